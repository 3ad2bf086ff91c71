#[macro_use] extern crate rocket;
#[macro_use] extern crate serde_derive;

use std::sync::Arc;

use clap::{Command, Arg, ArgAction};
use rocket::{Build, Request, Response, Rocket};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};

mod auth;
mod backend;
mod common;
mod config;
mod directory;
mod error;
mod http_backend;
mod log_surface;
mod map_view;
mod monitor;
mod probe;
mod rest_api;
mod router;
mod seed;
mod session;

use crate::config::{ConfigManager, ServerConfig};
use crate::directory::{Clock, SystemClock};



// Since the UI is served by another server, we may need to setup CORS to allow the UI to make requests to this server.
pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
	fn info(&self) -> Info {
		Info {
			name: "Add CORS headers to responses",
			kind: Kind::Response
		}
	}

	async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
		response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
		response.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"));
		response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
		response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
	}
}

// Browsers send a preflight OPTIONS before PUT, DELETE and any request carrying Authorization.
#[options("/<_..>")]
fn preflight() -> Status {
	Status::NoContent
}

pub fn build_rocket(config: &ServerConfig, clock: Arc<dyn Clock>) -> Rocket<Build> {
	let figment = rocket::Config::figment()
		.merge(("address", config.address.clone()))
		.merge(("port", config.port));

	rocket::custom(figment)
		.attach(rest_api::stage(config, clock))
		.attach(auth::stage())
		.attach(CORS)
		.mount("/", routes![preflight])
}

fn cli() -> Command {
	Command::new("cctv-monitor")
		.version(env!("CARGO_PKG_VERSION"))
		.about("CCTV monitoring backend and map dashboard.")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.action(ArgAction::Append)	// Allow argument to be specified multiple times
				.short('c')
				.long("config")
				.global(true)
				.help("TOML file with cctv-monitor config")
		)
		.subcommand(Command::new("serve").about("Run the mock REST backend"))
		.subcommand(
			Command::new("monitor")
				.about("Log in to a backend and keep the camera map in sync")
				.arg(Arg::new("backend").long("backend").help("Backend base URL"))
				.arg(Arg::new("username").short('u').long("username"))
				.arg(Arg::new("password").short('p').long("password"))
				.arg(
					Arg::new("demo")
						.long("demo")
						.action(ArgAction::SetTrue)
						.help("Use the built-in fake backend instead of a server")
				)
		)
}


#[rocket::main]
async fn main() -> anyhow::Result<()> {
	let matches = cli().get_matches();

	let mut config_manager = ConfigManager::new();
	let config_filename_matches = matches.get_many::<String>("config");
	match config_filename_matches {
		Some(filenames) => {
			config_manager.read_config(filenames.map(|v| v.as_str()).collect())?;
		},
		None => {
			// Use default file path
			config_manager.read_default_config_files()?;
		}
	};
	let mut config = config_manager.get_config().clone();

	match matches.subcommand() {
		Some(("serve", _)) => {
			let clock = Arc::new(SystemClock::with_offset_hours(config.server.utc_offset_hours));
			build_rocket(&config.server, clock)
				.launch()
				.await?;
		},
		Some(("monitor", monitor_matches)) => {
			env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
			if let Some(backend) = monitor_matches.get_one::<String>("backend") {
				config.monitor.backend_url = backend.clone();
			}
			if let Some(username) = monitor_matches.get_one::<String>("username") {
				config.monitor.username = Some(username.clone());
			}
			if let Some(password) = monitor_matches.get_one::<String>("password") {
				config.monitor.password = Some(password.clone());
			}
			monitor::run(&config.monitor, monitor_matches.get_flag("demo")).await?;
		},
		_ => unreachable!("clap requires a subcommand"),
	}

	anyhow::Ok(())
}
