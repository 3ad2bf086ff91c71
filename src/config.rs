use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use log::{debug, info};



pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["/etc/cctv-monitor/config.toml", "cctv-monitor.toml"];

#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub server: ServerConfig,
	pub monitor: MonitorConfig,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	pub address: String,
	pub port: u16,
	pub require_auth: bool,
	pub seed_demo_cameras: bool,
	pub utc_offset_hours: i32,
	pub probe_timeout_ms: u64,
}

impl Default for ServerConfig {
	fn default() -> Self {
		ServerConfig {
			address: "127.0.0.1".to_string(),
			port: 3000,
			require_auth: true,
			seed_demo_cameras: true,
			utc_offset_hours: 7,
			probe_timeout_ms: 2000,
		}
	}
}

impl ServerConfig {
	pub fn probe_timeout(&self) -> Duration {
		Duration::from_millis(self.probe_timeout_ms)
	}
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
	pub backend_url: String,
	pub username: Option<String>,
	pub password: Option<String>,
	pub refresh_interval_secs: u64,
	pub pulse_interval_ms: u64,
	pub coordinate_precision: usize,
	pub session_file: Option<PathBuf>,
}

impl Default for MonitorConfig {
	fn default() -> Self {
		MonitorConfig {
			backend_url: "http://127.0.0.1:3000/".to_string(),
			username: None,
			password: None,
			refresh_interval_secs: 30,
			pulse_interval_ms: 1000,
			coordinate_precision: 4,
			session_file: None,
		}
	}
}

impl MonitorConfig {
	pub fn refresh_interval(&self) -> Duration {
		Duration::from_secs(self.refresh_interval_secs.max(1))
	}

	pub fn pulse_interval(&self) -> Duration {
		Duration::from_millis(self.pulse_interval_ms.max(1))
	}
}

/// Merges TOML config files in the order they are read; later files win.
#[derive(Clone)]
#[derive(Debug)]
pub struct ConfigManager {
	merged: toml::Table,
	config: Config,
}

impl ConfigManager {
	pub fn new() -> Self {
		ConfigManager {
			merged: toml::Table::new(),
			config: Config::default(),
		}
	}

	pub fn read_config(&mut self, filenames: Vec<&str>) -> anyhow::Result<()> {
		for filename in filenames {
			let text = fs::read_to_string(filename)
				.with_context(|| format!("failed to read config file {}", filename))?;
			self.merge_str(&text)
				.with_context(|| format!("failed to parse config file {}", filename))?;
			info!("Read config file {}", filename);
		}
		Ok(())
	}

	pub fn read_default_config_files(&mut self) -> anyhow::Result<()> {
		let existing: Vec<&str> = DEFAULT_CONFIG_FILES
			.iter()
			.copied()
			.filter(|filename| Path::new(filename).exists())
			.collect();
		if existing.is_empty() {
			debug!("No default config files found; using built-in defaults");
		}
		self.read_config(existing)
	}

	pub fn merge_str(&mut self, text: &str) -> anyhow::Result<()> {
		let table: toml::Table = toml::from_str(text)?;
		let mut merged = self.merged.clone();
		merge_tables(&mut merged, table);
		self.config = toml::Value::Table(merged.clone()).try_into()?;
		self.merged = merged;
		Ok(())
	}

	pub fn get_config(&self) -> &Config {
		&self.config
	}
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
	for (key, value) in overlay {
		match (base.get_mut(&key), value) {
			(Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
				merge_tables(existing, incoming);
			},
			(_, value) => {
				base.insert(key, value);
			}
		}
	}
}
