use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::backend::{CameraBackend, FakeBackend};
use crate::common::{Camera, CameraId, CameraPatch, Credentials, NewCamera, Summary};
use crate::config::MonitorConfig;
use crate::directory::{CameraDirectory, SystemClock};
use crate::error::{Error, Result};
use crate::http_backend::HttpBackend;
use crate::log_surface::LogSurface;
use crate::map_view::{MapView, Popup, RenderReport};
use crate::router::{self, Route};
use crate::seed;
use crate::session::{FileStorage, MemoryStorage, Session, SessionContext, SessionStorage};



const DEMO_LATENCY: Duration = Duration::from_millis(500);


/// Client-side state of one dashboard: session, camera directory, map.
///
/// Every change flows backend → directory → map. An `Unauthorized` answer
/// from the backend ends the session and sends the dashboard back to the
/// login page before the error reaches the caller.
pub struct Dashboard {
	backend: Arc<dyn CameraBackend>,
	session: SessionContext,
	cameras: CameraDirectory,
	view: MapView,
	route: Route,
}

impl Dashboard {
	pub fn new(backend: Arc<dyn CameraBackend>, session: SessionContext, cameras: CameraDirectory, view: MapView) -> Self {
		Dashboard {
			backend,
			session,
			cameras,
			view,
			route: Route::Login,
		}
	}

	pub fn route(&self) -> Route {
		self.route
	}

	pub fn session(&self) -> Option<&Session> {
		self.session.current()
	}

	pub fn cameras(&self) -> &CameraDirectory {
		&self.cameras
	}

	pub fn view(&self) -> &MapView {
		&self.view
	}

	pub fn summary(&self) -> Summary {
		self.cameras.summary()
	}

	pub fn popup(&self, id: CameraId) -> Option<Popup> {
		self.view.popup(id)
	}

	pub fn navigate(&mut self, requested: Route) -> Route {
		self.route = router::resolve(requested, self.session.is_authenticated());
		if self.route != requested {
			info!("Redirected from {} to {}", requested, self.route);
		}
		self.route
	}

	pub fn restore_session(&mut self) -> bool {
		self.session.restore().is_some()
	}

	pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
		let session = self.backend.login(credentials).await?;
		info!("Logged in as {} ({})", session.user.name, session.user.role);
		self.session.begin(session);
		self.navigate(Route::Monitoring);
		Ok(())
	}

	pub async fn logout(&mut self) -> Result<()> {
		if let Some(session) = self.session.current() {
			// The local session ends either way.
			if let Err(err) = self.backend.logout(session).await {
				warn!("Backend logout failed; error was {}", err);
			}
		}
		self.end_session();
		Ok(())
	}

	/// Reloads the camera list and re-renders the map from it.
	pub async fn refresh(&mut self) -> Result<RenderReport> {
		let session = self.active_session()?;
		let result = self.backend.list_cameras(&session).await;
		let cameras = self.guard(result)?;
		self.cameras.replace_all(cameras);
		Ok(self.render())
	}

	pub async fn add_camera(&mut self, fields: NewCamera) -> Result<Camera> {
		let session = self.active_session()?;
		let result = self.backend.create_camera(&session, &fields).await;
		let camera = self.guard(result)?;
		self.cameras.upsert(camera.clone());
		self.render();
		Ok(camera)
	}

	pub async fn update_camera(&mut self, id: CameraId, patch: CameraPatch) -> Result<Camera> {
		let session = self.active_session()?;
		let result = self.backend.update_camera(&session, id, &patch).await;
		let camera = self.guard(result)?;
		self.cameras.upsert(camera.clone());
		self.render();
		Ok(camera)
	}

	pub async fn delete_camera(&mut self, id: CameraId) -> Result<()> {
		let session = self.active_session()?;
		let result = self.backend.delete_camera(&session, id).await;
		self.guard(result)?;
		// Already gone locally is fine; the backend is authoritative.
		let _ = self.cameras.remove(id);
		self.render();
		Ok(())
	}

	fn render(&mut self) -> RenderReport {
		let report = self.view.render(self.cameras.list_all());
		for (id, reason) in &report.skipped {
			warn!("Camera {} not on map: {}", id, reason);
		}
		report
	}

	fn active_session(&mut self) -> Result<Session> {
		match self.session.current() {
			Some(session) => Ok(session.clone()),
			None => {
				self.navigate(Route::Monitoring);
				Err(Error::Unauthorized("not logged in".to_string()))
			}
		}
	}

	fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
		if let Err(Error::Unauthorized(reason)) = &result {
			warn!("Session rejected by backend ({}); returning to login", reason);
			self.end_session();
		}
		result
	}

	fn end_session(&mut self) {
		self.session.end();
		self.cameras.replace_all(Vec::new());
		self.view.clear();
		self.route = Route::Login;
	}
}


fn session_storage(config: &MonitorConfig) -> Box<dyn SessionStorage> {
	match &config.session_file {
		Some(path) => Box::new(FileStorage::new(path.clone())),
		None => Box::new(MemoryStorage::new()),
	}
}

fn configured_credentials(config: &MonitorConfig) -> Option<Credentials> {
	match (&config.username, &config.password) {
		(Some(username), Some(password)) => Some(Credentials::new(username, password)),
		_ => None,
	}
}

async fn sign_in(dashboard: &mut Dashboard, config: &MonitorConfig) -> anyhow::Result<()> {
	match configured_credentials(config) {
		Some(credentials) => {
			dashboard.login(&credentials).await?;
			Ok(())
		},
		None => anyhow::bail!("no stored session and no username/password configured"),
	}
}

/// One refresh cycle. An expired session triggers a single re-login with
/// the configured credentials; only missing credentials are fatal.
async fn refresh_once(dashboard: &mut Dashboard, config: &MonitorConfig) -> anyhow::Result<()> {
	match dashboard.refresh().await {
		Ok(report) => {
			let summary = dashboard.summary();
			info!(
				"{} cameras ({} online, {} offline); markers +{} ~{} -{}",
				summary.total, summary.online, summary.offline,
				report.counts.created, report.counts.updated, report.counts.removed
			);
		},
		Err(Error::Unauthorized(_)) => {
			let credentials = match configured_credentials(config) {
				Some(credentials) => credentials,
				None => anyhow::bail!("session expired and no username/password configured"),
			};
			if let Err(err) = dashboard.login(&credentials).await {
				error!("Re-login failed, retrying on next refresh; error was {}", err);
			}
		},
		Err(err) => error!("Refresh failed; error was {}", err),
	}
	Ok(())
}

/// Runs the dashboard until Ctrl-C, against the configured backend or, in
/// demo mode, against an in-process fake one.
pub async fn run(config: &MonitorConfig, demo: bool) -> anyhow::Result<()> {
	let mut config = config.clone();
	let backend: Arc<dyn CameraBackend> = if demo {
		if configured_credentials(&config).is_none() {
			config.username = Some("demo".to_string());
			config.password = Some("demo".to_string());
		}
		let clock = Arc::new(SystemClock::with_offset_hours(0));
		Arc::new(FakeBackend::new(clock, seed::demo_cameras()).with_latency(DEMO_LATENCY))
	} else {
		Arc::new(HttpBackend::new(&config.backend_url)?)
	};
	let config = &config;

	match backend.health().await {
		Ok(health) => info!("Backend is {}: {}", health.status, health.message),
		Err(err) => warn!("Backend health check failed; error was {}", err),
	}

	let view = MapView::new(Arc::new(LogSurface::new()), config.pulse_interval(), config.coordinate_precision);
	let cameras = CameraDirectory::new(Arc::new(SystemClock::with_offset_hours(0)));
	let mut dashboard = Dashboard::new(backend, SessionContext::new(session_storage(config)), cameras, view);

	if !dashboard.restore_session() {
		sign_in(&mut dashboard, config).await?;
	}
	dashboard.navigate(Route::Monitoring);

	let mut ticker = tokio::time::interval(config.refresh_interval());
	loop {
		tokio::select! {
			_ = ticker.tick() => refresh_once(&mut dashboard, config).await?,
			_ = tokio::signal::ctrl_c() => {
				info!("Shutting down");
				break;
			}
		}
	}

	dashboard.view.clear();
	Ok(())
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::common::{CameraStatus, Coordinates};
	use crate::directory::tests::StepClock;
	use crate::map_view::tests::RecordingSurface;
	use crate::seed::demo_cameras;

	fn dashboard() -> (Arc<FakeBackend>, Dashboard) {
		let backend = Arc::new(FakeBackend::new(StepClock::new(), demo_cameras()));
		let view = MapView::new(Arc::new(RecordingSurface::default()), Duration::from_millis(1000), 4);
		let dashboard = Dashboard::new(
			backend.clone(),
			SessionContext::new(Box::new(MemoryStorage::new())),
			CameraDirectory::new(StepClock::new()),
			view,
		);
		(backend, dashboard)
	}

	#[tokio::test(start_paused = true)]
	async fn login_refresh_and_mutate() {
		let (_backend, mut dashboard) = dashboard();
		assert_eq!(dashboard.navigate(Route::Monitoring), Route::Login);

		dashboard.login(&Credentials::new("admin", "secret")).await.unwrap();
		assert_eq!(dashboard.route(), Route::Monitoring);

		let report = dashboard.refresh().await.unwrap();
		assert_eq!(report.counts.created, 5);
		assert_eq!(dashboard.summary(), Summary { total: 5, online: 4, offline: 1 });
		assert!(dashboard.refresh().await.unwrap().is_noop());

		let fields = NewCamera::new("Gate", "North", Coordinates::new(20.045, 99.8925), CameraStatus::Up);
		let created = dashboard.add_camera(fields).await.unwrap();
		assert_eq!(created.id, 6);
		assert_eq!(dashboard.view().marker_count(), 6);

		dashboard.update_camera(6, CameraPatch::status(CameraStatus::Down)).await.unwrap();
		assert_eq!(dashboard.view().active_pulses(), 2);
		assert_eq!(dashboard.popup(6).unwrap().status_label, "Offline");

		dashboard.delete_camera(6).await.unwrap();
		assert_eq!(dashboard.view().marker_count(), 5);
		assert_eq!(dashboard.view().active_pulses(), 1);
		assert!(matches!(dashboard.cameras().get_by_id(6), Err(Error::NotFound(6))));
		assert!(matches!(dashboard.delete_camera(6).await, Err(Error::NotFound(6))));
	}

	#[tokio::test(start_paused = true)]
	async fn unauthorized_response_ends_the_session() {
		let (backend, mut dashboard) = dashboard();
		dashboard.login(&Credentials::new("admin", "secret")).await.unwrap();
		dashboard.refresh().await.unwrap();

		backend.revoke_all().await;
		assert!(matches!(dashboard.refresh().await, Err(Error::Unauthorized(_))));
		assert!(dashboard.session().is_none());
		assert_eq!(dashboard.route(), Route::Login);
		assert_eq!(dashboard.view().marker_count(), 0);
		assert_eq!(dashboard.view().active_pulses(), 0);
		assert!(dashboard.cameras().is_empty());

		assert_eq!(dashboard.navigate(Route::Monitoring), Route::Login);
	}

	#[tokio::test(start_paused = true)]
	async fn logout_clears_everything() {
		let (backend, mut dashboard) = dashboard();
		dashboard.login(&Credentials::new("admin", "secret")).await.unwrap();
		let session = dashboard.session().unwrap().clone();
		dashboard.refresh().await.unwrap();

		dashboard.logout().await.unwrap();
		assert!(dashboard.session().is_none());
		assert_eq!(dashboard.route(), Route::Login);
		assert_eq!(dashboard.view().marker_count(), 0);
		assert!(matches!(backend.list_cameras(&session).await, Err(Error::Unauthorized(_))));
	}

	#[tokio::test(start_paused = true)]
	async fn calls_without_session_are_unauthorized() {
		let (_backend, mut dashboard) = dashboard();
		assert!(matches!(dashboard.refresh().await, Err(Error::Unauthorized(_))));
		assert_eq!(dashboard.route(), Route::Login);
		assert!(matches!(dashboard.login(&Credentials::new("", "")).await, Err(Error::Unauthorized(_))));
	}

	#[test]
	fn credentials_need_both_fields() {
		let mut config = MonitorConfig::default();
		assert!(configured_credentials(&config).is_none());
		config.username = Some("admin".to_string());
		assert!(configured_credentials(&config).is_none());
		config.password = Some("secret".to_string());
		assert!(configured_credentials(&config).is_some());
	}

	#[tokio::test(start_paused = true)]
	async fn refresh_once_logs_back_in() {
		let (_backend, mut dashboard) = dashboard();
		let mut config = MonitorConfig::default();
		assert!(refresh_once(&mut dashboard, &config).await.is_err());

		config.username = Some("admin".to_string());
		config.password = Some("secret".to_string());
		refresh_once(&mut dashboard, &config).await.unwrap();
		assert_eq!(dashboard.route(), Route::Monitoring);
		refresh_once(&mut dashboard, &config).await.unwrap();
		assert_eq!(dashboard.summary().total, 5);
	}

	#[tokio::test]
	async fn unreachable_backend_during_relogin_is_not_fatal() {
		let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
		let http = reqwest::Client::builder().no_proxy().build().unwrap();
		let backend = HttpBackend::with_client(&format!("http://127.0.0.1:{}", port), http).unwrap();
		let view = MapView::new(Arc::new(RecordingSurface::default()), Duration::from_millis(1000), 4);
		let mut dashboard = Dashboard::new(
			Arc::new(backend),
			SessionContext::new(Box::new(MemoryStorage::new())),
			CameraDirectory::new(StepClock::new()),
			view,
		);
		let config = MonitorConfig {
			username: Some("admin".to_string()),
			password: Some("secret".to_string()),
			..MonitorConfig::default()
		};

		refresh_once(&mut dashboard, &config).await.unwrap();
		assert!(dashboard.session().is_none());
		assert_eq!(dashboard.route(), Route::Login);
	}
}
