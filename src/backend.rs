//! The backend seen from the dashboard.
//!
//! [`CameraBackend`] is the only way the monitor talks to the camera service.
//! [`crate::http_backend::HttpBackend`] speaks the REST API over the network;
//! [`FakeBackend`] answers in-process from its own directory and token
//! registry, so the dashboard can run and be tested without a server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use log::debug;

use crate::auth::{self, TokenRegistry};
use crate::common::{Camera, CameraId, CameraList, CameraPatch, Credentials, HealthResponse, LoginResponse, NewCamera, StatusResponse};
use crate::directory::{CameraDirectory, Clock};
use crate::error::{Error, Result};
use crate::session::Session;



#[async_trait::async_trait]
pub trait CameraBackend: Send + Sync {
	async fn health(&self) -> Result<HealthResponse>;

	async fn status(&self) -> Result<StatusResponse>;

	/// Exchanges credentials for a session. Rejected credentials are
	/// `Unauthorized`.
	async fn login(&self, credentials: &Credentials) -> Result<Session>;

	async fn logout(&self, session: &Session) -> Result<()>;

	async fn list_cameras(&self, session: &Session) -> Result<CameraList>;

	async fn get_camera(&self, session: &Session, id: CameraId) -> Result<Camera>;

	async fn create_camera(&self, session: &Session, fields: &NewCamera) -> Result<Camera>;

	async fn update_camera(&self, session: &Session, id: CameraId, patch: &CameraPatch) -> Result<Camera>;

	async fn delete_camera(&self, session: &Session, id: CameraId) -> Result<()>;
}

/// Turns a login answer into a session, or `Unauthorized` when refused.
pub fn session_from_login(response: LoginResponse) -> Result<Session> {
	match (response.success, response.token, response.user) {
		(true, Some(token), Some(user)) => Ok(Session::new(token, user)),
		(true, _, _) => Err(Error::Decode("login succeeded without token or user".to_string())),
		(false, _, _) => Err(Error::Unauthorized(
			response.message.unwrap_or_else(|| "Invalid credentials".to_string())
		)),
	}
}

/// In-process backend with the same behaviour as the REST service.
pub struct FakeBackend {
	cameras: Mutex<CameraDirectory>,
	tokens: TokenRegistry,
	latency: Option<Duration>,
}

impl FakeBackend {
	pub fn new(clock: Arc<dyn Clock>, cameras: CameraList) -> Self {
		FakeBackend {
			cameras: Mutex::new(CameraDirectory::with_cameras(clock, cameras)),
			tokens: TokenRegistry::new(),
			latency: None,
		}
	}

	/// Delays every call, like a remote service would.
	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}

	/// Invalidates every issued token; the next protected call fails with
	/// `Unauthorized`.
	pub async fn revoke_all(&self) {
		self.tokens.revoke_all().await;
	}

	async fn simulate_latency(&self) {
		if let Some(latency) = self.latency {
			tokio::time::sleep(latency).await;
		}
	}

	async fn authorize(&self, session: &Session) -> Result<()> {
		self.simulate_latency().await;
		if self.tokens.is_valid(&session.token).await {
			Ok(())
		} else {
			Err(Error::Unauthorized("invalid or expired token".to_string()))
		}
	}
}

#[async_trait::async_trait]
impl CameraBackend for FakeBackend {
	async fn health(&self) -> Result<HealthResponse> {
		Ok(HealthResponse {
			status: "ok".to_string(),
			message: "Fake backend".to_string(),
		})
	}

	async fn status(&self) -> Result<StatusResponse> {
		let summary = self.cameras.lock().await.summary();
		Ok(StatusResponse {
			status: "running".to_string(),
			version: env!("CARGO_PKG_VERSION").to_string(),
			cameras: summary.total,
			online: summary.online,
			offline: summary.offline,
		})
	}

	async fn login(&self, credentials: &Credentials) -> Result<Session> {
		self.simulate_latency().await;
		session_from_login(auth::login(&self.tokens, credentials).await)
	}

	async fn logout(&self, session: &Session) -> Result<()> {
		self.simulate_latency().await;
		self.tokens.revoke(&session.token).await;
		Ok(())
	}

	async fn list_cameras(&self, session: &Session) -> Result<CameraList> {
		self.authorize(session).await?;
		debug!("Fake backend: listing cameras");
		Ok(self.cameras.lock().await.list_all().to_vec())
	}

	async fn get_camera(&self, session: &Session, id: CameraId) -> Result<Camera> {
		self.authorize(session).await?;
		self.cameras.lock().await.get_by_id(id).cloned()
	}

	async fn create_camera(&self, session: &Session, fields: &NewCamera) -> Result<Camera> {
		self.authorize(session).await?;
		debug!("Fake backend: creating camera {}", fields.name);
		self.cameras.lock().await.add(fields.clone())
	}

	async fn update_camera(&self, session: &Session, id: CameraId, patch: &CameraPatch) -> Result<Camera> {
		self.authorize(session).await?;
		debug!("Fake backend: updating camera {}", id);
		self.cameras.lock().await.update(id, patch.clone())
	}

	async fn delete_camera(&self, session: &Session, id: CameraId) -> Result<()> {
		self.authorize(session).await?;
		debug!("Fake backend: deleting camera {}", id);
		self.cameras.lock().await.remove(id)
	}
}
