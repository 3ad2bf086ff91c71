use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use log::debug;

use crate::backend::{session_from_login, CameraBackend};
use crate::common::{Camera, CameraId, CameraList, CameraPatch, Credentials, HealthResponse, LoginResponse, NewCamera, StatusResponse};
use crate::error::{Error, Result};
use crate::session::Session;


/// The server caps one listing at this many records.
const PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
struct ErrorBody {
	error: Option<String>,
	message: Option<String>,
}

/// Maps a failed response to an error kind. The body's `error` (or
/// `message`) field becomes the message when it can be read.
pub fn error_for_status(status: StatusCode, body: &str, id: Option<CameraId>) -> Error {
	let message = serde_json::from_str::<ErrorBody>(body)
		.ok()
		.and_then(|parsed| parsed.error.or(parsed.message))
		.unwrap_or_else(|| body.to_string());

	match status {
		StatusCode::UNAUTHORIZED => Error::Unauthorized(message),
		StatusCode::NOT_FOUND => match id {
			Some(id) => Error::NotFound(id),
			None => Error::Transport(format!("HTTP 404: {}", message)),
		},
		StatusCode::CONFLICT => Error::Conflict(message),
		StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::Validation(message),
		other => Error::Transport(format!("HTTP {}: {}", other.as_u16(), message)),
	}
}

/// REST client for the camera service.
pub struct HttpBackend {
	http: reqwest::Client,
	base_url: Url,
}

impl HttpBackend {
	pub fn new(base_url: &str) -> Result<Self> {
		Self::with_client(base_url, reqwest::Client::new())
	}

	pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self> {
		let mut base_url = Url::parse(base_url)
			.map_err(|err| Error::Validation(format!("invalid backend URL '{}': {}", base_url, err)))?;
		// Url::join replaces the last segment unless the path ends in '/'.
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());
			base_url.set_path(&path);
		}
		Ok(HttpBackend {
			http,
			base_url,
		})
	}

	pub fn endpoint(&self, path: &str) -> Result<Url> {
		self.base_url.join(path)
			.map_err(|err| Error::Validation(format!("invalid endpoint '{}': {}", path, err)))
	}

	fn camera_endpoint(&self, id: CameraId) -> Result<Url> {
		self.endpoint(&format!("api/cameras/{}", id))
	}

	fn page_endpoint(&self, skip: usize) -> Result<Url> {
		let mut url = self.endpoint("api/cameras")?;
		url.query_pairs_mut()
			.append_pair("skip", &skip.to_string())
			.append_pair("limit", &PAGE_SIZE.to_string());
		Ok(url)
	}

	async fn send<R: DeserializeOwned>(&self, request: RequestBuilder, id: Option<CameraId>) -> Result<R> {
		let response = request.send().await?;
		Self::parse(response, id).await
	}

	async fn parse<R: DeserializeOwned>(response: Response, id: Option<CameraId>) -> Result<R> {
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(error_for_status(status, &body, id));
		}
		response.json::<R>().await
			.map_err(|err| Error::Decode(format!("response body: {}", err)))
	}

	fn authed(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
		request.bearer_auth(&session.token)
	}
}

#[async_trait::async_trait]
impl CameraBackend for HttpBackend {
	async fn health(&self) -> Result<HealthResponse> {
		let request = self.http.get(self.endpoint("api/health")?);
		self.send(request, None).await
	}

	async fn status(&self) -> Result<StatusResponse> {
		let request = self.http.get(self.endpoint("api/status")?);
		self.send(request, None).await
	}

	async fn login(&self, credentials: &Credentials) -> Result<Session> {
		let request = self.http.post(self.endpoint("api/auth/login")?).json(credentials);
		let response = request.send().await?;
		// A refused login still carries a LoginResponse body.
		if response.status() == StatusCode::UNAUTHORIZED {
			let refused: LoginResponse = response.json().await
				.map_err(|err| Error::Decode(format!("login response: {}", err)))?;
			return session_from_login(refused);
		}
		session_from_login(Self::parse(response, None).await?)
	}

	async fn logout(&self, session: &Session) -> Result<()> {
		let request = self.authed(self.http.post(self.endpoint("api/auth/logout")?), session);
		let _: serde_json::Value = self.send(request, None).await?;
		Ok(())
	}

	async fn list_cameras(&self, session: &Session) -> Result<CameraList> {
		let mut cameras = CameraList::new();
		// Keep paging until the server hands back a short page.
		loop {
			let request = self.authed(self.http.get(self.page_endpoint(cameras.len())?), session);
			let page: CameraList = self.send(request, None).await?;
			let last = page.len() < PAGE_SIZE;
			cameras.extend(page);
			if last {
				break;
			}
		}
		debug!("Fetched {} cameras", cameras.len());
		Ok(cameras)
	}

	async fn get_camera(&self, session: &Session, id: CameraId) -> Result<Camera> {
		let request = self.authed(self.http.get(self.camera_endpoint(id)?), session);
		self.send(request, Some(id)).await
	}

	async fn create_camera(&self, session: &Session, fields: &NewCamera) -> Result<Camera> {
		let request = self.authed(self.http.post(self.endpoint("api/cameras")?), session).json(fields);
		self.send(request, None).await
	}

	async fn update_camera(&self, session: &Session, id: CameraId, patch: &CameraPatch) -> Result<Camera> {
		let request = self.authed(self.http.put(self.camera_endpoint(id)?), session).json(patch);
		self.send(request, Some(id)).await
	}

	async fn delete_camera(&self, session: &Session, id: CameraId) -> Result<()> {
		let request = self.authed(self.http.delete(self.camera_endpoint(id)?), session);
		let _: serde_json::Value = self.send(request, Some(id)).await?;
		Ok(())
	}
}
