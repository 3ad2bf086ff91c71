use std::sync::Arc;

use tokio::sync::RwLock;

use rocket::http::Status;
use rocket::serde::json::{json, Json, Value};
use rocket::{Request, State};

use log::info;

use crate::auth::Authenticated;
use crate::common::{Camera, CameraId, CameraList, CameraPatch, HealthResponse, MessageResponse, NewCamera, StatusResponse};
use crate::config::ServerConfig;
use crate::directory::{CameraDirectory, Clock};
use crate::error::Result;
use crate::probe;
use crate::seed;



pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_PAGE_LIMIT: usize = 100;

type DirectoryState = RwLock<CameraDirectory>;


#[get("/?<skip>&<limit>")]
async fn list_cameras(skip: Option<usize>, limit: Option<usize>, _auth: Authenticated, cameras_state: &State<DirectoryState>) -> Json<CameraList> {
	let cameras = cameras_state.read().await;
	Json(cameras.page(skip.unwrap_or(0), limit.unwrap_or(DEFAULT_PAGE_LIMIT)))
}

#[get("/<id>")]
async fn get_camera(id: CameraId, _auth: Authenticated, cameras_state: &State<DirectoryState>) -> Result<Json<Camera>> {
	let cameras = cameras_state.read().await;
	cameras.get_by_id(id).map(|camera| {
		Json(camera.clone())
	})
}

#[post("/", data = "<camera_json>")]
async fn new_camera(camera_json: Json<NewCamera>, _auth: Authenticated, cameras_state: &State<DirectoryState>) -> Result<Json<Camera>> {
	let mut cameras = cameras_state.write().await;
	let camera = cameras.add(camera_json.into_inner())?;
	info!("Added camera {} ({})", camera.id, camera.name);
	Ok(Json(camera))
}

#[put("/<id>", data = "<patch_json>")]
async fn update_camera(id: CameraId, patch_json: Json<CameraPatch>, _auth: Authenticated, cameras_state: &State<DirectoryState>) -> Result<Json<Camera>> {
	let mut cameras = cameras_state.write().await;
	let camera = cameras.update(id, patch_json.into_inner())?;
	info!("Updated camera {} ({})", camera.id, camera.name);
	Ok(Json(camera))
}

#[delete("/<id>")]
async fn delete_camera(id: CameraId, _auth: Authenticated, cameras_state: &State<DirectoryState>) -> Result<Json<MessageResponse>> {
	let mut cameras = cameras_state.write().await;
	cameras.remove(id)?;
	info!("Deleted camera {}", id);
	Ok(Json(MessageResponse {
		success: None,
		message: "Camera deleted successfully".to_string(),
	}))
}

#[post("/<id>/check")]
async fn check_camera(id: CameraId, _auth: Authenticated, cameras_state: &State<DirectoryState>, config: &State<ServerConfig>) -> Result<Json<Camera>> {
	// The probe can take seconds, so it runs without holding the lock.
	let camera = cameras_state.read().await.get_by_id(id)?.clone();
	let observed = match probe::check_reachability(&camera, config.probe_timeout()).await {
		Some(status) => status,
		None => return Ok(Json(camera)),
	};

	let mut cameras = cameras_state.write().await;
	let updated = cameras.set_status(id, observed)?;
	if updated.status != camera.status {
		info!("Camera {} ({}) status changed: {} -> {}", id, updated.name, camera.status, updated.status);
	}
	Ok(Json(updated))
}

#[get("/health")]
fn health() -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok".to_string(),
		message: "CCTV Monitoring API is running".to_string(),
	})
}

#[get("/status")]
async fn status(cameras_state: &State<DirectoryState>) -> Json<StatusResponse> {
	let summary = cameras_state.read().await.summary();
	Json(StatusResponse {
		status: "running".to_string(),
		version: API_VERSION.to_string(),
		cameras: summary.total,
		online: summary.online,
		offline: summary.offline,
	})
}

#[catch(default)]
fn default_catcher(status: Status, _request: &Request) -> Value {
	let reason = match status.code {
		400 => "Malformed request body",
		401 => "Unauthorized",
		404 => "Route not found",
		422 => "Invalid camera fields",
		500 => "Something went wrong!",
		_ => status.reason().unwrap_or("Request failed"),
	};
	json!({
		"error": reason
	})
}



fn initial_cameras(config: &ServerConfig, clock: Arc<dyn Clock>) -> CameraDirectory {
	if config.seed_demo_cameras {
		CameraDirectory::with_cameras(clock, seed::demo_cameras())
	} else {
		CameraDirectory::new(clock)
	}
}

pub fn stage(config: &ServerConfig, clock: Arc<dyn Clock>) -> rocket::fairing::AdHoc {
	let cameras = initial_cameras(config, clock);
	info!("Serving {} cameras", cameras.len());

	// Using tokio::sync::RwLock rather than std::sync::RwLock so that:
	//     A.) Multiple readers can read the directory at the same time without blocking each other
	//     B.) A new reader cannot acquire the lock while a writer is waiting for it.
	let cameras_lock: DirectoryState = RwLock::new(cameras);
	let config = config.clone();

	rocket::fairing::AdHoc::on_ignite("Cameras", move |rocket| async move {
		rocket
			.manage(cameras_lock)
			.manage(config)
			.register("/", catchers![default_catcher])
			.mount("/api", routes![health, status])
			.mount("/api/cameras", routes![list_cameras, get_camera, new_camera, update_camera, delete_camera, check_camera])
			.mount("/api/cctvs", routes![list_cameras, get_camera, new_camera, update_camera, delete_camera, check_camera])
	})
}


#[cfg(test)]
mod tests {
	use rocket::http::{ContentType, Header};
	use rocket::local::blocking::Client;

	use crate::common::{CameraStatus, LoginResponse};
	use crate::config::ServerConfig;
	use crate::directory::tests::StepClock;

	use super::*;

	fn client(config: ServerConfig) -> Client {
		Client::tracked(crate::build_rocket(&config, StepClock::new())).expect("valid rocket instance")
	}

	fn login(client: &Client) -> Header<'static> {
		let response = client.post("/api/auth/login")
			.header(ContentType::JSON)
			.body(r#"{"username":"admin","password":"secret"}"#)
			.dispatch();
		assert_eq!(response.status(), Status::Ok);
		let body: LoginResponse = response.into_json().unwrap();
		Header::new("Authorization", format!("Bearer {}", body.token.unwrap()))
	}

	#[test]
	fn health_and_status_are_public() {
		let client = client(ServerConfig::default());
		let response = client.get("/api/health").dispatch();
		assert_eq!(response.status(), Status::Ok);
		assert_eq!(response.into_json::<Value>().unwrap()["status"], "ok");

		let status: Value = client.get("/api/status").dispatch().into_json().unwrap();
		assert_eq!(status["cameras"], 5);
		assert_eq!(status["offline"], 1);
	}

	#[test]
	fn protected_routes_need_a_valid_token() {
		let client = client(ServerConfig::default());
		let response = client.get("/api/cameras").dispatch();
		assert_eq!(response.status(), Status::Unauthorized);
		assert!(response.into_json::<Value>().unwrap()["error"].is_string());

		let response = client.get("/api/cameras")
			.header(Header::new("Authorization", "Bearer forged"))
			.dispatch();
		assert_eq!(response.status(), Status::Unauthorized);
	}

	#[test]
	fn empty_credentials_are_rejected() {
		let client = client(ServerConfig::default());
		let response = client.post("/api/auth/login")
			.header(ContentType::JSON)
			.body(r#"{"username":"admin"}"#)
			.dispatch();
		assert_eq!(response.status(), Status::Unauthorized);
		let body: LoginResponse = response.into_json().unwrap();
		assert!(!body.success);
	}

	#[test]
	fn logout_revokes_the_token() {
		let client = client(ServerConfig::default());
		let auth = login(&client);
		assert_eq!(client.get("/api/cameras").header(auth.clone()).dispatch().status(), Status::Ok);

		let response = client.post("/api/auth/logout").header(auth.clone()).dispatch();
		assert_eq!(response.status(), Status::Ok);
		assert_eq!(client.get("/api/cameras").header(auth).dispatch().status(), Status::Unauthorized);
	}

	#[test]
	fn camera_crud_round() {
		let client = client(ServerConfig { seed_demo_cameras: false, ..ServerConfig::default() });
		let auth = login(&client);

		let listed: CameraList = client.get("/api/cameras").header(auth.clone()).dispatch().into_json().unwrap();
		assert!(listed.is_empty());

		let response = client.post("/api/cameras")
			.header(auth.clone())
			.header(ContentType::JSON)
			.body(r#"{"name":"Gate","location":"North","coordinates":[20.045,99.8925],"status":"up","ipAddress":"192.168.1.100"}"#)
			.dispatch();
		assert_eq!(response.status(), Status::Ok);
		let created: Camera = response.into_json().unwrap();
		assert_eq!(created.id, 1);

		let response = client.put("/api/cameras/1")
			.header(auth.clone())
			.header(ContentType::JSON)
			.body(r#"{"status":"down"}"#)
			.dispatch();
		let updated: Camera = response.into_json().unwrap();
		assert_eq!(updated.status, CameraStatus::Down);
		assert_eq!(updated.name, "Gate");
		assert_ne!(updated.last_update, created.last_update);

		// The legacy path serves the same directory.
		let fetched: Camera = client.get("/api/cctvs/1").header(auth.clone()).dispatch().into_json().unwrap();
		assert_eq!(fetched, updated);

		assert_eq!(client.delete("/api/cameras/1").header(auth.clone()).dispatch().status(), Status::Ok);
		let response = client.get("/api/cameras/1").header(auth.clone()).dispatch();
		assert_eq!(response.status(), Status::NotFound);
		assert_eq!(response.into_json::<Value>().unwrap()["error"], "Camera with id 1 not found");
		assert_eq!(client.delete("/api/cameras/1").header(auth).dispatch().status(), Status::NotFound);
	}

	#[test]
	fn invalid_and_conflicting_cameras_are_rejected() {
		let client = client(ServerConfig::default());
		let auth = login(&client);

		let response = client.post("/api/cameras")
			.header(auth.clone())
			.header(ContentType::JSON)
			.body(r#"{"name":"Gate","location":"North","coordinates":[120.0,99.0]}"#)
			.dispatch();
		assert_eq!(response.status(), Status::UnprocessableEntity);

		let response = client.post("/api/cameras")
			.header(auth.clone())
			.header(ContentType::JSON)
			.body(r#"{"name":"Gate","location":"North","coordinates":[20.0,99.0],"ipAddress":"192.168.1.10"}"#)
			.dispatch();
		assert_eq!(response.status(), Status::Conflict);

		let response = client.post("/api/cameras")
			.header(auth)
			.header(ContentType::JSON)
			.body(r#"{"name":"Gate","location":"North","coordinates":[20.0,99.0],"status":"unknown"}"#)
			.dispatch();
		assert_eq!(response.status(), Status::UnprocessableEntity);
	}

	#[test]
	fn paging_and_disabled_auth() {
		let client = client(ServerConfig { require_auth: false, ..ServerConfig::default() });
		let page: CameraList = client.get("/api/cameras?skip=1&limit=2").dispatch().into_json().unwrap();
		let ids: Vec<CameraId> = page.iter().map(|camera| camera.id).collect();
		assert_eq!(ids, vec![2, 3]);
	}

	#[test]
	fn check_without_address_returns_camera_unchanged() {
		let client = client(ServerConfig { require_auth: false, ..ServerConfig::default() });
		let before: Camera = client.get("/api/cameras/5").dispatch().into_json().unwrap();
		let after: Camera = client.post("/api/cameras/5/check").dispatch().into_json().unwrap();
		assert_eq!(before, after);
		assert_eq!(client.post("/api/cameras/99/check").dispatch().status(), Status::NotFound);
	}

	#[test]
	fn unknown_route_gets_json_error() {
		let client = client(ServerConfig::default());
		let response = client.get("/api/nothing-here").dispatch();
		assert_eq!(response.status(), Status::NotFound);
		assert_eq!(response.into_json::<Value>().unwrap()["error"], "Route not found");
	}
}
