use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, Result};



pub type CameraId = u64;
pub type CameraList = Vec<Camera>;

pub const MAX_TEXT_LEN: usize = 255;
pub const MAX_BRAND_LEN: usize = 100;
pub const MAX_VERSION_LEN: usize = 50;
pub const MAX_RTSP_URL_LEN: usize = 500;

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
	pub id: CameraId,
	pub name: String,
	pub location: String,
	pub coordinates: Coordinates,
	pub status: CameraStatus,
	pub last_update: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ip_address: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub brand: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rtsp_url: Option<String>,
}

/// Latitude/longitude pair in degrees, carried on the wire as `[lat, lng]`.
#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
	pub lat: f64,
	pub lng: f64,
}

impl Coordinates {
	pub fn new(lat: f64, lng: f64) -> Self {
		Coordinates { lat, lng }
	}

	pub fn is_valid(&self) -> bool {
		self.lat.is_finite()
			&& self.lng.is_finite()
			&& (-90.0..=90.0).contains(&self.lat)
			&& (-180.0..=180.0).contains(&self.lng)
	}

	/// Formats as `lat, lng` with a fixed number of decimal places.
	pub fn format(&self, precision: usize) -> String {
		format!("{:.*}, {:.*}", precision, self.lat, precision, self.lng)
	}
}

impl From<[f64; 2]> for Coordinates {
	fn from(pair: [f64; 2]) -> Self {
		Coordinates { lat: pair[0], lng: pair[1] }
	}
}

impl From<Coordinates> for [f64; 2] {
	fn from(coordinates: Coordinates) -> Self {
		[coordinates.lat, coordinates.lng]
	}
}

#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
#[derive(Default)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
	#[default]
	Up,
	Down,
}

impl CameraStatus {
	pub fn label(&self) -> &'static str {
		match self {
			CameraStatus::Up => "Online",
			CameraStatus::Down => "Offline",
		}
	}
}

impl fmt::Display for CameraStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CameraStatus::Up => write!(f, "up"),
			CameraStatus::Down => write!(f, "down"),
		}
	}
}

/// Fields accepted when adding a camera.
#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCamera {
	pub name: String,
	pub location: String,
	pub coordinates: Coordinates,
	#[serde(default)]
	pub status: CameraStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ip_address: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub brand: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rtsp_url: Option<String>,
}

impl NewCamera {
	pub fn new(name: &str, location: &str, coordinates: Coordinates, status: CameraStatus) -> Self {
		NewCamera {
			name: name.to_string(),
			location: location.to_string(),
			coordinates,
			status,
			ip_address: None,
			brand: None,
			version: None,
			rtsp_url: None,
		}
	}
}

/// Partial update; `None` keeps the current value.
#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub location: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub coordinates: Option<Coordinates>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<CameraStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ip_address: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub brand: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rtsp_url: Option<String>,
}

impl CameraPatch {
	pub fn status(status: CameraStatus) -> Self {
		CameraPatch { status: Some(status), ..Default::default() }
	}
}

impl Camera {
	/// Checks the invariants every stored record must satisfy.
	pub fn validate(&self) -> Result<()> {
		validate_text("name", &self.name)?;
		validate_text("location", &self.location)?;
		if !self.coordinates.is_valid() {
			return Err(Error::Validation(format!(
				"coordinates out of range: [{}, {}]", self.coordinates.lat, self.coordinates.lng
			)));
		}
		if let Some(ip) = &self.ip_address {
			if ip.parse::<IpAddr>().is_err() {
				return Err(Error::Validation(format!("invalid IP address '{}'", ip)));
			}
		}
		validate_optional("brand", &self.brand, MAX_BRAND_LEN)?;
		validate_optional("version", &self.version, MAX_VERSION_LEN)?;
		validate_optional("rtspUrl", &self.rtsp_url, MAX_RTSP_URL_LEN)?;
		Ok(())
	}

	pub fn apply(&mut self, patch: CameraPatch) {
		if let Some(name) = patch.name { self.name = name; }
		if let Some(location) = patch.location { self.location = location; }
		if let Some(coordinates) = patch.coordinates { self.coordinates = coordinates; }
		if let Some(status) = patch.status { self.status = status; }
		if patch.ip_address.is_some() { self.ip_address = patch.ip_address; }
		if patch.brand.is_some() { self.brand = patch.brand; }
		if patch.version.is_some() { self.version = patch.version; }
		if patch.rtsp_url.is_some() { self.rtsp_url = patch.rtsp_url; }
	}
}

fn validate_text(field: &str, value: &str) -> Result<()> {
	let len = value.trim().chars().count();
	if len == 0 {
		return Err(Error::Validation(format!("{} must not be empty", field)));
	}
	check_length(field, value, MAX_TEXT_LEN)
}

fn validate_optional(field: &str, value: &Option<String>, max: usize) -> Result<()> {
	match value {
		Some(value) => check_length(field, value, max),
		None => Ok(()),
	}
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
	if value.chars().count() > max {
		return Err(Error::Validation(format!("{} longer than {} characters", field, max)));
	}
	Ok(())
}

#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
#[derive(Default)]
#[derive(Serialize, Deserialize)]
pub struct Summary {
	pub total: usize,
	pub online: usize,
	pub offline: usize,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct User {
	pub name: String,
	pub role: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
pub struct Credentials {
	#[serde(default)]
	pub username: String,
	#[serde(default)]
	pub password: String,
}

impl Credentials {
	pub fn new(username: &str, password: &str) -> Self {
		Credentials { username: username.to_string(), password: password.to_string() }
	}
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<User>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub success: Option<bool>,
	pub message: String,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
	pub message: String,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
	pub status: String,
	pub version: String,
	pub cameras: usize,
	pub online: usize,
	pub offline: usize,
}


#[cfg(test)]
mod tests {
	use super::*;

	fn camera() -> Camera {
		Camera {
			id: 1,
			name: "Gate".to_string(),
			location: "North".to_string(),
			coordinates: Coordinates::new(20.045, 99.8925),
			status: CameraStatus::Up,
			last_update: "Just now".to_string(),
			ip_address: Some("192.168.1.10".to_string()),
			brand: None,
			version: None,
			rtsp_url: None,
		}
	}

	#[test]
	fn camera_json_uses_camel_case_and_coordinate_pair() {
		let value = serde_json::to_value(camera()).unwrap();
		assert_eq!(value["coordinates"], serde_json::json!([20.045, 99.8925]));
		assert_eq!(value["lastUpdate"], "Just now");
		assert_eq!(value["ipAddress"], "192.168.1.10");
		assert_eq!(value["status"], "up");
		assert!(value.get("brand").is_none());
	}

	#[test]
	fn unknown_status_is_rejected() {
		let body = r#"{"name":"A","location":"B","coordinates":[1.0,2.0],"status":"maintenance"}"#;
		assert!(serde_json::from_str::<NewCamera>(body).is_err());
	}

	#[test]
	fn status_defaults_to_up() {
		let body = r#"{"name":"A","location":"B","coordinates":[1.0,2.0]}"#;
		let fields: NewCamera = serde_json::from_str(body).unwrap();
		assert_eq!(fields.status, CameraStatus::Up);
	}

	#[test]
	fn coordinates_format_to_fixed_precision() {
		assert_eq!(Coordinates::new(20.045, 99.8925).format(4), "20.0450, 99.8925");
	}

	#[test]
	fn validation_rejects_bad_fields() {
		let mut bad = camera();
		bad.coordinates = Coordinates::new(91.0, 0.0);
		assert!(matches!(bad.validate(), Err(Error::Validation(_))));

		let mut bad = camera();
		bad.coordinates = Coordinates::new(f64::NAN, 0.0);
		assert!(matches!(bad.validate(), Err(Error::Validation(_))));

		let mut bad = camera();
		bad.name = "  ".to_string();
		assert!(matches!(bad.validate(), Err(Error::Validation(_))));

		let mut bad = camera();
		bad.ip_address = Some("999.1.1.1".to_string());
		assert!(matches!(bad.validate(), Err(Error::Validation(_))));

		assert!(camera().validate().is_ok());
	}

	#[test]
	fn optional_fields_have_length_limits() {
		let mut ok = camera();
		ok.brand = Some("b".repeat(MAX_BRAND_LEN));
		ok.version = Some("v".repeat(MAX_VERSION_LEN));
		ok.rtsp_url = Some(format!("rtsp://{}", "h".repeat(MAX_RTSP_URL_LEN - 7)));
		assert!(ok.validate().is_ok());

		let mut bad = camera();
		bad.brand = Some("b".repeat(MAX_BRAND_LEN + 1));
		assert!(matches!(bad.validate(), Err(Error::Validation(message)) if message.starts_with("brand")));

		let mut bad = camera();
		bad.version = Some("v".repeat(MAX_VERSION_LEN + 1));
		assert!(matches!(bad.validate(), Err(Error::Validation(message)) if message.starts_with("version")));

		let mut bad = camera();
		bad.rtsp_url = Some(format!("rtsp://{}", "h".repeat(MAX_RTSP_URL_LEN)));
		assert!(matches!(bad.validate(), Err(Error::Validation(message)) if message.starts_with("rtspUrl")));
	}
}
