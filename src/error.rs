use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::{json, Json};

use log::warn;

use crate::common::CameraId;



pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Camera with id {0} not found")]
	NotFound(CameraId),

	#[error("Unauthorized: {0}")]
	Unauthorized(String),

	#[error("Validation error: {0}")]
	Validation(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Transport error: {0}")]
	Transport(String),

	#[error("Decode error: {0}")]
	Decode(String),
}

impl Error {
	pub fn status(&self) -> Status {
		match self {
			Error::NotFound(_) => Status::NotFound,
			Error::Unauthorized(_) => Status::Unauthorized,
			Error::Validation(_) => Status::UnprocessableEntity,
			Error::Conflict(_) => Status::Conflict,
			Error::Transport(_) => Status::BadGateway,
			Error::Decode(_) => Status::BadGateway,
		}
	}
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		if err.is_decode() {
			Error::Decode(err.to_string())
		} else {
			Error::Transport(err.to_string())
		}
	}
}

impl<'r> Responder<'r, 'static> for Error {
	fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
		let status = self.status();
		warn!("{} {} failed with {}: {}", request.method(), request.uri(), status, self);
		(status, Json(json!({ "error": self.to_string() }))).respond_to(request)
	}
}
