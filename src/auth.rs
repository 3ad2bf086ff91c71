use std::collections::HashSet;

use rand::distributions::Alphanumeric;
use rand::Rng;

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::State;

use tokio::sync::RwLock;

use log::{info, warn};

use crate::common::{Credentials, LoginResponse, MessageResponse, User};
use crate::config::ServerConfig;
use crate::error::Error;



const TOKEN_PREFIX: &str = "mock-jwt-token-";
const TOKEN_RANDOM_LEN: usize = 32;

/// Bearer tokens handed out by the stub login, valid until logged out.
pub struct TokenRegistry {
	tokens: RwLock<HashSet<String>>,
}

impl TokenRegistry {
	pub fn new() -> Self {
		TokenRegistry {
			tokens: RwLock::new(HashSet::new()),
		}
	}

	pub async fn issue(&self) -> String {
		let suffix: String = rand::thread_rng()
			.sample_iter(&Alphanumeric)
			.take(TOKEN_RANDOM_LEN)
			.map(char::from)
			.collect();
		let token = format!("{}{}", TOKEN_PREFIX, suffix);
		self.tokens.write().await.insert(token.clone());
		token
	}

	pub async fn is_valid(&self, token: &str) -> bool {
		self.tokens.read().await.contains(token)
	}

	pub async fn revoke(&self, token: &str) -> bool {
		self.tokens.write().await.remove(token)
	}

	pub async fn revoke_all(&self) {
		self.tokens.write().await.clear();
	}
}

pub fn demo_user() -> User {
	User {
		name: "Admin User".to_string(),
		role: "Security Administrator".to_string(),
		email: Some("admin@mfu.ac.th".to_string()),
	}
}

/// Stub credential check: any non-empty username and password is accepted.
pub async fn login(tokens: &TokenRegistry, credentials: &Credentials) -> LoginResponse {
	if credentials.username.trim().is_empty() || credentials.password.is_empty() {
		warn!("Rejected login with empty credentials");
		return LoginResponse {
			success: false,
			token: None,
			user: None,
			message: Some("Invalid credentials".to_string()),
		};
	}

	let token = tokens.issue().await;
	info!("User '{}' logged in", credentials.username);
	LoginResponse {
		success: true,
		token: Some(token),
		user: Some(demo_user()),
		message: None,
	}
}

fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
	request.headers()
		.get_one("Authorization")
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(str::trim)
		.filter(|token| !token.is_empty())
}

/// Guard for protected routes. Passes everything through when auth is
/// disabled in the server config.
pub struct Authenticated;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Authenticated {
	type Error = Error;

	async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
		let require_auth = request.rocket()
			.state::<ServerConfig>()
			.map(|config| config.require_auth)
			.unwrap_or(true);
		if !require_auth {
			return Outcome::Success(Authenticated);
		}

		let tokens = match request.rocket().state::<TokenRegistry>() {
			Some(tokens) => tokens,
			None => return Outcome::Error((Status::InternalServerError, Error::Unauthorized("token registry missing".to_string()))),
		};
		match bearer_token(request) {
			Some(token) if tokens.is_valid(token).await => Outcome::Success(Authenticated),
			Some(_) => Outcome::Error((Status::Unauthorized, Error::Unauthorized("invalid or expired token".to_string()))),
			None => Outcome::Error((Status::Unauthorized, Error::Unauthorized("missing bearer token".to_string()))),
		}
	}
}

/// Whatever bearer token the request carries, if any. Never fails.
pub struct PresentedToken(Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PresentedToken {
	type Error = ();

	async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
		Outcome::Success(PresentedToken(bearer_token(request).map(str::to_string)))
	}
}

#[post("/login", data = "<credentials>")]
async fn login_route(credentials: Json<Credentials>, tokens: &State<TokenRegistry>) -> (Status, Json<LoginResponse>) {
	let response = login(tokens, &credentials).await;
	let status = if response.success { Status::Ok } else { Status::Unauthorized };
	(status, Json(response))
}

#[post("/logout")]
async fn logout_route(presented: PresentedToken, tokens: &State<TokenRegistry>) -> Json<MessageResponse> {
	if let Some(token) = presented.0 {
		if tokens.revoke(&token).await {
			info!("Revoked session token");
		}
	}
	Json(MessageResponse {
		success: Some(true),
		message: "Logged out successfully".to_string(),
	})
}

pub fn stage() -> rocket::fairing::AdHoc {
	rocket::fairing::AdHoc::on_ignite("Auth", |rocket| async {
		rocket
			.manage(TokenRegistry::new())
			.mount("/api/auth", routes![login_route, logout_route])
	})
}


#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn issued_tokens_are_unique_until_revoked() {
		let tokens = TokenRegistry::new();
		let first = tokens.issue().await;
		let second = tokens.issue().await;
		assert_ne!(first, second);
		assert!(first.starts_with(TOKEN_PREFIX));
		assert!(tokens.is_valid(&first).await);

		assert!(tokens.revoke(&first).await);
		assert!(!tokens.is_valid(&first).await);
		assert!(!tokens.revoke(&first).await);

		tokens.revoke_all().await;
		assert!(!tokens.is_valid(&second).await);
	}

	#[tokio::test]
	async fn login_requires_both_fields() {
		let tokens = TokenRegistry::new();
		let rejected = login(&tokens, &Credentials::new("admin", "")).await;
		assert!(!rejected.success);
		assert!(rejected.token.is_none());

		let accepted = login(&tokens, &Credentials::new("admin", "secret")).await;
		assert!(accepted.success);
		assert_eq!(accepted.user, Some(demo_user()));
		assert!(tokens.is_valid(accepted.token.as_deref().unwrap()).await);
	}
}
