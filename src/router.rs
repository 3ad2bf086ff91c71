use std::fmt;



#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
pub enum Route {
	Root,
	Login,
	Monitoring,
}

impl Route {
	pub fn path(&self) -> &'static str {
		match self {
			Route::Root => "/",
			Route::Login => "/login",
			Route::Monitoring => "/monitoring",
		}
	}

	pub fn from_path(path: &str) -> Option<Route> {
		match path.trim_end_matches('/') {
			"" => Some(Route::Root),
			"/login" => Some(Route::Login),
			"/monitoring" => Some(Route::Monitoring),
			_ => None,
		}
	}

	pub fn requires_auth(&self) -> bool {
		matches!(self, Route::Monitoring)
	}
}

impl fmt::Display for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.path())
	}
}

/// Where a navigation actually lands. The root always goes to the login
/// page; protected routes do too when there is no session.
pub fn resolve(requested: Route, authenticated: bool) -> Route {
	match requested {
		Route::Root => Route::Login,
		route if route.requires_auth() && !authenticated => Route::Login,
		route => route,
	}
}
