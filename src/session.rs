use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{info, warn};

use crate::common::User;



#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct Session {
	pub token: String,
	pub user: User,
}

impl Session {
	pub fn new(token: String, user: User) -> Self {
		Session { token, user }
	}
}

/// Where a session survives between runs of the client.
pub trait SessionStorage: Send + Sync {
	fn load(&self) -> Option<Session>;
	fn save(&self, session: &Session);
	fn clear(&self);
}

pub struct MemoryStorage {
	slot: Mutex<Option<Session>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		MemoryStorage { slot: Mutex::new(None) }
	}
}

impl SessionStorage for MemoryStorage {
	fn load(&self) -> Option<Session> {
		self.slot.lock().ok().and_then(|slot| slot.clone())
	}

	fn save(&self, session: &Session) {
		if let Ok(mut slot) = self.slot.lock() {
			*slot = Some(session.clone());
		}
	}

	fn clear(&self) {
		if let Ok(mut slot) = self.slot.lock() {
			*slot = None;
		}
	}
}

/// JSON file holding the token and user. Storage failures are logged, not
/// fatal: the session still lives in memory.
pub struct FileStorage {
	path: PathBuf,
}

impl FileStorage {
	pub fn new(path: PathBuf) -> Self {
		FileStorage { path }
	}
}

impl SessionStorage for FileStorage {
	fn load(&self) -> Option<Session> {
		let text = match fs::read_to_string(&self.path) {
			Ok(text) => text,
			Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
			Err(err) => {
				warn!("Failed to read session file {}; error was {}", self.path.display(), err);
				return None;
			}
		};
		match serde_json::from_str(&text) {
			Ok(session) => Some(session),
			Err(err) => {
				warn!("Ignoring unreadable session file {}; error was {}", self.path.display(), err);
				None
			}
		}
	}

	fn save(&self, session: &Session) {
		let result = serde_json::to_vec(session)
			.map_err(io::Error::from)
			.and_then(|bytes| fs::write(&self.path, bytes));
		if let Err(err) = result {
			warn!("Failed to write session file {}; error was {}", self.path.display(), err);
		}
	}

	fn clear(&self) {
		match fs::remove_file(&self.path) {
			Ok(()) => {},
			Err(err) if err.kind() == io::ErrorKind::NotFound => {},
			Err(err) => warn!("Failed to remove session file {}; error was {}", self.path.display(), err),
		}
	}
}

/// The client's authentication state. A session exists from `begin` until
/// `end`; nothing else creates or clears it.
pub struct SessionContext {
	storage: Box<dyn SessionStorage>,
	current: Option<Session>,
}

impl SessionContext {
	pub fn new(storage: Box<dyn SessionStorage>) -> Self {
		SessionContext { storage, current: None }
	}

	/// Picks up a session persisted by an earlier run.
	pub fn restore(&mut self) -> Option<&Session> {
		self.current = self.storage.load();
		if let Some(session) = &self.current {
			info!("Restored session for {}", session.user.name);
		}
		self.current.as_ref()
	}

	pub fn begin(&mut self, session: Session) {
		self.storage.save(&session);
		self.current = Some(session);
	}

	pub fn end(&mut self) -> Option<Session> {
		self.storage.clear();
		self.current.take()
	}

	pub fn current(&self) -> Option<&Session> {
		self.current.as_ref()
	}

	pub fn is_authenticated(&self) -> bool {
		self.current.is_some()
	}
}
