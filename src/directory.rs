use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::common::{Camera, CameraId, CameraList, CameraPatch, CameraStatus, NewCamera, Summary};
use crate::error::{Error, Result};



pub const LAST_UPDATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock pinned to a fixed UTC offset.
pub struct SystemClock {
	offset: FixedOffset,
}

impl SystemClock {
	pub fn with_offset_hours(hours: i32) -> Self {
		let offset = FixedOffset::east_opt(hours * 3600).unwrap_or(Utc.fix());
		SystemClock { offset }
	}
}

impl Clock for SystemClock {
	fn now(&self) -> DateTime<FixedOffset> {
		Utc::now().with_timezone(&self.offset)
	}
}

/// In-memory, authoritative list of camera records, kept in insertion order.
pub struct CameraDirectory {
	cameras: CameraList,
	next_id: CameraId,
	clock: Arc<dyn Clock>,
}

impl CameraDirectory {
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		CameraDirectory {
			cameras: CameraList::new(),
			next_id: 1,
			clock,
		}
	}

	/// Builds a directory from existing records, e.g. seed data.
	pub fn with_cameras(clock: Arc<dyn Clock>, cameras: CameraList) -> Self {
		let mut directory = CameraDirectory::new(clock);
		directory.replace_all(cameras);
		directory
	}

	pub fn list_all(&self) -> &[Camera] {
		&self.cameras
	}

	pub fn len(&self) -> usize {
		self.cameras.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cameras.is_empty()
	}

	pub fn page(&self, skip: usize, limit: usize) -> CameraList {
		self.cameras.iter().skip(skip).take(limit).cloned().collect()
	}

	pub fn get_by_id(&self, id: CameraId) -> Result<&Camera> {
		self.cameras.iter()
			.find(|camera| camera.id == id)
			.ok_or(Error::NotFound(id))
	}

	pub fn find_by_ip(&self, ip_address: &str) -> Option<&Camera> {
		self.cameras.iter()
			.find(|camera| camera.ip_address.as_deref() == Some(ip_address))
	}

	pub fn add(&mut self, fields: NewCamera) -> Result<Camera> {
		// The counter saturates once a snapshot carries the largest id.
		if self.index_of(self.next_id).is_ok() {
			return Err(Error::Conflict("no camera ids left".to_string()));
		}
		let camera = Camera {
			id: self.next_id,
			name: fields.name,
			location: fields.location,
			coordinates: fields.coordinates,
			status: fields.status,
			last_update: self.timestamp(),
			ip_address: fields.ip_address,
			brand: fields.brand,
			version: fields.version,
			rtsp_url: fields.rtsp_url,
		};
		camera.validate()?;
		self.check_ip_unique(&camera)?;

		// Only consume the id once the record is accepted.
		self.next_id = self.next_id.saturating_add(1);
		self.cameras.push(camera.clone());
		Ok(camera)
	}

	pub fn update(&mut self, id: CameraId, patch: CameraPatch) -> Result<Camera> {
		let index = self.index_of(id)?;
		let mut updated = self.cameras[index].clone();
		updated.apply(patch);
		updated.last_update = self.timestamp();
		updated.validate()?;
		self.check_ip_unique(&updated)?;

		self.cameras[index] = updated.clone();
		Ok(updated)
	}

	/// Records a status observed from outside (e.g. a probe). `lastUpdate`
	/// only moves when the status actually changes.
	pub fn set_status(&mut self, id: CameraId, status: CameraStatus) -> Result<Camera> {
		let index = self.index_of(id)?;
		if self.cameras[index].status != status {
			let timestamp = self.timestamp();
			let camera = &mut self.cameras[index];
			camera.status = status;
			camera.last_update = timestamp;
		}
		Ok(self.cameras[index].clone())
	}

	pub fn remove(&mut self, id: CameraId) -> Result<()> {
		let index = self.index_of(id)?;
		self.cameras.remove(index);
		Ok(())
	}

	/// Replaces the whole directory with a snapshot, keeping the id counter
	/// ahead of every id seen so far.
	pub fn replace_all(&mut self, cameras: CameraList) {
		let highest = cameras.iter().map(|camera| camera.id).max().unwrap_or(0);
		self.next_id = self.next_id.max(highest.saturating_add(1));
		self.cameras = cameras;
	}

	/// Applies a record produced elsewhere, keeping its id.
	pub fn upsert(&mut self, camera: Camera) {
		self.next_id = self.next_id.max(camera.id.saturating_add(1));
		match self.index_of(camera.id) {
			Ok(index) => self.cameras[index] = camera,
			Err(_) => self.cameras.push(camera),
		}
	}

	pub fn summary(&self) -> Summary {
		let online = self.cameras.iter().filter(|camera| camera.status == CameraStatus::Up).count();
		Summary {
			total: self.cameras.len(),
			online,
			offline: self.cameras.len() - online,
		}
	}

	fn index_of(&self, id: CameraId) -> Result<usize> {
		self.cameras.iter()
			.position(|camera| camera.id == id)
			.ok_or(Error::NotFound(id))
	}

	fn check_ip_unique(&self, camera: &Camera) -> Result<()> {
		if let Some(ip) = camera.ip_address.as_deref() {
			if let Some(other) = self.find_by_ip(ip) {
				if other.id != camera.id {
					return Err(Error::Conflict(format!("Camera with IP address {} already exists", ip)));
				}
			}
		}
		Ok(())
	}

	fn timestamp(&self) -> String {
		self.clock.now().format(LAST_UPDATE_FORMAT).to_string()
	}
}
