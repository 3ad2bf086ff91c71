//! Keeps map markers in step with the camera list.
//!
//! [`MapView::render`] reconciles the markers on a [`MapSurface`] against a
//! slice of cameras: new cameras get a marker, moved or re-statused cameras
//! have theirs updated in place, and markers whose camera is gone are
//! removed. Rendering the same list twice touches nothing.
//!
//! Offline markers pulse. Each pulse is a [`PulseTask`] owned by the marker's
//! entry and aborted when the entry is dropped or the camera comes back up,
//! so no timer outlives its marker.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use log::{debug, warn};

use crate::common::{Camera, CameraId, CameraStatus, Coordinates};



pub const ONLINE_COLOR: &str = "#10b981";
pub const OFFLINE_COLOR: &str = "#ef4444";
pub const FULL_OPACITY: f32 = 0.8;
pub const DIM_OPACITY: f32 = 0.3;

#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct MarkerStyle {
	pub color: &'static str,
	pub radius: u32,
	pub weight: u32,
	pub fill_opacity: f32,
}

impl MarkerStyle {
	pub fn for_status(status: CameraStatus) -> Self {
		let color = match status {
			CameraStatus::Up => ONLINE_COLOR,
			CameraStatus::Down => OFFLINE_COLOR,
		};
		MarkerStyle {
			color,
			radius: 10,
			weight: 3,
			fill_opacity: FULL_OPACITY,
		}
	}
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct Popup {
	pub title: String,
	pub status: CameraStatus,
	pub status_label: &'static str,
	pub location: String,
	pub last_update: String,
	pub coordinates: String,
}

impl Popup {
	pub fn for_camera(camera: &Camera, precision: usize) -> Self {
		Popup {
			title: camera.name.clone(),
			status: camera.status,
			status_label: camera.status.label(),
			location: camera.location.clone(),
			last_update: camera.last_update.clone(),
			coordinates: camera.coordinates.format(precision),
		}
	}
}

impl fmt::Display for Popup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{} [{}]", self.title, self.status_label)?;
		writeln!(f, "Location: {}", self.location)?;
		writeln!(f, "Last Update: {}", self.last_update)?;
		write!(f, "Coordinates: {}", self.coordinates)
	}
}

/// The map widget. Implementations draw; the view decides what to draw.
pub trait MapSurface: Send + Sync {
	fn add_marker(&self, coordinates: Coordinates, style: &MarkerStyle) -> MarkerHandle;
	fn move_marker(&self, marker: MarkerHandle, coordinates: Coordinates);
	fn set_style(&self, marker: MarkerHandle, style: &MarkerStyle);
	fn set_fill_opacity(&self, marker: MarkerHandle, opacity: f32);
	fn bind_popup(&self, marker: MarkerHandle, popup: &Popup);
	fn remove_marker(&self, marker: MarkerHandle);
}

/// Alternates a marker's fill opacity until dropped.
///
/// Aborting the task does not interrupt a tick that is already running on
/// another worker, so each write happens under the `stopped` lock and drop
/// sets the flag first. Once drop returns, the marker gets no more writes.
pub struct PulseTask {
	task: JoinHandle<()>,
	stopped: Arc<Mutex<bool>>,
}

impl PulseTask {
	pub fn start(surface: Arc<dyn MapSurface>, marker: MarkerHandle, period: Duration) -> Self {
		let stopped = Arc::new(Mutex::new(false));
		let task_stopped = stopped.clone();
		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);
			// The first tick completes immediately.
			ticker.tick().await;
			let mut dimmed = false;
			loop {
				ticker.tick().await;
				let stopped = task_stopped.lock().unwrap_or_else(PoisonError::into_inner);
				if *stopped {
					break;
				}
				dimmed = !dimmed;
				surface.set_fill_opacity(marker, if dimmed { DIM_OPACITY } else { FULL_OPACITY });
			}
		});
		PulseTask { task, stopped }
	}
}

impl Drop for PulseTask {
	fn drop(&mut self) {
		*self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
		self.task.abort();
	}
}

#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(Default)]
#[derive(PartialEq, Eq)]
pub struct RenderCounts {
	pub created: usize,
	pub updated: usize,
	pub removed: usize,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
#[derive(PartialEq)]
pub struct RenderReport {
	pub counts: RenderCounts,
	/// Cameras left off the map, with the reason.
	pub skipped: Vec<(CameraId, String)>,
}

impl RenderReport {
	pub fn is_noop(&self) -> bool {
		self.counts == RenderCounts::default()
	}
}

struct MarkerEntry {
	handle: MarkerHandle,
	camera: Camera,
	pulse: Option<PulseTask>,
}

pub struct MapView {
	surface: Arc<dyn MapSurface>,
	markers: HashMap<CameraId, MarkerEntry>,
	pulse_interval: Duration,
	precision: usize,
}

impl MapView {
	pub fn new(surface: Arc<dyn MapSurface>, pulse_interval: Duration, precision: usize) -> Self {
		MapView {
			surface,
			markers: HashMap::new(),
			pulse_interval,
			precision,
		}
	}

	pub fn marker_count(&self) -> usize {
		self.markers.len()
	}

	pub fn active_pulses(&self) -> usize {
		self.markers.values().filter(|entry| entry.pulse.is_some()).count()
	}

	pub fn marker(&self, id: CameraId) -> Option<MarkerHandle> {
		self.markers.get(&id).map(|entry| entry.handle)
	}

	/// Popup for a camera's marker, built from the record as last rendered.
	pub fn popup(&self, id: CameraId) -> Option<Popup> {
		self.markers.get(&id).map(|entry| Popup::for_camera(&entry.camera, self.precision))
	}

	/// Must run inside a tokio runtime: offline markers spawn their pulse.
	pub fn render(&mut self, cameras: &[Camera]) -> RenderReport {
		let mut report = RenderReport::default();
		let mut seen = HashSet::new();

		for camera in cameras {
			if !camera.coordinates.is_valid() {
				warn!("Camera {} ({}) has invalid coordinates; not shown on map", camera.id, camera.name);
				report.skipped.push((camera.id, format!(
					"invalid coordinates [{}, {}]", camera.coordinates.lat, camera.coordinates.lng
				)));
				continue;
			}
			seen.insert(camera.id);

			match self.markers.get_mut(&camera.id) {
				None => {
					let entry = self.create_marker(camera);
					self.markers.insert(camera.id, entry);
					report.counts.created += 1;
				},
				Some(entry) => {
					if Self::sync_marker(&self.surface, self.pulse_interval, self.precision, entry, camera) {
						report.counts.updated += 1;
					}
				}
			}
		}

		let stale: Vec<CameraId> = self.markers.keys()
			.filter(|id| !seen.contains(id))
			.copied()
			.collect();
		for id in stale {
			if let Some(entry) = self.markers.remove(&id) {
				self.surface.remove_marker(entry.handle);
				report.counts.removed += 1;
				debug!("Removed marker for camera {}", id);
			}
		}

		report
	}

	pub fn clear(&mut self) -> RenderReport {
		self.render(&[])
	}

	fn create_marker(&self, camera: &Camera) -> MarkerEntry {
		let handle = self.surface.add_marker(camera.coordinates, &MarkerStyle::for_status(camera.status));
		self.surface.bind_popup(handle, &Popup::for_camera(camera, self.precision));
		debug!("Created marker for camera {} ({})", camera.id, camera.name);
		MarkerEntry {
			handle,
			camera: camera.clone(),
			pulse: self.pulse_for(camera.status, handle),
		}
	}

	fn pulse_for(&self, status: CameraStatus, handle: MarkerHandle) -> Option<PulseTask> {
		match status {
			CameraStatus::Down => Some(PulseTask::start(self.surface.clone(), handle, self.pulse_interval)),
			CameraStatus::Up => None,
		}
	}

	/// Brings an existing marker up to date. Returns true when the marker
	/// itself moved or changed style.
	fn sync_marker(surface: &Arc<dyn MapSurface>, pulse_interval: Duration, precision: usize, entry: &mut MarkerEntry, camera: &Camera) -> bool {
		if entry.camera == *camera {
			return false;
		}

		let mut changed = false;
		if entry.camera.coordinates != camera.coordinates {
			surface.move_marker(entry.handle, camera.coordinates);
			changed = true;
		}
		if entry.camera.status != camera.status {
			// Stop the old pulse before restyling.
			entry.pulse = None;
			surface.set_style(entry.handle, &MarkerStyle::for_status(camera.status));
			if camera.status == CameraStatus::Down {
				entry.pulse = Some(PulseTask::start(surface.clone(), entry.handle, pulse_interval));
			}
			changed = true;
		}

		surface.bind_popup(entry.handle, &Popup::for_camera(camera, precision));
		entry.camera = camera.clone();
		changed
	}
}
