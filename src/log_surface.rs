use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, trace};

use crate::common::Coordinates;
use crate::map_view::{MapSurface, MarkerHandle, MarkerStyle, Popup};



/// Map surface for headless runs: every marker operation goes to the log.
pub struct LogSurface {
	next_handle: AtomicU64,
}

impl LogSurface {
	pub fn new() -> Self {
		LogSurface { next_handle: AtomicU64::new(1) }
	}
}

impl MapSurface for LogSurface {
	fn add_marker(&self, coordinates: Coordinates, style: &MarkerStyle) -> MarkerHandle {
		let handle = MarkerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
		info!("marker {} added at [{:.4}, {:.4}] color {}", handle.0, coordinates.lat, coordinates.lng, style.color);
		handle
	}

	fn move_marker(&self, marker: MarkerHandle, coordinates: Coordinates) {
		info!("marker {} moved to [{:.4}, {:.4}]", marker.0, coordinates.lat, coordinates.lng);
	}

	fn set_style(&self, marker: MarkerHandle, style: &MarkerStyle) {
		info!("marker {} restyled to {}", marker.0, style.color);
	}

	fn set_fill_opacity(&self, marker: MarkerHandle, opacity: f32) {
		trace!("marker {} fill opacity {}", marker.0, opacity);
	}

	fn bind_popup(&self, marker: MarkerHandle, popup: &Popup) {
		debug!("marker {} popup:\n{}", marker.0, popup);
	}

	fn remove_marker(&self, marker: MarkerHandle) {
		info!("marker {} removed", marker.0);
	}
}
