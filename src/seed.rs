use crate::common::{Camera, CameraList, CameraStatus, Coordinates};



fn demo_camera(id: u64, name: &str, location: &str, lat: f64, lng: f64, status: CameraStatus, last_update: &str) -> Camera {
	Camera {
		id,
		name: name.to_string(),
		location: location.to_string(),
		coordinates: Coordinates::new(lat, lng),
		status,
		last_update: last_update.to_string(),
		ip_address: None,
		brand: None,
		version: None,
		rtsp_url: None,
	}
}

/// Campus cameras served when `seed_demo_cameras` is on.
pub fn demo_cameras() -> CameraList {
	let mut cameras = vec![
		demo_camera(1, "Main Gate CCTV", "Main Entrance", 20.0450, 99.8925, CameraStatus::Up, "2 min ago"),
		demo_camera(2, "Library CCTV", "Central Library", 20.0442, 99.8945, CameraStatus::Up, "1 min ago"),
		demo_camera(3, "Dormitory CCTV", "Student Housing", 20.0435, 99.8952, CameraStatus::Down, "15 min ago"),
		demo_camera(4, "Parking Lot CCTV", "Parking Area A", 20.0455, 99.8935, CameraStatus::Up, "Just now"),
		demo_camera(5, "Sports Complex CCTV", "Athletic Center", 20.0438, 99.8920, CameraStatus::Up, "3 min ago"),
	];

	let hardware = [
		("192.168.1.10", "Hikvision", "V5.7.3"),
		("192.168.1.11", "Dahua", "V2.840.0000000.28.R"),
		("192.168.1.12", "Axis", "10.12.85"),
	];
	for (camera, (ip, brand, version)) in cameras.iter_mut().zip(hardware.iter()) {
		camera.ip_address = Some(ip.to_string());
		camera.brand = Some(brand.to_string());
		camera.version = Some(version.to_string());
	}
	cameras
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn demo_cameras_are_valid_and_unique() {
		let cameras = demo_cameras();
		assert_eq!(cameras.len(), 5);
		for camera in &cameras {
			camera.validate().unwrap();
		}
		let mut ids: Vec<u64> = cameras.iter().map(|camera| camera.id).collect();
		ids.dedup();
		assert_eq!(ids.len(), 5);
		assert_eq!(cameras.iter().filter(|camera| camera.status == CameraStatus::Down).count(), 1);
	}
}
