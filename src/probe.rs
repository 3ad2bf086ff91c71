use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use url::Url;

use log::debug;

use crate::common::{Camera, CameraStatus};



pub const DEFAULT_RTSP_PORT: u16 = 554;

/// Port to probe: the one in `rtspUrl` when it names one, RTSP's default otherwise.
pub fn probe_port(camera: &Camera) -> u16 {
	camera.rtsp_url.as_deref()
		.and_then(|rtsp_url| Url::parse(rtsp_url).ok())
		.and_then(|url| url.port())
		.unwrap_or(DEFAULT_RTSP_PORT)
}

/// Checks whether the camera accepts a TCP connection. `None` when the
/// camera has no usable address and therefore can't be probed.
pub async fn check_reachability(camera: &Camera, timeout: Duration) -> Option<CameraStatus> {
	let ip: IpAddr = camera.ip_address.as_deref()?.parse().ok()?;
	let address = SocketAddr::new(ip, probe_port(camera));

	let status = match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
		Ok(Ok(_)) => CameraStatus::Up,
		Ok(Err(err)) => {
			debug!("Camera {} at {} unreachable: {}", camera.id, address, err);
			CameraStatus::Down
		},
		Err(_) => {
			debug!("Camera {} at {} timed out after {:?}", camera.id, address, timeout);
			CameraStatus::Down
		}
	};
	Some(status)
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::seed::demo_cameras;

	#[test]
	fn port_comes_from_rtsp_url() {
		let mut camera = demo_cameras().remove(0);
		assert_eq!(probe_port(&camera), DEFAULT_RTSP_PORT);
		camera.rtsp_url = Some("rtsp://192.168.1.10:8554/stream1".to_string());
		assert_eq!(probe_port(&camera), 8554);
		camera.rtsp_url = Some("not a url".to_string());
		assert_eq!(probe_port(&camera), DEFAULT_RTSP_PORT);
	}

	#[tokio::test]
	async fn listening_port_is_up_and_closed_port_is_down() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();

		let mut camera = demo_cameras().remove(0);
		camera.ip_address = Some("127.0.0.1".to_string());
		camera.rtsp_url = Some(format!("rtsp://127.0.0.1:{}/live", port));
		assert_eq!(check_reachability(&camera, Duration::from_secs(2)).await, Some(CameraStatus::Up));

		drop(listener);
		assert_eq!(check_reachability(&camera, Duration::from_secs(2)).await, Some(CameraStatus::Down));
	}

	#[tokio::test]
	async fn camera_without_address_is_not_probed() {
		let camera = demo_cameras().remove(4);
		assert!(camera.ip_address.is_none());
		assert_eq!(check_reachability(&camera, Duration::from_millis(10)).await, None);
	}
}
