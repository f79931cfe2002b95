// SPDX-License-Identifier: GPL-3.0-only

//! Media controller device discovery
//!
//! Scans `/dev/media*` and identifies each node through `MEDIA_IOC_DEVICE_INFO`
//! so the CLI can report which media devices are present and whether any of
//! them is driven by a supported ISP driver.

use serde::Serialize;
use std::os::unix::io::{AsRawFd, RawFd};
use tracing::debug;

/// MEDIA_IOC_DEVICE_INFO ioctl number
const MEDIA_IOC_DEVICE_INFO: libc::c_ulong = 0xC1007C00;

/// Media controller device info structure for MEDIA_IOC_DEVICE_INFO
#[repr(C)]
struct MediaDeviceInfoRaw {
    driver: [u8; 16],
    model: [u8; 32],
    serial: [u8; 40],
    bus_info: [u8; 32],
    media_version: u32,
    hw_revision: u32,
    driver_version: u32,
    reserved: [u32; 31],
}

/// Identity of one media controller device node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaDeviceInfo {
    pub path: String,
    pub driver: String,
    pub model: String,
    pub bus_info: String,
}

fn query_device_info(fd: RawFd) -> Option<MediaDeviceInfoRaw> {
    let mut info: MediaDeviceInfoRaw = unsafe { std::mem::zeroed() };
    let result = unsafe {
        libc::ioctl(
            fd,
            MEDIA_IOC_DEVICE_INFO as _,
            &mut info as *mut MediaDeviceInfoRaw,
        )
    };
    if result < 0 { None } else { Some(info) }
}

/// NUL-terminated byte field to String
fn c_field(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).to_string()
}

/// Identify a single media device node
pub fn probe_media_device(path: &str) -> Option<MediaDeviceInfo> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!(path, error = %e, "Cannot open media device");
            return None;
        }
    };
    let raw = query_device_info(file.as_raw_fd())?;
    let info = MediaDeviceInfo {
        path: path.to_string(),
        driver: c_field(&raw.driver),
        model: c_field(&raw.model),
        bus_info: c_field(&raw.bus_info),
    };
    debug!(
        path,
        driver = %info.driver,
        model = %info.model,
        hw_revision = raw.hw_revision,
        "Probed media device"
    );
    Some(info)
}

/// Every `/dev/media*` node that answers MEDIA_IOC_DEVICE_INFO, sorted by path
pub fn probe_media_devices() -> Vec<MediaDeviceInfo> {
    let entries = match std::fs::read_dir("/dev") {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut paths: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            name.strip_prefix("media")
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                .then(|| format!("/dev/{}", name))
        })
        .collect();
    paths.sort();

    paths.iter().filter_map(|p| probe_media_device(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_struct_matches_kernel_size() {
        assert_eq!(std::mem::size_of::<MediaDeviceInfoRaw>(), 256);
        assert_eq!((MEDIA_IOC_DEVICE_INFO >> 16) & 0x3fff, 256);
    }

    #[test]
    fn test_c_field() {
        assert_eq!(c_field(b"rkisp1\0\0\0"), "rkisp1");
        assert_eq!(c_field(b"full"), "full");
    }

    #[test]
    fn test_missing_node() {
        assert_eq!(probe_media_device("/nonexistent/media0"), None);
    }
}
