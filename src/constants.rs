// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants
//!
//! Entity names and pad numbers are a fixed contract with the rkisp1 media
//! graph exposed by the kernel driver and must match it exactly.

use crate::media::formats::MediaBusCode;

/// Media device driver name
pub const DRIVER_NAME: &str = "rkisp1";

/// Entity names of the fixed processing chain
pub mod entities {
    /// MIPI CSI-2 D-PHY receiver; every sensor links into its sink pad
    pub const RECEIVER: &str = "rockchip-sy-mipi-dphy";
    /// ISP subdevice
    pub const ISP: &str = "rkisp1-isp-subdev";
    /// Main path capture video node
    pub const CAPTURE: &str = "rkisp1_mainpath";
    /// Self path capture video node (required to be present, unused)
    pub const SELFPATH: &str = "rkisp1_selfpath";
    /// 3A statistics video node
    pub const STATISTICS: &str = "rkisp1-statistics";
    /// ISP parameters video node
    pub const INPUT_PARAMS: &str = "rkisp1-input-params";
}

/// Pad indices used along the chain
pub mod pads {
    pub const SENSOR_SOURCE: u32 = 0;
    pub const RECEIVER_SINK: u32 = 0;
    pub const RECEIVER_SOURCE: u32 = 1;
    pub const ISP_SINK: u32 = 0;
    pub const ISP_PARAMS: u32 = 1;
    pub const ISP_SOURCE: u32 = 2;
    pub const ISP_STATS: u32 = 3;
    pub const CAPTURE_SINK: u32 = 0;
}

/// Buffers exported per stream unless configured otherwise
pub const DEFAULT_BUFFER_COUNT: u32 = 4;

/// Default output pixel format of the main path
pub const DEFAULT_OUTPUT_FORMAT: &str = "NV12";

/// Planes used by the multi-planar NV12 capture format
pub const CAPTURE_PLANES: u32 = 2;

/// Raw Bayer encodings offered to the sensor, most preferred first:
/// 12-bit, then 10-bit, then 8-bit, each in BGGR/GBRG/GRBG/RGGB order.
pub const RAW_BAYER_CODES: [MediaBusCode; 12] = [
    MediaBusCode::SBGGR12_1X12,
    MediaBusCode::SGBRG12_1X12,
    MediaBusCode::SGRBG12_1X12,
    MediaBusCode::SRGGB12_1X12,
    MediaBusCode::SBGGR10_1X10,
    MediaBusCode::SGBRG10_1X10,
    MediaBusCode::SGRBG10_1X10,
    MediaBusCode::SRGGB10_1X10,
    MediaBusCode::SBGGR8_1X8,
    MediaBusCode::SGBRG8_1X8,
    MediaBusCode::SGRBG8_1X8,
    MediaBusCode::SRGGB8_1X8,
];

/// Frames after stream on whose statistics are not fed to the control loop
pub const MISTRUST_FRAMES_STARTUP: u32 = 2;

/// Application information utilities
pub mod app_info {
    /// Version stamped at build time
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
