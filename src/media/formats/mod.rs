// SPDX-License-Identifier: GPL-3.0-only

//! Geometry and format types exchanged with pipeline stages
//!
//! Subdevices (sensor, receiver, ISP) negotiate a [`SubdeviceFormat`] made of a
//! media bus code and a frame size. The capture video node negotiates a
//! [`DeviceFormat`] made of a V4L2 FourCC, a size and a plane count.

pub mod bus_code;

pub use bus_code::MediaBusCode;
pub use v4l::FourCC;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `other` fits inside this size in both dimensions
    pub fn contains(&self, other: &Size) -> bool {
        other.width <= self.width && other.height <= self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, 0 for an empty size
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Pick the candidate closest to `target`
    ///
    /// Among the candidates covering `target`, the one with the nearest
    /// aspect ratio wins, ties going to the smallest area. If none covers
    /// it, the largest candidate is used.
    pub fn best_fit<'a>(candidates: impl IntoIterator<Item = &'a Size>, target: Size) -> Option<Size> {
        let ratio = target.aspect_ratio();
        let mut covering: Option<(f64, Size)> = None;
        let mut largest: Option<Size> = None;
        for size in candidates {
            if size.contains(&target) {
                let distance = (size.aspect_ratio() - ratio).abs();
                let better = covering.is_none_or(|(best, c)| {
                    distance < best || (distance == best && size.area() < c.area())
                });
                if better {
                    covering = Some((distance, *size));
                }
            }
            if largest.is_none_or(|l| size.area() > l.area()) {
                largest = Some(*size);
            }
        }
        covering.map(|(_, size)| size).or(largest)
    }

    /// Parse "WIDTHxHEIGHT" (e.g. "1920x1080")
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once(['x', 'X'])?;
        Some(Self::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Format on a subdevice pad (media bus code + size)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubdeviceFormat {
    pub code: MediaBusCode,
    pub size: Size,
}

impl SubdeviceFormat {
    pub fn new(code: MediaBusCode, size: Size) -> Self {
        Self { code, size }
    }
}

impl fmt::Display for SubdeviceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.size, self.code)
    }
}

/// Format on a video node (pixel FourCC + size + plane count)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFormat {
    pub fourcc: FourCC,
    pub size: Size,
    pub planes: u32,
}

impl DeviceFormat {
    pub fn new(fourcc: FourCC, size: Size, planes: u32) -> Self {
        Self {
            fourcc,
            size,
            planes,
        }
    }

    /// Whether size and pixel encoding match, ignoring the plane count
    pub fn matches(&self, other: &DeviceFormat) -> bool {
        self.size == other.size && self.fourcc == other.fourcc
    }
}

impl fmt::Display for DeviceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} ({} plane{})",
            self.size,
            fourcc_name(&self.fourcc),
            self.planes,
            if self.planes == 1 { "" } else { "s" }
        )
    }
}

/// Printable FourCC, falling back to hex for non-ASCII codes
pub fn fourcc_name(fourcc: &FourCC) -> String {
    if fourcc.repr.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        fourcc.repr.iter().map(|&b| b as char).collect()
    } else {
        format!("0x{:08x}", u32::from_le_bytes(fourcc.repr))
    }
}

/// Parse a pixel format name into a V4L2 FourCC
///
/// Accepts raw four-character codes ("NV12", "YUYV") and a few common
/// aliases used by other tools.
pub fn parse_fourcc(name: &str) -> Option<FourCC> {
    let name = name.trim();
    let code = match name.to_ascii_uppercase().as_str() {
        "I420" | "YUV420" => *b"YU12",
        "YUY2" => *b"YUYV",
        "GRAY8" | "GRAY" => *b"GREY",
        _ => {
            let bytes = name.as_bytes();
            if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_alphanumeric()) {
                return None;
            }
            [bytes[0], bytes[1], bytes[2], bytes[3]]
        }
    };
    Some(FourCC::new(&code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_parse_and_contains() {
        let fhd = Size::parse("1920x1080").unwrap();
        assert_eq!(fhd, Size::new(1920, 1080));
        assert!(Size::new(4208, 3120).contains(&fhd));
        assert!(!fhd.contains(&Size::new(1920, 1200)));
        assert_eq!(Size::parse("1920"), None);
        assert_eq!(Size::parse(" 640 X 480 "), Some(Size::new(640, 480)));
    }

    #[test]
    fn test_best_fit() {
        let modes = [
            Size::new(3280, 2464),
            Size::new(1920, 1080),
            Size::new(640, 480),
        ];
        assert_eq!(
            Size::best_fit(&modes, Size::new(1280, 720)),
            Some(Size::new(1920, 1080))
        );
        assert_eq!(
            Size::best_fit(&modes, Size::new(640, 480)),
            Some(Size::new(640, 480))
        );
        assert_eq!(
            Size::best_fit(&modes, Size::new(4000, 3000)),
            Some(Size::new(3280, 2464))
        );
        assert_eq!(Size::best_fit(&[], Size::new(640, 480)), None);
    }

    #[test]
    fn test_best_fit_prefers_matching_aspect_ratio() {
        let imx219 = [
            Size::new(3280, 2464),
            Size::new(1920, 1080),
            Size::new(1640, 1232),
            Size::new(640, 480),
        ];
        // 1640x1232 is smaller, but 4:3
        assert_eq!(
            Size::best_fit(&imx219, Size::new(1280, 720)),
            Some(Size::new(1920, 1080))
        );
        assert_eq!(
            Size::best_fit(&imx219, Size::new(1024, 768)),
            Some(Size::new(1640, 1232))
        );
        // Only the full frame covers it
        assert_eq!(
            Size::best_fit(&imx219, Size::new(2000, 1125)),
            Some(Size::new(3280, 2464))
        );
    }

    #[test]
    fn test_fourcc_parsing() {
        assert_eq!(parse_fourcc("NV12"), Some(FourCC::new(b"NV12")));
        assert_eq!(parse_fourcc("i420"), Some(FourCC::new(b"YU12")));
        assert_eq!(parse_fourcc("NV1"), None);
        assert_eq!(parse_fourcc("NV-2"), None);
    }

    #[test]
    fn test_device_format_match_ignores_planes() {
        let a = DeviceFormat::new(FourCC::new(b"NV12"), Size::new(1920, 1080), 2);
        let b = DeviceFormat::new(FourCC::new(b"NV12"), Size::new(1920, 1080), 1);
        let c = DeviceFormat::new(FourCC::new(b"NV16"), Size::new(1920, 1080), 2);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
        assert_eq!(a.to_string(), "1920x1080-NV12 (2 planes)");
    }
}
