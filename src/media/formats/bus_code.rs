// SPDX-License-Identifier: GPL-3.0-only

//! Media bus codes for raw Bayer sensor output
//!
//! Values match `linux/media-bus-format.h` so they can be handed to the
//! subdevice format ioctls unchanged.

use std::fmt;

/// Media bus format code (`MEDIA_BUS_FMT_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaBusCode(pub u32);

impl MediaBusCode {
    pub const SBGGR8_1X8: Self = Self(0x3001);
    pub const SGRBG8_1X8: Self = Self(0x3002);
    pub const SBGGR10_1X10: Self = Self(0x3007);
    pub const SBGGR12_1X12: Self = Self(0x3008);
    pub const SGRBG10_1X10: Self = Self(0x300a);
    pub const SGBRG10_1X10: Self = Self(0x300e);
    pub const SRGGB10_1X10: Self = Self(0x300f);
    pub const SGBRG12_1X12: Self = Self(0x3010);
    pub const SGRBG12_1X12: Self = Self(0x3011);
    pub const SRGGB12_1X12: Self = Self(0x3012);
    pub const SGBRG8_1X8: Self = Self(0x3013);
    pub const SRGGB8_1X8: Self = Self(0x3014);

    /// Canonical kernel name without the `MEDIA_BUS_FMT_` prefix
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::SBGGR8_1X8 => "SBGGR8_1X8",
            Self::SGBRG8_1X8 => "SGBRG8_1X8",
            Self::SGRBG8_1X8 => "SGRBG8_1X8",
            Self::SRGGB8_1X8 => "SRGGB8_1X8",
            Self::SBGGR10_1X10 => "SBGGR10_1X10",
            Self::SGBRG10_1X10 => "SGBRG10_1X10",
            Self::SGRBG10_1X10 => "SGRBG10_1X10",
            Self::SRGGB10_1X10 => "SRGGB10_1X10",
            Self::SBGGR12_1X12 => "SBGGR12_1X12",
            Self::SGBRG12_1X12 => "SGBRG12_1X12",
            Self::SGRBG12_1X12 => "SGRBG12_1X12",
            Self::SRGGB12_1X12 => "SRGGB12_1X12",
            _ => return None,
        };
        Some(name)
    }

    /// Bits per sample for the known Bayer codes
    pub fn bit_depth(&self) -> Option<u32> {
        match *self {
            Self::SBGGR8_1X8 | Self::SGBRG8_1X8 | Self::SGRBG8_1X8 | Self::SRGGB8_1X8 => Some(8),
            Self::SBGGR10_1X10 | Self::SGBRG10_1X10 | Self::SGRBG10_1X10 | Self::SRGGB10_1X10 => {
                Some(10)
            }
            Self::SBGGR12_1X12 | Self::SGBRG12_1X12 | Self::SGRBG12_1X12 | Self::SRGGB12_1X12 => {
                Some(12)
            }
            _ => None,
        }
    }

    /// Component ordering of the 2x2 Bayer tile ("BGGR", "GBRG", ...)
    pub fn bayer_order(&self) -> Option<&'static str> {
        self.name().map(|n| &n[1..5])
    }

    /// Parse a kernel name, with or without the `MEDIA_BUS_FMT_` prefix
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_prefix("MEDIA_BUS_FMT_").unwrap_or(name);
        crate::constants::RAW_BAYER_CODES
            .iter()
            .copied()
            .find(|code| code.name() == Some(name))
    }
}

impl fmt::Display for MediaBusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}
