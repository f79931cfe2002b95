// SPDX-License-Identifier: GPL-3.0-only

//! Sensor-specific conversions between control units and physical values

use crate::constants::MISTRUST_FRAMES_STARTUP;
use std::time::Duration;

/// Converts exposure and gain to the values the sensor driver takes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorHelper {
    /// Duration of one sensor line
    line_duration: Duration,
    /// Startup frames whose statistics are unusable
    mistrust_frames_startup: u32,
}

impl Default for SensorHelper {
    fn default() -> Self {
        Self::new(Duration::from_nanos(14_815), MISTRUST_FRAMES_STARTUP)
    }
}

impl SensorHelper {
    pub fn new(line_duration: Duration, mistrust_frames_startup: u32) -> Self {
        Self {
            line_duration: line_duration.max(Duration::from_nanos(1)),
            mistrust_frames_startup,
        }
    }

    /// Gain code = gain × 100
    pub fn gain_code(&self, gain: f64) -> u32 {
        (gain * 100.0) as u32
    }

    pub fn gain(&self, gain_code: u32) -> f64 {
        gain_code as f64 / 100.0
    }

    /// Exposure in whole lines, never below one
    pub fn exposure_lines(&self, exposure: Duration) -> u32 {
        let lines = exposure.as_nanos() / self.line_duration.as_nanos();
        lines.clamp(1, u32::MAX as u128) as u32
    }

    pub fn exposure(&self, lines: u32) -> Duration {
        self.line_duration * lines
    }

    pub fn mistrust_frames_startup(&self) -> u32 {
        self.mistrust_frames_startup
    }
}
