// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame exposure/gain control
//!
//! The request engine hands the statistics of every completed buffer to a
//! [`ControlLoop`], which asks an [`AgcAlgorithm`] for the next exposure and
//! gain and converts them into sensor control values through a
//! [`SensorHelper`]. The algorithm is pluggable; [`MeanLuminanceAgc`] is the
//! default.

pub mod agc;
pub mod sensor_helper;

pub use agc::MeanLuminanceAgc;
pub use sensor_helper::SensorHelper;

use crate::backends::SensorControl;
use crate::config::ControlSettings;
use std::time::Duration;
use tracing::debug;

/// Measurement statistics produced by the ISP for one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameStatistics {
    /// Mean luminance over the whole frame (0.0 - 1.0)
    pub mean_luminance: f64,
    /// Per-zone mean luminance, row-major (empty if the ISP reports none)
    pub zones: Vec<f64>,
}

/// Exposure and gain chosen for the next frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgcStatus {
    pub exposure: Duration,
    pub analogue_gain: f64,
    /// Whether the algorithm considers itself settled
    pub converged: bool,
}

/// How zone statistics are weighted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeteringMode {
    /// Centre zones count more than the edges
    #[default]
    CentreWeighted,
    /// Only the centre zone counts
    Spot,
    /// Every zone counts equally
    Matrix,
}

/// Auto exposure / gain algorithm
pub trait AgcAlgorithm: Send {
    fn name(&self) -> &str;

    /// Frames the algorithm needs to settle after a mode switch
    fn convergence_frames(&self) -> u32;

    /// Exposure compensation in stops
    fn set_ev(&mut self, ev: f64);

    /// Pin the shutter (None returns it to automatic)
    fn set_fixed_shutter(&mut self, shutter: Option<Duration>);

    fn set_max_shutter(&mut self, shutter: Duration);

    /// Pin the analogue gain (None returns it to automatic)
    fn set_fixed_gain(&mut self, gain: Option<f64>);

    fn set_metering_mode(&mut self, mode: MeteringMode);

    fn enable_auto(&mut self);

    fn disable_auto(&mut self);

    /// Decide the exposure and gain for the next frame
    fn process(&mut self, stats: &FrameStatistics) -> AgcStatus;
}

/// Output of one control loop step
#[derive(Debug, Clone, PartialEq)]
pub struct ControlUpdate {
    pub status: AgcStatus,
    /// Sensor control writes implementing `status`
    pub controls: Vec<(SensorControl, i64)>,
}

/// Drives an AGC algorithm from completed frames
pub struct ControlLoop {
    algorithm: Box<dyn AgcAlgorithm>,
    helper: SensorHelper,
    frames_since_start: u32,
}

impl ControlLoop {
    pub fn new(algorithm: Box<dyn AgcAlgorithm>, helper: SensorHelper) -> Self {
        Self {
            algorithm,
            helper,
            frames_since_start: 0,
        }
    }

    /// Build the default algorithm configured from settings
    pub fn from_settings(settings: &ControlSettings) -> Self {
        let mut agc = MeanLuminanceAgc::new(settings.target_luminance);
        agc.set_ev(settings.exposure_value);
        agc.set_fixed_shutter(settings.fixed_shutter_us.map(Duration::from_micros));
        agc.set_fixed_gain(settings.fixed_gain);
        if !settings.agc_enabled {
            agc.disable_auto();
        }
        Self::new(Box::new(agc), SensorHelper::default())
    }

    pub fn algorithm_mut(&mut self) -> &mut dyn AgcAlgorithm {
        self.algorithm.as_mut()
    }

    /// Forget frame history; called when streaming starts
    pub fn reset(&mut self) {
        self.frames_since_start = 0;
    }

    /// Run one step. Returns `None` while startup frames are still mistrusted.
    pub fn process(&mut self, stats: &FrameStatistics) -> Option<ControlUpdate> {
        self.frames_since_start = self.frames_since_start.saturating_add(1);
        if self.frames_since_start <= self.helper.mistrust_frames_startup() {
            debug!(
                frame = self.frames_since_start,
                "Skipping statistics of startup frame"
            );
            return None;
        }

        let status = self.algorithm.process(stats);
        let controls = vec![
            (
                SensorControl::Exposure,
                self.helper.exposure_lines(status.exposure) as i64,
            ),
            (
                SensorControl::AnalogueGain,
                self.helper.gain_code(status.analogue_gain) as i64,
            ),
        ];
        Some(ControlUpdate { status, controls })
    }
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("algorithm", &self.algorithm.name())
            .field("frames_since_start", &self.frames_since_start)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_frame() -> FrameStatistics {
        FrameStatistics {
            mean_luminance: 0.02,
            zones: Vec::new(),
        }
    }

    #[test]
    fn test_startup_frames_are_skipped() {
        let mut control = ControlLoop::from_settings(&ControlSettings::default());
        assert!(control.process(&dark_frame()).is_none());
        assert!(control.process(&dark_frame()).is_none());
        let update = control.process(&dark_frame()).unwrap();
        assert_eq!(update.controls.len(), 2);
        assert_eq!(update.controls[0].0, SensorControl::Exposure);

        control.reset();
        assert!(control.process(&dark_frame()).is_none());
    }

    #[test]
    fn test_disabled_agc_holds_settings() {
        let settings = ControlSettings {
            agc_enabled: false,
            ..Default::default()
        };
        let mut control = ControlLoop::from_settings(&settings);
        control.reset();
        let mut last = None;
        for _ in 0..6 {
            if let Some(update) = control.process(&dark_frame()) {
                if let Some(prev) = last {
                    assert_eq!(prev, update.status);
                }
                last = Some(update.status);
            }
        }
        assert!(last.is_some());
    }
}
