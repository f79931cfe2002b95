// SPDX-License-Identifier: GPL-3.0-only

//! Mean-luminance AGC
//!
//! Scales the total exposure (shutter × gain) towards a target mean
//! luminance. Shutter is raised first, up to the maximum, and gain only
//! covers what the shutter cannot. Each step moves part of the way to the
//! target to avoid oscillation.

use super::{AgcAlgorithm, AgcStatus, FrameStatistics, MeteringMode};
use std::time::Duration;

/// Side length of the zone grid the metering weights are defined for
const ZONE_GRID: usize = 5;

const MIN_SHUTTER: Duration = Duration::from_micros(100);
const DEFAULT_MAX_SHUTTER: Duration = Duration::from_millis(66);
const MIN_GAIN: f64 = 1.0;
const MAX_GAIN: f64 = 16.0;

/// Fraction of the remaining error corrected per frame
const DAMPING: f64 = 0.5;

/// Relative error under which the algorithm reports convergence
const CONVERGED_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct MeanLuminanceAgc {
    target_luminance: f64,
    ev: f64,
    metering: MeteringMode,
    auto_enabled: bool,
    fixed_shutter: Option<Duration>,
    fixed_gain: Option<f64>,
    max_shutter: Duration,
    shutter: Duration,
    gain: f64,
}

impl MeanLuminanceAgc {
    pub fn new(target_luminance: f64) -> Self {
        Self {
            target_luminance,
            ev: 0.0,
            metering: MeteringMode::default(),
            auto_enabled: true,
            fixed_shutter: None,
            fixed_gain: None,
            max_shutter: DEFAULT_MAX_SHUTTER,
            shutter: Duration::from_millis(10),
            gain: MIN_GAIN,
        }
    }

    /// Metering weights for a 5x5 zone grid
    fn weights(&self) -> [f64; ZONE_GRID * ZONE_GRID] {
        let mut weights = [0.0; ZONE_GRID * ZONE_GRID];
        let centre = (ZONE_GRID / 2) as i32;
        for (i, weight) in weights.iter_mut().enumerate() {
            let row = (i / ZONE_GRID) as i32;
            let col = (i % ZONE_GRID) as i32;
            let ring = (row - centre).abs().max((col - centre).abs());
            *weight = match self.metering {
                MeteringMode::Matrix => 1.0,
                MeteringMode::Spot => {
                    if ring == 0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                MeteringMode::CentreWeighted => match ring {
                    0 => 4.0,
                    1 => 2.0,
                    _ => 1.0,
                },
            };
        }
        weights
    }

    fn metered_luminance(&self, stats: &FrameStatistics) -> f64 {
        if stats.zones.len() != ZONE_GRID * ZONE_GRID {
            return stats.mean_luminance;
        }
        let weights = self.weights();
        let total: f64 = weights.iter().sum();
        stats
            .zones
            .iter()
            .zip(weights.iter())
            .map(|(zone, weight)| zone * weight)
            .sum::<f64>()
            / total
    }

    fn status(&self, converged: bool) -> AgcStatus {
        AgcStatus {
            exposure: self.shutter,
            analogue_gain: self.gain,
            converged,
        }
    }

    /// Split a total exposure (seconds × gain) into shutter and gain
    fn divide_up(&mut self, total: f64) {
        let max_shutter = self.fixed_shutter.unwrap_or(self.max_shutter);
        let shutter = match self.fixed_shutter {
            Some(fixed) => fixed,
            None => {
                let wanted = total / self.fixed_gain.unwrap_or(MIN_GAIN);
                if wanted >= max_shutter.as_secs_f64() {
                    max_shutter
                } else if wanted <= MIN_SHUTTER.as_secs_f64() {
                    MIN_SHUTTER
                } else {
                    Duration::from_secs_f64(wanted)
                }
            }
        };
        let gain = match self.fixed_gain {
            Some(fixed) => fixed,
            None => (total / shutter.as_secs_f64()).clamp(MIN_GAIN, MAX_GAIN),
        };
        self.shutter = shutter;
        self.gain = gain;
    }
}

impl AgcAlgorithm for MeanLuminanceAgc {
    fn name(&self) -> &str {
        "mean-luminance"
    }

    fn convergence_frames(&self) -> u32 {
        6
    }

    fn set_ev(&mut self, ev: f64) {
        self.ev = ev;
    }

    fn set_fixed_shutter(&mut self, shutter: Option<Duration>) {
        self.fixed_shutter = shutter;
        if let Some(shutter) = shutter {
            self.shutter = shutter;
        }
    }

    fn set_max_shutter(&mut self, shutter: Duration) {
        self.max_shutter = shutter.max(MIN_SHUTTER);
    }

    fn set_fixed_gain(&mut self, gain: Option<f64>) {
        self.fixed_gain = gain.map(|g| g.clamp(MIN_GAIN, MAX_GAIN));
        if let Some(gain) = self.fixed_gain {
            self.gain = gain;
        }
    }

    fn set_metering_mode(&mut self, mode: MeteringMode) {
        self.metering = mode;
    }

    fn enable_auto(&mut self) {
        self.auto_enabled = true;
    }

    fn disable_auto(&mut self) {
        self.auto_enabled = false;
    }

    fn process(&mut self, stats: &FrameStatistics) -> AgcStatus {
        if !self.auto_enabled {
            return self.status(true);
        }

        let target = (self.target_luminance * 2f64.powf(self.ev)).min(0.95);
        let measured = self.metered_luminance(stats).max(0.001);
        let error = target / measured;
        if (error - 1.0).abs() < CONVERGED_TOLERANCE {
            return self.status(true);
        }

        let current = self.shutter.as_secs_f64() * self.gain;
        let desired = current * error;
        self.divide_up(current + (desired - current) * DAMPING);
        self.status(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(luminance: f64) -> FrameStatistics {
        FrameStatistics {
            mean_luminance: luminance,
            zones: Vec::new(),
        }
    }

    #[test]
    fn test_dark_scene_raises_exposure() {
        let mut agc = MeanLuminanceAgc::new(0.16);
        let before = agc.process(&frame(0.16));
        assert!(before.converged);

        let after = agc.process(&frame(0.04));
        assert!(!after.converged);
        assert!(
            after.exposure.as_secs_f64() * after.analogue_gain
                > before.exposure.as_secs_f64() * before.analogue_gain
        );
    }

    #[test]
    fn test_gain_only_above_max_shutter() {
        let mut agc = MeanLuminanceAgc::new(0.5);
        let mut status = agc.process(&frame(0.001));
        for _ in 0..20 {
            status = agc.process(&frame(0.001));
        }
        assert_eq!(status.exposure, DEFAULT_MAX_SHUTTER);
        assert!(status.analogue_gain > MIN_GAIN);
        assert!(status.analogue_gain <= MAX_GAIN);
    }

    #[test]
    fn test_fixed_values_are_respected() {
        let mut agc = MeanLuminanceAgc::new(0.16);
        agc.set_fixed_shutter(Some(Duration::from_millis(5)));
        agc.set_fixed_gain(Some(2.0));
        let status = agc.process(&frame(0.01));
        assert_eq!(status.exposure, Duration::from_millis(5));
        assert_eq!(status.analogue_gain, 2.0);
    }

    #[test]
    fn test_spot_metering_uses_centre_zone() {
        let mut agc = MeanLuminanceAgc::new(0.16);
        agc.set_metering_mode(MeteringMode::Spot);
        let mut zones = vec![0.9; 25];
        zones[12] = 0.16;
        let stats = FrameStatistics {
            mean_luminance: 0.9,
            zones,
        };
        assert!(agc.process(&stats).converged);
    }
}
