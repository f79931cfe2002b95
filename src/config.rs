// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration
//!
//! Defaults describe the rkisp1 graph. A JSON file can override any subset
//! of the fields, which is how the same handler is pointed at boards whose
//! receiver or sensor naming differs.

use crate::constants::{self, entities, pads};
use crate::errors::{PipelineError, PipelineResult};
use crate::media::formats::{FourCC, parse_fourcc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Entity names the handler looks up in the media graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityNames {
    /// CSI-2 receiver all sensors link into
    pub receiver: String,
    /// ISP subdevice
    pub isp: String,
    /// Capture video node
    pub capture: String,
    /// Entities that must exist for the device to match, but are not driven
    pub extra_required: Vec<String>,
}

impl Default for EntityNames {
    fn default() -> Self {
        Self {
            receiver: entities::RECEIVER.to_string(),
            isp: entities::ISP.to_string(),
            capture: entities::CAPTURE.to_string(),
            extra_required: vec![
                entities::SELFPATH.to_string(),
                entities::STATISTICS.to_string(),
                entities::INPUT_PARAMS.to_string(),
            ],
        }
    }
}

/// Pad numbers along the processing chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadLayout {
    pub sensor_source: u32,
    pub receiver_sink: u32,
    pub receiver_source: u32,
    pub isp_sink: u32,
    pub isp_source: u32,
    pub capture_sink: u32,
}

impl Default for PadLayout {
    fn default() -> Self {
        Self {
            sensor_source: pads::SENSOR_SOURCE,
            receiver_sink: pads::RECEIVER_SINK,
            receiver_source: pads::RECEIVER_SOURCE,
            isp_sink: pads::ISP_SINK,
            isp_source: pads::ISP_SOURCE,
            capture_sink: pads::CAPTURE_SINK,
        }
    }
}

/// Auto exposure / gain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Run the AGC algorithm on completed frames
    pub agc_enabled: bool,
    /// Exposure compensation in stops
    pub exposure_value: f64,
    /// Target mean luminance (0.0 - 1.0)
    pub target_luminance: f64,
    /// Fixed shutter in microseconds (None = automatic)
    pub fixed_shutter_us: Option<u64>,
    /// Fixed analogue gain (None = automatic)
    pub fixed_gain: Option<f64>,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            agc_enabled: true,
            exposure_value: 0.0,
            target_luminance: 0.16,
            fixed_shutter_us: None,
            fixed_gain: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Media device driver name to match
    pub driver: String,
    /// Entity names of the chain
    pub entities: EntityNames,
    /// Pad numbers of the chain
    pub pads: PadLayout,
    /// Buffers exported per stream
    pub buffer_count: u32,
    /// Output pixel format of the capture node (e.g. "NV12")
    pub output_format: String,
    /// Plane count requested from the capture node
    pub capture_planes: u32,
    /// Auto exposure / gain settings
    pub control: ControlSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            driver: constants::DRIVER_NAME.to_string(),
            entities: EntityNames::default(),
            pads: PadLayout::default(),
            buffer_count: constants::DEFAULT_BUFFER_COUNT,
            output_format: constants::DEFAULT_OUTPUT_FORMAT.to_string(),
            capture_planes: constants::CAPTURE_PLANES,
            control: ControlSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&contents)?;
        debug!(path = %path.display(), driver = %config.driver, "Loaded pipeline config");
        Ok(config)
    }

    /// Parse and validate a JSON configuration string
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Every entity name that must be present for a device to match
    pub fn required_entities(&self) -> Vec<String> {
        let mut names = vec![
            self.entities.receiver.clone(),
            self.entities.isp.clone(),
            self.entities.capture.clone(),
        ];
        for name in &self.entities.extra_required {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Output FourCC parsed from `output_format`
    pub fn output_fourcc(&self) -> PipelineResult<FourCC> {
        parse_fourcc(&self.output_format).ok_or_else(|| {
            PipelineError::Config(format!("Invalid output format '{}'", self.output_format))
        })
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.driver.trim().is_empty() {
            return Err(PipelineError::Config("Driver name is empty".to_string()));
        }
        for name in [
            &self.entities.receiver,
            &self.entities.isp,
            &self.entities.capture,
        ] {
            if name.trim().is_empty() {
                return Err(PipelineError::Config("Entity name is empty".to_string()));
            }
        }
        if self.buffer_count == 0 {
            return Err(PipelineError::Config(
                "Buffer count must be at least 1".to_string(),
            ));
        }
        if self.capture_planes == 0 {
            return Err(PipelineError::Config(
                "Capture plane count must be at least 1".to_string(),
            ));
        }
        self.output_fourcc()?;
        let target = self.control.target_luminance;
        if !(target > 0.0 && target < 1.0) {
            return Err(PipelineError::Config(format!(
                "Target luminance {} outside (0, 1)",
                target
            )));
        }
        Ok(())
    }
}
