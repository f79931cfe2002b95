// SPDX-License-Identifier: GPL-3.0-only

//! Camera sensor model
//!
//! Wraps the sensor subdevice with what was learned from it at init time:
//! the media bus codes it can output, its native frame sizes and the
//! largest of them.

use super::subdevice::Subdevice;
use crate::backends::SensorControl;
use crate::errors::{PipelineError, PipelineResult};
use crate::media::formats::{MediaBusCode, Size, SubdeviceFormat};
use tracing::debug;

#[derive(Debug)]
pub struct CameraSensor {
    subdev: Subdevice,
    pad: u32,
    formats: Vec<(MediaBusCode, Vec<Size>)>,
    resolution: Size,
}

impl CameraSensor {
    /// Wrap the subdevice; `pad` is the sensor's source pad
    pub fn new(subdev: Subdevice, pad: u32) -> Self {
        Self {
            subdev,
            pad,
            formats: Vec::new(),
            resolution: Size::default(),
        }
    }

    /// Enumerate supported formats and record the maximum resolution
    pub fn init(&mut self) -> PipelineResult<()> {
        let formats: Vec<_> = self
            .subdev
            .formats(self.pad)?
            .into_iter()
            .filter(|(_, sizes)| !sizes.is_empty())
            .collect();
        if formats.is_empty() {
            return Err(PipelineError::NotFound(format!(
                "Sensor '{}' reports no formats",
                self.subdev.entity()
            )));
        }

        self.resolution = formats
            .iter()
            .flat_map(|(_, sizes)| sizes.iter())
            .copied()
            .max_by_key(Size::area)
            .unwrap_or_default();
        self.formats = formats;

        debug!(
            sensor = %self.subdev.entity(),
            codes = self.formats.len(),
            resolution = %self.resolution,
            "Sensor initialised"
        );
        Ok(())
    }

    pub fn entity(&self) -> &str {
        self.subdev.entity()
    }

    /// Largest native frame size
    pub fn resolution(&self) -> Size {
        self.resolution
    }

    pub fn codes(&self) -> Vec<MediaBusCode> {
        self.formats.iter().map(|(code, _)| *code).collect()
    }

    pub fn sizes(&self, code: MediaBusCode) -> &[Size] {
        self.formats
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, sizes)| sizes.as_slice())
            .unwrap_or_default()
    }

    /// Best sensor format for `size` among `codes`, in priority order
    ///
    /// Takes the first code the sensor supports, then the smallest native
    /// size covering `size` (or the largest one if none covers it).
    pub fn best_format(&self, codes: &[MediaBusCode], size: Size) -> Option<SubdeviceFormat> {
        let code = codes.iter().copied().find(|code| !self.sizes(*code).is_empty())?;
        let size = Size::best_fit(self.sizes(code), size)?;
        Some(SubdeviceFormat::new(code, size))
    }

    pub fn set_format(&mut self, format: &mut SubdeviceFormat) -> PipelineResult<()> {
        self.subdev.set_format(self.pad, format)
    }

    pub fn set_control(&mut self, control: SensorControl, value: i64) -> PipelineResult<()> {
        self.subdev.set_control(control, value)
    }
}
