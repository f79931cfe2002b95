// SPDX-License-Identifier: GPL-3.0-only

//! Subdevice handle
//!
//! Owns the open session on one non-streaming entity (sensor, receiver,
//! ISP). The session closes when the handle is dropped.

use crate::backends::{MediaDevice, SensorControl, SubdeviceIo};
use crate::errors::PipelineResult;
use crate::media::formats::{MediaBusCode, Size, SubdeviceFormat};
use tracing::debug;

pub struct Subdevice {
    entity: String,
    io: Box<dyn SubdeviceIo>,
}

impl Subdevice {
    pub fn open(device: &dyn MediaDevice, entity: &str) -> PipelineResult<Self> {
        let io = device.open_subdevice(entity)?;
        debug!(entity, "Opened subdevice");
        Ok(Self {
            entity: entity.to_string(),
            io,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Media bus codes and discrete sizes supported on a pad
    pub fn formats(&self, pad: u32) -> PipelineResult<Vec<(MediaBusCode, Vec<Size>)>> {
        Ok(self.io.enumerate_formats(pad)?)
    }

    pub fn get_format(&self, pad: u32) -> PipelineResult<SubdeviceFormat> {
        Ok(self.io.get_format(pad)?)
    }

    /// Apply `format` to a pad; on success it holds what the driver accepted
    pub fn set_format(&mut self, pad: u32, format: &mut SubdeviceFormat) -> PipelineResult<()> {
        let requested = *format;
        self.io.set_format(pad, format)?;
        debug!(
            entity = %self.entity,
            pad,
            requested = %requested,
            accepted = %format,
            "Set subdevice format"
        );
        Ok(())
    }

    pub fn set_control(&mut self, control: SensorControl, value: i64) -> PipelineResult<()> {
        Ok(self.io.set_control(control, value)?)
    }
}

impl std::fmt::Debug for Subdevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subdevice")
            .field("entity", &self.entity)
            .finish()
    }
}
