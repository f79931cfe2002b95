// SPDX-License-Identifier: GPL-3.0-only

//! Format negotiator
//!
//! Walks the chain stage by stage:
//!
//! ```text
//! sensor ──► receiver sink ┄┄► receiver source ──► ISP sink      capture node
//!  (best raw Bayer mode)      (read back)                       (output format)
//! ```
//!
//! Each stage may adjust or reject what it is given. Any rejection aborts
//! the walk with the originating error; stages already configured are left
//! as they are.

use super::sensor::CameraSensor;
use super::subdevice::Subdevice;
use super::video_node::VideoNode;
use crate::config::PadLayout;
use crate::constants::RAW_BAYER_CODES;
use crate::errors::{PipelineError, PipelineResult};
use crate::media::formats::{DeviceFormat, Size, SubdeviceFormat};
use tracing::{debug, info};

/// Stages taking part in a negotiation
pub struct Chain<'a> {
    pub sensor: &'a mut CameraSensor,
    pub receiver: &'a mut Subdevice,
    pub isp: &'a mut Subdevice,
    pub capture: &'a mut VideoNode,
    pub pads: &'a PadLayout,
}

/// Formats accepted along the chain by a successful negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub sensor: SubdeviceFormat,
    pub isp_input: SubdeviceFormat,
    pub output: DeviceFormat,
}

/// Reject sizes the sensor cannot reach
pub fn check_size(sensor: &CameraSensor, size: Size) -> PipelineResult<()> {
    let resolution = sensor.resolution();
    if size.is_empty() || !resolution.contains(&size) {
        return Err(PipelineError::InvalidConfiguration(format!(
            "Size {} outside sensor '{}' resolution {}",
            size,
            sensor.entity(),
            resolution
        )));
    }
    Ok(())
}

/// Configure the chain for `requested` (output encoding, size, planes)
pub fn negotiate(chain: Chain<'_>, requested: DeviceFormat) -> PipelineResult<Negotiated> {
    check_size(chain.sensor, requested.size)?;

    let mut sensor_format = chain
        .sensor
        .best_format(&RAW_BAYER_CODES, requested.size)
        .ok_or_else(|| {
            PipelineError::InvalidConfiguration(format!(
                "Sensor '{}' supports no raw Bayer format",
                chain.sensor.entity()
            ))
        })?;
    chain.sensor.set_format(&mut sensor_format)?;
    debug!(sensor = %chain.sensor.entity(), format = %sensor_format, "Sensor format");

    let mut receiver_format = sensor_format;
    chain
        .receiver
        .set_format(chain.pads.receiver_sink, &mut receiver_format)?;

    let mut isp_input = chain.receiver.get_format(chain.pads.receiver_source)?;
    chain.isp.set_format(chain.pads.isp_sink, &mut isp_input)?;

    let mut output = requested;
    chain.capture.set_format(&mut output)?;
    if !output.matches(&requested) {
        return Err(PipelineError::ConfigurationMismatch {
            requested,
            accepted: output,
        });
    }

    info!(
        sensor = %sensor_format,
        isp_input = %isp_input,
        output = %output,
        "Negotiated pipeline formats"
    );
    Ok(Negotiated {
        sensor: sensor_format,
        isp_input,
        output,
    })
}
