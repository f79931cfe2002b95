// SPDX-License-Identifier: GPL-3.0-only

//! Capture video node handle
//!
//! Owns the open session on the capture entity. Dropping the handle
//! unregisters the buffer-ready subscriber, which ends the completion
//! channel.

use crate::backends::{BufferMemory, CompletionSender, MediaDevice, VideoIo};
use crate::errors::PipelineResult;
use crate::media::formats::DeviceFormat;
use tracing::{debug, info};

pub struct VideoNode {
    entity: String,
    io: Box<dyn VideoIo>,
}

impl VideoNode {
    pub fn open(device: &dyn MediaDevice, entity: &str) -> PipelineResult<Self> {
        let io = device.open_video_node(entity)?;
        debug!(entity, "Opened video node");
        Ok(Self {
            entity: entity.to_string(),
            io,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn get_format(&self) -> PipelineResult<DeviceFormat> {
        Ok(self.io.get_format()?)
    }

    /// Apply `format`; on success it holds what the driver accepted
    pub fn set_format(&mut self, format: &mut DeviceFormat) -> PipelineResult<()> {
        let requested = *format;
        self.io.set_format(format)?;
        debug!(
            entity = %self.entity,
            requested = %requested,
            accepted = %format,
            "Set video node format"
        );
        Ok(())
    }

    /// Export up to `count` buffers; the driver may hand back fewer
    pub fn export_buffers(&mut self, count: u32) -> PipelineResult<Vec<BufferMemory>> {
        let buffers = self.io.export_buffers(count)?;
        debug!(entity = %self.entity, requested = count, exported = buffers.len(), "Exported buffers");
        Ok(buffers)
    }

    pub fn release_buffers(&mut self) -> PipelineResult<()> {
        Ok(self.io.release_buffers()?)
    }

    pub fn queue_buffer(&mut self, index: u32) -> PipelineResult<()> {
        Ok(self.io.queue_buffer(index)?)
    }

    pub fn stream_on(&mut self) -> PipelineResult<()> {
        self.io.stream_on()?;
        info!(entity = %self.entity, "Stream on");
        Ok(())
    }

    pub fn stream_off(&mut self) -> PipelineResult<()> {
        self.io.stream_off()?;
        info!(entity = %self.entity, "Stream off");
        Ok(())
    }

    /// Register the single subscriber for buffer completions
    pub fn set_buffer_ready(&mut self, sink: Option<CompletionSender>) {
        self.io.set_buffer_ready(sink);
    }
}

impl Drop for VideoNode {
    fn drop(&mut self) {
        self.io.set_buffer_ready(None);
        debug!(entity = %self.entity, "Closed video node");
    }
}

impl std::fmt::Debug for VideoNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoNode")
            .field("entity", &self.entity)
            .finish()
    }
}
