// SPDX-License-Identifier: GPL-3.0-only

//! Stream and buffer pool
//!
//! Each camera owns exactly one [`Stream`]. The pool only exists between
//! `allocate` and `release`, and buffer memory is owned by the capture
//! node; the pool tracks where each buffer currently is.

use super::video_node::VideoNode;
use crate::backends::BufferMemory;
use crate::errors::{PipelineError, PipelineResult};
use crate::media::formats::{FourCC, Size, fourcc_name};
use std::fmt;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub(crate) usize);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream{}", self.0)
    }
}

/// Negotiated stream parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfiguration {
    pub pixel_format: FourCC,
    pub size: Size,
    pub buffer_count: u32,
}

impl fmt::Display for StreamConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} x{}",
            self.size,
            fourcc_name(&self.pixel_format),
            self.buffer_count
        )
    }
}

/// Where a pool buffer currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Exported, not handed to hardware
    Available,
    /// Owned by hardware until it completes
    Queued,
    /// Filled, carried back to the client in a request
    Completed,
}

#[derive(Debug, Clone)]
pub struct Buffer {
    memory: BufferMemory,
    state: BufferState,
}

impl Buffer {
    pub fn index(&self) -> u32 {
        self.memory.index
    }

    pub fn memory(&self) -> &BufferMemory {
        &self.memory
    }

    pub fn state(&self) -> BufferState {
        self.state
    }
}

#[derive(Debug)]
pub struct Stream {
    id: StreamId,
    configuration: Option<StreamConfiguration>,
    buffers: Vec<Buffer>,
}

impl Stream {
    pub fn new(id: StreamId) -> Self {
        Self {
            id,
            configuration: None,
            buffers: Vec::new(),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn configuration(&self) -> Option<&StreamConfiguration> {
        self.configuration.as_ref()
    }

    pub(crate) fn set_configuration(&mut self, configuration: Option<StreamConfiguration>) {
        self.configuration = configuration;
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn buffer(&self, index: u32) -> Option<&Buffer> {
        self.buffers.iter().find(|b| b.index() == index)
    }

    pub fn is_allocated(&self) -> bool {
        !self.buffers.is_empty()
    }

    /// Export the configured number of buffers from the capture node
    ///
    /// A shortfall gives everything back to the hardware and leaves the
    /// pool empty.
    pub(crate) fn allocate(&mut self, node: &mut VideoNode) -> PipelineResult<usize> {
        let configuration = self.configuration.ok_or_else(|| {
            PipelineError::InvalidState(format!("{} is not configured", self.id))
        })?;
        if self.is_allocated() {
            return Err(PipelineError::InvalidState(format!(
                "{} already has buffers",
                self.id
            )));
        }

        let requested = configuration.buffer_count;
        let memory = node.export_buffers(requested)?;
        if memory.len() < requested as usize {
            let exported = memory.len() as u32;
            if exported > 0
                && let Err(e) = node.release_buffers()
            {
                error!(stream = %self.id, error = %e, "Failed to release partial buffer export");
            }
            return Err(PipelineError::ResourceExhausted {
                requested,
                exported,
            });
        }

        self.buffers = memory
            .into_iter()
            .map(|memory| Buffer {
                memory,
                state: BufferState::Available,
            })
            .collect();
        info!(stream = %self.id, count = self.buffers.len(), "Allocated buffers");
        Ok(self.buffers.len())
    }

    /// Give the buffer memory back; never fails, the pool is empty afterwards
    pub(crate) fn release(&mut self, node: &mut VideoNode) {
        if let Err(e) = node.release_buffers() {
            error!(stream = %self.id, error = %e, "Failed to release buffers");
        }
        if !self.buffers.is_empty() {
            info!(stream = %self.id, count = self.buffers.len(), "Released buffers");
        }
        self.buffers.clear();
    }

    /// Check `index` can be handed to hardware
    pub(crate) fn check_queueable(&self, index: u32) -> PipelineResult<()> {
        match self.buffer(index).map(Buffer::state) {
            None => Err(PipelineError::InvalidRequest(format!(
                "Buffer {} is not in the {} pool",
                index, self.id
            ))),
            Some(BufferState::Queued) => Err(PipelineError::InvalidRequest(format!(
                "Buffer {} of {} is already queued",
                index, self.id
            ))),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn set_state(&mut self, index: u32, state: BufferState) {
        if let Some(buffer) = self.buffers.iter_mut().find(|b| b.index() == index) {
            buffer.state = state;
        }
    }

    /// Hardware dropped its queue (stream off): everything queued is ours again
    pub(crate) fn reclaim_queued(&mut self) {
        for buffer in &mut self.buffers {
            if buffer.state == BufferState::Queued {
                buffer.state = BufferState::Available;
            }
        }
    }
}
