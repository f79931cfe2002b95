// SPDX-License-Identifier: GPL-3.0-only

//! Capture requests

use super::stream::StreamId;
use crate::control::AgcStatus;
use crate::errors::{PipelineError, PipelineResult};

/// Lifecycle of a submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Waiting in the camera queue
    Pending,
    /// Every bound buffer completed
    Complete,
    /// Flushed by `stop` before completing
    Cancelled,
}

/// What the hardware reported for a filled buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMetadata {
    pub index: u32,
    pub sequence: u32,
    pub timestamp_ns: u64,
    pub bytes_used: Vec<u32>,
}

/// Client intent to fill one buffer per bound stream
#[derive(Debug, Clone)]
pub struct Request {
    cookie: u64,
    bindings: Vec<(StreamId, u32)>,
    completed: Vec<(StreamId, FrameMetadata)>,
    status: RequestStatus,
    agc: Option<AgcStatus>,
}

impl Request {
    /// `cookie` is opaque to the pipeline and handed back on completion
    pub fn new(cookie: u64) -> Self {
        Self {
            cookie,
            bindings: Vec::new(),
            completed: Vec::new(),
            status: RequestStatus::Pending,
            agc: None,
        }
    }

    /// Bind a pool buffer to a stream (one buffer per stream)
    pub fn add_buffer(&mut self, stream: StreamId, index: u32) -> PipelineResult<()> {
        if self.buffer_for(stream).is_some() {
            return Err(PipelineError::InvalidRequest(format!(
                "Request {} already has a buffer for {}",
                self.cookie, stream
            )));
        }
        self.bindings.push((stream, index));
        Ok(())
    }

    /// Builder form of [`Request::add_buffer`] for a fresh request
    pub fn with_buffer(mut self, stream: StreamId, index: u32) -> Self {
        if self.buffer_for(stream).is_none() {
            self.bindings.push((stream, index));
        }
        self
    }

    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub fn buffers(&self) -> &[(StreamId, u32)] {
        &self.bindings
    }

    pub fn buffer_for(&self, stream: StreamId) -> Option<u32> {
        self.bindings
            .iter()
            .find(|(s, _)| *s == stream)
            .map(|(_, index)| *index)
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Metadata of the completed buffer bound to `stream`
    pub fn metadata(&self, stream: StreamId) -> Option<&FrameMetadata> {
        self.completed
            .iter()
            .find(|(s, _)| *s == stream)
            .map(|(_, metadata)| metadata)
    }

    /// Exposure and gain the control loop chose after this frame
    pub fn agc_status(&self) -> Option<&AgcStatus> {
        self.agc.as_ref()
    }

    /// Whether every bound stream has a completed buffer
    pub fn has_pending_buffers(&self) -> bool {
        self.bindings
            .iter()
            .any(|(stream, _)| self.metadata(*stream).is_none())
    }

    /// Record a filled buffer; returns true once nothing is pending
    pub(crate) fn complete_buffer(&mut self, stream: StreamId, metadata: FrameMetadata) -> bool {
        self.completed.retain(|(s, _)| *s != stream);
        self.completed.push((stream, metadata));
        !self.has_pending_buffers()
    }

    pub(crate) fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
    }

    pub(crate) fn set_agc_status(&mut self, status: AgcStatus) {
        self.agc = Some(status);
    }
}
