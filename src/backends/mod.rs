// SPDX-License-Identifier: GPL-3.0-only

//! Hardware device layer
//!
//! The pipeline handler never touches device nodes directly. Everything it
//! needs from the platform goes through the traits in this module:
//!
//! ```text
//! ┌──────────────────────┐
//! │   PipelineHandler    │
//! └──────────┬───────────┘
//!            │ search / acquire
//!            ▼
//! ┌──────────────────────┐      open_subdevice()   ┌──────────────┐
//! │  MediaDevice (trait) │ ──────────────────────► │ SubdeviceIo  │
//! │  topology, links     │      open_video_node()  ├──────────────┤
//! │                      │ ──────────────────────► │   VideoIo    │ ── BufferCompletion ──►
//! └──────────────────────┘                         └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`virtual_media`]: In-memory rkisp1-shaped device used by the CLI and tests
//! - [`media_probe`]: `/dev/media*` discovery through `MEDIA_IOC_DEVICE_INFO`

pub mod media_probe;
pub mod virtual_media;

use crate::control::FrameStatistics;
use crate::errors::HwResult;
use crate::media::formats::{DeviceFormat, MediaBusCode, Size, SubdeviceFormat};
use crate::media::graph::{LinkDesc, MediaGraph};
use std::sync::Arc;

/// Channel the video node uses to deliver buffer completions
pub type CompletionSender = tokio::sync::mpsc::UnboundedSender<BufferCompletion>;

/// Receiving half of the completion channel
pub type CompletionReceiver = tokio::sync::mpsc::UnboundedReceiver<BufferCompletion>;

/// V4L2 control identifiers written to the sensor by the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorControl {
    /// Exposure time in lines (`V4L2_CID_EXPOSURE`)
    Exposure,
    /// Analogue gain code (`V4L2_CID_ANALOGUE_GAIN`)
    AnalogueGain,
}

impl SensorControl {
    pub fn cid(&self) -> u32 {
        match self {
            SensorControl::Exposure => 0x0098_0911,
            SensorControl::AnalogueGain => 0x009e_0903,
        }
    }
}

/// Plane of an exported buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneInfo {
    pub offset: u32,
    pub length: u32,
}

/// Exported buffer memory (opaque to the core apart from plane metadata)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferMemory {
    pub index: u32,
    pub planes: Vec<PlaneInfo>,
}

/// A buffer the hardware finished filling
#[derive(Debug, Clone)]
pub struct BufferCompletion {
    /// Index of the buffer in the exported pool
    pub index: u32,
    /// Frame sequence number since stream on
    pub sequence: u32,
    /// Capture timestamp in nanoseconds
    pub timestamp_ns: u64,
    /// Bytes written per plane
    pub bytes_used: Vec<u32>,
    /// Measurement statistics for the control loop, when the ISP produced them
    pub statistics: Option<FrameStatistics>,
}

/// Source of media devices present on the system
pub trait DeviceEnumerator: Send + Sync {
    /// Every media device currently known
    fn devices(&self) -> Vec<Arc<dyn MediaDevice>>;
}

/// One physical media device (a media controller instance)
pub trait MediaDevice: Send + Sync {
    /// Driver name (e.g. "rkisp1")
    fn driver(&self) -> String;

    /// Snapshot of the device topology, including current link flags
    fn topology(&self) -> HwResult<MediaGraph>;

    /// Claim exclusive use of the device; false if someone else holds it
    fn acquire(&self) -> bool;

    /// Give up exclusive use
    fn release(&self);

    /// Open a control session for link configuration
    fn open(&self) -> HwResult<()>;

    /// Close the control session opened by [`MediaDevice::open`]
    fn close(&self);

    /// Enable or disable a link
    fn setup_link(&self, link: &LinkDesc, enabled: bool) -> HwResult<()>;

    /// Open the subdevice node of a named entity
    fn open_subdevice(&self, entity: &str) -> HwResult<Box<dyn SubdeviceIo>>;

    /// Open the video node of a named entity
    fn open_video_node(&self, entity: &str) -> HwResult<Box<dyn VideoIo>>;
}

/// Open session on a subdevice node
pub trait SubdeviceIo: Send {
    /// Supported media bus codes on a pad with the discrete frame sizes of each
    fn enumerate_formats(&self, pad: u32) -> HwResult<Vec<(MediaBusCode, Vec<Size>)>>;

    fn get_format(&self, pad: u32) -> HwResult<SubdeviceFormat>;

    /// Apply a format; the driver writes back what it actually accepted
    fn set_format(&mut self, pad: u32, format: &mut SubdeviceFormat) -> HwResult<()>;

    fn set_control(&mut self, control: SensorControl, value: i64) -> HwResult<()>;
}

/// Open session on a capture video node
pub trait VideoIo: Send {
    fn get_format(&self) -> HwResult<DeviceFormat>;

    /// Apply a format; the driver writes back what it actually accepted
    fn set_format(&mut self, format: &mut DeviceFormat) -> HwResult<()>;

    /// Export up to `count` buffers; the driver may return fewer
    fn export_buffers(&mut self, count: u32) -> HwResult<Vec<BufferMemory>>;

    fn release_buffers(&mut self) -> HwResult<()>;

    fn queue_buffer(&mut self, index: u32) -> HwResult<()>;

    fn stream_on(&mut self) -> HwResult<()>;

    fn stream_off(&mut self) -> HwResult<()>;

    /// Register (or clear) the subscriber for buffer completions
    fn set_buffer_ready(&mut self, sink: Option<CompletionSender>);
}
