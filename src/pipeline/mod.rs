// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline handler core
//!
//! ```text
//! ┌────────┐   dynamic   ┌──────────┐  static  ┌─────┐  static  ┌──────────┐
//! │ sensor │ ──────────► │ receiver │ ───────► │ ISP │ ───────► │ capture  │
//! └────────┘  (1 of N)   └──────────┘          └─────┘          └──────────┘
//! ```
//!
//! # Modules
//!
//! - [`device_match`]: Finds and acquires the media device
//! - [`topology`]: Static chain links and per-camera sensor link selection
//! - [`negotiation`]: Format propagation from the sensor to the capture node
//! - [`stream`]: Stream configuration and buffer pool
//! - [`request`]: Capture requests
//! - [`handler`]: Cameras, state machine and the completion engine

pub mod device_match;
pub mod handler;
pub mod negotiation;
pub mod request;
pub mod sensor;
pub mod stream;
pub mod subdevice;
pub mod topology;
pub mod video_node;

pub use handler::{CameraId, CameraInfo, CameraState, CompletedRequest, PipelineHandler};
pub use request::{FrameMetadata, Request, RequestStatus};
pub use stream::{Buffer, BufferState, StreamConfiguration, StreamId};
