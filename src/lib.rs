// SPDX-License-Identifier: GPL-3.0-only

//! ISP pipeline handler
//!
//! Drives camera pipelines shaped as sensor → CSI-2 receiver → ISP →
//! capture node, as exposed by the rkisp1 media controller driver.
//!
//! # Architecture
//!
//! - [`backends`]: Hardware device layer traits, a simulated rkisp1 device and `/dev/media*` probing
//! - [`media`]: Media graph model and format types
//! - [`pipeline`]: Graph matching, link setup, format negotiation, buffers and requests
//! - [`control`]: Per-frame exposure/gain control
//! - [`config`]: Pipeline configuration
//!
//! # Example
//!
//! ```no_run
//! use isp_pipeline::backends::virtual_media::{
//!     VirtualEnumerator, VirtualMediaDevice, VirtualSensor, VirtualTopology,
//! };
//! use isp_pipeline::media::Size;
//! use isp_pipeline::{PipelineConfig, PipelineHandler};
//!
//! let device = VirtualMediaDevice::new(VirtualTopology::rkisp1(vec![
//!     VirtualSensor::imx219("imx219 4-0010"),
//! ]));
//! let enumerator = VirtualEnumerator::new(vec![device]);
//! let handler = PipelineHandler::match_device(&enumerator, PipelineConfig::default())?;
//! let camera = handler.cameras()[0].id;
//! handler.configure(camera, Size::new(1920, 1080))?;
//! # Ok::<(), isp_pipeline::PipelineError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod control;
pub mod errors;
pub mod media;
pub mod pipeline;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use errors::{HwError, PipelineError, PipelineResult};
pub use pipeline::{CameraId, CompletedRequest, PipelineHandler, Request, RequestStatus};
