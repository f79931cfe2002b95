// SPDX-License-Identifier: GPL-3.0-only

//! Media graph model and format types
//!
//! # Modules
//!
//! - [`formats`]: Frame sizes, media bus codes and pixel formats
//! - [`graph`]: Entities, pads and links of a media device

pub mod formats;
pub mod graph;

pub use formats::{DeviceFormat, MediaBusCode, Size, SubdeviceFormat};
pub use graph::{EntityId, LinkDesc, LinkId, MediaGraph, PadDirection, PadId};
