// SPDX-License-Identifier: GPL-3.0-only

//! Graph matcher
//!
//! Finds the media device whose driver and entity names satisfy a
//! [`DeviceMatch`], and claims it for the lifetime of the handler.

use crate::backends::{DeviceEnumerator, MediaDevice};
use crate::config::PipelineConfig;
use crate::errors::{HwResult, PipelineError, PipelineResult};
use crate::media::graph::MediaGraph;
use std::sync::Arc;
use tracing::{debug, info};

/// Driver name plus the entity names a device must expose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMatch {
    driver: String,
    entities: Vec<String>,
}

impl DeviceMatch {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            entities: Vec::new(),
        }
    }

    /// Require an entity name
    pub fn add(&mut self, entity: impl Into<String>) -> &mut Self {
        let entity = entity.into();
        if !self.entities.contains(&entity) {
            self.entities.push(entity);
        }
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut dm = Self::new(&config.driver);
        for entity in config.required_entities() {
            dm.add(entity);
        }
        dm
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    /// Required entities absent from `graph`
    pub fn missing<'a>(&'a self, graph: &MediaGraph) -> Vec<&'a str> {
        self.entities
            .iter()
            .filter(|name| graph.entity_by_name(name).is_none())
            .map(String::as_str)
            .collect()
    }

    pub fn matches(&self, graph: &MediaGraph) -> bool {
        graph.driver() == self.driver && self.missing(graph).is_empty()
    }
}

/// Exclusive claim on a media device, released on drop
pub struct DeviceLease {
    device: Arc<dyn MediaDevice>,
}

impl DeviceLease {
    pub fn device(&self) -> &dyn MediaDevice {
        self.device.as_ref()
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        debug!(driver = %self.device.driver(), "Releasing media device");
        self.device.release();
    }
}

impl std::fmt::Debug for DeviceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLease")
            .field("driver", &self.device.driver())
            .finish()
    }
}

/// Open control session on a media device, closed on drop
pub struct MediaSession<'a> {
    device: &'a dyn MediaDevice,
}

impl<'a> MediaSession<'a> {
    pub fn open(device: &'a dyn MediaDevice) -> HwResult<Self> {
        device.open()?;
        Ok(Self { device })
    }
}

impl Drop for MediaSession<'_> {
    fn drop(&mut self) {
        self.device.close();
    }
}

/// Search the enumerator for a device satisfying `dm` and acquire it
///
/// Devices already claimed elsewhere are skipped. Fails with
/// [`PipelineError::NotFound`] when no free device matches.
pub fn search(
    enumerator: &dyn DeviceEnumerator,
    dm: &DeviceMatch,
) -> PipelineResult<(DeviceLease, MediaGraph)> {
    for device in enumerator.devices() {
        if device.driver() != dm.driver {
            continue;
        }

        let graph = match device.topology() {
            Ok(graph) => graph,
            Err(e) => {
                debug!(driver = %dm.driver, error = %e, "Cannot read media graph, skipping device");
                continue;
            }
        };

        let missing = dm.missing(&graph);
        if !missing.is_empty() {
            debug!(driver = %dm.driver, ?missing, "Media device lacks required entities");
            continue;
        }

        if !device.acquire() {
            debug!(driver = %dm.driver, "Media device already in use");
            continue;
        }

        info!(
            driver = %dm.driver,
            entities = graph.entities().len(),
            links = graph.links().len(),
            "Acquired media device"
        );
        return Ok((DeviceLease { device }, graph));
    }

    Err(PipelineError::NotFound(format!(
        "No available '{}' media device exposing {}",
        dm.driver,
        dm.entities.join(", ")
    )))
}
