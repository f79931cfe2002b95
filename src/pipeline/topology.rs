// SPDX-License-Identifier: GPL-3.0-only

//! Topology configurator
//!
//! Owns every link mutation. The graph's enabled flags are only updated
//! after the hardware accepted the change, so the graph always reflects
//! the last successful setup call. Failures are not rolled back.

use crate::backends::MediaDevice;
use crate::config::PipelineConfig;
use crate::errors::{PipelineError, PipelineResult};
use crate::media::graph::{LinkId, MediaGraph};
use tracing::debug;

fn set_link(
    device: &dyn MediaDevice,
    graph: &mut MediaGraph,
    link: LinkId,
    enabled: bool,
) -> PipelineResult<()> {
    let desc = graph.describe_link(link);
    device.setup_link(&desc, enabled)?;
    graph.set_link_flag(link, enabled);
    debug!(link = %desc, enabled, "Link setup");
    Ok(())
}

fn find_static_link(
    graph: &MediaGraph,
    source: &str,
    source_pad: u32,
    sink: &str,
    sink_pad: u32,
) -> PipelineResult<LinkId> {
    graph
        .find_link(source, source_pad, sink, sink_pad)
        .ok_or_else(|| {
            PipelineError::NotFound(format!(
                "Link '{}':{} -> '{}':{}",
                source, source_pad, sink, sink_pad
            ))
        })
}

/// Disable every link, then enable receiver → ISP and ISP → capture
///
/// Both static links are looked up before anything is touched, so a
/// graph lacking either one is left unmodified.
pub fn initialize_static_links(
    device: &dyn MediaDevice,
    graph: &mut MediaGraph,
    config: &PipelineConfig,
) -> PipelineResult<()> {
    let names = &config.entities;
    let pads = &config.pads;
    let receiver_isp = find_static_link(
        graph,
        &names.receiver,
        pads.receiver_source,
        &names.isp,
        pads.isp_sink,
    )?;
    let isp_capture = find_static_link(
        graph,
        &names.isp,
        pads.isp_source,
        &names.capture,
        pads.capture_sink,
    )?;

    let enabled: Vec<LinkId> = graph
        .links()
        .iter()
        .filter(|link| link.is_enabled())
        .map(|link| link.id())
        .collect();
    for link in enabled {
        set_link(device, graph, link, false)?;
    }

    set_link(device, graph, receiver_isp, true)?;
    set_link(device, graph, isp_capture, true)?;
    Ok(())
}

/// Route `sensor` into the receiver and cut every other sensor off
///
/// Only links whose state differs from the wanted one are touched, so a
/// repeated call issues no hardware calls. Other sensors are disabled
/// before the chosen one is enabled, so two sensor links are never enabled
/// at once. Stops at the first hardware error.
pub fn select_sensor_link(
    device: &dyn MediaDevice,
    graph: &mut MediaGraph,
    config: &PipelineConfig,
    sensor: &str,
) -> PipelineResult<()> {
    let receiver = graph
        .entity_by_name(&config.entities.receiver)
        .ok_or_else(|| PipelineError::NotFound(format!("Entity '{}'", config.entities.receiver)))?;
    let sink = graph
        .pad_by_index(receiver.id(), config.pads.receiver_sink)
        .ok_or_else(|| {
            PipelineError::NotFound(format!(
                "Pad {} of '{}'",
                config.pads.receiver_sink, config.entities.receiver
            ))
        })?;

    let mut wanted = Vec::new();
    for &link in sink.links() {
        let enable = graph.link_source_entity(link).name() == sensor;
        wanted.push((link, enable));
    }
    if !wanted.iter().any(|(_, enable)| *enable) {
        return Err(PipelineError::NotFound(format!(
            "Link from '{}' into '{}'",
            sensor, config.entities.receiver
        )));
    }

    // Disable pass first, then enable
    for pass in [false, true] {
        for &(link, enable) in &wanted {
            if enable == pass && graph.link(link).is_enabled() != enable {
                set_link(device, graph, link, enable)?;
            }
        }
    }
    Ok(())
}
