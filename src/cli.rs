// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing the cameras of a simulated rkisp1 device
//! - Streaming frames through the request/completion engine
//! - Probing the media controller devices of this system

use isp_pipeline::backends::SensorControl;
use isp_pipeline::backends::media_probe::probe_media_devices;
use isp_pipeline::backends::virtual_media::{
    VirtualEnumerator, VirtualMediaDevice, VirtualSensor, VirtualTopology,
};
use isp_pipeline::control::{FrameStatistics, SensorHelper};
use isp_pipeline::media::Size;
use isp_pipeline::{PipelineConfig, PipelineHandler, Request, RequestStatus};

/// Options of the `capture` command
pub struct CaptureOptions {
    pub camera: usize,
    pub size: Option<String>,
    pub frames: u32,
    pub scene: f64,
}

/// Build simulated sensors from model names ("imx219", "ov5695")
fn virtual_sensors(names: &[String]) -> Result<Vec<VirtualSensor>, Box<dyn std::error::Error>> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| -> Result<VirtualSensor, Box<dyn std::error::Error>> {
            let bus = i + 1;
            match name.trim() {
                "imx219" => Ok(VirtualSensor::imx219(format!("imx219 {}-0010", bus))),
                "ov5695" => Ok(VirtualSensor::ov5695(format!("ov5695 {}-0036", bus))),
                other => Err(format!("Unknown sensor model '{}' (use imx219 or ov5695)", other).into()),
            }
        })
        .collect()
}

fn virtual_device(
    config: &PipelineConfig,
    sensors: &[String],
) -> Result<VirtualMediaDevice, Box<dyn std::error::Error>> {
    let mut topology = VirtualTopology::rkisp1(virtual_sensors(sensors)?);
    topology.driver = config.driver.clone();
    topology.receiver = config.entities.receiver.clone();
    topology.isp = config.entities.isp.clone();
    topology.capture = config.entities.capture.clone();
    Ok(VirtualMediaDevice::new(topology))
}

/// List all cameras of a simulated device
pub fn list_cameras(
    config: PipelineConfig,
    sensors: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let device = virtual_device(&config, sensors)?;
    let enumerator = VirtualEnumerator::new(vec![device]);
    let handler = PipelineHandler::match_device(&enumerator, config)?;

    println!("Available cameras:");
    println!();
    for (index, camera) in handler.cameras().iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Resolution: {}", camera.resolution);
        let default = handler.default_configuration(camera.id)?;
        println!("      Default:    {}", default);
        println!();
    }

    Ok(())
}

/// Mean luminance a simulated sensor would see with its current controls
fn simulated_statistics(
    device: &VirtualMediaDevice,
    sensor: &str,
    helper: &SensorHelper,
    scene: f64,
) -> FrameStatistics {
    let lines = device
        .control(sensor, SensorControl::Exposure)
        .unwrap_or(675) as u32;
    let code = device
        .control(sensor, SensorControl::AnalogueGain)
        .unwrap_or(100) as u32;
    // 10 ms at unity gain reproduces the scene brightness
    let exposure = helper.exposure(lines).as_secs_f64() * helper.gain(code);
    FrameStatistics {
        mean_luminance: (scene * exposure / 0.010).clamp(0.0, 1.0),
        zones: Vec::new(),
    }
}

/// Stream frames from a camera of a simulated device
pub fn capture(
    config: PipelineConfig,
    sensors: &[String],
    options: CaptureOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let device = virtual_device(&config, sensors)?;
    let enumerator = VirtualEnumerator::new(vec![device.clone()]);
    let handler = PipelineHandler::match_device(&enumerator, config)?;

    let cameras = handler.cameras();
    if options.camera >= cameras.len() {
        return Err(format!(
            "Camera index {} out of range (0-{})",
            options.camera,
            cameras.len() - 1
        )
        .into());
    }
    let camera = &cameras[options.camera];
    println!("Using camera: {}", camera.name);

    let size = match &options.size {
        Some(s) => Size::parse(s).ok_or_else(|| format!("Invalid size '{}'", s))?,
        None => camera.resolution,
    };
    let accepted = handler.configure(camera.id, size)?;
    let count = handler.allocate_buffers(camera.id)?;
    println!("Capture format: {} ({} buffers)", accepted, count);

    let mut completed = handler.subscribe_request_completed();
    handler.start(camera.id)?;

    let mut cookie = 0u64;
    for buffer in handler.buffers(camera.id)? {
        handler.submit(
            camera.id,
            Request::new(cookie).with_buffer(camera.stream, buffer.index()),
        )?;
        cookie += 1;
    }

    let helper = SensorHelper::default();
    for _ in 0..options.frames {
        let stats = simulated_statistics(&device, &camera.name, &helper, options.scene);
        let luminance = stats.mean_luminance;
        if !device.complete_next_buffer(Some(stats)) {
            return Err("Capture node stopped delivering buffers".into());
        }
        let Some(done) = completed.blocking_recv() else {
            return Err("Request completion channel closed".into());
        };
        if done.request.status() != RequestStatus::Complete {
            continue;
        }

        let metadata = done.request.metadata(camera.stream);
        let sequence = metadata.map(|m| m.sequence).unwrap_or_default();
        let bytes: u32 = metadata.map(|m| m.bytes_used.iter().sum()).unwrap_or_default();
        match done.request.agc_status() {
            Some(agc) => println!(
                "  frame {:>3}  {:>9} bytes  luma {:.3}  exposure {:>6} us  gain {:.2}{}",
                sequence,
                bytes,
                luminance,
                agc.exposure.as_micros(),
                agc.analogue_gain,
                if agc.converged { "  (converged)" } else { "" }
            ),
            None => println!(
                "  frame {:>3}  {:>9} bytes  luma {:.3}",
                sequence, bytes, luminance
            ),
        }

        // Hand the buffer straight back
        if let Some(index) = done.request.buffer_for(camera.stream) {
            handler.submit(camera.id, Request::new(cookie).with_buffer(camera.stream, index))?;
            cookie += 1;
        }
    }

    handler.stop(camera.id)?;
    handler.release_buffers(camera.id)?;
    println!("Captured {} frames", options.frames);
    Ok(())
}

/// List media controller devices and flag the ones the pipeline can drive
pub fn probe_devices(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let devices = probe_media_devices();
    if devices.is_empty() {
        println!("No media devices found.");
        return Ok(());
    }

    println!("Media devices:");
    println!();
    for device in devices {
        let marker = if device.driver == config.driver {
            "  (supported)"
        } else {
            ""
        };
        println!("  {}  {}{}", device.path, device.driver, marker);
        println!("      Model: {}", device.model);
        println!("      Bus:   {}", device.bus_info);
        println!();
    }

    Ok(())
}
