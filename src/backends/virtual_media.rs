// SPDX-License-Identifier: GPL-3.0-only

//! Virtual rkisp1-shaped media device
//!
//! Simulates the sensor → CSI-2 receiver → ISP → main path graph in memory,
//! with the same driver-side behaviour the handler relies on: link setup
//! only inside an open session, sensors snapping to their native modes,
//! the receiver copying its sink format to its source pad, the capture node
//! adjusting formats it cannot produce, and buffer export capped by a
//! configurable ceiling.
//!
//! Clones share state, so a test can keep one handle to inspect calls, inject
//! failures and complete queued buffers while the handler owns another.

use super::{
    BufferCompletion, BufferMemory, CompletionSender, DeviceEnumerator, MediaDevice, PlaneInfo,
    SensorControl, SubdeviceIo, VideoIo,
};
use crate::constants::entities;
use crate::control::FrameStatistics;
use crate::errors::{HwError, HwResult};
use crate::media::formats::{DeviceFormat, FourCC, MediaBusCode, Size, SubdeviceFormat};
use crate::media::graph::{LinkDesc, MediaGraph, PadDirection};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Nominal frame interval used for simulated timestamps
const FRAME_INTERVAL_NS: u64 = 33_333_333;

/// Sensor attached to the virtual receiver
#[derive(Debug, Clone)]
pub struct VirtualSensor {
    pub name: String,
    /// Supported media bus codes
    pub codes: Vec<MediaBusCode>,
    /// Native modes, valid for every code
    pub sizes: Vec<Size>,
}

impl VirtualSensor {
    pub fn new(name: impl Into<String>, codes: Vec<MediaBusCode>, sizes: Vec<Size>) -> Self {
        Self {
            name: name.into(),
            codes,
            sizes,
        }
    }

    /// 8 MP RGGB sensor with 10-bit and 8-bit output
    pub fn imx219(name: impl Into<String>) -> Self {
        Self::new(
            name,
            vec![MediaBusCode::SRGGB10_1X10, MediaBusCode::SRGGB8_1X8],
            vec![
                Size::new(3280, 2464),
                Size::new(1920, 1080),
                Size::new(1640, 1232),
                Size::new(640, 480),
            ],
        )
    }

    /// 5 MP BGGR sensor with 10-bit output only
    pub fn ov5695(name: impl Into<String>) -> Self {
        Self::new(
            name,
            vec![MediaBusCode::SBGGR10_1X10],
            vec![
                Size::new(2592, 1944),
                Size::new(1920, 1080),
                Size::new(1296, 972),
            ],
        )
    }

    fn resolution(&self) -> Size {
        Size::best_fit(&self.sizes, Size::new(u32::MAX, u32::MAX)).unwrap_or_default()
    }
}

/// Shape and limits of a virtual device
#[derive(Debug, Clone)]
pub struct VirtualTopology {
    pub driver: String,
    pub receiver: String,
    pub isp: String,
    pub capture: String,
    /// Other entities present in the graph (self path, statistics, params)
    pub extra: Vec<String>,
    pub sensors: Vec<VirtualSensor>,
    /// Pixel formats the capture node can produce, default first
    pub capture_formats: Vec<FourCC>,
    /// Largest frame the capture node can write
    pub max_capture_size: Size,
    /// Most buffers the capture node will export
    pub export_limit: u32,
    /// Entity names left out of the graph
    pub omitted: Vec<String>,
}

impl VirtualTopology {
    /// rkisp1 graph with the given sensors linked to the receiver
    pub fn rkisp1(sensors: Vec<VirtualSensor>) -> Self {
        Self {
            driver: crate::constants::DRIVER_NAME.to_string(),
            receiver: entities::RECEIVER.to_string(),
            isp: entities::ISP.to_string(),
            capture: entities::CAPTURE.to_string(),
            extra: vec![
                entities::SELFPATH.to_string(),
                entities::STATISTICS.to_string(),
                entities::INPUT_PARAMS.to_string(),
            ],
            sensors,
            capture_formats: vec![
                FourCC::new(b"NV12"),
                FourCC::new(b"NV21"),
                FourCC::new(b"NV16"),
                FourCC::new(b"YUYV"),
            ],
            max_capture_size: Size::new(4416, 3312),
            export_limit: 16,
            omitted: Vec::new(),
        }
    }

    /// Leave an entity (and every link touching it) out of the graph
    pub fn without_entity(mut self, name: &str) -> Self {
        self.omitted.push(name.to_string());
        self
    }

    pub fn with_export_limit(mut self, limit: u32) -> Self {
        self.export_limit = limit;
        self
    }

    pub fn with_capture_formats(mut self, formats: Vec<FourCC>) -> Self {
        self.capture_formats = formats;
        self
    }

    fn sensor(&self, name: &str) -> Option<&VirtualSensor> {
        self.sensors.iter().find(|s| s.name == name)
    }

    fn build_graph(&self) -> MediaGraph {
        use PadDirection::{Sink, Source};

        let mut graph = MediaGraph::new(&self.driver);
        let add = |graph: &mut MediaGraph, name: &str, pads: &[PadDirection]| {
            if self.omitted.iter().any(|o| o == name) {
                None
            } else {
                Some(graph.add_entity(name, pads))
            }
        };

        let sensors: Vec<_> = self
            .sensors
            .iter()
            .map(|s| add(&mut graph, &s.name, &[Source]))
            .collect();
        let receiver = add(&mut graph, &self.receiver, &[Sink, Source]);
        let isp = add(&mut graph, &self.isp, &[Sink, Sink, Source, Source]);
        let capture = add(&mut graph, &self.capture, &[Sink]);
        let extras: Vec<_> = self
            .extra
            .iter()
            .map(|name| {
                let pads: &[PadDirection] = if name == entities::INPUT_PARAMS {
                    &[Source]
                } else {
                    &[Sink]
                };
                (name.as_str(), add(&mut graph, name, pads))
            })
            .collect();

        // Power-on state: first sensor routed, static chain down, self path up
        if let Some(receiver) = receiver {
            for (i, sensor) in sensors.iter().enumerate() {
                if let Some(sensor) = sensor {
                    graph.add_link(*sensor, 0, receiver, 0, i == 0);
                }
            }
        }
        if let (Some(receiver), Some(isp)) = (receiver, isp) {
            graph.add_link(receiver, 1, isp, 0, false);
        }
        if let (Some(isp), Some(capture)) = (isp, capture) {
            graph.add_link(isp, 2, capture, 0, false);
        }
        if let Some(isp) = isp {
            for (name, entity) in extras {
                let Some(entity) = entity else { continue };
                match name {
                    entities::SELFPATH => graph.add_link(isp, 2, entity, 0, true),
                    entities::STATISTICS => graph.add_link(isp, 3, entity, 0, false),
                    entities::INPUT_PARAMS => graph.add_link(entity, 0, isp, 1, true),
                    _ => None,
                };
            }
        }
        graph
    }
}

/// Mutable device state shared by every clone and open session
struct VirtualState {
    graph: MediaGraph,
    acquired: bool,
    open_sessions: u32,
    link_setup_calls: u32,
    subdev_format_calls: u32,
    video_format_calls: u32,
    pad_formats: HashMap<(String, u32), SubdeviceFormat>,
    video_format: DeviceFormat,
    export_limit: u32,
    exported: u32,
    queued: VecDeque<u32>,
    streaming: bool,
    sequence: u32,
    sink: Option<CompletionSender>,
    controls: HashMap<(String, SensorControl), i64>,
    failures: HashMap<String, i32>,
}

impl VirtualState {
    /// Consume an injected failure for `operation` (optionally scoped to an entity)
    fn check(&mut self, operation: &str, entity: Option<&str>) -> HwResult<()> {
        let scoped = entity.map(|e| format!("{}:{}", operation, e));
        let errno = scoped
            .as_ref()
            .and_then(|key| self.failures.remove(key))
            .or_else(|| self.failures.remove(operation));
        match errno {
            Some(errno) => {
                debug!(operation, entity, errno, "Injected hardware failure");
                Err(HwError::new(operation, errno))
            }
            None => Ok(()),
        }
    }

    fn plane_lengths(&self) -> Vec<u32> {
        let format = &self.video_format;
        let luma = format.size.width * format.size.height;
        match format.planes {
            0 | 1 => vec![luma * 3 / 2],
            2 => vec![luma, luma / 2],
            n => {
                let mut planes = vec![luma];
                planes.extend(std::iter::repeat_n(luma / 4, n as usize - 1));
                planes
            }
        }
    }
}

/// In-memory media device
#[derive(Clone)]
pub struct VirtualMediaDevice {
    topology: Arc<VirtualTopology>,
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualMediaDevice {
    pub fn new(topology: VirtualTopology) -> Self {
        let graph = topology.build_graph();
        let default_format = DeviceFormat::new(
            topology
                .capture_formats
                .first()
                .copied()
                .unwrap_or(FourCC::new(b"NV12")),
            Size::new(800, 600),
            1,
        );
        let state = VirtualState {
            graph,
            acquired: false,
            open_sessions: 0,
            link_setup_calls: 0,
            subdev_format_calls: 0,
            video_format_calls: 0,
            pad_formats: HashMap::new(),
            video_format: default_format,
            export_limit: topology.export_limit,
            exported: 0,
            queued: VecDeque::new(),
            streaming: false,
            sequence: 0,
            sink: None,
            controls: HashMap::new(),
            failures: HashMap::new(),
        };
        Self {
            topology: Arc::new(topology),
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next call of `operation` fail with `errno`
    ///
    /// `operation` is an ioctl name ("VIDIOC_STREAMON"), optionally scoped to
    /// an entity ("VIDIOC_SUBDEV_S_FMT:rkisp1-isp-subdev").
    pub fn fail_next(&self, operation: &str, errno: i32) {
        self.lock().failures.insert(operation.to_string(), errno);
    }

    pub fn set_export_limit(&self, limit: u32) {
        self.lock().export_limit = limit;
    }

    /// Number of link setup calls issued so far
    pub fn link_setup_calls(&self) -> u32 {
        self.lock().link_setup_calls
    }

    /// Number of subdevice set-format calls issued so far
    pub fn subdev_format_calls(&self) -> u32 {
        self.lock().subdev_format_calls
    }

    /// Number of video node set-format calls issued so far
    pub fn video_format_calls(&self) -> u32 {
        self.lock().video_format_calls
    }

    pub fn is_link_enabled(&self, source: &str, source_pad: u32, sink: &str, sink_pad: u32) -> bool {
        let state = self.lock();
        state
            .graph
            .find_link(source, source_pad, sink, sink_pad)
            .is_some_and(|id| state.graph.link(id).is_enabled())
    }

    /// Sensors whose link into the receiver is enabled
    pub fn routed_sensors(&self) -> Vec<String> {
        let state = self.lock();
        self.topology
            .sensors
            .iter()
            .filter(|s| {
                state
                    .graph
                    .find_link(&s.name, 0, &self.topology.receiver, 0)
                    .is_some_and(|id| state.graph.link(id).is_enabled())
            })
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn is_acquired(&self) -> bool {
        self.lock().acquired
    }

    pub fn open_sessions(&self) -> u32 {
        self.lock().open_sessions
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().streaming
    }

    pub fn exported_buffers(&self) -> u32 {
        self.lock().exported
    }

    /// Buffer indices queued to the capture node, oldest first
    pub fn queued_buffers(&self) -> Vec<u32> {
        self.lock().queued.iter().copied().collect()
    }

    pub fn has_buffer_ready_subscriber(&self) -> bool {
        self.lock().sink.is_some()
    }

    /// Last value written to a sensor control
    pub fn control(&self, entity: &str, control: SensorControl) -> Option<i64> {
        self.lock()
            .controls
            .get(&(entity.to_string(), control))
            .copied()
    }

    /// Current format on a subdevice pad
    pub fn pad_format(&self, entity: &str, pad: u32) -> Option<SubdeviceFormat> {
        self.lock()
            .pad_formats
            .get(&(entity.to_string(), pad))
            .copied()
    }

    /// Finish the oldest queued buffer and deliver it to the subscriber
    ///
    /// Returns false when not streaming, nothing is queued, or no one is
    /// subscribed.
    pub fn complete_next_buffer(&self, statistics: Option<FrameStatistics>) -> bool {
        let mut state = self.lock();
        if !state.streaming {
            return false;
        }
        let Some(index) = state.queued.pop_front() else {
            return false;
        };
        let sequence = state.sequence;
        state.sequence = state.sequence.wrapping_add(1);

        let completion = BufferCompletion {
            index,
            sequence,
            timestamp_ns: sequence as u64 * FRAME_INTERVAL_NS,
            bytes_used: state.plane_lengths(),
            statistics,
        };
        trace!(index, sequence, "Virtual buffer complete");
        match &state.sink {
            Some(sink) => sink.send(completion).is_ok(),
            None => false,
        }
    }
}

impl MediaDevice for VirtualMediaDevice {
    fn driver(&self) -> String {
        self.topology.driver.clone()
    }

    fn topology(&self) -> HwResult<MediaGraph> {
        let mut state = self.lock();
        state.check("MEDIA_IOC_G_TOPOLOGY", None)?;
        Ok(state.graph.clone())
    }

    fn acquire(&self) -> bool {
        let mut state = self.lock();
        if state.acquired {
            false
        } else {
            state.acquired = true;
            true
        }
    }

    fn release(&self) {
        self.lock().acquired = false;
    }

    fn open(&self) -> HwResult<()> {
        let mut state = self.lock();
        state.check("open", None)?;
        state.open_sessions += 1;
        Ok(())
    }

    fn close(&self) {
        let mut state = self.lock();
        state.open_sessions = state.open_sessions.saturating_sub(1);
    }

    fn setup_link(&self, link: &LinkDesc, enabled: bool) -> HwResult<()> {
        const OP: &str = "MEDIA_IOC_SETUP_LINK";

        let mut state = self.lock();
        if state.open_sessions == 0 {
            return Err(HwError::new(OP, libc::EBADF));
        }
        state.check(OP, Some(link.source.entity.as_str()))?;
        state.link_setup_calls += 1;

        let id = state
            .graph
            .find_link(&link.source.entity, link.source.pad, &link.sink.entity, link.sink.pad)
            .ok_or_else(|| HwError::new(OP, libc::ENOENT))?;

        // The receiver can only route one sensor at a time
        if enabled {
            let sink = state.graph.link(id).sink();
            let busy = state
                .graph
                .enabled_links_into(sink)
                .into_iter()
                .any(|other| other != id);
            if busy && link.sink.entity == self.topology.receiver {
                return Err(HwError::new(OP, libc::EBUSY));
            }
        }

        state.graph.set_link_flag(id, enabled);
        debug!(link = %link, enabled, "Virtual link setup");
        Ok(())
    }

    fn open_subdevice(&self, entity: &str) -> HwResult<Box<dyn SubdeviceIo>> {
        let mut state = self.lock();
        state.check("open", Some(entity))?;
        if state.graph.entity_by_name(entity).is_none() {
            return Err(HwError::new("open", libc::ENODEV));
        }
        Ok(Box::new(VirtualSubdevice {
            entity: entity.to_string(),
            device: self.clone(),
        }))
    }

    fn open_video_node(&self, entity: &str) -> HwResult<Box<dyn VideoIo>> {
        let mut state = self.lock();
        state.check("open", Some(entity))?;
        if entity != self.topology.capture || state.graph.entity_by_name(entity).is_none() {
            return Err(HwError::new("open", libc::ENODEV));
        }
        Ok(Box::new(VirtualVideoNode {
            device: self.clone(),
        }))
    }
}

/// Open subdevice session on the virtual device
struct VirtualSubdevice {
    entity: String,
    device: VirtualMediaDevice,
}

impl VirtualSubdevice {
    fn default_format(&self) -> SubdeviceFormat {
        match self.device.topology.sensor(&self.entity) {
            Some(sensor) => SubdeviceFormat::new(
                sensor
                    .codes
                    .first()
                    .copied()
                    .unwrap_or(MediaBusCode::SBGGR10_1X10),
                sensor.resolution(),
            ),
            None => SubdeviceFormat::new(MediaBusCode::SBGGR10_1X10, Size::default()),
        }
    }
}

impl SubdeviceIo for VirtualSubdevice {
    fn enumerate_formats(&self, pad: u32) -> HwResult<Vec<(MediaBusCode, Vec<Size>)>> {
        let mut state = self.device.lock();
        state.check("VIDIOC_SUBDEV_ENUM_MBUS_CODE", Some(self.entity.as_str()))?;
        Ok(match self.device.topology.sensor(&self.entity) {
            Some(sensor) if pad == 0 => sensor
                .codes
                .iter()
                .map(|code| (*code, sensor.sizes.clone()))
                .collect(),
            _ => Vec::new(),
        })
    }

    fn get_format(&self, pad: u32) -> HwResult<SubdeviceFormat> {
        let mut state = self.device.lock();
        state.check("VIDIOC_SUBDEV_G_FMT", Some(self.entity.as_str()))?;
        Ok(state
            .pad_formats
            .get(&(self.entity.clone(), pad))
            .copied()
            .unwrap_or_else(|| self.default_format()))
    }

    fn set_format(&mut self, pad: u32, format: &mut SubdeviceFormat) -> HwResult<()> {
        let topology = Arc::clone(&self.device.topology);
        let mut state = self.device.lock();
        state.check("VIDIOC_SUBDEV_S_FMT", Some(self.entity.as_str()))?;
        state.subdev_format_calls += 1;

        if let Some(sensor) = topology.sensor(&self.entity) {
            if !sensor.codes.contains(&format.code)
                && let Some(code) = sensor.codes.first()
            {
                format.code = *code;
            }
            if let Some(size) = Size::best_fit(&sensor.sizes, format.size) {
                format.size = size;
            }
        } else if self.entity == topology.receiver {
            if pad == 1 {
                // Source pad mirrors the sink pad
                if let Some(sink) = state.pad_formats.get(&(self.entity.clone(), 0)) {
                    *format = *sink;
                }
            } else {
                state
                    .pad_formats
                    .insert((self.entity.clone(), 1), *format);
            }
        }

        state.pad_formats.insert((self.entity.clone(), pad), *format);
        Ok(())
    }

    fn set_control(&mut self, control: SensorControl, value: i64) -> HwResult<()> {
        let mut state = self.device.lock();
        state.check("VIDIOC_S_CTRL", Some(self.entity.as_str()))?;
        state
            .controls
            .insert((self.entity.clone(), control), value);
        Ok(())
    }
}

/// Open capture node session on the virtual device
struct VirtualVideoNode {
    device: VirtualMediaDevice,
}

impl VideoIo for VirtualVideoNode {
    fn get_format(&self) -> HwResult<DeviceFormat> {
        let mut state = self.device.lock();
        state.check("VIDIOC_G_FMT", None)?;
        Ok(state.video_format)
    }

    fn set_format(&mut self, format: &mut DeviceFormat) -> HwResult<()> {
        let topology = Arc::clone(&self.device.topology);
        let mut state = self.device.lock();
        state.check("VIDIOC_S_FMT", None)?;
        if state.exported > 0 {
            return Err(HwError::new("VIDIOC_S_FMT", libc::EBUSY));
        }
        state.video_format_calls += 1;

        if !topology.capture_formats.contains(&format.fourcc)
            && let Some(fourcc) = topology.capture_formats.first()
        {
            format.fourcc = *fourcc;
        }

        // The main path can scale down but not up
        let mut limit = topology.max_capture_size;
        if let Some(input) = state.pad_formats.get(&(topology.isp.clone(), 0))
            && !input.size.is_empty()
        {
            limit.width = limit.width.min(input.size.width);
            limit.height = limit.height.min(input.size.height);
        }
        format.size.width = format.size.width.min(limit.width);
        format.size.height = format.size.height.min(limit.height);
        format.planes = format.planes.clamp(1, 3);

        state.video_format = *format;
        Ok(())
    }

    fn export_buffers(&mut self, count: u32) -> HwResult<Vec<BufferMemory>> {
        let mut state = self.device.lock();
        state.check("VIDIOC_REQBUFS", None)?;
        if state.streaming || state.exported > 0 {
            return Err(HwError::new("VIDIOC_REQBUFS", libc::EBUSY));
        }
        let exported = count.min(state.export_limit);
        state.exported = exported;

        let mut offset = 0;
        let lengths = state.plane_lengths();
        Ok((0..exported)
            .map(|index| BufferMemory {
                index,
                planes: lengths
                    .iter()
                    .map(|&length| {
                        let plane = PlaneInfo { offset, length };
                        offset += length;
                        plane
                    })
                    .collect(),
            })
            .collect())
    }

    fn release_buffers(&mut self) -> HwResult<()> {
        let mut state = self.device.lock();
        state.check("VIDIOC_REQBUFS", None)?;
        if state.streaming {
            return Err(HwError::new("VIDIOC_REQBUFS", libc::EBUSY));
        }
        state.exported = 0;
        state.queued.clear();
        Ok(())
    }

    fn queue_buffer(&mut self, index: u32) -> HwResult<()> {
        let mut state = self.device.lock();
        state.check("VIDIOC_QBUF", None)?;
        if index >= state.exported || state.queued.contains(&index) {
            return Err(HwError::new("VIDIOC_QBUF", libc::EINVAL));
        }
        state.queued.push_back(index);
        Ok(())
    }

    fn stream_on(&mut self) -> HwResult<()> {
        let mut state = self.device.lock();
        state.check("VIDIOC_STREAMON", None)?;
        if state.exported == 0 {
            return Err(HwError::new("VIDIOC_STREAMON", libc::EINVAL));
        }
        state.streaming = true;
        state.sequence = 0;
        Ok(())
    }

    fn stream_off(&mut self) -> HwResult<()> {
        let mut state = self.device.lock();
        state.check("VIDIOC_STREAMOFF", None)?;
        state.streaming = false;
        state.queued.clear();
        Ok(())
    }

    fn set_buffer_ready(&mut self, sink: Option<CompletionSender>) {
        self.device.lock().sink = sink;
    }
}

/// Fixed list of virtual devices
#[derive(Clone, Default)]
pub struct VirtualEnumerator {
    devices: Vec<VirtualMediaDevice>,
}

impl VirtualEnumerator {
    pub fn new(devices: Vec<VirtualMediaDevice>) -> Self {
        Self { devices }
    }
}

impl DeviceEnumerator for VirtualEnumerator {
    fn devices(&self) -> Vec<Arc<dyn MediaDevice>> {
        self.devices
            .iter()
            .map(|d| Arc::new(d.clone()) as Arc<dyn MediaDevice>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> VirtualMediaDevice {
        VirtualMediaDevice::new(VirtualTopology::rkisp1(vec![
            VirtualSensor::imx219("imx219 4-0010"),
            VirtualSensor::ov5695("ov5695 7-0036"),
        ]))
    }

    #[test]
    fn test_power_on_graph() {
        let device = device();
        assert_eq!(device.routed_sensors(), vec!["imx219 4-0010".to_string()]);
        assert!(device.is_link_enabled(entities::ISP, 2, entities::SELFPATH, 0));
        assert!(!device.is_link_enabled(entities::RECEIVER, 1, entities::ISP, 0));
    }

    #[test]
    fn test_link_setup_requires_session() {
        let device = device();
        let graph = device.topology().unwrap();
        let link = graph
            .find_link("ov5695 7-0036", 0, entities::RECEIVER, 0)
            .unwrap();
        let desc = graph.describe_link(link);

        let err = device.setup_link(&desc, false).unwrap_err();
        assert_eq!(err.errno, libc::EBADF);

        device.open().unwrap();
        // Second sensor cannot be routed while the first one is
        let err = device.setup_link(&desc, true).unwrap_err();
        assert_eq!(err.errno, libc::EBUSY);
        device.close();
        assert_eq!(device.open_sessions(), 0);
    }

    #[test]
    fn test_sensor_snaps_to_native_mode() {
        let device = device();
        let mut sensor = device.open_subdevice("ov5695 7-0036").unwrap();
        let mut format = SubdeviceFormat::new(MediaBusCode::SRGGB12_1X12, Size::new(1280, 720));
        sensor.set_format(0, &mut format).unwrap();
        assert_eq!(format.code, MediaBusCode::SBGGR10_1X10);
        assert_eq!(format.size, Size::new(1920, 1080));
    }

    #[test]
    fn test_export_is_capped() {
        let device = VirtualMediaDevice::new(
            VirtualTopology::rkisp1(vec![VirtualSensor::imx219("imx219 4-0010")])
                .with_export_limit(2),
        );
        let mut node = device.open_video_node(entities::CAPTURE).unwrap();
        let buffers = node.export_buffers(4).unwrap();
        assert_eq!(buffers.len(), 2);
        assert_eq!(device.exported_buffers(), 2);
        node.release_buffers().unwrap();
        assert_eq!(device.exported_buffers(), 0);
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let device = device();
        device.fail_next("VIDIOC_STREAMON", libc::EIO);
        let mut node = device.open_video_node(entities::CAPTURE).unwrap();
        node.export_buffers(1).unwrap();
        assert_eq!(node.stream_on().unwrap_err().errno, libc::EIO);
        node.stream_on().unwrap();
        assert!(device.is_streaming());
    }
}
