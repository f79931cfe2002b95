// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline handler
//!
//! Ties the pieces together: one handler owns one acquired media device, the
//! receiver/ISP/capture handles and one [`CameraData`] per sensor found
//! behind the receiver.
//!
//! # Threading
//!
//! All state lives in a single `Core` behind a mutex. Control calls lock it
//! from the caller's thread. Every `start` registers a fresh completion
//! channel with the capture node and hands its receiving end, tagged with a
//! session number, to the `isp-buffer-ready` thread. Completions still in
//! flight when a camera stops carry a stale session number and are dropped,
//! so they never reach the requests of a later session. The thread only
//! holds a weak reference: once the handler is dropped the session channels
//! close and the thread exits.
//!
//! # Camera states
//!
//! ```text
//! Unconfigured ──configure──► Configured ──start──► Streaming
//!      ▲                        ▲    │                 │
//!      └──── failed configure ──┘    └◄──── stop ──────┘
//! ```

use super::device_match::{self, DeviceLease, DeviceMatch, MediaSession};
use super::negotiation::{self, Chain};
use super::request::{FrameMetadata, Request, RequestStatus};
use super::sensor::CameraSensor;
use super::stream::{Buffer, BufferState, Stream, StreamConfiguration, StreamId};
use super::subdevice::Subdevice;
use super::topology;
use super::video_node::VideoNode;
use crate::backends::{BufferCompletion, CompletionReceiver, DeviceEnumerator, MediaDevice};
use crate::config::PipelineConfig;
use crate::control::{AgcAlgorithm, ControlLoop};
use crate::errors::{HwError, PipelineError, PipelineResult};
use crate::media::formats::{DeviceFormat, Size};
use crate::media::graph::MediaGraph;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraId(usize);

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cam{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Unconfigured,
    /// Formats negotiated; buffers may or may not be allocated
    Configured,
    /// Active camera, requests flowing
    Streaming,
}

/// Snapshot of a camera for clients
#[derive(Debug, Clone, PartialEq)]
pub struct CameraInfo {
    pub id: CameraId,
    /// Sensor entity name
    pub name: String,
    pub stream: StreamId,
    /// Largest sensor frame size
    pub resolution: Size,
    pub state: CameraState,
    pub configuration: Option<StreamConfiguration>,
}

/// Request handed back to the client, completed or cancelled
#[derive(Debug, Clone)]
pub struct CompletedRequest {
    pub camera: CameraId,
    pub request: Request,
}

struct CameraData {
    id: CameraId,
    sensor: CameraSensor,
    stream: Stream,
    state: CameraState,
    /// Submitted requests, oldest first
    queue: VecDeque<Request>,
}

impl CameraData {
    fn info(&self) -> CameraInfo {
        CameraInfo {
            id: self.id,
            name: self.sensor.entity().to_string(),
            stream: self.stream.id(),
            resolution: self.sensor.resolution(),
            state: self.state,
            configuration: self.stream.configuration().copied(),
        }
    }

    /// Empty the queue, marking everything in it cancelled
    fn flush(&mut self) -> Vec<Request> {
        self.queue
            .drain(..)
            .map(|mut request| {
                request.set_status(RequestStatus::Cancelled);
                request
            })
            .collect()
    }
}

fn camera_mut(cameras: &mut [CameraData], id: CameraId) -> PipelineResult<&mut CameraData> {
    cameras
        .get_mut(id.0)
        .ok_or_else(|| PipelineError::NotFound(format!("Camera {}", id)))
}

/// Completions of one streaming session
struct CompletionSession {
    id: u64,
    completions: CompletionReceiver,
}

// Field order is drop order: handles close before the device is released
struct Core {
    config: PipelineConfig,
    graph: MediaGraph,
    cameras: Vec<CameraData>,
    receiver: Subdevice,
    isp: Subdevice,
    capture: VideoNode,
    active: Option<CameraId>,
    /// Streaming session whose completions are accepted
    session: Option<u64>,
    sessions_started: u64,
    sessions: mpsc::UnboundedSender<CompletionSession>,
    control: ControlLoop,
    subscribers: Vec<mpsc::UnboundedSender<CompletedRequest>>,
    lease: DeviceLease,
}

impl Core {
    fn camera(&self, id: CameraId) -> PipelineResult<&CameraData> {
        self.cameras
            .get(id.0)
            .ok_or_else(|| PipelineError::NotFound(format!("Camera {}", id)))
    }

    /// Camera other than `id` holding capture node buffers
    fn buffer_owner_besides(&self, id: CameraId) -> Option<CameraId> {
        self.cameras
            .iter()
            .find(|c| c.id != id && c.stream.is_allocated())
            .map(|c| c.id)
    }

    fn default_configuration(&self, id: CameraId) -> PipelineResult<StreamConfiguration> {
        let camera = self.camera(id)?;
        Ok(StreamConfiguration {
            pixel_format: self.config.output_fourcc()?,
            size: camera.sensor.resolution(),
            buffer_count: self.config.buffer_count,
        })
    }

    fn configure(
        &mut self,
        id: CameraId,
        requested: StreamConfiguration,
    ) -> PipelineResult<StreamConfiguration> {
        if let Some(owner) = self.buffer_owner_besides(id) {
            return Err(PipelineError::InvalidState(format!(
                "Capture node buffers are held by {}",
                owner
            )));
        }

        let camera = self.camera(id)?;
        if camera.state == CameraState::Streaming {
            return Err(PipelineError::InvalidState(format!(
                "{} is streaming; stop it before reconfiguring",
                id
            )));
        }
        if camera.stream.is_allocated() {
            return Err(PipelineError::InvalidState(format!(
                "{} has buffers allocated; release them before reconfiguring",
                id
            )));
        }
        if requested.buffer_count == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "Buffer count must be at least 1".to_string(),
            ));
        }

        // Nothing survives a failed attempt
        let camera = camera_mut(&mut self.cameras, id)?;
        camera.state = CameraState::Unconfigured;
        camera.stream.set_configuration(None);
        negotiation::check_size(&camera.sensor, requested.size)?;

        // Routing and formats are shared, so other cameras lose theirs
        for other in self.cameras.iter_mut().filter(|c| c.id != id) {
            if other.state == CameraState::Configured {
                debug!(camera = %other.id, by = %id, "Configuration superseded");
                other.state = CameraState::Unconfigured;
                other.stream.set_configuration(None);
            }
        }

        let Core {
            config,
            graph,
            cameras,
            receiver,
            isp,
            capture,
            lease,
            ..
        } = self;
        let camera = camera_mut(cameras, id)?;

        {
            let _session = MediaSession::open(lease.device())?;
            topology::select_sensor_link(lease.device(), graph, config, camera.sensor.entity())?;
        }

        let negotiated = negotiation::negotiate(
            Chain {
                sensor: &mut camera.sensor,
                receiver,
                isp,
                capture,
                pads: &config.pads,
            },
            DeviceFormat::new(requested.pixel_format, requested.size, config.capture_planes),
        )?;

        let accepted = StreamConfiguration {
            pixel_format: negotiated.output.fourcc,
            size: negotiated.output.size,
            buffer_count: requested.buffer_count,
        };
        camera.stream.set_configuration(Some(accepted));
        camera.state = CameraState::Configured;
        info!(camera = %id, sensor = %camera.sensor.entity(), configuration = %accepted, "Camera configured");
        Ok(accepted)
    }

    fn allocate_buffers(&mut self, id: CameraId) -> PipelineResult<usize> {
        if let Some(owner) = self.buffer_owner_besides(id) {
            return Err(PipelineError::InvalidState(format!(
                "Capture node buffers are held by {}",
                owner
            )));
        }
        let Core {
            cameras, capture, ..
        } = self;
        let camera = camera_mut(cameras, id)?;
        match camera.state {
            CameraState::Unconfigured => Err(PipelineError::InvalidState(format!(
                "{} is not configured",
                id
            ))),
            CameraState::Streaming => Err(PipelineError::InvalidState(format!(
                "{} is streaming",
                id
            ))),
            CameraState::Configured => camera.stream.allocate(capture),
        }
    }

    fn release_buffers(&mut self, id: CameraId) -> PipelineResult<()> {
        let Core {
            cameras, capture, ..
        } = self;
        let camera = camera_mut(cameras, id)?;
        if camera.state == CameraState::Streaming {
            return Err(PipelineError::InvalidState(format!(
                "{} is streaming; stop it before releasing buffers",
                id
            )));
        }
        if camera.stream.is_allocated() {
            camera.stream.release(capture);
        }
        Ok(())
    }

    fn start(&mut self, id: CameraId) -> PipelineResult<()> {
        if let Some(active) = self.active {
            return Err(PipelineError::InvalidState(if active == id {
                format!("{} is already streaming", id)
            } else {
                format!("{} is streaming on the shared pipeline", active)
            }));
        }

        let Core {
            cameras,
            capture,
            control,
            active,
            session,
            sessions_started,
            sessions,
            ..
        } = self;
        let camera = camera_mut(cameras, id)?;
        if camera.state != CameraState::Configured || !camera.stream.is_allocated() {
            return Err(PipelineError::InvalidState(format!(
                "{} needs a configuration and buffers before starting",
                id
            )));
        }

        // Fresh channel per session so nothing from an earlier one leaks in
        let (tx, rx) = mpsc::unbounded_channel();
        capture.set_buffer_ready(Some(tx));
        if let Err(e) = capture.stream_on() {
            capture.set_buffer_ready(None);
            return Err(e);
        }
        *sessions_started += 1;
        let started = *sessions_started;
        if sessions
            .send(CompletionSession {
                id: started,
                completions: rx,
            })
            .is_err()
        {
            warn!(camera = %id, "Buffer ready thread is gone; completions will not be processed");
        }

        control.reset();
        camera.state = CameraState::Streaming;
        *active = Some(id);
        *session = Some(started);
        info!(camera = %id, sensor = %camera.sensor.entity(), session = started, "Camera started");
        Ok(())
    }

    fn stop(&mut self, id: CameraId) -> PipelineResult<()> {
        let Core {
            cameras,
            capture,
            active,
            session,
            ..
        } = self;
        let camera = camera_mut(cameras, id)?;
        if camera.state != CameraState::Streaming {
            debug!(camera = %id, "Stop on a camera that is not streaming");
            return Ok(());
        }

        if let Err(e) = capture.stream_off() {
            warn!(camera = %id, error = %e, "Failed to stop streaming");
        }
        capture.set_buffer_ready(None);
        *session = None;
        camera.stream.reclaim_queued();
        camera.state = CameraState::Configured;
        let flushed = camera.flush();
        if *active == Some(id) {
            *active = None;
        }

        info!(camera = %id, cancelled = flushed.len(), "Camera stopped");
        for request in flushed {
            self.deliver(id, request);
        }
        Ok(())
    }

    fn submit(&mut self, id: CameraId, mut request: Request) -> PipelineResult<()> {
        let Core {
            cameras, capture, ..
        } = self;
        let camera = camera_mut(cameras, id)?;
        if camera.state != CameraState::Streaming {
            return Err(PipelineError::InvalidState(format!("{} is not streaming", id)));
        }

        let stream = camera.stream.id();
        let index = request.buffer_for(stream).ok_or_else(|| {
            PipelineError::InvalidRequest(format!(
                "Request {} has no buffer for {}",
                request.cookie(),
                stream
            ))
        })?;
        camera.stream.check_queueable(index)?;

        capture.queue_buffer(index)?;
        camera.stream.set_state(index, BufferState::Queued);
        request.set_status(RequestStatus::Pending);
        debug!(
            camera = %id,
            cookie = request.cookie(),
            index,
            queued = camera.queue.len() + 1,
            "Request queued"
        );
        camera.queue.push_back(request);
        Ok(())
    }

    fn buffer_ready(&mut self, completion: BufferCompletion) -> PipelineResult<()> {
        let Some(id) = self.active else {
            error!(index = completion.index, "Buffer completed with no active camera");
            return Err(PipelineError::InternalInconsistency(format!(
                "Buffer {} completed with no active camera",
                completion.index
            )));
        };

        if self.camera(id)?.queue.is_empty() {
            let message = format!(
                "Buffer {} completed on {} with no queued request",
                completion.index, id
            );
            error!(camera = %id, index = completion.index, "Completion with empty request queue, halting camera");
            self.halt(id);
            return Err(PipelineError::InternalInconsistency(message));
        }

        let Core {
            cameras, control, ..
        } = self;
        let camera = camera_mut(cameras, id)?;
        let stream = camera.stream.id();
        let Some(mut request) = camera.queue.pop_front() else {
            return Err(PipelineError::InternalInconsistency(format!(
                "{} request queue emptied concurrently",
                id
            )));
        };

        // Attribution is by queue order only: the pool follows the request,
        // so a buffer still bound to a queued request stays queued
        let expected = request.buffer_for(stream);
        if expected != Some(completion.index) {
            warn!(
                camera = %id,
                cookie = request.cookie(),
                ?expected,
                index = completion.index,
                "Completed buffer is not the one bound to the oldest request"
            );
        }
        camera
            .stream
            .set_state(expected.unwrap_or(completion.index), BufferState::Completed);

        if let Some(stats) = &completion.statistics
            && let Some(update) = control.process(stats)
        {
            for (ctrl, value) in &update.controls {
                if let Err(e) = camera.sensor.set_control(*ctrl, *value) {
                    warn!(camera = %id, control = ?ctrl, value, error = %e, "Failed to apply sensor control");
                }
            }
            request.set_agc_status(update.status);
        }

        let done = request.complete_buffer(
            stream,
            FrameMetadata {
                index: completion.index,
                sequence: completion.sequence,
                timestamp_ns: completion.timestamp_ns,
                bytes_used: completion.bytes_used,
            },
        );
        if !done {
            camera.queue.push_front(request);
            return Ok(());
        }

        request.set_status(RequestStatus::Complete);
        self.deliver(id, request);
        Ok(())
    }

    /// Completion read from the channel of streaming session `session`
    fn session_buffer_ready(
        &mut self,
        session: u64,
        completion: BufferCompletion,
    ) -> PipelineResult<()> {
        if self.session != Some(session) {
            debug!(
                session,
                index = completion.index,
                "Dropping completion from a finished streaming session"
            );
            return Ok(());
        }
        self.buffer_ready(completion)
    }

    /// Stop a camera whose completion stream can no longer be trusted
    fn halt(&mut self, id: CameraId) {
        if let Err(e) = self.capture.stream_off() {
            warn!(camera = %id, error = %e, "Failed to stop streaming while halting");
        }
        self.capture.set_buffer_ready(None);
        self.session = None;
        let flushed = match self.cameras.get_mut(id.0) {
            Some(camera) => {
                camera.stream.reclaim_queued();
                camera.state = CameraState::Configured;
                camera.flush()
            }
            None => Vec::new(),
        };
        if self.active == Some(id) {
            self.active = None;
        }
        for request in flushed {
            self.deliver(id, request);
        }
    }

    fn deliver(&mut self, camera: CameraId, request: Request) {
        debug!(
            camera = %camera,
            cookie = request.cookie(),
            status = ?request.status(),
            "Request finished"
        );
        self.subscribers.retain(|tx| {
            tx.send(CompletedRequest {
                camera,
                request: request.clone(),
            })
            .is_ok()
        });
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        if let Some(id) = self.active
            && let Err(e) = self.stop(id)
        {
            warn!(camera = %id, error = %e, "Failed to stop camera on teardown");
        }
        for camera in self.cameras.iter_mut() {
            if camera.stream.is_allocated() {
                camera.stream.release(&mut self.capture);
            }
        }
        info!(device = ?self.lease, "Pipeline handler released");
    }
}

/// Joins the completion thread once the core is gone
struct EventThread(Option<JoinHandle<()>>);

impl Drop for EventThread {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take()
            && let Err(e) = handle.join()
        {
            error!("Buffer ready thread panicked: {:?}", e);
        }
    }
}

fn spawn_event_thread(
    core: Weak<Mutex<Core>>,
    mut sessions: mpsc::UnboundedReceiver<CompletionSession>,
) -> PipelineResult<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("isp-buffer-ready".to_string())
        .spawn(move || {
            // Each session channel closes when its camera stops
            'sessions: while let Some(mut session) = sessions.blocking_recv() {
                while let Some(completion) = session.completions.blocking_recv() {
                    let Some(strong) = core.upgrade() else {
                        break 'sessions;
                    };
                    let mut guard = strong.lock().unwrap_or_else(|e| e.into_inner());
                    if let Err(e) = guard.session_buffer_ready(session.id, completion) {
                        debug!(error = %e, "Buffer completion rejected");
                    }
                }
                debug!(session = session.id, "Streaming session closed");
            }
            debug!("Buffer ready thread exiting");
        })
        .map_err(|e| {
            PipelineError::Hardware(HwError::new(
                "spawn isp-buffer-ready",
                e.raw_os_error().unwrap_or(libc::EAGAIN),
            ))
        })
}

fn create_cameras(
    device: &dyn MediaDevice,
    graph: &MediaGraph,
    config: &PipelineConfig,
) -> Vec<CameraData> {
    let Some(receiver) = graph.entity_by_name(&config.entities.receiver) else {
        return Vec::new();
    };
    let Some(sink) = graph.pad_by_index(receiver.id(), config.pads.receiver_sink) else {
        return Vec::new();
    };

    let mut cameras = Vec::new();
    for &link in sink.links() {
        let name = graph.link_source_entity(link).name();
        let subdev = match Subdevice::open(device, name) {
            Ok(subdev) => subdev,
            Err(e) => {
                warn!(sensor = name, error = %e, "Cannot open sensor, skipping");
                continue;
            }
        };
        let mut sensor = CameraSensor::new(subdev, config.pads.sensor_source);
        if let Err(e) = sensor.init() {
            warn!(sensor = name, error = %e, "Sensor init failed, skipping");
            continue;
        }

        let id = CameraId(cameras.len());
        info!(camera = %id, sensor = name, resolution = %sensor.resolution(), "Registered camera");
        cameras.push(CameraData {
            id,
            sensor,
            stream: Stream::new(StreamId(id.0)),
            state: CameraState::Unconfigured,
            queue: VecDeque::new(),
        });
    }
    cameras
}

/// Pipeline handler for one sensor → receiver → ISP → capture media device
pub struct PipelineHandler {
    core: Arc<Mutex<Core>>,
    _events: EventThread,
}

impl PipelineHandler {
    /// Find, acquire and set up a matching media device
    ///
    /// Creates one camera per sensor linked into the receiver. Fails with
    /// [`PipelineError::NotFound`] when no device matches or no sensor
    /// behind the receiver is usable.
    pub fn match_device(
        enumerator: &dyn DeviceEnumerator,
        config: PipelineConfig,
    ) -> PipelineResult<Self> {
        config.validate()?;
        let dm = DeviceMatch::from_config(&config);
        let (lease, mut graph) = device_match::search(enumerator, &dm)?;

        let device = lease.device();
        let receiver = Subdevice::open(device, &config.entities.receiver)?;
        let isp = Subdevice::open(device, &config.entities.isp)?;
        let capture = VideoNode::open(device, &config.entities.capture)?;
        {
            let _session = MediaSession::open(device)?;
            topology::initialize_static_links(device, &mut graph, &config)?;
        }

        let cameras = create_cameras(device, &graph, &config);
        if cameras.is_empty() {
            return Err(PipelineError::NotFound(format!(
                "No usable sensor linked into '{}'",
                config.entities.receiver
            )));
        }

        let (sessions, session_rx) = mpsc::unbounded_channel();
        let control = ControlLoop::from_settings(&config.control);
        info!(
            driver = %config.driver,
            cameras = cameras.len(),
            "Pipeline handler ready"
        );
        let core = Arc::new(Mutex::new(Core {
            config,
            graph,
            cameras,
            receiver,
            isp,
            capture,
            active: None,
            session: None,
            sessions_started: 0,
            sessions,
            control,
            subscribers: Vec::new(),
            lease,
        }));
        let events = spawn_event_thread(Arc::downgrade(&core), session_rx)?;

        Ok(Self {
            core,
            _events: EventThread(Some(events)),
        })
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every camera, in registration order
    pub fn cameras(&self) -> Vec<CameraInfo> {
        self.core().cameras.iter().map(CameraData::info).collect()
    }

    pub fn camera(&self, id: CameraId) -> Option<CameraInfo> {
        self.core().camera(id).ok().map(CameraData::info)
    }

    pub fn camera_by_name(&self, name: &str) -> Option<CameraInfo> {
        self.core()
            .cameras
            .iter()
            .find(|c| c.sensor.entity() == name)
            .map(CameraData::info)
    }

    /// Camera currently driving the hardware
    pub fn active_camera(&self) -> Option<CameraId> {
        self.core().active
    }

    /// Requests submitted to `id` and not yet completed
    pub fn queued_requests(&self, id: CameraId) -> PipelineResult<usize> {
        Ok(self.core().camera(id)?.queue.len())
    }

    /// Buffers in the camera's pool (empty until allocated)
    pub fn buffers(&self, id: CameraId) -> PipelineResult<Vec<Buffer>> {
        Ok(self.core().camera(id)?.stream.buffers().to_vec())
    }

    /// Starting configuration: output format, full sensor resolution, default buffer count
    pub fn default_configuration(&self, id: CameraId) -> PipelineResult<StreamConfiguration> {
        self.core().default_configuration(id)
    }

    /// Configure `id` at `size` with the default format and buffer count
    ///
    /// Returns the accepted size, which always equals `size` on success.
    pub fn configure(&self, id: CameraId, size: Size) -> PipelineResult<Size> {
        let mut core = self.core();
        let requested = StreamConfiguration {
            size,
            ..core.default_configuration(id)?
        };
        Ok(core.configure(id, requested)?.size)
    }

    /// Configure `id` with an explicit pixel format and buffer count
    pub fn configure_stream(
        &self,
        id: CameraId,
        configuration: StreamConfiguration,
    ) -> PipelineResult<StreamConfiguration> {
        self.core().configure(id, configuration)
    }

    /// Export the configured number of buffers; returns how many were exported
    pub fn allocate_buffers(&self, id: CameraId) -> PipelineResult<usize> {
        self.core().allocate_buffers(id)
    }

    /// Give all buffer memory back to the hardware
    pub fn release_buffers(&self, id: CameraId) -> PipelineResult<()> {
        self.core().release_buffers(id)
    }

    pub fn start(&self, id: CameraId) -> PipelineResult<()> {
        self.core().start(id)
    }

    /// Stop streaming; still-queued requests come back cancelled
    pub fn stop(&self, id: CameraId) -> PipelineResult<()> {
        self.core().stop(id)
    }

    pub fn submit(&self, id: CameraId, request: Request) -> PipelineResult<()> {
        self.core().submit(id, request)
    }

    /// Feed a hardware buffer completion into the request engine
    ///
    /// Normally driven by the `isp-buffer-ready` thread.
    pub fn buffer_ready(&self, completion: BufferCompletion) -> PipelineResult<()> {
        self.core().buffer_ready(completion)
    }

    /// Channel receiving every completed or cancelled request
    pub fn subscribe_request_completed(&self) -> mpsc::UnboundedReceiver<CompletedRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.core().subscribers.push(tx);
        rx
    }

    /// Adjust the exposure/gain algorithm (EV, metering, fixed values)
    pub fn with_agc<R>(&self, f: impl FnOnce(&mut dyn AgcAlgorithm) -> R) -> R {
        f(self.core().control.algorithm_mut())
    }
}

impl fmt::Debug for PipelineHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core();
        f.debug_struct("PipelineHandler")
            .field("driver", &core.config.driver)
            .field("cameras", &core.cameras.len())
            .field("active", &core.active)
            .finish()
    }
}
