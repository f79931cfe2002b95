// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the pipeline handler against a simulated rkisp1 device

use isp_pipeline::backends::virtual_media::{
    VirtualEnumerator, VirtualMediaDevice, VirtualSensor, VirtualTopology,
};
use isp_pipeline::backends::{BufferCompletion, SensorControl};
use isp_pipeline::constants::entities;
use isp_pipeline::control::FrameStatistics;
use isp_pipeline::media::Size;
use isp_pipeline::media::formats::FourCC;
use isp_pipeline::pipeline::{BufferState, CameraInfo, CameraState, StreamConfiguration};
use isp_pipeline::{
    CameraId, PipelineConfig, PipelineError, PipelineHandler, Request, RequestStatus,
};

fn two_sensor_device() -> VirtualMediaDevice {
    VirtualMediaDevice::new(VirtualTopology::rkisp1(vec![
        VirtualSensor::imx219("sensorA"),
        VirtualSensor::ov5695("sensorB"),
    ]))
}

fn match_handler(device: &VirtualMediaDevice) -> PipelineHandler {
    let enumerator = VirtualEnumerator::new(vec![device.clone()]);
    PipelineHandler::match_device(&enumerator, PipelineConfig::default()).unwrap()
}

fn camera(handler: &PipelineHandler, name: &str) -> CameraInfo {
    handler.camera_by_name(name).unwrap()
}

/// Configure, allocate and start a camera, returning its info
fn streaming(handler: &PipelineHandler, name: &str) -> CameraInfo {
    let cam = camera(handler, name);
    handler.configure(cam.id, Size::new(1920, 1080)).unwrap();
    handler.allocate_buffers(cam.id).unwrap();
    handler.start(cam.id).unwrap();
    cam
}

fn completion(index: u32) -> BufferCompletion {
    BufferCompletion {
        index,
        sequence: 0,
        timestamp_ns: 0,
        bytes_used: vec![1920 * 1080, 1920 * 540],
        statistics: None,
    }
}

#[test]
fn test_missing_entity_fails_match_without_link_changes() {
    for missing in [
        entities::RECEIVER,
        entities::ISP,
        entities::CAPTURE,
        entities::SELFPATH,
        entities::STATISTICS,
        entities::INPUT_PARAMS,
    ] {
        let device = VirtualMediaDevice::new(
            VirtualTopology::rkisp1(vec![VirtualSensor::imx219("sensorA")])
                .without_entity(missing),
        );
        let enumerator = VirtualEnumerator::new(vec![device.clone()]);
        let result = PipelineHandler::match_device(&enumerator, PipelineConfig::default());

        assert!(
            matches!(result, Err(PipelineError::NotFound(_))),
            "match should fail without {}",
            missing
        );
        assert_eq!(device.link_setup_calls(), 0);
        assert!(!device.is_acquired());
    }
}

#[test]
fn test_match_creates_one_camera_per_sensor() {
    let device = two_sensor_device();
    let handler = match_handler(&device);

    let names: Vec<String> = handler.cameras().into_iter().map(|c| c.name).collect();
    assert_eq!(names, ["sensorA", "sensorB"]);
    assert!(device.is_acquired());
    assert_eq!(device.open_sessions(), 0);
    assert!(device.is_link_enabled(entities::RECEIVER, 1, entities::ISP, 0));
    assert!(device.is_link_enabled(entities::ISP, 2, entities::CAPTURE, 0));
    assert!(device.routed_sensors().is_empty());

    drop(handler);
    assert!(!device.is_acquired());
}

#[test]
fn test_match_skips_claimed_device() {
    let device = two_sensor_device();
    let _first = match_handler(&device);
    let enumerator = VirtualEnumerator::new(vec![device.clone()]);
    assert!(matches!(
        PipelineHandler::match_device(&enumerator, PipelineConfig::default()),
        Err(PipelineError::NotFound(_))
    ));
}

#[test]
fn test_reconfiguring_same_sensor_issues_no_link_calls() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = camera(&handler, "sensorA");

    handler.configure(cam.id, Size::new(1920, 1080)).unwrap();
    let calls = device.link_setup_calls();
    handler.configure(cam.id, Size::new(1280, 720)).unwrap();
    assert_eq!(device.link_setup_calls(), calls);
}

#[test]
fn test_switching_cameras_moves_the_sensor_link() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let a = camera(&handler, "sensorA");
    let b = camera(&handler, "sensorB");

    assert_eq!(
        handler.configure(a.id, Size::new(1920, 1080)).unwrap(),
        Size::new(1920, 1080)
    );
    assert_eq!(device.routed_sensors(), ["sensorA"]);

    handler.configure(b.id, Size::new(1920, 1080)).unwrap();
    assert_eq!(device.routed_sensors(), ["sensorB"]);

    // Never more than one sensor routed, whatever the order
    for name in ["sensorA", "sensorA", "sensorB", "sensorA", "sensorB", "sensorB"] {
        handler
            .configure(camera(&handler, name).id, Size::new(640, 480))
            .unwrap();
        assert_eq!(device.routed_sensors(), [name]);
    }
}

#[test]
fn test_configuring_another_camera_supersedes_configuration() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let a = camera(&handler, "sensorA");
    let b = camera(&handler, "sensorB");

    handler.configure(a.id, Size::new(1640, 1232)).unwrap();
    handler.configure(b.id, Size::new(1920, 1080)).unwrap();
    assert_eq!(device.routed_sensors(), ["sensorB"]);

    let info = handler.camera(a.id).unwrap();
    assert_eq!(info.state, CameraState::Unconfigured);
    assert_eq!(info.configuration, None);
    assert!(matches!(
        handler.allocate_buffers(a.id),
        Err(PipelineError::InvalidState(_))
    ));
    assert!(matches!(
        handler.start(a.id),
        Err(PipelineError::InvalidState(_))
    ));
    assert_eq!(device.exported_buffers(), 0);
    assert_eq!(
        handler.camera(b.id).unwrap().state,
        CameraState::Configured
    );

    // Rejected before touching the hardware, so B keeps its configuration
    let err = handler.configure(a.id, Size::new(3840, 2160)).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    assert_eq!(
        handler.camera(b.id).unwrap().state,
        CameraState::Configured
    );
    handler.allocate_buffers(b.id).unwrap();
    handler.start(b.id).unwrap();
    assert_eq!(handler.active_camera(), Some(b.id));
}

#[test]
fn test_oversized_request_issues_no_format_calls() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let a = camera(&handler, "sensorA");

    let err = handler.configure(a.id, Size::new(3840, 2160)).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    assert_eq!(device.subdev_format_calls(), 0);
    assert_eq!(device.video_format_calls(), 0);
    assert!(device.routed_sensors().is_empty());
    assert_eq!(
        handler.camera(a.id).unwrap().state,
        CameraState::Unconfigured
    );
}

#[test]
fn test_negotiation_never_settles_for_a_different_format() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let a = camera(&handler, "sensorA");

    let accepted = handler
        .configure_stream(
            a.id,
            StreamConfiguration {
                pixel_format: FourCC::new(b"NV16"),
                size: Size::new(1640, 1232),
                buffer_count: 3,
            },
        )
        .unwrap();
    assert_eq!(accepted.pixel_format, FourCC::new(b"NV16"));
    assert_eq!(accepted.size, Size::new(1640, 1232));

    let err = handler
        .configure_stream(
            a.id,
            StreamConfiguration {
                pixel_format: FourCC::new(b"BA81"),
                size: Size::new(1640, 1232),
                buffer_count: 3,
            },
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::ConfigurationMismatch { .. }));
    assert_eq!(handler.camera(a.id).unwrap().configuration, None);
}

#[test]
fn test_export_shortfall_is_resource_exhausted() {
    let device = VirtualMediaDevice::new(
        VirtualTopology::rkisp1(vec![VirtualSensor::imx219("sensorA")]).with_export_limit(2),
    );
    let handler = match_handler(&device);
    let a = camera(&handler, "sensorA");
    handler.configure(a.id, Size::new(1920, 1080)).unwrap();

    let err = handler.allocate_buffers(a.id).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ResourceExhausted {
            requested: 4,
            exported: 2
        }
    ));
    assert!(handler.buffers(a.id).unwrap().is_empty());
    assert_eq!(device.exported_buffers(), 0);
}

#[test]
fn test_completion_retires_only_the_oldest_request() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = streaming(&handler, "sensorA");
    let mut completed = handler.subscribe_request_completed();

    for (cookie, index) in [(10, 0), (11, 1), (12, 2)] {
        handler
            .submit(cam.id, Request::new(cookie).with_buffer(cam.stream, index))
            .unwrap();
    }
    assert_eq!(device.queued_buffers(), [0, 1, 2]);

    assert!(device.complete_next_buffer(None));
    let done = completed.blocking_recv().unwrap();
    assert_eq!(done.camera, cam.id);
    assert_eq!(done.request.cookie(), 10);
    assert_eq!(done.request.status(), RequestStatus::Complete);
    let metadata = done.request.metadata(cam.stream).unwrap();
    assert_eq!(metadata.index, 0);
    assert_eq!(metadata.bytes_used, [1920 * 1080, 1920 * 540]);

    assert_eq!(handler.queued_requests(cam.id).unwrap(), 2);
    let buffers = handler.buffers(cam.id).unwrap();
    assert_eq!(buffers[0].state(), BufferState::Completed);
    assert_eq!(buffers[1].state(), BufferState::Queued);

    assert!(device.complete_next_buffer(None));
    assert_eq!(completed.blocking_recv().unwrap().request.cookie(), 11);
    assert_eq!(handler.queued_requests(cam.id).unwrap(), 1);
}

#[test]
fn test_completed_buffer_can_be_requeued() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = streaming(&handler, "sensorA");
    let mut completed = handler.subscribe_request_completed();

    handler
        .submit(cam.id, Request::new(1).with_buffer(cam.stream, 0))
        .unwrap();
    // Same buffer twice while the hardware owns it
    let err = handler
        .submit(cam.id, Request::new(2).with_buffer(cam.stream, 0))
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));

    assert!(device.complete_next_buffer(None));
    completed.blocking_recv().unwrap();
    handler
        .submit(cam.id, Request::new(3).with_buffer(cam.stream, 0))
        .unwrap();
    assert_eq!(device.queued_buffers(), [0]);
}

#[test]
fn test_request_without_stream_buffer_is_rejected() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let a = streaming(&handler, "sensorA");
    let b = camera(&handler, "sensorB");

    handler
        .submit(a.id, Request::new(1).with_buffer(a.stream, 0))
        .unwrap();

    for request in [Request::new(2), Request::new(3).with_buffer(b.stream, 1)] {
        let err = handler.submit(a.id, request).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
    }
    assert_eq!(handler.queued_requests(a.id).unwrap(), 1);
    assert_eq!(device.queued_buffers(), [0]);
}

#[test]
fn test_queue_failure_does_not_enqueue() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = streaming(&handler, "sensorA");

    device.fail_next("VIDIOC_QBUF", libc::EIO);
    let err = handler
        .submit(cam.id, Request::new(1).with_buffer(cam.stream, 0))
        .unwrap_err();
    assert_eq!(err.errno(), Some(libc::EIO));
    assert_eq!(handler.queued_requests(cam.id).unwrap(), 0);
    assert_eq!(
        handler.buffers(cam.id).unwrap()[0].state(),
        BufferState::Available
    );
}

#[test]
fn test_completion_without_active_camera_is_inconsistent() {
    let device = two_sensor_device();
    let handler = match_handler(&device);

    let err = handler.buffer_ready(completion(0)).unwrap_err();
    assert!(matches!(err, PipelineError::InternalInconsistency(_)));
    assert_eq!(handler.active_camera(), None);

    // Still usable afterwards
    let cam = streaming(&handler, "sensorA");
    assert_eq!(handler.active_camera(), Some(cam.id));
}

#[test]
fn test_completion_with_empty_queue_halts_camera() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = streaming(&handler, "sensorA");

    let err = handler.buffer_ready(completion(0)).unwrap_err();
    assert!(matches!(err, PipelineError::InternalInconsistency(_)));
    assert_eq!(handler.active_camera(), None);
    assert_eq!(
        handler.camera(cam.id).unwrap().state,
        CameraState::Configured
    );
    assert!(!device.is_streaming());
}

#[test]
fn test_out_of_order_completion_follows_the_request_queue() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = streaming(&handler, "sensorA");
    let mut completed = handler.subscribe_request_completed();

    for (cookie, index) in [(1, 0), (2, 1)] {
        handler
            .submit(cam.id, Request::new(cookie).with_buffer(cam.stream, index))
            .unwrap();
    }

    // Buffer 1 comes back first; the oldest request still retires
    handler.buffer_ready(completion(1)).unwrap();
    let done = completed.blocking_recv().unwrap();
    assert_eq!(done.request.cookie(), 1);
    assert_eq!(done.request.status(), RequestStatus::Complete);
    assert_eq!(done.request.metadata(cam.stream).unwrap().index, 1);

    let states = |handler: &PipelineHandler| -> Vec<BufferState> {
        handler
            .buffers(cam.id)
            .unwrap()
            .iter()
            .map(|b| b.state())
            .collect()
    };
    assert_eq!(
        states(&handler),
        [
            BufferState::Completed,
            BufferState::Queued,
            BufferState::Available,
            BufferState::Available
        ]
    );
    assert_eq!(handler.queued_requests(cam.id).unwrap(), 1);

    handler.buffer_ready(completion(0)).unwrap();
    assert_eq!(completed.blocking_recv().unwrap().request.cookie(), 2);
    assert_eq!(
        states(&handler),
        [
            BufferState::Completed,
            BufferState::Completed,
            BufferState::Available,
            BufferState::Available
        ]
    );
    assert_eq!(handler.queued_requests(cam.id).unwrap(), 0);
}

#[test]
fn test_start_failure_marks_nothing_active() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = camera(&handler, "sensorA");
    handler.configure(cam.id, Size::new(1920, 1080)).unwrap();
    handler.allocate_buffers(cam.id).unwrap();

    device.fail_next("VIDIOC_STREAMON", libc::EPIPE);
    let err = handler.start(cam.id).unwrap_err();
    assert_eq!(err.errno(), Some(libc::EPIPE));
    assert_eq!(handler.active_camera(), None);
    assert_eq!(
        handler.camera(cam.id).unwrap().state,
        CameraState::Configured
    );
}

#[test]
fn test_stop_cancels_pending_requests_even_if_stream_off_fails() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = streaming(&handler, "sensorA");
    let mut completed = handler.subscribe_request_completed();

    for index in 0..3 {
        handler
            .submit(
                cam.id,
                Request::new(index as u64).with_buffer(cam.stream, index),
            )
            .unwrap();
    }

    device.fail_next("VIDIOC_STREAMOFF", libc::EIO);
    handler.stop(cam.id).unwrap();

    for expected in 0..3u64 {
        let done = completed.blocking_recv().unwrap();
        assert_eq!(done.request.cookie(), expected);
        assert_eq!(done.request.status(), RequestStatus::Cancelled);
    }
    assert_eq!(handler.active_camera(), None);
    assert_eq!(handler.queued_requests(cam.id).unwrap(), 0);
    assert!(
        handler
            .buffers(cam.id)
            .unwrap()
            .iter()
            .all(|b| b.state() == BufferState::Available)
    );

    // The hardware still thinks it is streaming; release is best effort
    handler.release_buffers(cam.id).unwrap();
    assert!(handler.buffers(cam.id).unwrap().is_empty());
}

#[test]
fn test_agc_writes_sensor_controls_after_startup_frames() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = streaming(&handler, "sensorA");
    let mut completed = handler.subscribe_request_completed();

    let dark = FrameStatistics {
        mean_luminance: 0.02,
        zones: Vec::new(),
    };
    for index in 0..3 {
        handler
            .submit(
                cam.id,
                Request::new(index as u64).with_buffer(cam.stream, index),
            )
            .unwrap();
    }

    for frame in 0..3 {
        assert!(device.complete_next_buffer(Some(dark.clone())));
        let done = completed.blocking_recv().unwrap();
        if frame < 2 {
            assert!(done.request.agc_status().is_none());
            assert_eq!(device.control("sensorA", SensorControl::Exposure), None);
        } else {
            let agc = done.request.agc_status().unwrap();
            assert!(!agc.converged);
        }
    }

    assert!(device.control("sensorA", SensorControl::Exposure).is_some());
    assert!(
        device
            .control("sensorA", SensorControl::AnalogueGain)
            .is_some()
    );
    assert_eq!(device.control("sensorB", SensorControl::Exposure), None);
}

#[test]
fn test_control_write_failure_does_not_fail_completion() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = streaming(&handler, "sensorA");
    let mut completed = handler.subscribe_request_completed();

    for index in 0..3 {
        handler
            .submit(
                cam.id,
                Request::new(index as u64).with_buffer(cam.stream, index),
            )
            .unwrap();
    }
    let stats = FrameStatistics {
        mean_luminance: 0.5,
        zones: Vec::new(),
    };
    for _ in 0..2 {
        assert!(device.complete_next_buffer(Some(stats.clone())));
        completed.blocking_recv().unwrap();
    }

    device.fail_next("VIDIOC_S_CTRL", libc::EINVAL);
    assert!(device.complete_next_buffer(Some(stats)));
    let done = completed.blocking_recv().unwrap();
    assert_eq!(done.request.status(), RequestStatus::Complete);
}

#[test]
fn test_handler_drop_stops_and_releases() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let cam = streaming(&handler, "sensorA");
    handler
        .submit(cam.id, Request::new(0).with_buffer(cam.stream, 0))
        .unwrap();
    assert!(device.has_buffer_ready_subscriber());

    drop(handler);
    assert!(!device.is_streaming());
    assert_eq!(device.exported_buffers(), 0);
    assert!(!device.has_buffer_ready_subscriber());
    assert!(!device.is_acquired());
}

#[test]
fn test_unknown_camera() {
    let device = two_sensor_device();
    let handler = match_handler(&device);
    let bogus: CameraId = {
        // Ids are only handed out by the handler; take one from a bigger device
        let other = VirtualMediaDevice::new(VirtualTopology::rkisp1(vec![
            VirtualSensor::imx219("s0"),
            VirtualSensor::imx219("s1"),
            VirtualSensor::imx219("s2"),
        ]));
        let other_handler = match_handler(&other);
        other_handler.cameras()[2].id
    };
    assert!(handler.camera(bogus).is_none());
    assert!(matches!(
        handler.start(bogus),
        Err(PipelineError::NotFound(_))
    ));
}
