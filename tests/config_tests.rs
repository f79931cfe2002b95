// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use isp_pipeline::media::formats::FourCC;
use isp_pipeline::{PipelineConfig, PipelineError};

#[test]
fn test_config_default() {
    let config = PipelineConfig::default();

    assert_eq!(config.driver, "rkisp1");
    assert_eq!(config.buffer_count, 4);
    assert_eq!(config.capture_planes, 2);
    assert_eq!(config.output_fourcc().unwrap(), FourCC::new(b"NV12"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_required_entities_cover_the_rkisp1_graph() {
    let names = PipelineConfig::default().required_entities();
    for expected in [
        "rockchip-sy-mipi-dphy",
        "rkisp1-isp-subdev",
        "rkisp1_mainpath",
        "rkisp1_selfpath",
        "rkisp1-statistics",
        "rkisp1-input-params",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {}", expected);
    }
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = PipelineConfig::from_json(
        r#"{ "buffer_count": 6, "entities": { "receiver": "rkisp1_csi" } }"#,
    )
    .unwrap();

    assert_eq!(config.buffer_count, 6);
    assert_eq!(config.entities.receiver, "rkisp1_csi");
    assert_eq!(config.entities.isp, "rkisp1-isp-subdev");
    assert_eq!(config.output_format, "NV12");
}

#[test]
fn test_invalid_config_is_rejected() {
    for json in [
        r#"{ "buffer_count": 0 }"#,
        r#"{ "output_format": "not-a-format" }"#,
        r#"{ "entities": { "isp": "" } }"#,
        r#"{ "control": { "target_luminance": 1.5 } }"#,
        r#"{ "buffer_count": "four" }"#,
    ] {
        assert!(
            matches!(PipelineConfig::from_json(json), Err(PipelineError::Config(_))),
            "accepted {}",
            json
        );
    }
}

#[test]
fn test_config_round_trips_through_file() {
    let path = std::env::temp_dir().join(format!("isp-pipeline-config-{}.json", std::process::id()));
    let mut config = PipelineConfig::default();
    config.control.fixed_gain = Some(2.0);
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = PipelineConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_is_a_config_error() {
    let err = PipelineConfig::load(std::path::Path::new("/nonexistent/isp.json")).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}
