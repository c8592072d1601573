// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use edgecam::Config;
use edgecam::errors::ConfigError;
use edgecam::pipelines::TransformParams;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(
        config.mirror_preview,
        "Mirror preview should be enabled by default"
    );
    assert_eq!(config.transform_params(), TransformParams::new(50, 150, 5));
    assert_eq!(config.render_fps(), 60);
    assert!(config.shader_dir.is_none());
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("edgecam").join("config.json");

    let config = Config {
        lower_threshold: 30,
        upper_threshold: 90,
        blur_kernel_size: 3,
        shader_dir: Some(dir.path().join("shaders")),
        ..Default::default()
    };
    config.save_to(&path).unwrap();

    assert!(path.exists());
    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_invalid_json_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    match Config::load_from(&path) {
        Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_transform_params_are_sanitized() {
    let config = Config {
        lower_threshold: -5,
        upper_threshold: 400,
        blur_kernel_size: 0,
        ..Default::default()
    };
    assert_eq!(config.transform_params(), TransformParams::new(0, 255, 1));
}
