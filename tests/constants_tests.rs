// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use edgecam::constants::{files, render, transform};
use std::time::Duration;

#[test]
fn test_default_params_within_bounds() {
    assert!(transform::DEFAULT_LOWER_THRESHOLD >= transform::THRESHOLD_MIN);
    assert!(transform::DEFAULT_UPPER_THRESHOLD <= transform::THRESHOLD_MAX);
    assert!(transform::DEFAULT_LOWER_THRESHOLD < transform::DEFAULT_UPPER_THRESHOLD);
    assert!(transform::DEFAULT_BLUR_KERNEL_SIZE >= transform::BLUR_KERNEL_MIN);
    assert!(transform::DEFAULT_BLUR_KERNEL_SIZE <= transform::BLUR_KERNEL_MAX);
    assert_eq!(transform::DEFAULT_BLUR_KERNEL_SIZE % 2, 1, "Blur kernel must be odd");
}

#[test]
fn test_frame_interval() {
    assert_eq!(render::frame_interval(50), Duration::from_millis(20));
    // Out-of-range rates are clamped rather than dividing by zero
    assert_eq!(render::frame_interval(0), Duration::from_secs(1));
}

#[test]
fn test_shader_file_names() {
    assert!(files::VERTEX_SHADER.ends_with(".wgsl"));
    assert!(files::FRAGMENT_SHADER.ends_with(".wgsl"));
    assert_ne!(files::VERTEX_SHADER, files::FRAGMENT_SHADER);
}
