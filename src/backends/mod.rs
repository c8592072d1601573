// SPDX-License-Identifier: GPL-3.0-only

//! Frame producers feeding the pipeline
//!
//! - [`camera`]: Frame types, built-in sources and the loop threads that
//!   drive them

pub mod camera;
