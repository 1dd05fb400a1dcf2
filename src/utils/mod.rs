//! Utility Module
//!
//! - [`math`]: quaternion helpers for strand local frames

pub mod math;
