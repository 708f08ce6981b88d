//! Core alignment kernels.
//!
//! These modules are agnostic to how candidate regions were found: they take
//! an encoded read and an encoded reference segment and score them.

pub mod banded_swa;
pub mod edit_distance;
