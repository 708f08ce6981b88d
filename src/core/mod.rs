//! Core reusable components for the filter pipeline.
//!
//! This module contains components that are agnostic to the search strategy:
//! sequence encoding, the DP kernel, diagnostics and file I/O.

pub mod alignment;
pub mod diagnostics;
pub mod encoding;
pub mod io;
pub mod read;
