//! Read filtering pipelines.

pub mod linear;
