pub mod core;
pub mod defaults;
pub mod pipelines;
