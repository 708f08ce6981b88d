//! Input and output collaborators of the pipeline.

pub mod read_source;
pub mod report;
