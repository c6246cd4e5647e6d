//! Core water-detection algorithms and orchestration.

pub mod dem_veto;
pub mod edge;
pub mod extent;
pub mod pipeline;
pub mod resolution;
pub mod simplify;
pub mod threshold;

pub use pipeline::{MeasurementPipeline, PipelineConfig, WATER_DETECTOR_VERSION};
pub use threshold::{ThresholdDecision, ThresholdParams, ThresholdSelector, ThresholdStatus};
