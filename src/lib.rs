//! waterline: surface-water extent and level estimation from satellite
//! index rasters.
//!
//! Given a nominal reservoir outline and a newly acquired
//! normalized-difference water index raster, the crate decides which
//! pixels are water via edge-guided adaptive thresholding, vectorizes
//! that decision into a polygon comparable to the nominal outline, and
//! optionally rejects implausible detections against terrain elevation.
//! The measurement pipeline wraps the algorithms with acquisition
//! validation, cloud screening and an explicit terminal-status taxonomy
//! for unattended per-date monitoring.

pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use crate::types::{
    BoundingBox, Crs, GeoFrame, Mask, Measurement, Raster, WaterBody, WaterDetectionSensor,
    WaterDetectionStatus, WaterError, WaterResult,
};

pub use crate::core::{
    MeasurementPipeline, PipelineConfig, ThresholdDecision, ThresholdParams, ThresholdSelector,
    ThresholdStatus, WATER_DETECTOR_VERSION,
};

pub use crate::io::{
    AcquisitionError, ElevationProvider, ImageryProvider, IndexScene, SceneRequest,
};
