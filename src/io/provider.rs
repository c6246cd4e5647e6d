use chrono::NaiveDate;

use crate::types::{GeoFrame, Mask, Raster};

/// Typed acquisition failures raised by imagery / elevation providers.
///
/// These never cross the pipeline boundary; the orchestration layer maps
/// every variant onto the `SH_REQUEST_ERROR` terminal status.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("request construction failed: {0}")]
    Request(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("image decoding failed: {0}")]
    Decode(String),
}

/// Parameters of one scene acquisition.
#[derive(Debug, Clone)]
pub struct SceneRequest {
    pub frame: GeoFrame,
    pub date: NaiveDate,
    /// Catalog-side filter: skip acquisitions cloudier than this fraction
    pub max_cloud_cover: f64,
}

/// One acquired index scene: the index band, its per-pixel validity band,
/// and whatever catalog metadata the provider carries along.
#[derive(Debug, Clone)]
pub struct IndexScene {
    pub index: Raster,
    /// True where the sensor flagged the pixel as valid data
    pub valid: Mask,
    pub image_date: NaiveDate,
    pub cc_orig: f64,
    pub cc_clean: f64,
    pub image_url: Option<String>,
}

impl IndexScene {
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Remote catalog supplying index rasters and derived cloud masks.
///
/// Calls are blocking; a call either returns data or raises a typed
/// failure. Retry and backoff policy belongs to the implementor (or an
/// outer scheduler), never to the core.
pub trait ImageryProvider {
    fn fetch_index(&self, request: &SceneRequest) -> Result<IndexScene, AcquisitionError>;

    /// Per-pixel cloud classification for the same scene, normally at a
    /// coarser frame than the index band.
    fn fetch_cloud_mask(&self, request: &SceneRequest) -> Result<Mask, AcquisitionError>;
}

/// Remote catalog supplying single-band elevation rasters.
pub trait ElevationProvider {
    fn fetch_elevation(&self, request: &SceneRequest) -> Result<Raster, AcquisitionError>;
}
