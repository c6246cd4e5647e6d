use chrono::{NaiveDate, Utc};
use geo::MultiPolygon;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::io::provider::AcquisitionError;

/// Single-band raster data (index or elevation values)
pub type Raster = Array2<f32>;

/// Binary raster mask (water / edge / footprint pixels)
pub type Mask = Array2<bool>;

/// Coordinate reference systems understood by the core.
///
/// Every polygon and bounding box crossing the API boundary is planar
/// WGS84 degrees; the enum exists so a frame carries its reference
/// explicitly rather than by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crs {
    Wgs84,
}

/// Geospatial bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> WaterResult<Self> {
        if !(max_lon > min_lon && max_lat > min_lat) {
            return Err(WaterError::InvalidGeometry(format!(
                "degenerate bounding box: ({}, {}) - ({}, {})",
                min_lon, min_lat, max_lon, max_lat
            )));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Width in degrees of longitude
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees of latitude
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn mid_lat(&self) -> f64 {
        0.5 * (self.min_lat + self.max_lat)
    }
}

/// Acquisition frame shared by every raster operation: bounding box,
/// coordinate reference and pixel size in meters.
///
/// Immutable once constructed for a request. Resolutions are positive
/// multiples of 10 m; the cloud-screening variant is floored at 80 m
/// (see [`crate::core::resolution`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFrame {
    pub bbox: BoundingBox,
    pub crs: Crs,
    /// Pixel width in meters
    pub res_x: u32,
    /// Pixel height in meters
    pub res_y: u32,
}

impl GeoFrame {
    pub fn new(bbox: BoundingBox, res_x: u32, res_y: u32) -> WaterResult<Self> {
        if res_x == 0 || res_y == 0 || res_x % 10 != 0 || res_y % 10 != 0 {
            return Err(WaterError::Processing(format!(
                "frame resolution must be a positive multiple of 10 m, got {}x{}",
                res_x, res_y
            )));
        }
        Ok(Self {
            bbox,
            crs: Crs::Wgs84,
            res_x,
            res_y,
        })
    }

    /// Same bounding box at a different (already validated) resolution.
    pub fn with_resolution(&self, res_x: u32, res_y: u32) -> WaterResult<Self> {
        Self::new(self.bbox, res_x, res_y)
    }
}

/// A monitored water body: stable identifier plus its nominal
/// (historical full) extent, externally supplied and fixed.
#[derive(Debug, Clone)]
pub struct WaterBody {
    pub id: String,
    pub nominal: MultiPolygon<f64>,
}

impl WaterBody {
    pub fn new(id: impl Into<String>, nominal: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            nominal,
        }
    }
}

/// Sensor / detection-algorithm family that produced a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaterDetectionSensor {
    S2Ndwi,
    S2NdwiDem,
    S1VhDb,
}

impl std::fmt::Display for WaterDetectionSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaterDetectionSensor::S2Ndwi => write!(f, "S2_NDWI"),
            WaterDetectionSensor::S2NdwiDem => write!(f, "S2_NDWI_DEM"),
            WaterDetectionSensor::S1VhDb => write!(f, "S1_VH_DB"),
        }
    }
}

/// Terminal classification of one (water body, date) unit of work.
///
/// `UnknownError` is the construction sentinel; every pipeline code path
/// overwrites it, and a record still carrying it after the pipeline
/// returns indicates an unhandled path, not a legitimate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaterDetectionStatus {
    UnknownError,
    MeasurementValid,
    InvalidData,
    TooCloudy,
    ShRequestError,
    ShNoData,
    ShNoCloudData,
    InvalidPolygon,
}

impl WaterDetectionStatus {
    /// Numeric code used in tabular storage.
    pub fn code(&self) -> i16 {
        match self {
            WaterDetectionStatus::UnknownError => -1,
            WaterDetectionStatus::MeasurementValid => 1,
            WaterDetectionStatus::InvalidData => 2,
            WaterDetectionStatus::TooCloudy => 3,
            WaterDetectionStatus::ShRequestError => 4,
            WaterDetectionStatus::ShNoData => 5,
            WaterDetectionStatus::ShNoCloudData => 6,
            WaterDetectionStatus::InvalidPolygon => 7,
        }
    }
}

impl std::fmt::Display for WaterDetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WaterDetectionStatus::UnknownError => "UNKNOWN_ERROR",
            WaterDetectionStatus::MeasurementValid => "MEASUREMENT_VALID",
            WaterDetectionStatus::InvalidData => "INVALID_DATA",
            WaterDetectionStatus::TooCloudy => "TOO_CLOUDY",
            WaterDetectionStatus::ShRequestError => "SH_REQUEST_ERROR",
            WaterDetectionStatus::ShNoData => "SH_NO_DATA",
            WaterDetectionStatus::ShNoCloudData => "SH_NO_CLOUD_DATA",
            WaterDetectionStatus::InvalidPolygon => "INVALID_POLYGON",
        };
        write!(f, "{}", name)
    }
}

/// Durable per-(water body, date) output record, one row per unit of work.
///
/// All fields are primitive scalars or WKT text so the serialization
/// contract stays flat and stable. Defaults are sentinels overwritten as
/// the pipeline reaches its terminal transition; the record is never
/// mutated after the pipeline returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub water_body_id: String,
    /// Date the measurement was processed
    pub measurement_date: NaiveDate,
    /// Acquisition date of the satellite image
    pub image_date: NaiveDate,
    pub sensor: WaterDetectionSensor,
    pub status: WaterDetectionStatus,
    pub algorithm_version: String,
    /// Cloud fraction of the screened scene; 1.0 until screening passes
    pub cloud_coverage: f64,
    /// Current extent area / nominal extent area
    pub water_level: f64,
    /// Catalog cloud cover of the raw acquisition, when the provider has it
    pub cc_orig: f64,
    /// Catalog cloud cover after scene filtering, when the provider has it
    pub cc_clean: f64,
    /// Threshold-selection branch code (0..=4), -1 until detection ran
    pub alg_status: i16,
    /// Measured extent geometry; degenerate point until detection ran
    pub geometry_wkt: String,
    pub image_url: String,
}

impl Measurement {
    pub fn new(
        water_body_id: impl Into<String>,
        image_date: NaiveDate,
        sensor: WaterDetectionSensor,
        algorithm_version: impl Into<String>,
    ) -> Self {
        Self {
            water_body_id: water_body_id.into(),
            measurement_date: Utc::now().date_naive(),
            image_date,
            sensor,
            status: WaterDetectionStatus::UnknownError,
            algorithm_version: algorithm_version.into(),
            cloud_coverage: 1.0,
            water_level: 0.0,
            cc_orig: 0.0,
            cc_clean: 0.0,
            alg_status: -1,
            geometry_wkt: "POINT(0 0)".to_string(),
            image_url: "none".to_string(),
        }
    }
}

/// Error types for water-extent processing
#[derive(Debug, thiserror::Error)]
pub enum WaterError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),
}

/// Result type for water-extent operations
pub type WaterResult<T> = Result<T, WaterError>;
