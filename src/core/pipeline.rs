//! Measurement orchestration: acquisition validation, cloud screening,
//! detection and elevation veto, classified into terminal statuses.
//!
//! One unit of work is one (water body, date) pair, processed
//! synchronously; there are no retries and no shared state between
//! units, so callers may run many units concurrently without
//! coordination.

use chrono::NaiveDate;
use geo::{Area, Geometry, MultiPolygon};
use wkt::{ToWkt, TryFromWkt};

use crate::core::{dem_veto, extent, resolution, threshold::ThresholdParams};
use crate::core::threshold::ThresholdSelector;
use crate::io::provider::{ElevationProvider, ImageryProvider, SceneRequest};
use crate::types::{
    Measurement, WaterBody, WaterDetectionSensor, WaterDetectionStatus, WaterError, WaterResult,
};

/// Version tag stamped on every measurement record.
pub const WATER_DETECTOR_VERSION: &str = "v0.2";

/// Caller-controlled pipeline parameters; every threshold that gates a
/// unit of work lives here, not in module constants, so runs are
/// reproducible from the configuration alone.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub algorithm_version: String,
    /// Bounding-box inflation per side, fraction of width/height
    pub inflate_bbox: f64,
    /// Catalog-side max cloud cover passed to the acquisition request
    pub max_search_cloud_cover: f64,
    /// Minimum fraction of valid-flagged pixels in the index scene
    pub min_valid_fraction: f64,
    /// Maximum tolerated cloud fraction of the screened scene
    pub max_cloud_fraction: f64,
    /// Elevation margin for the DEM veto, meters
    pub dem_threshold: f32,
    /// Simplify output polygons to the WKT budget
    pub simplify: bool,
    pub threshold: ThresholdParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            algorithm_version: WATER_DETECTOR_VERSION.to_string(),
            inflate_bbox: resolution::DEFAULT_INFLATE,
            max_search_cloud_cover: 0.5,
            min_valid_fraction: 0.98,
            max_cloud_fraction: 0.20,
            dem_threshold: dem_veto::DEFAULT_DEM_THRESHOLD,
            simplify: true,
            threshold: ThresholdParams::default(),
        }
    }
}

/// Scene fields known once the cloud screen has passed; they belong on
/// the record even when the detection itself then fails.
struct ScreenedScene {
    image_date: NaiveDate,
    cloud_coverage: f64,
    cc_orig: f64,
    cc_clean: f64,
    image_url: Option<String>,
}

/// Fields of a successful detection, carried between the detection run
/// and the single terminal write of the measurement record.
struct ValidDetection {
    scene: ScreenedScene,
    water_level: f64,
    geometry_wkt: String,
    alg_status: i16,
}

/// Tagged terminal outcome of one detection run; the measurement record
/// is written exactly once from this, which keeps every status
/// transition unambiguous. Rejections past the cloud screen still carry
/// the screened scene.
enum Outcome {
    Rejected(WaterDetectionStatus, Option<ScreenedScene>),
    Valid(Box<ValidDetection>),
}

/// Per-(water body, date) measurement pipeline over an imagery and an
/// elevation provider.
pub struct MeasurementPipeline<P, E> {
    imagery: P,
    elevation: E,
    config: PipelineConfig,
}

impl<P: ImageryProvider, E: ElevationProvider> MeasurementPipeline<P, E> {
    pub fn new(imagery: P, elevation: E) -> Self {
        Self::with_config(imagery, elevation, PipelineConfig::default())
    }

    pub fn with_config(imagery: P, elevation: E, config: PipelineConfig) -> Self {
        Self {
            imagery,
            elevation,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full detection for one (water body, date) pair.
    ///
    /// Acquisition failures and data-quality rejections become terminal
    /// statuses on the returned record; `Err` is reserved for contract
    /// violations such as a nominal outline without valid bounds.
    pub fn measure(&self, water_body: &WaterBody, date: NaiveDate) -> WaterResult<Measurement> {
        log::info!("measuring water body {} on {}", water_body.id, date);

        let frame = resolution::plan_frame(&water_body.nominal, self.config.inflate_bbox)?;
        let (cloud_res_x, cloud_res_y) = resolution::cloud_resolution(frame.res_x, frame.res_y);
        let cloud_frame = frame.with_resolution(cloud_res_x, cloud_res_y)?;

        let mut measurement = Measurement::new(
            &water_body.id,
            date,
            WaterDetectionSensor::S2Ndwi,
            &self.config.algorithm_version,
        );

        match self.run_detection(water_body, date, &frame, &cloud_frame) {
            Outcome::Rejected(status, scene) => {
                log::info!("water body {} on {}: {}", water_body.id, date, status);
                if let Some(scene) = scene {
                    apply_scene(&mut measurement, scene);
                }
                measurement.status = status;
            }
            Outcome::Valid(valid) => {
                measurement.status = WaterDetectionStatus::MeasurementValid;
                apply_scene(&mut measurement, valid.scene);
                measurement.water_level = valid.water_level;
                measurement.geometry_wkt = valid.geometry_wkt;
                measurement.alg_status = valid.alg_status;
                log::info!(
                    "water body {} on {}: water level {:.3}",
                    water_body.id,
                    date,
                    measurement.water_level
                );
            }
        }

        debug_assert_ne!(measurement.status, WaterDetectionStatus::UnknownError);
        Ok(measurement)
    }

    fn run_detection(
        &self,
        water_body: &WaterBody,
        date: NaiveDate,
        frame: &crate::types::GeoFrame,
        cloud_frame: &crate::types::GeoFrame,
    ) -> Outcome {
        let request = SceneRequest {
            frame: *frame,
            date,
            max_cloud_cover: self.config.max_search_cloud_cover,
        };

        let scene = match self.imagery.fetch_index(&request) {
            Ok(scene) => scene,
            Err(e) => {
                log::warn!("index acquisition failed: {}", e);
                return Outcome::Rejected(WaterDetectionStatus::ShRequestError, None);
            }
        };

        if scene.is_empty() {
            return Outcome::Rejected(WaterDetectionStatus::ShNoData, None);
        }

        let valid_fraction =
            scene.valid.iter().filter(|&&v| v).count() as f64 / scene.valid.len() as f64;
        if valid_fraction < self.config.min_valid_fraction {
            log::debug!(
                "valid-pixel fraction {:.3} below {:.2}",
                valid_fraction,
                self.config.min_valid_fraction
            );
            return Outcome::Rejected(WaterDetectionStatus::InvalidData, None);
        }

        let cloud_request = SceneRequest {
            frame: *cloud_frame,
            date,
            max_cloud_cover: self.config.max_search_cloud_cover,
        };
        let clouds = match self.imagery.fetch_cloud_mask(&cloud_request) {
            Ok(mask) => mask,
            Err(e) => {
                log::warn!("cloud classification failed: {}", e);
                return Outcome::Rejected(WaterDetectionStatus::ShRequestError, None);
            }
        };

        if clouds.is_empty() {
            return Outcome::Rejected(WaterDetectionStatus::ShNoCloudData, None);
        }

        let cloud_fraction = clouds.iter().filter(|&&c| c).count() as f64 / clouds.len() as f64;
        if cloud_fraction > self.config.max_cloud_fraction {
            log::debug!(
                "cloud fraction {:.3} above {:.2}",
                cloud_fraction,
                self.config.max_cloud_fraction
            );
            return Outcome::Rejected(WaterDetectionStatus::TooCloudy, None);
        }

        let screened = ScreenedScene {
            image_date: scene.image_date,
            cloud_coverage: cloud_fraction,
            cc_orig: scene.cc_orig,
            cc_clean: scene.cc_clean,
            image_url: scene.image_url.clone(),
        };

        let selector = ThresholdSelector::with_params(self.config.threshold.clone());
        let decision = selector.select(&scene.index);
        let extent = extent::extract(
            &decision.mask,
            &water_body.nominal,
            frame,
            self.config.simplify,
        );

        let level = match water_level(&extent, &water_body.nominal) {
            Ok(level) => level,
            Err(e) => {
                log::warn!("water-level ratio failed: {}", e);
                return Outcome::Rejected(WaterDetectionStatus::InvalidPolygon, Some(screened));
            }
        };

        Outcome::Valid(Box::new(ValidDetection {
            scene: screened,
            water_level: level,
            geometry_wkt: extent.wkt_string(),
            alg_status: decision.status.code(),
        }))
    }

    /// Secondary entry point: re-filter an already-valid measurement with
    /// the elevation veto.
    ///
    /// The input record is never mutated; a clone carries the vetoed
    /// water level and geometry, or the failure status, on every exit
    /// path.
    pub fn measure_with_dem_veto(
        &self,
        measurement: &Measurement,
        water_body: &WaterBody,
    ) -> WaterResult<Measurement> {
        if measurement.status != WaterDetectionStatus::MeasurementValid {
            return Err(WaterError::Processing(format!(
                "DEM veto requires a valid measurement, got status {}",
                measurement.status
            )));
        }

        let frame = resolution::plan_frame(&water_body.nominal, self.config.inflate_bbox)?;

        let mut vetoed = measurement.clone();
        vetoed.sensor = WaterDetectionSensor::S2NdwiDem;

        let request = SceneRequest {
            frame,
            date: measurement.image_date,
            max_cloud_cover: self.config.max_search_cloud_cover,
        };
        let dem = match self.elevation.fetch_elevation(&request) {
            Ok(dem) => dem,
            Err(e) => {
                log::warn!("elevation acquisition failed: {}", e);
                vetoed.status = WaterDetectionStatus::ShRequestError;
                return Ok(vetoed);
            }
        };

        if dem.is_empty() {
            vetoed.status = WaterDetectionStatus::ShNoData;
            return Ok(vetoed);
        }

        let current = match Geometry::<f64>::try_from_wkt_str(&measurement.geometry_wkt) {
            Ok(geometry) => geometry,
            Err(e) => {
                log::warn!("stored extent geometry does not parse: {}", e);
                vetoed.status = WaterDetectionStatus::InvalidPolygon;
                return Ok(vetoed);
            }
        };

        let extent = dem_veto::apply(
            &dem,
            &water_body.nominal,
            &current,
            &frame,
            self.config.dem_threshold,
            self.config.simplify,
        );

        match water_level(&extent, &water_body.nominal) {
            Ok(level) => {
                vetoed.water_level = level;
                vetoed.geometry_wkt = extent.wkt_string();
            }
            Err(e) => {
                log::warn!("vetoed water-level ratio failed: {}", e);
                vetoed.status = WaterDetectionStatus::InvalidPolygon;
            }
        }

        Ok(vetoed)
    }
}

fn apply_scene(measurement: &mut Measurement, scene: ScreenedScene) {
    measurement.image_date = scene.image_date;
    measurement.cloud_coverage = scene.cloud_coverage;
    measurement.cc_orig = scene.cc_orig;
    measurement.cc_clean = scene.cc_clean;
    if let Some(url) = scene.image_url {
        measurement.image_url = url;
    }
}

/// Current extent area over nominal area, both in planar square degrees.
fn water_level(extent: &Geometry<f64>, nominal: &MultiPolygon<f64>) -> WaterResult<f64> {
    let nominal_area = nominal.unsigned_area();
    if !(nominal_area > 0.0) {
        return Err(WaterError::InvalidGeometry(
            "nominal polygon has zero area".to_string(),
        ));
    }

    let extent_area = match extent {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        // the degenerate no-water case
        Geometry::Point(_) => 0.0,
        other => {
            return Err(WaterError::InvalidGeometry(format!(
                "extent geometry has no area: {:?}",
                other
            )))
        }
    };

    Ok(extent_area / nominal_area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};

    fn nominal() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 4.0),
            (x: 0.0, y: 4.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    #[test]
    fn water_level_is_area_ratio() {
        let half = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 2.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ]);
        let level = water_level(&half, &nominal()).unwrap();
        assert!((level - 0.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_point_extent_is_zero_level() {
        let point = Geometry::Point(Point::new(0.0, 0.0));
        assert_eq!(water_level(&point, &nominal()).unwrap(), 0.0);
    }

    #[test]
    fn zero_area_nominal_is_rejected() {
        let empty = MultiPolygon::<f64>::new(vec![]);
        let point = Geometry::Point(Point::new(0.0, 0.0));
        assert!(water_level(&point, &empty).is_err());
    }

    #[test]
    fn default_config_matches_operating_thresholds() {
        let config = PipelineConfig::default();
        assert_eq!(config.min_valid_fraction, 0.98);
        assert_eq!(config.max_cloud_fraction, 0.20);
        assert_eq!(config.max_search_cloud_cover, 0.5);
        assert_eq!(config.dem_threshold, 15.0);
        assert!(config.simplify);
    }
}
