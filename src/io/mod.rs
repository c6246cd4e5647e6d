//! External-collaborator interfaces.
//!
//! Imagery, cloud-mask and elevation acquisition are specified only by the
//! traits they present; concrete catalog clients, storage and rendering
//! live outside this crate.

pub mod provider;

pub use provider::{
    AcquisitionError, ElevationProvider, ImageryProvider, IndexScene, SceneRequest,
};
