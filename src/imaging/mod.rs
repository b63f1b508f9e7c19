//! Image processing: the backend capability the core calls into.
//!
//! | Concern | Where |
//! |---|---|
//! | **Geometry** | [`calculations`]: resize, crop, offset and rotation math |
//! | **Arguments** | `params`: typed operation arguments, quality, formats |
//! | **Backend** | [`ImageBackend`] trait, [`RustBackend`], [`FastBackend`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backends**: pixel work on `image::DynamicImage` handles

pub mod backend;
pub mod calculations;
pub mod fast_backend;
mod params;
pub mod rust_backend;

use crate::config::Driver;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use fast_backend::FastBackend;
pub use params::{
    BackgroundArgs, Color, CropArgs, FlipDirection, Master, Offset, OutputFormat, Quality,
    ReflectionArgs, ResizeArgs, WatermarkArgs,
};
pub use rust_backend::{RustBackend, supported_input_extensions};

/// Instantiate the backend selected by `driver`.
pub fn backend_for(driver: Driver) -> Box<dyn ImageBackend> {
    match driver {
        Driver::Image => Box::new(RustBackend::new()),
        Driver::Fast => Box::new(FastBackend::new()),
    }
}
