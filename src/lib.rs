//! sarmoist: Sentinel-1 speckle filtering and NDVI smoothing for soil-moisture sites
//!
//! Prepares multi-date SAR backscatter with mono- and multi-temporal speckle
//! filters (Boxcar, Lee, Gamma-MAP, Refined Lee, Lee sigma) and turns irregular
//! NDVI observations into a regular, Savitzky-Golay smoothed series.

pub mod types;
pub mod core;
pub mod temporal;
pub mod io;
pub mod config;
pub mod workflow;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    Band, BandData, BackscatterScale, BoundingBox, Frame, GeoTransform, OrbitDirection,
    Polarization, ProcessingError, ProcessingResult, Raster, RasterSeries,
};

pub use crate::core::{filter_speckle, FilterConfig, FilterFramework, SpeckleFilter, SpeckleFilterParams, SpeckleFilterType};
pub use temporal::{interpolate_and_smooth, interpolate_and_smooth_series, Observation, SmoothingConfig, TimeSeries};
pub use io::{ImagerySource, SeriesRequest, SeriesSink};
pub use config::{RunConfig, SiteConfig};
