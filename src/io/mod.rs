//! Imagery sources and export sinks

pub mod memory;
#[cfg(feature = "geotiff")]
pub mod geotiff;

pub use memory::{InMemorySink, InMemorySource, SeriesExport};
#[cfg(feature = "geotiff")]
pub use geotiff::GeoTiffSink;

use crate::types::{
    BoundingBox, OrbitDirection, Polarization, ProcessingError, ProcessingResult, RasterSeries,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query for a series of rasters over a footprint and date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRequest {
    pub footprint: BoundingBox,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Bands to return; empty means every band
    #[serde(default)]
    pub bands: Vec<String>,
    /// Only frames carrying every one of these polarization bands
    #[serde(default)]
    pub polarizations: Vec<Polarization>,
    #[serde(default)]
    pub orbit_direction: Option<OrbitDirection>,
}

impl SeriesRequest {
    pub fn validate(&self) -> ProcessingResult<()> {
        if self.end < self.start {
            return Err(ProcessingError::Config(format!(
                "Request end {} is before start {}",
                self.end, self.start
            )));
        }
        if self.footprint.min_lon > self.footprint.max_lon
            || self.footprint.min_lat > self.footprint.max_lat
        {
            return Err(ProcessingError::Config(format!(
                "Degenerate footprint {:?}",
                self.footprint
            )));
        }
        Ok(())
    }

    /// Bands each returned frame carries, `None` for all of them
    pub fn selected_bands(&self) -> Option<Vec<&str>> {
        if self.bands.is_empty() {
            return None;
        }
        let mut bands: Vec<&str> = self.bands.iter().map(String::as_str).collect();
        for pol in &self.polarizations {
            if !bands.contains(&pol.band_name()) {
                bands.push(pol.band_name());
            }
        }
        Some(bands)
    }
}

/// Provider of dated rasters
pub trait ImagerySource {
    fn fetch_series(&self, request: &SeriesRequest) -> ProcessingResult<RasterSeries>;
}

/// Destination for processed series
pub trait SeriesSink {
    /// `scale` is the output pixel size in meters, `region` the export extent
    fn export_series(
        &mut self,
        series: &RasterSeries,
        destination: &str,
        scale: f64,
        region: &BoundingBox,
    ) -> ProcessingResult<()>;
}

pub(crate) fn check_export_args(destination: &str, scale: f64) -> ProcessingResult<()> {
    if destination.trim().is_empty() {
        return Err(ProcessingError::Export("Empty export destination".to_string()));
    }
    if !(scale.is_finite() && scale > 0.0) {
        return Err(ProcessingError::Config(format!(
            "Export scale must be positive, got {}",
            scale
        )));
    }
    Ok(())
}
