//! Run configuration loaded from JSON

use crate::core::pipeline::FilterConfig;
use crate::io::SeriesRequest;
use crate::temporal::SmoothingConfig;
use crate::types::{
    BoundingBox, OrbitDirection, Polarization, ProcessingError, ProcessingResult, METERS_PER_DEGREE,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Field site given as a point and a buffer radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    /// Buffer radius around the point in meters
    pub buffer_m: f64,
}

impl SiteConfig {
    pub fn validate(&self) -> ProcessingResult<()> {
        if !(-180.0..=180.0).contains(&self.lon) || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ProcessingError::Config(format!(
                "Site {} has invalid coordinates ({}, {})",
                self.name, self.lon, self.lat
            )));
        }
        if !(self.buffer_m.is_finite() && self.buffer_m >= 0.0) {
            return Err(ProcessingError::Config(format!(
                "Site {} has invalid buffer {}",
                self.name, self.buffer_m
            )));
        }
        Ok(())
    }

    /// Square footprint covering the buffered point
    pub fn footprint(&self) -> BoundingBox {
        let dlat = self.buffer_m / METERS_PER_DEGREE;
        let dlon = self.buffer_m / (METERS_PER_DEGREE * self.lat.to_radians().cos().max(1e-6));
        BoundingBox {
            min_lon: self.lon - dlon,
            max_lon: self.lon + dlon,
            min_lat: self.lat - dlat,
            max_lat: self.lat + dlat,
        }
    }
}

/// Everything one preparation run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub site: SiteConfig,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_polarizations")]
    pub polarizations: Vec<Polarization>,
    #[serde(default)]
    pub orbit_direction: Option<OrbitDirection>,
    /// Bands copied through unfiltered, e.g. the incidence angle
    #[serde(default = "default_auxiliary_bands")]
    pub auxiliary_bands: Vec<String>,
    #[serde(default)]
    pub speckle: FilterConfig,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    /// Export pixel size in meters
    #[serde(default = "default_export_scale")]
    pub export_scale: f64,
}

fn default_polarizations() -> Vec<Polarization> {
    vec![Polarization::VV, Polarization::VH]
}

fn default_auxiliary_bands() -> Vec<String> {
    vec!["angle".to_string()]
}

fn default_export_scale() -> f64 {
    10.0
}

impl RunConfig {
    pub fn from_json_str(text: &str) -> ProcessingResult<Self> {
        let config: RunConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ProcessingResult<Self> {
        log::info!("Loading run configuration from {}", path.as_ref().display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> ProcessingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ProcessingResult<()> {
        self.site.validate()?;
        if self.end < self.start {
            return Err(ProcessingError::Config(format!(
                "Run end {} is before start {}",
                self.end, self.start
            )));
        }
        if self.polarizations.is_empty() {
            return Err(ProcessingError::Config(
                "At least one polarization is required".to_string(),
            ));
        }
        if !(self.export_scale.is_finite() && self.export_scale > 0.0) {
            return Err(ProcessingError::Config(format!(
                "Export scale must be positive, got {}",
                self.export_scale
            )));
        }
        self.speckle.validate()?;
        self.smoothing.validate()
    }

    /// Band names of the configured polarizations
    pub fn backscatter_bands(&self) -> Vec<&str> {
        self.polarizations.iter().map(|p| p.band_name()).collect()
    }

    /// Imagery request for the site footprint and run period
    pub fn series_request(&self) -> SeriesRequest {
        let mut bands: Vec<String> = self.backscatter_bands().iter().map(|b| b.to_string()).collect();
        bands.extend(self.auxiliary_bands.iter().cloned());
        SeriesRequest {
            footprint: self.site.footprint(),
            start: self.start,
            end: self.end,
            bands,
            polarizations: self.polarizations.clone(),
            orbit_direction: self.orbit_direction,
        }
    }
}
