use crate::core::multitemporal::MultiTemporalFilter;
use crate::core::scale::{from_linear, into_linear};
use crate::core::speckle_filter::{SpeckleFilter, SpeckleFilterParams, SpeckleFilterType};
use crate::types::{BackscatterScale, BandData, Frame, ProcessingError, ProcessingResult, RasterSeries};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether frames are filtered alone or together with their temporal neighbours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterFramework {
    Mono,
    #[default]
    Multi,
}

impl std::str::FromStr for FilterFramework {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MONO" => Ok(FilterFramework::Mono),
            "MULTI" => Ok(FilterFramework::Multi),
            _ => Err(ProcessingError::Config(format!("Unknown filter framework: {}", s))),
        }
    }
}

/// Speckle filtering configuration for one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub filter: SpeckleFilterType,
    pub framework: FilterFramework,
    pub params: SpeckleFilterParams,
    /// Temporal neighbours per frame (MULTI only)
    pub temporal_neighbors: usize,
    /// Scale of the incoming backscatter bands
    pub input_scale: BackscatterScale,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            filter: SpeckleFilterType::Lee,
            framework: FilterFramework::Multi,
            params: SpeckleFilterParams::default(),
            temporal_neighbors: 10,
            input_scale: BackscatterScale::Linear,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> ProcessingResult<()> {
        self.params.validate()?;
        if self.framework == FilterFramework::Multi && self.temporal_neighbors < 1 {
            return Err(ProcessingError::Config(
                "MULTI framework needs at least one temporal neighbour".to_string(),
            ));
        }
        Ok(())
    }
}

/// Speckle filter the selected bands of every frame.
///
/// Timestamps, frame order, geocoding and unselected bands (e.g. `angle`)
/// are carried over unchanged.
pub fn filter_speckle(
    series: &RasterSeries,
    config: &FilterConfig,
    bands: &[&str],
) -> ProcessingResult<RasterSeries> {
    config.validate()?;

    for (idx, band) in bands.iter().enumerate() {
        if bands[..idx].contains(band) {
            return Err(ProcessingError::Config(format!("Band {} listed twice", band)));
        }
    }

    let Some(first) = series.frames().first() else {
        log::warn!("Empty series, nothing to filter");
        return Ok(series.clone());
    };
    for band in bands {
        first.raster.require_band(band)?;
    }

    log::info!(
        "Applying {:?} {:?} speckle filter to {} frames, bands {:?}",
        config.framework,
        config.filter,
        series.len(),
        bands
    );
    log::debug!("Filter configuration: {:?}", config);

    let filter = SpeckleFilter::with_params(config.params.clone())?;

    let mut filtered_bands: Vec<(&str, Vec<BandData>)> = Vec::with_capacity(bands.len());
    for band in bands {
        let stack = series
            .frames()
            .iter()
            .map(|frame| {
                frame
                    .raster
                    .require_band(band)
                    .map(|data| into_linear(data, config.input_scale))
            })
            .collect::<ProcessingResult<Vec<_>>>()?;

        let outputs = match config.framework {
            FilterFramework::Mono => filter_each_frame(&filter, config.filter, &stack)?,
            FilterFramework::Multi => {
                let refs: Vec<&BandData> = stack.iter().collect();
                MultiTemporalFilter::new(filter.clone(), config.filter, config.temporal_neighbors)?
                    .apply(&refs)?
            }
        };

        let outputs: Vec<BandData> = outputs
            .iter()
            .map(|data| from_linear(data, config.input_scale))
            .collect();
        filtered_bands.push((*band, outputs));
    }

    let frames = series
        .frames()
        .iter()
        .enumerate()
        .map(|(t, frame)| {
            let mut raster = frame.raster.clone();
            for (name, outputs) in &filtered_bands {
                raster = raster.with_band_replaced(name, outputs[t].clone())?;
            }
            Ok(Frame {
                time: frame.time,
                orbit_direction: frame.orbit_direction,
                raster,
            })
        })
        .collect::<ProcessingResult<Vec<_>>>()?;

    log::info!("Speckle filtering completed for {} frames", frames.len());
    RasterSeries::new(frames)
}

#[cfg(feature = "parallel")]
fn filter_each_frame(
    filter: &SpeckleFilter,
    filter_type: SpeckleFilterType,
    stack: &[BandData],
) -> ProcessingResult<Vec<BandData>> {
    stack
        .par_iter()
        .map(|band| filter.apply_filter(band, filter_type))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn filter_each_frame(
    filter: &SpeckleFilter,
    filter_type: SpeckleFilterType,
    stack: &[BandData],
) -> ProcessingResult<Vec<BandData>> {
    stack
        .iter()
        .map(|band| filter.apply_filter(band, filter_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Band, Raster};
    use approx::assert_abs_diff_eq;
    use chrono::{TimeZone, Utc};
    use ndarray::Array2;

    fn series_with_angle(n: usize) -> RasterSeries {
        let frames = (0..n)
            .map(|k| {
                let vv = Array2::from_shape_fn((8, 8), |(i, j)| 0.05 + 0.01 * (((i * 3 + j + k) % 7) as f32));
                let angle = Array2::from_elem((8, 8), 38.5);
                let raster = Raster::new(vec![
                    Band { name: "VV".to_string(), data: vv },
                    Band { name: "angle".to_string(), data: angle },
                ])
                .unwrap();
                Frame::new(Utc.with_ymd_and_hms(2020, 1 + k as u32, 1, 0, 0, 0).unwrap(), raster)
            })
            .collect();
        RasterSeries::new(frames).unwrap()
    }

    #[test]
    fn test_config_validation() {
        let mut config = FilterConfig::default();
        assert!(config.validate().is_ok());

        config.params.window_size = 6;
        assert!(matches!(config.validate(), Err(ProcessingError::Config(_))));

        config.params.window_size = 1;
        assert!(config.validate().is_err());

        config.params.window_size = 5;
        config.temporal_neighbors = 0;
        assert!(config.validate().is_err());

        config.framework = FilterFramework::Mono;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unselected_bands_pass_through() {
        let series = series_with_angle(3);
        let config = FilterConfig {
            framework: FilterFramework::Mono,
            params: SpeckleFilterParams { window_size: 3, ..Default::default() },
            ..Default::default()
        };
        let out = filter_speckle(&series, &config, &["VV"]).unwrap();
        assert_eq!(out.timestamps(), series.timestamps());
        for (a, b) in out.frames().iter().zip(series.frames()) {
            assert_eq!(a.raster.band("angle"), b.raster.band("angle"));
            assert_ne!(a.raster.band("VV"), b.raster.band("VV"));
        }
    }

    #[test]
    fn test_decibel_input_round_trips_scale() {
        let frames = (0..4)
            .map(|k| {
                let db = Array2::from_elem((6, 6), -12.0f32);
                Frame::new(
                    Utc.with_ymd_and_hms(2020, 3, 1 + 6 * k, 0, 0, 0).unwrap(),
                    Raster::single_band("VH", db),
                )
            })
            .collect();
        let series = RasterSeries::new(frames).unwrap();
        let config = FilterConfig {
            filter: SpeckleFilterType::GammaMap,
            input_scale: BackscatterScale::Decibel,
            temporal_neighbors: 2,
            ..Default::default()
        };
        let out = filter_speckle(&series, &config, &["VH"]).unwrap();
        for frame in out.frames() {
            for &v in frame.raster.band("VH").unwrap() {
                assert_abs_diff_eq!(v, -12.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_missing_band_is_an_error() {
        let series = series_with_angle(2);
        let result = filter_speckle(&series, &FilterConfig::default(), &["VH"]);
        assert!(matches!(result, Err(ProcessingError::MissingBand(_))));
    }

    #[test]
    fn test_empty_series_passes() {
        let out = filter_speckle(&RasterSeries::default(), &FilterConfig::default(), &["VV"]).unwrap();
        assert!(out.is_empty());
    }
}
