//! NDVI time-series gap filling and smoothing
//!
//! Observations are interpolated onto a regular [`TimeGrid`], smoothed with a
//! Savitzky-Golay local polynomial fit and finally clipped to a percentile band.

pub mod grid;
pub mod interpolate;
pub mod outlier;
pub mod savitzky_golay;

pub use grid::TimeGrid;
pub use interpolate::{InterpolationNode, TemporalInterpolator};
pub use outlier::OutlierClipper;
pub use savitzky_golay::SavitzkyGolaySmoother;

use crate::core::statistics::map_pixels;
use crate::types::{Frame, ProcessingError, ProcessingResult, Raster, RasterSeries};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Time weighting inside the smoothing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWeighting {
    #[default]
    Uniform,
    Tricube,
}

impl TimeWeighting {
    /// Weight of a sample at normalized offset `x` in [-1, 1]
    pub fn weight(&self, x: f64) -> f64 {
        match self {
            TimeWeighting::Uniform => 1.0,
            TimeWeighting::Tricube => {
                let a = x.abs();
                if a >= 1.0 {
                    0.0
                } else {
                    (1.0 - a * a * a).powi(3)
                }
            }
        }
    }
}

/// Interpolation, smoothing and clipping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub grid_interval_days: u32,
    /// Max distance in days to a bracketing observation
    pub interpolation_window_days: u32,
    pub savgol_half_width_days: u32,
    pub savgol_order: usize,
    pub weighting: TimeWeighting,
    pub percentile_low: f64,
    pub percentile_high: f64,
    /// Grid start; defaults to the first observation
    pub start: Option<DateTime<Utc>>,
    /// Grid end; defaults to the last observation
    pub end: Option<DateTime<Utc>>,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            grid_interval_days: 5,
            interpolation_window_days: 45,
            savgol_half_width_days: 60,
            savgol_order: 3,
            weighting: TimeWeighting::Uniform,
            percentile_low: 5.0,
            percentile_high: 95.0,
            start: None,
            end: None,
        }
    }
}

impl SmoothingConfig {
    pub fn validate(&self) -> ProcessingResult<()> {
        if self.grid_interval_days == 0 {
            return Err(ProcessingError::Config(
                "Grid interval must be at least one day".to_string(),
            ));
        }
        if self.savgol_half_width_days == 0 {
            return Err(ProcessingError::Config(
                "Savitzky-Golay half width must be at least one day".to_string(),
            ));
        }
        OutlierClipper::new(self.percentile_low, self.percentile_high)?;
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Err(ProcessingError::Config(format!(
                    "Smoothing end {} is before start {}",
                    end, start
                )));
            }
        }
        Ok(())
    }

    /// Grid spanning the configured range, or `observed` where a bound is unset
    fn grid(&self, observed: Option<(DateTime<Utc>, DateTime<Utc>)>) -> ProcessingResult<TimeGrid> {
        let start = self.start.or(observed.map(|(first, _)| first));
        let end = self.end.or(observed.map(|(_, last)| last));
        match (start, end) {
            (Some(start), Some(end)) => TimeGrid::new(start, end, self.grid_interval_days),
            _ => Err(ProcessingError::InsufficientData(
                "No observations and no grid bounds configured".to_string(),
            )),
        }
    }
}

/// A dated scalar sample; NaN is masked
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// How a grid value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillState {
    /// Bracketed by samples on both sides
    Interpolated,
    /// Only one side had a sample in the window; low confidence
    NearestOnly,
    /// No sample in the window
    Gap,
    /// Removed by outlier clipping
    Clipped,
}

/// Value at one grid point; `None` is masked
#[derive(Debug, Clone, PartialEq)]
pub struct GridValue {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
    pub fill: FillState,
}

/// Regularly gridded, smoothed series
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    values: Vec<GridValue>,
}

impl TimeSeries {
    pub fn values(&self) -> &[GridValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.values.iter().map(|gv| gv.time).collect()
    }

    /// Strict lookup: a masked grid point is a [`ProcessingError::Gap`]
    pub fn value_at(&self, time: DateTime<Utc>) -> ProcessingResult<f64> {
        let point = self
            .values
            .iter()
            .find(|gv| gv.time == time)
            .ok_or_else(|| ProcessingError::Config(format!("{} is not a grid point", time)))?;
        point.value.ok_or(ProcessingError::Gap { time })
    }

    pub fn masked_count(&self) -> usize {
        self.values.iter().filter(|gv| gv.value.is_none()).count()
    }
}

/// Interpolator, smoother and clipper built once from a validated config
#[derive(Debug, Clone)]
struct SmoothingChain {
    interpolator: TemporalInterpolator,
    smoother: SavitzkyGolaySmoother,
    clipper: OutlierClipper,
}

impl SmoothingChain {
    fn new(config: &SmoothingConfig) -> ProcessingResult<Self> {
        config.validate()?;
        Ok(Self {
            interpolator: TemporalInterpolator::new(config.interpolation_window_days),
            smoother: SavitzkyGolaySmoother::new(
                config.savgol_half_width_days,
                config.savgol_order,
                config.weighting,
            )?,
            clipper: OutlierClipper::new(config.percentile_low, config.percentile_high)?,
        })
    }

    fn run(&self, observations: &[Observation], grid: &TimeGrid) -> Vec<GridValue> {
        let filled = self.interpolator.interpolate(observations, grid);
        let smoothed = self.smoother.smooth(&filled);
        self.clipper.clip(&smoothed)
    }
}

fn observed_range(times: impl IntoIterator<Item = DateTime<Utc>>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    times.into_iter().fold(None, |range, t| match range {
        None => Some((t, t)),
        Some((first, last)) => Some((first.min(t), last.max(t))),
    })
}

/// Interpolate, smooth and clip one scalar series
pub fn interpolate_and_smooth(
    observations: &[Observation],
    config: &SmoothingConfig,
) -> ProcessingResult<TimeSeries> {
    let chain = SmoothingChain::new(config)?;
    let grid = config.grid(observed_range(observations.iter().map(|o| o.time)))?;

    log::debug!(
        "Smoothing {} observations onto {} grid points",
        observations.len(),
        grid.len()
    );

    let values = chain.run(observations, &grid);
    let series = TimeSeries { values };
    if series.masked_count() > 0 {
        log::debug!("{} of {} grid points masked", series.masked_count(), series.len());
    }
    Ok(series)
}

/// Per-pixel form of [`interpolate_and_smooth`] over one band of a series.
///
/// The result has one single-band frame per grid point, masked pixels as NaN,
/// and keeps the input geocoding. An empty series with configured bounds
/// yields a 1x1 fully masked frame per grid point.
pub fn interpolate_and_smooth_series(
    series: &RasterSeries,
    band: &str,
    config: &SmoothingConfig,
) -> ProcessingResult<RasterSeries> {
    let chain = SmoothingChain::new(config)?;
    let grid = config.grid(observed_range(series.timestamps()))?;

    let Some(first) = series.frames().first() else {
        log::warn!(
            "No {} observations, emitting {} fully masked grid frames",
            band,
            grid.len()
        );
        let frames = grid
            .times()
            .iter()
            .map(|&time| Frame::new(time, Raster::single_band(band, Array2::from_elem((1, 1), f32::NAN))))
            .collect();
        return RasterSeries::new(frames);
    };
    let shape = first.raster.shape();
    let geo_transform = first.raster.geo_transform().copied();
    let stack = series
        .frames()
        .iter()
        .map(|frame| frame.raster.require_band(band).map(|data| (frame.time, data)))
        .collect::<ProcessingResult<Vec<_>>>()?;

    log::info!(
        "Smoothing band {} of {} frames onto {} grid points ({}x{} pixels)",
        band,
        stack.len(),
        grid.len(),
        shape.0,
        shape.1
    );

    let per_pixel: Array2<Vec<Option<f64>>> = map_pixels(shape, |i, j| {
        let observations: Vec<Observation> = stack
            .iter()
            .map(|(time, data)| Observation {
                time: *time,
                value: data[[i, j]] as f64,
            })
            .collect();
        chain
            .run(&observations, &grid)
            .into_iter()
            .map(|gv| gv.value)
            .collect()
    });

    let frames = grid
        .times()
        .iter()
        .enumerate()
        .map(|(g, &time)| {
            let data = per_pixel.map(|values| values[g].map_or(f32::NAN, |v| v as f32));
            let mut raster = Raster::single_band(band, data);
            if let Some(gt) = geo_transform {
                raster = raster.with_geo_transform(gt);
            }
            Frame::new(time, raster)
        })
        .collect();

    RasterSeries::new(frames)
}
