use crate::types::{BandData, ProcessingError, ProcessingResult};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Odd square neighbourhood used for local statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Window {
    size: usize,
}

impl Window {
    /// 3x3 neighbourhood
    pub const SMALLEST: Window = Window { size: 3 };

    /// Create a window; the side must be odd and at least 3
    pub fn new(size: usize) -> ProcessingResult<Self> {
        if size < 3 || size % 2 == 0 {
            return Err(ProcessingError::Config(format!(
                "Window size must be odd and >= 3, got {}",
                size
            )));
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn half(&self) -> usize {
        self.size / 2
    }

    /// Row and column ranges of the window around (i, j), clipped to the raster
    pub fn bounds(&self, shape: (usize, usize), i: usize, j: usize) -> (Range<usize>, Range<usize>) {
        let half = self.half();
        let rows = i.saturating_sub(half)..(i + half + 1).min(shape.0);
        let cols = j.saturating_sub(half)..(j + half + 1).min(shape.1);
        (rows, cols)
    }
}

impl Default for Window {
    fn default() -> Self {
        Window { size: 7 }
    }
}

impl TryFrom<usize> for Window {
    type Error = ProcessingError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Window::new(size)
    }
}

impl From<Window> for usize {
    fn from(window: Window) -> usize {
        window.size
    }
}

/// Statistics of one neighbourhood
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelStats {
    pub mean: f32,
    pub variance: f32,
    /// Number of valid samples that contributed
    pub count: usize,
}

impl PixelStats {
    /// Accumulate finite samples; variance is E[x^2] - E[x]^2 clamped at zero
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = f32>,
    {
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;

        for value in samples {
            if value.is_finite() {
                let v = value as f64;
                sum += v;
                sum_sq += v * v;
                count += 1;
            }
        }

        if count == 0 {
            return Self::default();
        }

        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
        Self {
            mean: mean as f32,
            variance: variance as f32,
            count,
        }
    }

    /// Coefficient of variation sigma/mu; zero when the mean is not positive
    pub fn cv(&self) -> f32 {
        if self.count == 0 || self.mean <= 0.0 {
            0.0
        } else {
            self.variance.sqrt() / self.mean
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Per-pixel local statistics of a band
#[derive(Debug, Clone)]
pub struct LocalStatistics {
    pub mean: Array2<f32>,
    pub variance: Array2<f32>,
}

impl LocalStatistics {
    /// Coefficient of variation per pixel
    pub fn cv(&self) -> Array2<f32> {
        Zip::from(&self.mean)
            .and(&self.variance)
            .map_collect(|&mean, &var| if mean > 0.0 { var.sqrt() / mean } else { 0.0 })
    }
}

/// Statistics of the in-bounds, unmasked part of the window around (i, j)
pub fn window_stats(band: &BandData, window: Window, i: usize, j: usize) -> PixelStats {
    let (rows, cols) = window.bounds(band.dim(), i, j);
    PixelStats::from_samples(
        rows.flat_map(|r| cols.clone().map(move |c| (r, c)))
            .map(|(r, c)| band[[r, c]]),
    )
}

/// Statistics of the window pixels whose offset from the centre passes `keep`
pub fn masked_window_stats<F>(
    band: &BandData,
    window: Window,
    i: usize,
    j: usize,
    keep: F,
) -> PixelStats
where
    F: Fn(isize, isize, f32) -> bool,
{
    let (rows, cols) = window.bounds(band.dim(), i, j);
    let mut samples = Vec::with_capacity(window.size() * window.size());
    for r in rows {
        for c in cols.clone() {
            let value = band[[r, c]];
            let di = r as isize - i as isize;
            let dj = c as isize - j as isize;
            if keep(di, dj, value) {
                samples.push(value);
            }
        }
    }
    PixelStats::from_samples(samples)
}

/// Local mean and variance for every pixel of a band
pub fn local_statistics(band: &BandData, window: Window) -> LocalStatistics {
    log::debug!(
        "Computing {}x{} local statistics over {:?} band",
        window.size(),
        window.size(),
        band.dim()
    );

    let stats = map_pixels(band.dim(), |i, j| window_stats(band, window, i, j));
    LocalStatistics {
        mean: stats.mapv(|s| s.mean),
        variance: stats.mapv(|s| s.variance),
    }
}

/// Evaluate `f` at every pixel of a `shape` grid, in parallel when enabled
#[cfg(feature = "parallel")]
pub(crate) fn map_pixels<T, F>(shape: (usize, usize), f: F) -> Array2<T>
where
    T: Clone + Default + Send + Sync,
    F: Fn(usize, usize) -> T + Sync + Send,
{
    let mut out = Array2::<T>::default(shape);
    Zip::indexed(&mut out).par_for_each(|(i, j), value| *value = f(i, j));
    out
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn map_pixels<T, F>(shape: (usize, usize), f: F) -> Array2<T>
where
    T: Clone + Default + Send + Sync,
    F: Fn(usize, usize) -> T + Sync + Send,
{
    let mut out = Array2::<T>::default(shape);
    Zip::indexed(&mut out).for_each(|(i, j), value| *value = f(i, j));
    out
}

/// Percentile of an ascending slice using linear interpolation between order statistics.
/// `p` is in percent.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !p.is_finite() {
        return None;
    }
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Percentile of the finite values of a band (percent)
pub fn band_percentile(band: &BandData, p: f64) -> Option<f64> {
    let mut values: Vec<f64> = band
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&values, p)
}
