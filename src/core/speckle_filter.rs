use crate::core::statistics::{band_percentile, map_pixels, masked_window_stats, window_stats, PixelStats, Window};
use crate::types::{BandData, ProcessingError, ProcessingResult};
use serde::{Deserialize, Serialize};

/// Speckle filtering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeckleFilterParams {
    /// Filter window size (must be odd)
    pub window_size: usize,
    /// Equivalent number of looks of the input
    pub num_looks: f32,
    /// Percentile above which a pixel may be a strong point scatterer (Lee sigma)
    pub strong_scatterer_percentile: f64,
    /// Bright 3x3 neighbours needed to keep a strong scatterer unfiltered (Lee sigma)
    pub strong_scatterer_count: usize,
}

impl Default for SpeckleFilterParams {
    fn default() -> Self {
        Self {
            window_size: 7,                    // 7x7 window
            num_looks: 5.0,                    // Sentinel-1 GRD IW
            strong_scatterer_percentile: 98.0,
            strong_scatterer_count: 7,
        }
    }
}

impl SpeckleFilterParams {
    pub fn validate(&self) -> ProcessingResult<()> {
        Window::new(self.window_size)?;
        if !(self.num_looks.is_finite() && self.num_looks > 0.0) {
            return Err(ProcessingError::Config(format!(
                "Number of looks must be positive, got {}",
                self.num_looks
            )));
        }
        if !(0.0..=100.0).contains(&self.strong_scatterer_percentile) {
            return Err(ProcessingError::Config(format!(
                "Strong scatterer percentile must be within [0, 100], got {}",
                self.strong_scatterer_percentile
            )));
        }
        Ok(())
    }
}

/// Available speckle filter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeckleFilterType {
    /// Plain local mean
    Boxcar,
    /// Lee filter (adaptive)
    Lee,
    /// Gamma MAP filter (Maximum A Posteriori)
    GammaMap,
    /// Refined Lee filter (directional)
    RefinedLee,
    /// Lee Sigma filter (sigma-range subset)
    LeeSigma,
}

impl std::str::FromStr for SpeckleFilterType {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace(' ', "_").replace('-', "_").as_str() {
            "BOXCAR" => Ok(SpeckleFilterType::Boxcar),
            "LEE" => Ok(SpeckleFilterType::Lee),
            "GAMMA_MAP" => Ok(SpeckleFilterType::GammaMap),
            "REFINED_LEE" => Ok(SpeckleFilterType::RefinedLee),
            "LEE_SIGMA" => Ok(SpeckleFilterType::LeeSigma),
            _ => Err(ProcessingError::Config(format!("Unknown speckle filter: {}", s))),
        }
    }
}

/// Directional half-window used by the Refined Lee filter.
///
/// Each direction keeps the window pixels lying on its side of the line
/// through the centre, centre line included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// (row, col) step pointing into the half-window
    fn step(&self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::NorthEast => (-1, 1),
            Direction::East => (0, 1),
            Direction::SouthEast => (1, 1),
            Direction::South => (1, 0),
            Direction::SouthWest => (1, -1),
            Direction::West => (0, -1),
            Direction::NorthWest => (-1, -1),
        }
    }

    /// Whether the offset (di, dj) from the centre belongs to this half-window
    pub fn contains(&self, di: isize, dj: isize) -> bool {
        let (si, sj) = self.step();
        di * si + dj * sj >= 0
    }
}

/// Lee correction factor k = 1 - Cu^2/CV^2, clamped to [0, 1].
/// Homogeneous patches (CV <= Cu) get k = 0.
pub fn lee_weight(cv: f32, cu: f32) -> f32 {
    if !cv.is_finite() || cv <= cu || cv <= 0.0 {
        return 0.0;
    }
    (1.0 - (cu * cu) / (cv * cv)).clamp(0.0, 1.0)
}

/// Lee estimate of `center` from the statistics of its neighbourhood
fn lee_estimate(center: f32, stats: &PixelStats, cu: f32) -> f32 {
    if stats.is_empty() || stats.mean <= 0.0 {
        return center;
    }
    let k = lee_weight(stats.cv(), cu);
    (stats.mean + k * (center - stats.mean)).max(0.0)
}

/// Sigma-range bounds (A1, A2) and the range-adjusted speckle CV for a 90% sigma
fn sigma_range_table(num_looks: f32) -> (f32, f32, f32) {
    match num_looks.round().clamp(1.0, 4.0) as u32 {
        1 => (0.436, 1.920, 0.4057),
        2 => (0.582, 1.584, 0.2763),
        3 => (0.652, 1.464, 0.2251),
        _ => (0.694, 1.385, 0.1964),
    }
}

/// Speckle filter processor
#[derive(Debug, Clone)]
pub struct SpeckleFilter {
    params: SpeckleFilterParams,
    window: Window,
}

impl SpeckleFilter {
    /// Create a new speckle filter with default parameters
    pub fn new() -> Self {
        Self {
            params: SpeckleFilterParams::default(),
            window: Window::default(),
        }
    }

    /// Create a speckle filter with custom parameters
    pub fn with_params(params: SpeckleFilterParams) -> ProcessingResult<Self> {
        params.validate()?;
        let window = Window::new(params.window_size)?;
        Ok(Self { params, window })
    }

    pub fn params(&self) -> &SpeckleFilterParams {
        &self.params
    }

    /// Speckle coefficient of variation Cu = 1/sqrt(L)
    pub fn speckle_cv(&self) -> f32 {
        1.0 / self.params.num_looks.sqrt()
    }

    /// Apply speckle filtering to one linear-scale band
    pub fn apply_filter(
        &self,
        image: &BandData,
        filter_type: SpeckleFilterType,
    ) -> ProcessingResult<BandData> {
        log::debug!(
            "Applying {:?} speckle filter to {:?} band",
            filter_type,
            image.dim()
        );
        log::trace!("Filter parameters: {:?}", self.params);

        if image.is_empty() {
            return Ok(image.clone());
        }

        let filtered = match filter_type {
            SpeckleFilterType::Boxcar => self.apply_boxcar_filter(image),
            SpeckleFilterType::Lee => self.apply_lee_filter(image),
            SpeckleFilterType::GammaMap => self.apply_gamma_map_filter(image),
            SpeckleFilterType::RefinedLee => self.apply_refined_lee_filter(image),
            SpeckleFilterType::LeeSigma => self.apply_lee_sigma_filter(image),
        };

        Ok(filtered)
    }

    /// Plain local mean
    fn apply_boxcar_filter(&self, image: &BandData) -> BandData {
        let window = self.window;
        map_pixels(image.dim(), |i, j| {
            let center = image[[i, j]];
            if !center.is_finite() {
                return center;
            }
            let stats = window_stats(image, window, i, j);
            if stats.is_empty() {
                center
            } else {
                stats.mean
            }
        })
    }

    /// Lee filter (adaptive)
    fn apply_lee_filter(&self, image: &BandData) -> BandData {
        let window = self.window;
        let cu = self.speckle_cv();
        map_pixels(image.dim(), |i, j| {
            let center = image[[i, j]];
            if !center.is_finite() {
                return center;
            }
            lee_estimate(center, &window_stats(image, window, i, j), cu)
        })
    }

    /// Gamma MAP filter with homogeneous / textured / point-target regions
    fn apply_gamma_map_filter(&self, image: &BandData) -> BandData {
        let window = self.window;
        let looks = self.params.num_looks;
        let cu = self.speckle_cv();
        let cmax = std::f32::consts::SQRT_2 * cu;

        map_pixels(image.dim(), |i, j| {
            let center = image[[i, j]];
            if !center.is_finite() {
                return center;
            }
            let stats = window_stats(image, window, i, j);
            if stats.is_empty() || stats.mean <= 0.0 {
                return center;
            }

            let cv = stats.cv();
            if cv <= cu {
                // Homogeneous area - use mean
                stats.mean
            } else if cv < cmax {
                let mean = stats.mean;
                let alpha = (1.0 + cu * cu) / (cv * cv - cu * cu);
                let b = alpha - looks - 1.0;
                let disc = mean * mean * b * b + 4.0 * alpha * looks * center * mean;
                ((b * mean + disc.max(0.0).sqrt()) / (2.0 * alpha)).max(0.0)
            } else {
                // Strong scatterer or edge - preserve original
                center
            }
        })
    }

    /// Refined Lee filter: Lee correction on the minimum-variance half-window
    fn apply_refined_lee_filter(&self, image: &BandData) -> BandData {
        let window = self.window;
        let cu = self.speckle_cv();
        map_pixels(image.dim(), |i, j| {
            let center = image[[i, j]];
            if !center.is_finite() {
                return center;
            }
            match dominant_direction(image, window, i, j) {
                Some((_, stats)) => lee_estimate(center, &stats, cu),
                None => center,
            }
        })
    }

    /// Lee Sigma filter: statistics restricted to the sigma range of a 3x3 prior
    fn apply_lee_sigma_filter(&self, image: &BandData) -> BandData {
        let window = self.window;
        let cu = self.speckle_cv();
        let (a1, a2, eta_v) = sigma_range_table(self.params.num_looks);
        let target = Window::SMALLEST;
        let min_bright = self.params.strong_scatterer_count;

        let z98 = band_percentile(image, self.params.strong_scatterer_percentile)
            .map(|p| p as f32);
        log::debug!(
            "Lee sigma range [{:.3}, {:.3}] x prior, eta_v {:.4}, strong scatterer threshold {:?}",
            a1,
            a2,
            eta_v,
            z98
        );

        map_pixels(image.dim(), |i, j| {
            let center = image[[i, j]];
            if !center.is_finite() {
                return center;
            }

            if let Some(z98) = z98 {
                if center > z98 {
                    let bright = masked_window_stats(image, target, i, j, |_, _, v| v > z98).count;
                    if bright >= min_bright {
                        return center;
                    }
                }
            }

            let prior = lee_estimate(center, &window_stats(image, target, i, j), cu);
            if prior <= 0.0 {
                return center;
            }

            let (lower, upper) = (prior * a1, prior * a2);
            let in_range = masked_window_stats(image, window, i, j, |_, _, v| v >= lower && v <= upper);
            if in_range.is_empty() {
                prior
            } else {
                lee_estimate(center, &in_range, eta_v)
            }
        })
    }

    /// Estimate number of looks (mean^2 / variance) from a homogeneous area
    pub fn estimate_number_of_looks(image: &BandData) -> ProcessingResult<f32> {
        log::debug!("Estimating number of looks from image statistics");

        let stats = PixelStats::from_samples(image.iter().copied().filter(|v| *v > 0.0));
        if stats.count < 2 {
            return Err(ProcessingError::InsufficientData(
                "Need at least two valid pixels to estimate looks".to_string(),
            ));
        }
        if stats.variance <= 0.0 {
            return Err(ProcessingError::Processing(
                "Image has zero variance, number of looks is unbounded".to_string(),
            ));
        }

        let num_looks = stats.mean * stats.mean / stats.variance;
        log::info!("Estimated number of looks: {:.2}", num_looks);
        Ok(num_looks.max(1.0))
    }
}

impl Default for SpeckleFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Half-window with the lowest variance around (i, j); ties keep the earlier direction
pub fn dominant_direction(
    image: &BandData,
    window: Window,
    i: usize,
    j: usize,
) -> Option<(Direction, PixelStats)> {
    let mut best: Option<(Direction, PixelStats)> = None;
    for direction in Direction::ALL {
        let stats = masked_window_stats(image, window, i, j, |di, dj, _| direction.contains(di, dj));
        if stats.is_empty() {
            continue;
        }
        match &best {
            Some((_, current)) if current.variance <= stats.variance => {}
            _ => best = Some((direction, stats)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    const ALL_FILTERS: [SpeckleFilterType; 5] = [
        SpeckleFilterType::Boxcar,
        SpeckleFilterType::Lee,
        SpeckleFilterType::GammaMap,
        SpeckleFilterType::RefinedLee,
        SpeckleFilterType::LeeSigma,
    ];

    /// Exponentially distributed speckle around `level`, deterministic
    fn speckled(rows: usize, cols: usize, level: f32, seed: u64) -> Array2<f32> {
        let mut state = seed;
        Array2::from_shape_fn((rows, cols), |_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let u = ((state >> 11) as f64 / (1u64 << 53) as f64).max(1e-12);
            (-(u.ln()) as f32) * level
        })
    }

    fn step_edge() -> Array2<f32> {
        Array2::from_shape_fn((9, 9), |(_, j)| if j < 4 { 1.0 } else { 10.0 })
    }

    fn filter(window_size: usize) -> SpeckleFilter {
        SpeckleFilter::with_params(SpeckleFilterParams {
            window_size,
            ..SpeckleFilterParams::default()
        })
        .unwrap()
    }

    #[test]
    fn test_uniform_image_unchanged() {
        let image = Array2::<f32>::from_elem((12, 10), 0.25);
        let filter = filter(5);
        for filter_type in ALL_FILTERS {
            let out = filter.apply_filter(&image, filter_type).unwrap();
            for (&a, &b) in out.iter().zip(image.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_boxcar_is_local_mean() {
        let image = speckled(8, 8, 1.0, 7);
        let filter = filter(3);
        let out = filter.apply_filter(&image, SpeckleFilterType::Boxcar).unwrap();
        let window = Window::new(3).unwrap();
        for ((i, j), &v) in out.indexed_iter() {
            assert_abs_diff_eq!(v, window_stats(&image, window, i, j).mean, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_lee_weight_bounds() {
        let cu = 1.0 / 5.0f32.sqrt();
        for step in 0..200 {
            let cv = step as f32 * 0.05;
            let k = lee_weight(cv, cu);
            assert!((0.0..=1.0).contains(&k), "k={} for cv={}", k, cv);
        }
        assert_eq!(lee_weight(cu * 0.5, cu), 0.0);
        assert_eq!(lee_weight(f32::NAN, cu), 0.0);
    }

    #[test]
    fn test_filters_reduce_speckle_variance() {
        let image = speckled(40, 40, 2.0, 42);
        let filter = SpeckleFilter::with_params(SpeckleFilterParams {
            window_size: 7,
            num_looks: 1.0,
            ..SpeckleFilterParams::default()
        })
        .unwrap();
        let input_var = PixelStats::from_samples(image.iter().copied()).variance;
        for filter_type in ALL_FILTERS {
            let out = filter.apply_filter(&image, filter_type).unwrap();
            let out_var = PixelStats::from_samples(out.iter().copied()).variance;
            assert!(out_var < input_var, "{:?} did not reduce variance", filter_type);
            assert!(out.iter().all(|v| v.is_finite() && *v >= 0.0));
        }
    }

    #[test]
    fn test_refined_lee_preserves_step_edge() {
        let image = step_edge();
        let filter = filter(5);
        let boxcar = filter.apply_filter(&image, SpeckleFilterType::Boxcar).unwrap();
        let refined = filter.apply_filter(&image, SpeckleFilterType::RefinedLee).unwrap();

        // pixel just left of the edge
        assert!(boxcar[[4, 3]] > 1.5);
        assert_abs_diff_eq!(refined[[4, 3]], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(refined[[4, 4]], 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_dominant_direction_points_away_from_edge() {
        let image = step_edge();
        let (direction, stats) = dominant_direction(&image, Window::new(5).unwrap(), 4, 3).unwrap();
        assert_eq!(direction, Direction::West);
        assert_eq!(stats.variance, 0.0);
    }

    #[test]
    fn test_gamma_map_keeps_edge_pixels() {
        let image = step_edge();
        let out = filter(3).apply_filter(&image, SpeckleFilterType::GammaMap).unwrap();
        assert_eq!(out[[4, 3]], 1.0);
        assert_eq!(out[[4, 0]], 1.0);
    }

    #[test]
    fn test_gamma_map_textured_region_follows_map_estimate() {
        // Cu = 0.5 and Cmax = 0.707 at four looks; this window has CV = 0.615
        let mut image = Array2::<f32>::from_elem((3, 3), 1.0);
        image[[1, 1]] = 3.5;
        let gamma_map = SpeckleFilter::with_params(SpeckleFilterParams {
            window_size: 3,
            num_looks: 4.0,
            ..SpeckleFilterParams::default()
        })
        .unwrap();
        let out = gamma_map.apply_filter(&image, SpeckleFilterType::GammaMap).unwrap();

        let looks = 4.0f64;
        let center = 3.5f64;
        let mean = 11.5 / 9.0;
        let variance = 20.25 / 9.0 - mean * mean;
        let cv2 = variance / (mean * mean);
        let cu2 = 1.0 / looks;
        assert!(cv2 > cu2 && cv2 < 2.0 * cu2);

        let alpha = (1.0 + cu2) / (cv2 - cu2);
        let b = alpha - looks - 1.0;
        let expected = (b * mean + (mean * mean * b * b + 4.0 * alpha * looks * center * mean).sqrt())
            / (2.0 * alpha);
        assert_abs_diff_eq!(out[[1, 1]] as f64, expected, epsilon = 1e-4);
        assert!(out[[1, 1]] as f64 > mean && (out[[1, 1]] as f64) < center);
    }

    #[test]
    fn test_lee_sigma_excludes_samples_outside_sigma_range() {
        let mut image = Array2::<f32>::from_elem((5, 5), 1.0);
        image[[2, 2]] = 1.2;
        image[[0, 0]] = 100.0;
        let filter = filter(5);

        // 3x3 prior is the plain mean 9.2 / 9; the range [0.694, 1.385] x prior drops the corner
        let out = filter.apply_filter(&image, SpeckleFilterType::LeeSigma).unwrap();
        assert_abs_diff_eq!(out[[2, 2]], 24.2 / 24.0, epsilon = 1e-5);

        let boxcar = filter.apply_filter(&image, SpeckleFilterType::Boxcar).unwrap();
        assert_abs_diff_eq!(boxcar[[2, 2]], 124.2 / 25.0, epsilon = 1e-4);
    }

    #[test]
    fn test_lee_sigma_keeps_strong_scatterer_cluster() {
        let mut image = speckled(40, 40, 1.0, 3);
        for i in 19..22 {
            for j in 19..22 {
                image[[i, j]] = 500.0;
            }
        }
        let out = filter(7).apply_filter(&image, SpeckleFilterType::LeeSigma).unwrap();
        assert_eq!(out[[20, 20]], 500.0);
    }

    #[test]
    fn test_masked_pixels_stay_masked() {
        let mut image = speckled(10, 10, 1.0, 11);
        image[[5, 5]] = f32::NAN;
        let filter = filter(3);
        for filter_type in ALL_FILTERS {
            let out = filter.apply_filter(&image, filter_type).unwrap();
            assert!(out[[5, 5]].is_nan());
            assert_eq!(out.iter().filter(|v| v.is_nan()).count(), 1);
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        let even = SpeckleFilterParams { window_size: 4, ..Default::default() };
        assert!(matches!(SpeckleFilter::with_params(even), Err(ProcessingError::Config(_))));
        let no_looks = SpeckleFilterParams { num_looks: 0.0, ..Default::default() };
        assert!(SpeckleFilter::with_params(no_looks).is_err());
    }

    #[test]
    fn test_estimate_number_of_looks() {
        let image = speckled(200, 200, 1.0, 5);
        let looks = SpeckleFilter::estimate_number_of_looks(&image).unwrap();
        // single-look exponential speckle
        assert!((looks - 1.0).abs() < 0.2, "looks = {}", looks);
    }

    #[test]
    fn test_filter_type_parsing() {
        assert_eq!("refined lee".parse::<SpeckleFilterType>().unwrap(), SpeckleFilterType::RefinedLee);
        assert_eq!("GAMMA_MAP".parse::<SpeckleFilterType>().unwrap(), SpeckleFilterType::GammaMap);
        assert!("frost".parse::<SpeckleFilterType>().is_err());
    }
}
