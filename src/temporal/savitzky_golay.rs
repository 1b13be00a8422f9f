use super::interpolate::days_between;
use super::{GridValue, TimeWeighting};
use crate::types::{ProcessingError, ProcessingResult};

/// Local polynomial least-squares smoothing over a time window.
///
/// Grid points need not be evenly filled: each estimate is fit only to the
/// filled samples within `half_width_days` of the point.
#[derive(Debug, Clone)]
pub struct SavitzkyGolaySmoother {
    half_width_days: f64,
    order: usize,
    weighting: TimeWeighting,
}

impl SavitzkyGolaySmoother {
    pub fn new(half_width_days: u32, order: usize, weighting: TimeWeighting) -> ProcessingResult<Self> {
        if half_width_days == 0 {
            return Err(ProcessingError::Config(
                "Savitzky-Golay half width must be at least one day".to_string(),
            ));
        }
        Ok(Self {
            half_width_days: half_width_days as f64,
            order,
            weighting,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Smooth the filled points; masked points are returned unchanged
    pub fn smooth(&self, values: &[GridValue]) -> Vec<GridValue> {
        let filled: Vec<(f64, &GridValue)> = values
            .iter()
            .filter_map(|gv| gv.value.map(|v| (v, gv)))
            .collect();

        values
            .iter()
            .map(|gv| {
                let Some(original) = gv.value else {
                    return gv.clone();
                };

                let mut x = Vec::new();
                let mut y = Vec::new();
                let mut w = Vec::new();
                for &(value, sample) in &filled {
                    let offset = days_between(gv.time, sample.time) / self.half_width_days;
                    if offset.abs() <= 1.0 {
                        x.push(offset);
                        y.push(value);
                        w.push(self.weighting.weight(offset));
                    }
                }

                let smoothed = self.fit_intercept(&x, &y, &w).unwrap_or(original);
                GridValue {
                    time: gv.time,
                    value: Some(smoothed),
                    fill: gv.fill,
                }
            })
            .collect()
    }

    /// Zero-order coefficient of the weighted polynomial fit, lowering the
    /// order until the normal equations are solvable
    fn fit_intercept(&self, x: &[f64], y: &[f64], w: &[f64]) -> Option<f64> {
        let effective = w.iter().filter(|&&wi| wi > 0.0).count();
        if effective == 0 {
            return None;
        }

        let mut order = self.order.min(effective - 1);
        if order < self.order {
            log::debug!(
                "Only {} samples in window, reducing polynomial order {} -> {}",
                effective,
                self.order,
                order
            );
        }

        loop {
            if let Some(coefficients) = weighted_polyfit(x, y, w, order) {
                return coefficients.first().copied();
            }
            if order == 0 {
                return None;
            }
            order -= 1;
        }
    }
}

/// Weighted least-squares polynomial coefficients, lowest degree first
pub fn weighted_polyfit(x: &[f64], y: &[f64], w: &[f64], order: usize) -> Option<Vec<f64>> {
    let n = order + 1;
    let mut normal = vec![vec![0.0f64; n + 1]; n];

    // power sums sum(w * x^k) for k in 0..=2*order
    let mut power_sums = vec![0.0f64; 2 * order + 1];
    for ((&xi, &yi), &wi) in x.iter().zip(y).zip(w) {
        let mut xp = 1.0;
        for (k, sum) in power_sums.iter_mut().enumerate() {
            *sum += wi * xp;
            if k < n {
                normal[k][n] += wi * xp * yi;
            }
            xp *= xi;
        }
    }
    for (r, row) in normal.iter_mut().enumerate() {
        row[..n].copy_from_slice(&power_sums[r..r + n]);
    }

    solve_augmented(normal)
}

/// Gaussian elimination with partial pivoting on an `n x (n + 1)` augmented matrix
fn solve_augmented(mut m: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let n = m.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);

        for row in col + 1..n {
            let factor = m[row][col] / m[col][col];
            for k in col..=n {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * solution[k]).sum();
        solution[row] = (m[row][n] - tail) / m[row][row];
    }
    Some(solution)
}
