use super::{FillState, GridValue};
use crate::core::statistics::percentile_sorted;
use crate::types::{ProcessingError, ProcessingResult};

/// Masks samples outside a percentile band of the filled values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierClipper {
    low: f64,
    high: f64,
}

impl OutlierClipper {
    /// `low` and `high` are percentiles with `0 <= low <= high <= 100`
    pub fn new(low: f64, high: f64) -> ProcessingResult<Self> {
        if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low > high {
            return Err(ProcessingError::Config(format!(
                "Percentile bounds must satisfy 0 <= low <= high <= 100, got ({}, {})",
                low, high
            )));
        }
        Ok(Self { low, high })
    }

    /// Value range kept by the clipper, `None` when nothing is filled
    pub fn bounds(&self, values: &[GridValue]) -> Option<(f64, f64)> {
        let mut filled: Vec<f64> = values.iter().filter_map(|gv| gv.value).collect();
        filled.sort_by(|a, b| a.total_cmp(b));
        Some((
            percentile_sorted(&filled, self.low)?,
            percentile_sorted(&filled, self.high)?,
        ))
    }

    pub fn clip(&self, values: &[GridValue]) -> Vec<GridValue> {
        let Some((lower, upper)) = self.bounds(values) else {
            log::debug!("No filled samples to clip");
            return values.to_vec();
        };

        values
            .iter()
            .map(|gv| match gv.value {
                Some(v) if v < lower || v > upper => GridValue {
                    time: gv.time,
                    value: None,
                    fill: FillState::Clipped,
                },
                _ => gv.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[Option<f64>]) -> Vec<GridValue> {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(k, &value)| GridValue {
                time: start + Duration::days(k as i64),
                value,
                fill: if value.is_some() { FillState::Interpolated } else { FillState::Gap },
            })
            .collect()
    }

    #[test]
    fn test_extremes_are_masked() {
        let mut values: Vec<Option<f64>> = (0..21).map(|k| Some(0.3 + 0.01 * k as f64)).collect();
        values[3] = Some(-0.9);
        values[17] = Some(2.5);
        let input = series(&values);
        let clipper = OutlierClipper::new(5.0, 95.0).unwrap();
        let (lower, upper) = clipper.bounds(&input).unwrap();
        let out = clipper.clip(&input);

        assert_eq!(out[3].fill, FillState::Clipped);
        assert_eq!(out[17].fill, FillState::Clipped);
        for gv in &out {
            if let Some(v) = gv.value {
                assert!(v >= lower && v <= upper);
            }
        }
    }

    #[test]
    fn test_in_range_values_unchanged_and_mask_grows() {
        let values: Vec<Option<f64>> = (0..30)
            .map(|k| if k % 7 == 0 { None } else { Some(((k * 37) % 11) as f64) })
            .collect();
        let input = series(&values);
        let out = OutlierClipper::new(10.0, 90.0).unwrap().clip(&input);

        let masked = |s: &[GridValue]| s.iter().filter(|gv| gv.value.is_none()).count();
        assert!(masked(&out) >= masked(&input));
        for (a, b) in out.iter().zip(&input) {
            if a.value.is_some() {
                assert_eq!(a.value, b.value);
            }
        }
    }

    #[test]
    fn test_full_range_keeps_everything() {
        let input = series(&[Some(1.0), Some(5.0), None, Some(3.0)]);
        let out = OutlierClipper::new(0.0, 100.0).unwrap().clip(&input);
        assert_eq!(out, input);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(OutlierClipper::new(95.0, 5.0).is_err());
        assert!(OutlierClipper::new(-1.0, 50.0).is_err());
        assert!(OutlierClipper::new(5.0, 101.0).is_err());
    }
}
