use super::grid::TimeGrid;
use super::{FillState, GridValue, Observation};
use chrono::{DateTime, Duration, Utc};

/// Fractional days from `from` to `to`
pub(crate) fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 86_400_000.0
}

/// A grid point with the samples that may bracket it
#[derive(Debug, Clone)]
pub struct InterpolationNode<'a> {
    pub time: DateTime<Utc>,
    /// Samples in `[time - W, time]`, nearest first
    pub before: Vec<&'a Observation>,
    /// Samples in `[time, time + W]`, nearest first
    pub after: Vec<&'a Observation>,
}

impl<'a> InterpolationNode<'a> {
    /// Value at the node and how it was obtained
    pub fn estimate(&self) -> (Option<f64>, FillState) {
        match (self.before.first(), self.after.first()) {
            (Some(before), Some(after)) => {
                if before.time == after.time {
                    return (Some(before.value), FillState::Interpolated);
                }
                let span = days_between(before.time, after.time);
                let alpha = days_between(before.time, self.time) / span;
                (
                    Some(before.value + alpha * (after.value - before.value)),
                    FillState::Interpolated,
                )
            }
            (Some(only), None) | (None, Some(only)) => (Some(only.value), FillState::NearestOnly),
            (None, None) => (None, FillState::Gap),
        }
    }
}

/// Linear gap filling onto a regular grid, bounded to `W` days each side
#[derive(Debug, Clone)]
pub struct TemporalInterpolator {
    window: Duration,
}

impl TemporalInterpolator {
    pub fn new(window_days: u32) -> Self {
        Self {
            window: Duration::days(window_days as i64),
        }
    }

    /// Build the interpolation nodes for every grid point.
    ///
    /// `sorted` must be ascending in time; equal timestamps keep input order,
    /// so the first of them is the one used.
    pub fn nodes<'a>(&self, sorted: &[&'a Observation], grid: &TimeGrid) -> Vec<InterpolationNode<'a>> {
        grid.times()
            .iter()
            .map(|&time| {
                let lo = sorted.partition_point(|o| o.time < time - self.window);
                let at = sorted.partition_point(|o| o.time < time);
                let past = sorted.partition_point(|o| o.time <= time);
                let hi = sorted.partition_point(|o| o.time <= time + self.window);

                // stable sort keeps input order among equal timestamps
                let mut before: Vec<&Observation> = sorted[lo..past].to_vec();
                before.sort_by(|a, b| b.time.cmp(&a.time));

                InterpolationNode {
                    time,
                    before,
                    after: sorted[at..hi].to_vec(),
                }
            })
            .collect()
    }

    /// Interpolate `observations` onto `grid`; non-finite observations are ignored
    pub fn interpolate(&self, observations: &[Observation], grid: &TimeGrid) -> Vec<GridValue> {
        let mut sorted: Vec<&Observation> = observations.iter().filter(|o| o.value.is_finite()).collect();
        sorted.sort_by_key(|o| o.time);

        self.nodes(&sorted, grid)
            .iter()
            .map(|node| {
                let (value, fill) = node.estimate();
                GridValue {
                    time: node.time,
                    value,
                    fill,
                }
            })
            .collect()
    }
}
