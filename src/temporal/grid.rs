use crate::types::{ProcessingError, ProcessingResult};
use chrono::{DateTime, Duration, Utc};

/// Regular sequence of target timestamps `start, start + interval, ...` up to `end`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    interval: Duration,
    times: Vec<DateTime<Utc>>,
}

impl TimeGrid {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, interval_days: u32) -> ProcessingResult<Self> {
        if interval_days == 0 {
            return Err(ProcessingError::Config(
                "Grid interval must be at least one day".to_string(),
            ));
        }
        if end < start {
            return Err(ProcessingError::Config(format!(
                "Grid end {} is before start {}",
                end, start
            )));
        }

        let interval = Duration::days(interval_days as i64);
        let mut times = Vec::new();
        let mut current = start;
        while current <= end {
            times.push(current);
            current += interval;
        }

        log::debug!(
            "Time grid: {} points every {} days from {}",
            times.len(),
            interval_days,
            start
        );
        Ok(Self { interval, times })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_grid_includes_end_when_aligned() {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2021, 1, 21, 0, 0, 0).unwrap();
        let grid = TimeGrid::new(start, end, 5).unwrap();
        assert_eq!(grid.len(), 5);
        assert_eq!(grid.times()[4], end);
    }

    #[test]
    fn test_single_point_grid() {
        let start = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        let grid = TimeGrid::new(start, start, 5).unwrap();
        assert_eq!(grid.times(), &[start]);
    }

    #[test]
    fn test_invalid_grid_rejected() {
        let start = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap();
        assert!(TimeGrid::new(start, end, 5).is_err());
        assert!(TimeGrid::new(end, start, 0).is_err());
    }
}
