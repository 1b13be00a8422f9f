use crate::core::speckle_filter::{SpeckleFilter, SpeckleFilterType};
use crate::types::{BandData, ProcessingError, ProcessingResult};
use ndarray::{Array2, Zip};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Temporal neighbours of `target` in a series of `len` frames.
///
/// Takes the `count` frames immediately before `target`; when fewer exist the
/// remainder comes from the frames after it, nearest first. The target itself
/// is never included and no index repeats. Result is ascending.
pub fn select_temporal_neighbors(len: usize, target: usize, count: usize) -> Vec<usize> {
    if target >= len {
        return Vec::new();
    }

    let before_start = target.saturating_sub(count);
    let mut neighbors: Vec<usize> = (before_start..target).collect();
    let remaining = count - neighbors.len();
    let after_end = (target + 1 + remaining).min(len);
    neighbors.extend(target + 1..after_end);
    neighbors
}

/// Quegan multi-temporal speckle filter.
///
/// Each frame is filtered once with the mono-temporal kernel `F_i`; the
/// estimate for frame `t` is `F_t * mean(I_i / F_i)` over its temporal
/// neighbours.
#[derive(Debug, Clone)]
pub struct MultiTemporalFilter {
    filter: SpeckleFilter,
    filter_type: SpeckleFilterType,
    neighbors: usize,
}

impl MultiTemporalFilter {
    pub fn new(
        filter: SpeckleFilter,
        filter_type: SpeckleFilterType,
        neighbors: usize,
    ) -> ProcessingResult<Self> {
        if neighbors < 1 {
            return Err(ProcessingError::Config(
                "Multi-temporal filtering needs at least one neighbour frame".to_string(),
            ));
        }
        Ok(Self {
            filter,
            filter_type,
            neighbors,
        })
    }

    pub fn neighbors(&self) -> usize {
        self.neighbors
    }

    /// Filter a time-ordered stack of one band; returns one output per input frame
    pub fn apply(&self, stack: &[&BandData]) -> ProcessingResult<Vec<BandData>> {
        if stack.is_empty() {
            return Ok(Vec::new());
        }
        let shape = stack[0].dim();
        if let Some(bad) = stack.iter().find(|b| b.dim() != shape) {
            return Err(ProcessingError::Schema(format!(
                "Stack frame has shape {:?}, expected {:?}",
                bad.dim(),
                shape
            )));
        }

        if stack.len() < self.neighbors + 1 {
            log::warn!(
                "Only {} frames available for {} temporal neighbours, using all frames",
                stack.len(),
                self.neighbors
            );
        }

        log::info!(
            "Multi-temporal {:?} filtering of {} frames with {} neighbours",
            self.filter_type,
            stack.len(),
            self.neighbors
        );

        // Scatter: spatially filter every frame once
        let filtered = self.filter_frames(stack)?;
        let ratios: Vec<BandData> = stack
            .iter()
            .zip(filtered.iter())
            .map(|(raw, smooth)| reflectivity_ratio(raw, smooth))
            .collect();

        // Gather: combine each frame with its neighbours' ratios
        let outputs = (0..stack.len())
            .map(|t| {
                let neighbors = select_temporal_neighbors(stack.len(), t, self.neighbors);
                log::debug!("Frame {} uses temporal neighbours {:?}", t, neighbors);
                combine(&filtered[t], neighbors.iter().map(|&n| &ratios[n]))
            })
            .collect();

        Ok(outputs)
    }

    #[cfg(feature = "parallel")]
    fn filter_frames(&self, stack: &[&BandData]) -> ProcessingResult<Vec<BandData>> {
        stack
            .par_iter()
            .map(|band| self.filter.apply_filter(band, self.filter_type))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn filter_frames(&self, stack: &[&BandData]) -> ProcessingResult<Vec<BandData>> {
        stack
            .iter()
            .map(|band| self.filter.apply_filter(band, self.filter_type))
            .collect()
    }
}

/// I / F per pixel; NaN where the ratio is undefined
fn reflectivity_ratio(raw: &BandData, filtered: &BandData) -> BandData {
    Zip::from(raw).and(filtered).map_collect(|&i, &f| {
        if i.is_finite() && f.is_finite() && f > 0.0 {
            i / f
        } else {
            f32::NAN
        }
    })
}

/// F_t times the mean of the valid neighbour ratios; F_t alone where none is valid
fn combine<'a, I>(target: &BandData, ratios: I) -> BandData
where
    I: Iterator<Item = &'a BandData>,
{
    let shape = target.dim();
    let mut sum = Array2::<f32>::zeros(shape);
    let mut count = Array2::<u32>::zeros(shape);
    for ratio in ratios {
        Zip::from(&mut sum)
            .and(&mut count)
            .and(ratio)
            .for_each(|s, c, &r| {
                if r.is_finite() {
                    *s += r;
                    *c += 1;
                }
            });
    }

    Zip::from(target)
        .and(&sum)
        .and(&count)
        .map_collect(|&f, &s, &c| if c > 0 { f * s / c as f32 } else { f })
}
