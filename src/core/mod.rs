//! Core SAR processing modules

pub mod statistics;
pub mod scale;
pub mod speckle_filter;
pub mod multitemporal;
pub mod pipeline;

// Re-export main types
pub use statistics::{Window, PixelStats, LocalStatistics, local_statistics, window_stats};
pub use scale::{to_db, to_linear};
pub use speckle_filter::{
    SpeckleFilter, SpeckleFilterParams, SpeckleFilterType, Direction, dominant_direction,
};
pub use multitemporal::{MultiTemporalFilter, select_temporal_neighbors};
pub use pipeline::{FilterConfig, FilterFramework, filter_speckle};
