//! End-to-end preparation of a site's backscatter and NDVI series

use crate::config::RunConfig;
use crate::core::pipeline::filter_speckle;
use crate::io::{ImagerySource, SeriesSink};
use crate::temporal::interpolate_and_smooth_series;
use crate::types::{ProcessingResult, RasterSeries};

/// Fetch the site's Sentinel-1 series and speckle filter its polarization bands
pub fn prepare_backscatter<S>(source: &S, config: &RunConfig) -> ProcessingResult<RasterSeries>
where
    S: ImagerySource + ?Sized,
{
    config.validate()?;
    log::info!(
        "Preparing backscatter for site {} from {} to {}",
        config.site.name,
        config.start,
        config.end
    );

    let series = source.fetch_series(&config.series_request())?;
    if series.is_empty() {
        log::warn!("No acquisitions found for site {}", config.site.name);
        return Ok(series);
    }
    filter_speckle(&series, &config.speckle, &config.backscatter_bands())
}

/// Gap fill, smooth and clip an NDVI band over the run period
pub fn prepare_ndvi(series: &RasterSeries, band: &str, config: &RunConfig) -> ProcessingResult<RasterSeries> {
    config.validate()?;
    let mut smoothing = config.smoothing.clone();
    smoothing.start.get_or_insert(config.start);
    smoothing.end.get_or_insert(config.end);

    log::info!(
        "Preparing {} series for site {} ({} frames)",
        band,
        config.site.name,
        series.len()
    );
    interpolate_and_smooth_series(series, band, &smoothing)
}

/// Export a prepared series over the site footprint at the configured scale
pub fn export_prepared<K>(
    sink: &mut K,
    series: &RasterSeries,
    destination: &str,
    config: &RunConfig,
) -> ProcessingResult<()>
where
    K: SeriesSink + ?Sized,
{
    sink.export_series(series, destination, config.export_scale, &config.site.footprint())
}
