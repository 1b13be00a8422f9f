use super::{check_export_args, SeriesSink};
use crate::types::{
    BoundingBox, GeoTransform, ProcessingError, ProcessingResult, RasterSeries, METERS_PER_DEGREE,
};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{DriverManager, Metadata};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Writes every frame as a multi-band float32 GeoTIFF named by acquisition time
#[derive(Debug, Clone)]
pub struct GeoTiffSink {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl GeoTiffSink {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            written: Vec::new(),
        }
    }

    /// Files written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_frame(
        &self,
        path: &Path,
        raster: &crate::types::Raster,
        geo_transform: &GeoTransform,
    ) -> ProcessingResult<()> {
        let (rows, cols) = raster.shape();
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<f32, _>(
            path,
            cols as isize,
            rows as isize,
            raster.bands().len() as isize,
        )?;
        dataset.set_geo_transform(&geo_transform.to_array())?;
        dataset.set_spatial_ref(&SpatialRef::from_epsg(4326)?)?;

        for (idx, band) in raster.bands().iter().enumerate() {
            let mut out = dataset.rasterband(idx as isize + 1)?;
            out.set_description(&band.name)?;
            out.set_no_data_value(Some(f64::NAN))?;
            let buffer = Buffer::new((cols, rows), band.data.iter().copied().collect());
            out.write((0, 0), (cols, rows), &buffer)?;
        }
        Ok(())
    }
}

impl SeriesSink for GeoTiffSink {
    fn export_series(
        &mut self,
        series: &RasterSeries,
        destination: &str,
        scale: f64,
        region: &BoundingBox,
    ) -> ProcessingResult<()> {
        check_export_args(destination, scale)?;

        let target_dir = self.output_dir.join(destination);
        std::fs::create_dir_all(&target_dir)?;
        log::info!(
            "Exporting {} frames to {}",
            series.len(),
            target_dir.display()
        );

        let fallback = GeoTransform::north_up(region, scale / METERS_PER_DEGREE);
        let names: Vec<String> = series
            .frames()
            .iter()
            .map(|frame| format!("{}.tif", frame.time.format("%Y%m%dT%H%M%S")))
            .collect();
        let mut seen = HashSet::with_capacity(names.len());
        for (frame, name) in series.frames().iter().zip(&names) {
            if !seen.insert(name) {
                return Err(ProcessingError::Export(format!(
                    "Two frames at {} would both be written to {}",
                    frame.time, name
                )));
            }
        }

        for (frame, name) in series.frames().iter().zip(&names) {
            if let Some(footprint) = frame.raster.footprint() {
                if !footprint.intersects(region) {
                    return Err(ProcessingError::Export(format!(
                        "Frame at {} lies outside the export region",
                        frame.time
                    )));
                }
            }
            let geo_transform = frame.raster.geo_transform().copied().unwrap_or(fallback);
            let path = target_dir.join(name);
            log::debug!("Writing {}", path.display());
            self.write_frame(&path, &frame.raster, &geo_transform)?;
            self.written.push(path);
        }
        Ok(())
    }
}
