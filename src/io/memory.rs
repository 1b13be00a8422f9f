use super::{check_export_args, ImagerySource, SeriesRequest, SeriesSink};
use crate::types::{BoundingBox, Frame, ProcessingResult, RasterSeries};

/// Imagery source over frames held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    frames: Vec<Frame>,
}

impl InMemorySource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn matches(frame: &Frame, request: &SeriesRequest) -> bool {
        if frame.time < request.start || frame.time > request.end {
            return false;
        }
        if let Some(footprint) = frame.raster.footprint() {
            if !footprint.intersects(&request.footprint) {
                return false;
            }
        }
        if request
            .polarizations
            .iter()
            .any(|pol| frame.raster.band(pol.band_name()).is_none())
        {
            return false;
        }
        match request.orbit_direction {
            Some(direction) => frame.orbit_direction == Some(direction),
            None => true,
        }
    }
}

impl ImagerySource for InMemorySource {
    fn fetch_series(&self, request: &SeriesRequest) -> ProcessingResult<RasterSeries> {
        request.validate()?;
        let selected = request.selected_bands();

        let frames = self
            .frames
            .iter()
            .filter(|frame| Self::matches(frame, request))
            .filter(|frame| match &selected {
                Some(bands) => {
                    let complete = bands.iter().all(|b| frame.raster.band(b).is_some());
                    if !complete {
                        log::debug!("Skipping frame at {}: missing requested bands", frame.time);
                    }
                    complete
                }
                None => true,
            })
            .map(|frame| {
                let raster = match &selected {
                    Some(bands) => frame.raster.select(bands)?,
                    None => frame.raster.clone(),
                };
                Ok(Frame {
                    time: frame.time,
                    orbit_direction: frame.orbit_direction,
                    raster,
                })
            })
            .collect::<ProcessingResult<Vec<_>>>()?;

        log::info!(
            "Fetched {} of {} frames between {} and {}",
            frames.len(),
            self.frames.len(),
            request.start,
            request.end
        );
        RasterSeries::new(frames)
    }
}

/// One recorded export
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesExport {
    pub destination: String,
    pub scale: f64,
    pub region: BoundingBox,
    pub series: RasterSeries,
}

/// Sink that keeps every exported series
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    exports: Vec<SeriesExport>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exports(&self) -> &[SeriesExport] {
        &self.exports
    }
}

impl SeriesSink for InMemorySink {
    fn export_series(
        &mut self,
        series: &RasterSeries,
        destination: &str,
        scale: f64,
        region: &BoundingBox,
    ) -> ProcessingResult<()> {
        check_export_args(destination, scale)?;
        log::debug!("Recording export of {} frames to {}", series.len(), destination);
        self.exports.push(SeriesExport {
            destination: destination.to_string(),
            scale,
            region: *region,
            series: series.clone(),
        });
        Ok(())
    }
}
