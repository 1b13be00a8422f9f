use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued backscatter or index sample
pub type PixelValue = f32;

/// 2D real raster band (rows x cols)
pub type BandData = Array2<PixelValue>;

/// Approximate ground distance of one degree of latitude
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl Polarization {
    /// Band name used for this polarization inside a raster
    pub fn band_name(&self) -> &'static str {
        match self {
            Polarization::VV => "VV",
            Polarization::VH => "VH",
            Polarization::HV => "HV",
            Polarization::HH => "HH",
        }
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.band_name())
    }
}

impl std::str::FromStr for Polarization {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            _ => Err(ProcessingError::Config(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Satellite pass direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrbitDirection {
    Ascending,
    Descending,
}

/// Scale the backscatter bands are stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackscatterScale {
    /// Linear power
    #[default]
    Linear,
    /// 10*log10 of linear power
    Decibel,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// True when the two boxes share any area (touching edges count)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }
}

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform anchored at the top-left corner of `bbox`
    pub fn north_up(bbox: &BoundingBox, pixel_size: f64) -> Self {
        Self {
            top_left_x: bbox.min_lon,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y: bbox.max_lat,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Footprint covered by a `rows` x `cols` grid (rotation ignored)
    pub fn footprint(&self, rows: usize, cols: usize) -> BoundingBox {
        let x_end = self.top_left_x + cols as f64 * self.pixel_width;
        let y_end = self.top_left_y + rows as f64 * self.pixel_height;
        BoundingBox {
            min_lon: self.top_left_x.min(x_end),
            max_lon: self.top_left_x.max(x_end),
            min_lat: self.top_left_y.min(y_end),
            max_lat: self.top_left_y.max(y_end),
        }
    }
}

/// Named raster band
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub data: BandData,
}

/// Multi-band raster sharing one pixel grid. NaN samples are no-data.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    bands: Vec<Band>,
    shape: (usize, usize),
    geo_transform: Option<GeoTransform>,
}

impl Raster {
    /// Build a raster; every band must share the same dimensions and name uniqueness
    pub fn new(bands: Vec<Band>) -> ProcessingResult<Self> {
        let shape = match bands.first() {
            Some(band) => band.data.dim(),
            None => {
                return Err(ProcessingError::Schema(
                    "Raster needs at least one band".to_string(),
                ))
            }
        };

        for (idx, band) in bands.iter().enumerate() {
            if band.data.dim() != shape {
                return Err(ProcessingError::Schema(format!(
                    "Band {} has shape {:?}, expected {:?}",
                    band.name,
                    band.data.dim(),
                    shape
                )));
            }
            if bands[..idx].iter().any(|b| b.name == band.name) {
                return Err(ProcessingError::Schema(format!(
                    "Duplicate band name {}",
                    band.name
                )));
            }
        }

        Ok(Self {
            bands,
            shape,
            geo_transform: None,
        })
    }

    /// Convenience constructor for a single band raster
    pub fn single_band(name: &str, data: BandData) -> Self {
        let shape = data.dim();
        Self {
            bands: vec![Band {
                name: name.to_string(),
                data,
            }],
            shape,
            geo_transform: None,
        }
    }

    pub fn with_geo_transform(mut self, geo_transform: GeoTransform) -> Self {
        self.geo_transform = Some(geo_transform);
        self
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn geo_transform(&self) -> Option<&GeoTransform> {
        self.geo_transform.as_ref()
    }

    pub fn footprint(&self) -> Option<BoundingBox> {
        self.geo_transform
            .map(|gt| gt.footprint(self.shape.0, self.shape.1))
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn band(&self, name: &str) -> Option<&BandData> {
        self.bands.iter().find(|b| b.name == name).map(|b| &b.data)
    }

    /// Like [`Raster::band`] but a missing band is an error
    pub fn require_band(&self, name: &str) -> ProcessingResult<&BandData> {
        self.band(name)
            .ok_or_else(|| ProcessingError::MissingBand(name.to_string()))
    }

    /// New raster with `name` replaced by `data`, all other bands and geocoding kept
    pub fn with_band_replaced(&self, name: &str, data: BandData) -> ProcessingResult<Self> {
        if data.dim() != self.shape {
            return Err(ProcessingError::Schema(format!(
                "Replacement for band {} has shape {:?}, expected {:?}",
                name,
                data.dim(),
                self.shape
            )));
        }
        let mut bands = self.bands.clone();
        match bands.iter_mut().find(|b| b.name == name) {
            Some(band) => band.data = data,
            None => return Err(ProcessingError::MissingBand(name.to_string())),
        }
        Ok(Self {
            bands,
            shape: self.shape,
            geo_transform: self.geo_transform,
        })
    }

    /// Raster restricted to the named bands, in the given order
    pub fn select(&self, names: &[&str]) -> ProcessingResult<Self> {
        let bands = names
            .iter()
            .map(|name| {
                self.require_band(name).map(|data| Band {
                    name: name.to_string(),
                    data: data.clone(),
                })
            })
            .collect::<ProcessingResult<Vec<_>>>()?;
        let mut raster = Raster::new(bands)?;
        raster.geo_transform = self.geo_transform;
        Ok(raster)
    }
}

/// One acquisition of a series
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub time: DateTime<Utc>,
    pub orbit_direction: Option<OrbitDirection>,
    pub raster: Raster,
}

impl Frame {
    pub fn new(time: DateTime<Utc>, raster: Raster) -> Self {
        Self {
            time,
            orbit_direction: None,
            raster,
        }
    }

    pub fn with_orbit(mut self, orbit_direction: OrbitDirection) -> Self {
        self.orbit_direction = Some(orbit_direction);
        self
    }
}

/// Time-ordered frames with one band schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterSeries {
    frames: Vec<Frame>,
}

impl RasterSeries {
    /// Build a series, checking band schema, shape and georeferencing, then
    /// stably sorting by time. Frames without a geo transform are accepted.
    pub fn new(mut frames: Vec<Frame>) -> ProcessingResult<Self> {
        if let Some(first) = frames.first() {
            let schema = first.raster.band_names();
            let shape = first.raster.shape();
            let geo_transform = frames.iter().find_map(|f| f.raster.geo_transform().copied());
            for frame in frames.iter().skip(1) {
                if frame.raster.band_names() != schema {
                    return Err(ProcessingError::Schema(format!(
                        "Frame at {} has bands {:?}, expected {:?}",
                        frame.time,
                        frame.raster.band_names(),
                        schema
                    )));
                }
                if frame.raster.shape() != shape {
                    return Err(ProcessingError::Schema(format!(
                        "Frame at {} has shape {:?}, expected {:?}",
                        frame.time,
                        frame.raster.shape(),
                        shape
                    )));
                }
            }
            if let Some(expected) = geo_transform {
                for frame in &frames {
                    if let Some(gt) = frame.raster.geo_transform() {
                        if *gt != expected {
                            return Err(ProcessingError::Schema(format!(
                                "Frame at {} has geo transform {:?}, expected {:?}",
                                frame.time, gt, expected
                            )));
                        }
                    }
                }
            }
        }
        frames.sort_by_key(|f| f.time);
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.frames.iter().map(|f| f.time).collect()
    }

    /// Band names shared by every frame (empty for an empty series)
    pub fn band_names(&self) -> Vec<&str> {
        self.frames
            .first()
            .map(|f| f.raster.band_names())
            .unwrap_or_default()
    }

    /// Combine two series and restore time ordering
    pub fn merge(&self, other: &RasterSeries) -> ProcessingResult<Self> {
        let mut frames = self.frames.clone();
        frames.extend(other.frames.iter().cloned());
        RasterSeries::new(frames)
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

/// Error types for speckle filtering and time-series processing
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No value available at {time}")]
    Gap { time: DateTime<Utc> },

    #[error("Band not found: {0}")]
    MissingBand(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Imagery source error: {0}")]
    Source(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "geotiff")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for processing operations
pub type ProcessingResult<T> = Result<T, ProcessingError>;
