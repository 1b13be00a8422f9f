//! Python bindings

use crate::core::pipeline::{filter_speckle, FilterConfig, FilterFramework};
use crate::core::speckle_filter::{SpeckleFilterParams, SpeckleFilterType};
use crate::temporal::{interpolate_and_smooth, Observation, SmoothingConfig};
use crate::types::{Frame, ProcessingError, Raster, RasterSeries};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ndarray::{s, Array3, Axis};
use numpy::{PyArray3, PyReadonlyArray3};
use pyo3::prelude::*;

const BAND: &str = "band";

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_filter_speckle, m)?)?;
    m.add_function(wrap_pyfunction!(py_smooth_series, m)?)?;
    Ok(())
}

fn runtime_err(e: ProcessingError) -> PyErr {
    match e {
        ProcessingError::Config(_) => PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e)),
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

fn parse_date(text: &str) -> PyResult<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(time.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Invalid date {}: {}", text, e))
    })?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Invalid date {}", text))
    })?;
    Ok(Utc.from_utc_datetime(&midnight))
}

fn parse_dates(dates: &[String]) -> PyResult<Vec<DateTime<Utc>>> {
    let times = dates.iter().map(|d| parse_date(d)).collect::<PyResult<Vec<_>>>()?;
    if times.windows(2).any(|w| w[1] < w[0]) {
        return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(
            "Dates must be in ascending order",
        ));
    }
    Ok(times)
}

/// Speckle filter a (time, rows, cols) float32 cube of linear backscatter
#[pyfunction]
#[pyo3(name = "filter_speckle")]
#[pyo3(signature = (cube, dates, filter = "LEE", framework = "MULTI", window_size = 7, num_looks = 5.0, neighbors = 10))]
#[allow(clippy::too_many_arguments)]
fn py_filter_speckle<'py>(
    py: Python<'py>,
    cube: PyReadonlyArray3<f32>,
    dates: Vec<String>,
    filter: &str,
    framework: &str,
    window_size: usize,
    num_looks: f32,
    neighbors: usize,
) -> PyResult<&'py PyArray3<f32>> {
    let cube = cube.as_array();
    if cube.len_of(Axis(0)) != dates.len() {
        return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
            "Cube has {} frames but {} dates were given",
            cube.len_of(Axis(0)),
            dates.len()
        )));
    }
    let times = parse_dates(&dates)?;

    let config = FilterConfig {
        filter: filter.parse::<SpeckleFilterType>().map_err(runtime_err)?,
        framework: framework.parse::<FilterFramework>().map_err(runtime_err)?,
        params: SpeckleFilterParams {
            window_size,
            num_looks,
            ..SpeckleFilterParams::default()
        },
        temporal_neighbors: neighbors,
        ..FilterConfig::default()
    };

    let frames = times
        .iter()
        .enumerate()
        .map(|(t, &time)| Frame::new(time, Raster::single_band(BAND, cube.slice(s![t, .., ..]).to_owned())))
        .collect();
    let series = RasterSeries::new(frames).map_err(runtime_err)?;

    let filtered = py
        .allow_threads(|| filter_speckle(&series, &config, &[BAND]))
        .map_err(runtime_err)?;

    let (_, rows, cols) = cube.dim();
    let mut out = Array3::<f32>::zeros((filtered.len(), rows, cols));
    for (t, frame) in filtered.frames().iter().enumerate() {
        out.slice_mut(s![t, .., ..])
            .assign(frame.raster.require_band(BAND).map_err(runtime_err)?);
    }
    Ok(PyArray3::from_owned_array(py, out))
}

/// Interpolate, smooth and clip a scalar series; returns grid dates and values (None = masked)
#[pyfunction]
#[pyo3(name = "smooth_series")]
#[pyo3(signature = (dates, values, interval_days = 5, window_days = 45, half_width_days = 60, order = 3, low = 5.0, high = 95.0))]
#[allow(clippy::too_many_arguments)]
fn py_smooth_series(
    dates: Vec<String>,
    values: Vec<f64>,
    interval_days: u32,
    window_days: u32,
    half_width_days: u32,
    order: usize,
    low: f64,
    high: f64,
) -> PyResult<(Vec<String>, Vec<Option<f64>>)> {
    if dates.len() != values.len() {
        return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(
            "dates and values must have the same length",
        ));
    }
    let observations = dates
        .iter()
        .zip(&values)
        .map(|(d, &value)| parse_date(d).map(|time| Observation { time, value }))
        .collect::<PyResult<Vec<_>>>()?;

    let config = SmoothingConfig {
        grid_interval_days: interval_days,
        interpolation_window_days: window_days,
        savgol_half_width_days: half_width_days,
        savgol_order: order,
        percentile_low: low,
        percentile_high: high,
        ..SmoothingConfig::default()
    };
    let series = interpolate_and_smooth(&observations, &config).map_err(runtime_err)?;

    Ok(series
        .values()
        .iter()
        .map(|gv| (gv.time.format("%Y-%m-%d").to_string(), gv.value))
        .unzip())
}
