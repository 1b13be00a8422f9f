use chrono::{Duration, TimeZone, Utc};
use ndarray::Array2;
use sarmoist::config::RunConfig;
use sarmoist::io::{ImagerySource, InMemorySink, InMemorySource, SeriesSink};
use sarmoist::types::{Band, BackscatterScale, Frame, GeoTransform, OrbitDirection, Raster};
use sarmoist::workflow::{export_prepared, prepare_backscatter, prepare_ndvi};

const RUN: &str = r#"{
    "site": { "name": "meadow", "lon": 7.45, "lat": 46.95, "buffer_m": 100.0 },
    "start": "2021-04-01T00:00:00Z",
    "end": "2021-09-30T00:00:00Z",
    "polarizations": ["VV", "VH"],
    "orbit_direction": "Ascending",
    "speckle": {
        "filter": "REFINED_LEE",
        "framework": "MULTI",
        "temporal_neighbors": 4,
        "input_scale": "Decibel",
        "params": { "window_size": 5 }
    }
}"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn acquisitions(config: &RunConfig) -> InMemorySource {
    let footprint = config.site.footprint();
    let geo = GeoTransform::north_up(&footprint, (footprint.max_lon - footprint.min_lon) / 12.0);
    let mut source = InMemorySource::default();
    for k in 0..20 {
        let time = Utc.with_ymd_and_hms(2021, 3, 20, 5, 30, 0).unwrap() + Duration::days(12 * k);
        let orbit = if k % 4 == 3 { OrbitDirection::Descending } else { OrbitDirection::Ascending };
        let raster = Raster::new(vec![
            Band { name: "VV".to_string(), data: Array2::from_elem((12, 12), -11.0) },
            Band { name: "VH".to_string(), data: Array2::from_elem((12, 12), -17.5) },
            Band { name: "angle".to_string(), data: Array2::from_elem((12, 12), 39.2) },
        ])
        .expect("Failed to build raster")
        .with_geo_transform(geo);
        source.push(Frame::new(time, raster).with_orbit(orbit));
    }
    source
}

#[test]
fn test_fetch_filters_by_date_and_orbit() {
    init_logging();

    let config = RunConfig::from_json_str(RUN).expect("Invalid run config");
    let source = acquisitions(&config);
    let series = source.fetch_series(&config.series_request()).expect("Fetch failed");

    assert!(!series.is_empty());
    assert!(series.frames().iter().all(|f| f.orbit_direction == Some(OrbitDirection::Ascending)));
    assert!(series.timestamps().iter().all(|t| *t >= config.start && *t <= config.end));
    assert_eq!(series.band_names(), vec!["VV", "VH", "angle"]);
}

#[test]
fn test_backscatter_preparation_end_to_end() {
    init_logging();

    let config = RunConfig::from_json_str(RUN).expect("Invalid run config");
    assert_eq!(config.speckle.input_scale, BackscatterScale::Decibel);

    let prepared = prepare_backscatter(&acquisitions(&config), &config).expect("Preparation failed");
    println!("Prepared {} frames", prepared.len());

    for frame in prepared.frames() {
        for &v in frame.raster.band("VV").unwrap() {
            assert!((v + 11.0).abs() < 1e-3);
        }
        for &v in frame.raster.band("VH").unwrap() {
            assert!((v + 17.5).abs() < 1e-3);
        }
        assert!(frame.raster.band("angle").unwrap().iter().all(|&a| a == 39.2));
        assert!(frame.raster.geo_transform().is_some());
    }

    let mut sink = InMemorySink::new();
    export_prepared(&mut sink, &prepared, "meadow/s1", &config).expect("Export failed");
    assert_eq!(sink.exports().len(), 1);
    assert_eq!(sink.exports()[0].scale, 10.0);
    assert!(sink
        .export_series(&prepared, "  ", config.export_scale, &config.site.footprint())
        .is_err());
}

#[test]
fn test_ndvi_preparation_end_to_end() {
    init_logging();

    let config = RunConfig::from_json_str(RUN).expect("Invalid run config");
    let frames = (0..30)
        .map(|k| {
            let time = config.start + Duration::days(6 * k + 2);
            let value = 0.35 + 0.01 * k as f32;
            let mut data = Array2::from_elem((3, 3), value);
            if k % 5 == 0 {
                data[[0, 0]] = f32::NAN;
            }
            Frame::new(time, Raster::single_band("NDVI", data))
        })
        .collect();
    let ndvi = sarmoist::types::RasterSeries::new(frames).unwrap();

    let smoothed = prepare_ndvi(&ndvi, "NDVI", &config).expect("NDVI preparation failed");
    assert_eq!(smoothed.timestamps()[0], config.start);
    let step = smoothed.timestamps()[1] - smoothed.timestamps()[0];
    assert_eq!(step, Duration::days(config.smoothing.grid_interval_days as i64));
    assert!(smoothed
        .frames()
        .iter()
        .any(|f| f.raster.band("NDVI").unwrap()[[1, 1]].is_finite()));
}

#[test]
fn test_fetch_skips_single_pol_frames() {
    init_logging();

    let config = RunConfig::from_json_str(RUN).expect("Invalid run config");
    let time = Utc.with_ymd_and_hms(2021, 5, 2, 5, 30, 0).unwrap();
    let dual = Raster::new(vec![
        Band { name: "VV".to_string(), data: Array2::from_elem((4, 4), -10.0) },
        Band { name: "VH".to_string(), data: Array2::from_elem((4, 4), -16.0) },
        Band { name: "angle".to_string(), data: Array2::from_elem((4, 4), 40.0) },
    ])
    .expect("Failed to build raster");
    let single = Raster::new(vec![
        Band { name: "VV".to_string(), data: Array2::from_elem((4, 4), -10.0) },
        Band { name: "angle".to_string(), data: Array2::from_elem((4, 4), 40.0) },
    ])
    .expect("Failed to build raster");

    let source = InMemorySource::new(vec![
        Frame::new(time, dual).with_orbit(OrbitDirection::Ascending),
        Frame::new(time + Duration::days(12), single).with_orbit(OrbitDirection::Ascending),
    ]);
    let series = source.fetch_series(&config.series_request()).expect("Fetch failed");

    assert_eq!(series.timestamps(), vec![time]);
    assert_eq!(series.band_names(), vec!["VV", "VH", "angle"]);
}

#[test]
fn test_ndvi_without_acquisitions_is_masked_grid() {
    init_logging();

    let config = RunConfig::from_json_str(RUN).expect("Invalid run config");
    let empty = sarmoist::types::RasterSeries::default();
    let smoothed = prepare_ndvi(&empty, "NDVI", &config).expect("NDVI preparation failed");

    assert!(!smoothed.is_empty());
    assert_eq!(smoothed.timestamps()[0], config.start);
    assert!(smoothed
        .frames()
        .iter()
        .all(|f| f.raster.band("NDVI").unwrap().iter().all(|v| v.is_nan())));
}
