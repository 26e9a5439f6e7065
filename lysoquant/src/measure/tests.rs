use std::str::FromStr;

use common::{Buffer2, FloatExt};
use strum::IntoEnumIterator;

use super::*;
use crate::geometry::{Roi, Shape};

fn ramp(width: usize, height: usize) -> Buffer2<u16> {
    Buffer2::from_fn(width, height, |x, y| (y * width + x) as u16)
}

#[test]
fn median_of_odd_and_even_lengths() {
    assert!(median(&mut [0.3, 0.1, 0.2]).unwrap().approximately_eq(0.2));
    assert!(median(&mut [0.4, 0.1, 0.3, 0.2]).unwrap().approximately_eq(0.25));
    assert_eq!(median(&mut [7.0]), Some(7.0));
    assert_eq!(median(&mut []), None);
}

#[test]
fn measures_masked_pixels() {
    let plane = ramp(4, 4);
    // pixels 5, 6, 9, 10
    let mask = Roi::rect("", 1.0, 1.0, 2.0, 2.0).rasterize(4, 4);

    let stats = measure(&plane, &mask, &Calibration::default()).unwrap();

    assert_eq!(stats.pixel_count, 4);
    assert_eq!(stats.area, 4.0);
    assert_eq!(stats.mean, 7.5);
    assert_eq!(stats.min, 5.0);
    assert_eq!(stats.max, 10.0);
    assert_eq!(stats.median, 7.5);
    assert_eq!(stats.raw_integrated_density, 30.0);
    assert_eq!(stats.integrated_density, 30.0);
    assert_eq!(stats.centroid, DVec2::new(2.0, 2.0));
    assert_eq!(stats.bounds, Rect::new(1, 1, 2, 2));
    // sample deviation of 5, 6, 9, 10
    assert!(stats.std_dev.approximately_eq((17.0f64 / 3.0).sqrt()));
}

#[test]
fn calibration_scales_area_and_centroid() {
    let plane = ramp(4, 4);
    let mask = Roi::rect("", 0.0, 0.0, 2.0, 1.0).rasterize(4, 4);
    let calibration = Calibration::new(0.5, 0.25, "um");

    let stats = measure(&plane, &mask, &calibration).unwrap();

    assert!(stats.area.approximately_eq(0.25));
    assert!(stats.centroid.x.approximately_eq(0.5));
    assert!(stats.centroid.y.approximately_eq(0.125));
    assert_eq!(
        stats.values(Measurement::BoundingRect),
        vec![0.0, 0.0, 1.0, 0.25]
    );
}

#[test]
fn empty_mask_has_no_stats() {
    let plane = ramp(2, 2);
    assert!(measure(&plane, &Mask::empty(), &Calibration::default()).is_none());
}

#[test]
fn cargo_threshold_runs_to_plane_max() {
    let plane = ramp(4, 4);
    // pixels 0, 1, 4, 5; plane max is 15
    let mask = Roi::rect("", 0.0, 0.0, 2.0, 2.0).rasterize(4, 4);

    let cargo = cargo_area(&plane, &mask, 4).unwrap();

    assert_eq!(cargo.percent, 50.0);
    assert_eq!(cargo.min_threshold, 4);
    assert_eq!(cargo.max_threshold, 15);
    assert_eq!(cargo_area(&plane, &mask, 16).unwrap().percent, 0.0);
}

#[test]
fn every_measurement_has_matching_columns_and_values() {
    let plane = ramp(3, 3);
    let mask = Mask::full(3, 3);
    let calibration = Calibration::default();
    let stats = measure(&plane, &mask, &calibration).unwrap();

    for measurement in Measurement::iter() {
        assert_eq!(
            measurement.columns().len(),
            stats.values(measurement).len(),
            "{}",
            measurement
        );
    }
}

#[test]
fn measurement_names_are_snake_case() {
    assert_eq!(Measurement::MinMax.to_string(), "min_max");
    assert_eq!(
        Measurement::from_str("integrated_density").unwrap(),
        Measurement::IntegratedDensity
    );
    assert_eq!(
        serde_json::to_string(&Measurement::StdDev).unwrap(),
        "\"std_dev\""
    );
}
