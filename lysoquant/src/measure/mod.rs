//! Intensity measurements of a raw plane restricted to an object mask.

#[cfg(test)]
mod tests;

use common::Buffer2;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::geometry::{DRect, Mask, Rect};
use crate::image::Calibration;

/// Selectable measurement; each one contributes one or more table columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    Area,
    Mean,
    StdDev,
    MinMax,
    Median,
    IntegratedDensity,
    Centroid,
    BoundingRect,
}

impl Measurement {
    pub fn default_set() -> Vec<Measurement> {
        vec![Measurement::Area, Measurement::Mean, Measurement::MinMax]
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Measurement::Area => &["Area"],
            Measurement::Mean => &["Mean"],
            Measurement::StdDev => &["StdDev"],
            Measurement::MinMax => &["Min", "Max"],
            Measurement::Median => &["Median"],
            Measurement::IntegratedDensity => &["IntDen", "RawIntDen"],
            Measurement::Centroid => &["X", "Y"],
            Measurement::BoundingRect => &["BX", "BY", "Width", "Height"],
        }
    }
}

/// Statistics of the pixels of one plane under one mask.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensityStats {
    pub pixel_count: usize,
    /// Calibrated area.
    pub area: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// Calibrated area times mean.
    pub integrated_density: f64,
    /// Sum of pixel values.
    pub raw_integrated_density: f64,
    /// Calibrated centroid of the pixel centres.
    pub centroid: DVec2,
    /// Pixel bounds of the measured pixels.
    pub bounds: Rect,
    /// `bounds` in calibrated units.
    pub calibrated_bounds: DRect,
}

impl IntensityStats {
    /// Column values for `measurement`, in the order of [`Measurement::columns`].
    pub fn values(&self, measurement: Measurement) -> Vec<f64> {
        match measurement {
            Measurement::Area => vec![self.area],
            Measurement::Mean => vec![self.mean],
            Measurement::StdDev => vec![self.std_dev],
            Measurement::MinMax => vec![self.min, self.max],
            Measurement::Median => vec![self.median],
            Measurement::IntegratedDensity => {
                vec![self.integrated_density, self.raw_integrated_density]
            }
            Measurement::Centroid => vec![self.centroid.x, self.centroid.y],
            Measurement::BoundingRect => {
                let size = self.calibrated_bounds.max - self.calibrated_bounds.min;
                vec![
                    self.calibrated_bounds.min.x,
                    self.calibrated_bounds.min.y,
                    size.x,
                    size.y,
                ]
            }
        }
    }
}

/// Measures `plane` under `mask`. Returns `None` when the mask covers no pixel of the plane.
pub fn measure(
    plane: &Buffer2<u16>,
    mask: &Mask,
    calibration: &Calibration,
) -> Option<IntensityStats> {
    let mut values: Vec<f64> = Vec::with_capacity(mask.count());
    let mut centre_sum = DVec2::ZERO;
    let (mut x0, mut y0) = (usize::MAX, usize::MAX);
    let (mut x1, mut y1) = (0usize, 0usize);

    for (x, y) in mask.iter() {
        let Some(&value) = plane.try_get(x as i64, y as i64) else {
            continue;
        };
        values.push(value as f64);
        centre_sum += DVec2::new(x as f64 + 0.5, y as f64 + 0.5);
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x + 1);
        y1 = y1.max(y + 1);
    }

    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let mean = sum / n;
    let std_dev = if values.len() > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let area = n * calibration.pixel_area();
    let centroid = centre_sum / n;
    let median = median(&mut values)?;
    let bounds = Rect::new(x0 as i64, y0 as i64, (x1 - x0) as i64, (y1 - y0) as i64);
    let pixel_size = DVec2::new(calibration.pixel_width, calibration.pixel_height);

    Some(IntensityStats {
        pixel_count: values.len(),
        area,
        mean,
        std_dev,
        min,
        max,
        median,
        integrated_density: area * mean,
        raw_integrated_density: sum,
        centroid: centroid * pixel_size,
        bounds,
        calibrated_bounds: {
            let pixel_bounds = bounds.to_drect();
            DRect::new(pixel_bounds.min * pixel_size, pixel_bounds.max * pixel_size)
        },
    })
}

/// Fraction of an object's pixels that fall in the cargo intensity window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CargoArea {
    /// Percentage, 0 to 100.
    pub percent: f64,
    pub min_threshold: u16,
    pub max_threshold: u16,
}

/// Thresholds `plane` at `[threshold, plane max]` and measures the in-window
/// share of the pixels under `mask`.
pub fn cargo_area(plane: &Buffer2<u16>, mask: &Mask, threshold: u16) -> Option<CargoArea> {
    let plane_max = plane.iter().copied().max()?;

    let mut total = 0usize;
    let mut inside = 0usize;
    for (x, y) in mask.iter() {
        let Some(&value) = plane.try_get(x as i64, y as i64) else {
            continue;
        };
        total += 1;
        if value >= threshold && value <= plane_max {
            inside += 1;
        }
    }

    if total == 0 {
        return None;
    }

    Some(CargoArea {
        percent: 100.0 * inside as f64 / total as f64,
        min_threshold: threshold,
        max_threshold: plane_max,
    })
}

/// Middle value after sorting; the mean of the two middle values for even lengths.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
