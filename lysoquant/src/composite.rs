//! RGB composite fed to the segmentation model.

use std::path::Path;

use common::Buffer2;

use crate::error::{Error, Result};
use crate::geometry::Mask;
use crate::image::{save_rgb_stack, Calibration, RawImage};
use crate::range::DimRange;

/// RGB stack over the selected slices and frames, slice fastest.
#[derive(Debug, Clone)]
pub struct CompositeStack {
    pub title: String,
    pub slices: usize,
    pub frames: usize,
    pub calibration: Calibration,
    pub planes: Vec<Buffer2<[u8; 3]>>,
}

impl CompositeStack {
    pub fn width(&self) -> usize {
        self.planes.first().map_or(0, |plane| plane.width())
    }

    pub fn height(&self) -> usize {
        self.planes.first().map_or(0, |plane| plane.height())
    }

    pub fn plane(&self, z: usize, t: usize) -> &Buffer2<[u8; 3]> {
        &self.planes[(t - 1) * self.slices + (z - 1)]
    }

    /// Zeroes every pixel outside `mask` on every plane.
    pub fn clear_outside(&mut self, mask: &Mask) {
        for plane in &mut self.planes {
            let width = plane.width();
            for (idx, pixel) in plane.iter_mut().enumerate() {
                if !mask.contains(idx % width, idx / width) {
                    *pixel = [0, 0, 0];
                }
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_rgb_stack(path, &self.planes)
    }
}

/// Linear map of `[min, max]` onto `[0, 255]`.
#[derive(Debug, Clone, Copy)]
struct DisplayRange {
    min: u16,
    max: u16,
}

impl DisplayRange {
    fn of<'a>(planes: impl Iterator<Item = &'a Buffer2<u16>>) -> Self {
        let (min, max) = planes
            .flat_map(|plane| plane.iter().copied())
            .fold((u16::MAX, u16::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Self { min, max }
    }

    fn apply(&self, value: u16) -> u8 {
        if self.max <= self.min {
            return 0;
        }
        let scaled = (value.saturating_sub(self.min)) as f64 * 255.0 / (self.max - self.min) as f64;
        scaled.round().min(255.0) as u8
    }
}

/// Protein channel in red, lysosome channel in green, blue empty.
pub fn make_composite(
    raw: &RawImage,
    protein_channel: usize,
    lyso_channel: usize,
    slices: DimRange,
    frames: DimRange,
) -> Result<CompositeStack> {
    for channel in [protein_channel, lyso_channel] {
        if channel < 1 || channel > raw.channels() {
            return Err(Error::InputValidation(format!(
                "channel {} outside 1-{}",
                channel,
                raw.channels()
            )));
        }
    }

    for (name, range, count) in [
        ("slices", slices, raw.slices()),
        ("frames", frames, raw.frames()),
    ] {
        if range.first < 1 || range.first > range.last || range.last > count {
            return Err(Error::InputValidation(format!(
                "{} {} outside 1-{}",
                name, range, count
            )));
        }
    }

    let positions: Vec<(usize, usize)> = frames
        .iter()
        .flat_map(|t| slices.iter().map(move |z| (z, t)))
        .collect();

    let red = DisplayRange::of(
        positions
            .iter()
            .map(|&(z, t)| raw.plane(protein_channel, z, t)),
    );
    let green = DisplayRange::of(positions.iter().map(|&(z, t)| raw.plane(lyso_channel, z, t)));

    let planes = positions
        .iter()
        .map(|&(z, t)| {
            let protein = raw.plane(protein_channel, z, t);
            let lyso = raw.plane(lyso_channel, z, t);
            Buffer2::from_fn(raw.width(), raw.height(), |x, y| {
                [red.apply(protein[(x, y)]), green.apply(lyso[(x, y)]), 0]
            })
        })
        .collect();

    Ok(CompositeStack {
        title: raw.title().to_string(),
        slices: slices.len(),
        frames: frames.len(),
        calibration: raw.calibration().clone(),
        planes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Roi, Shape};
    use crate::image::{BitDepth, Hyperstack};

    fn two_channel_raw() -> RawImage {
        Hyperstack::new(
            "cells.tif",
            2,
            2,
            1,
            BitDepth::Sixteen,
            vec![
                // z=1: c1, c2
                Buffer2::new(2, 1, vec![100, 200]),
                Buffer2::new(2, 1, vec![0, 10]),
                // z=2: c1, c2
                Buffer2::new(2, 1, vec![300, 300]),
                Buffer2::new(2, 1, vec![20, 20]),
            ],
        )
        .unwrap()
        .with_calibration(Calibration::new(0.1, 0.1, "um"))
    }

    #[test]
    fn protein_red_lyso_green_stretched_over_selection() {
        let raw = two_channel_raw();
        let composite = make_composite(&raw, 1, 2, DimRange::full(2), DimRange::full(1)).unwrap();

        assert_eq!(composite.planes.len(), 2);
        assert_eq!(composite.calibration, *raw.calibration());
        assert_eq!(composite.plane(1, 1)[(0, 0)], [0, 0, 0]);
        assert_eq!(composite.plane(1, 1)[(1, 0)], [128, 128, 0]);
        assert_eq!(composite.plane(2, 1)[(0, 0)], [255, 255, 0]);
    }

    #[test]
    fn flat_selection_maps_to_black() {
        let raw = two_channel_raw();
        let composite = make_composite(&raw, 1, 2, DimRange::new(2, 2), DimRange::full(1)).unwrap();

        assert_eq!(composite.slices, 1);
        assert_eq!(composite.plane(1, 1)[(1, 0)], [0, 0, 0]);
    }

    #[test]
    fn rejects_missing_channel() {
        let raw = two_channel_raw();
        assert!(matches!(
            make_composite(&raw, 3, 2, DimRange::full(2), DimRange::full(1)),
            Err(Error::InputValidation(_))
        ));
    }

    #[test]
    fn rejects_ranges_beyond_the_stack() {
        let raw = two_channel_raw();
        assert!(matches!(
            make_composite(&raw, 1, 2, DimRange::new(1, 3), DimRange::full(1)),
            Err(Error::InputValidation(_))
        ));
        assert!(matches!(
            make_composite(&raw, 1, 2, DimRange::full(2), DimRange::new(2, 2)),
            Err(Error::InputValidation(_))
        ));
        assert!(matches!(
            make_composite(&raw, 1, 2, DimRange { first: 0, last: 1 }, DimRange::full(1)),
            Err(Error::InputValidation(_))
        ));
    }

    #[test]
    fn clear_outside_zeroes_every_plane() {
        let raw = two_channel_raw();
        let mut composite =
            make_composite(&raw, 1, 2, DimRange::full(2), DimRange::full(1)).unwrap();
        let mask = Roi::rect("", 1.0, 0.0, 1.0, 1.0).rasterize(2, 1);

        composite.clear_outside(&mask);

        for plane in &composite.planes {
            assert_eq!(plane[(0, 0)], [0, 0, 0]);
        }
        assert_eq!(composite.plane(2, 1)[(1, 0)], [255, 255, 0]);
    }
}
