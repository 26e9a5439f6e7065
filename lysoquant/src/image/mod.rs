mod io;


use std::collections::BTreeSet;

use common::Buffer2;
use serde::{Deserialize, Serialize};

use crate::classes::ClassLabelMap;
use crate::error::{Error, Result};

pub use self::io::{load_stack, parse_imagej_description, save_rgb_stack, ImageJDescription};

/// Physical size of one pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub unit: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixel_width: 1.0,
            pixel_height: 1.0,
            unit: "pixel".to_string(),
        }
    }
}

impl Calibration {
    pub fn new(pixel_width: f64, pixel_height: f64, unit: impl Into<String>) -> Self {
        Self {
            pixel_width,
            pixel_height,
            unit: unit.into(),
        }
    }

    pub fn is_uncalibrated(&self) -> bool {
        *self == Self::default()
    }

    pub fn pixel_area(&self) -> f64 {
        self.pixel_width * self.pixel_height
    }

    /// Converts an area in calibrated units to a pixel count.
    pub fn area_to_pixels(&self, area: f64) -> f64 {
        area / self.pixel_area()
    }

    /// Calibration of the same field of view sampled `factor` times coarser.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            pixel_width: self.pixel_width * factor,
            pixel_height: self.pixel_height * factor,
            unit: self.unit.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    pub fn max_value(self) -> u16 {
        match self {
            BitDepth::Eight => u8::MAX as u16,
            BitDepth::Sixteen => u16::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub slices: usize,
    pub frames: usize,
}

impl Dimensions {
    pub fn plane_count(&self) -> usize {
        self.channels * self.slices * self.frames
    }
}

/// Multichannel image stack.
///
/// Planes are stored channel-fastest, then slice, then frame; positions are
/// 1-based `(c, z, t)`.
#[derive(Debug, Clone)]
pub struct Hyperstack {
    title: String,
    dims: Dimensions,
    bit_depth: BitDepth,
    calibration: Calibration,
    planes: Vec<Buffer2<u16>>,
}

pub type RawImage = Hyperstack;

impl Hyperstack {
    pub fn new(
        title: impl Into<String>,
        channels: usize,
        slices: usize,
        frames: usize,
        bit_depth: BitDepth,
        planes: Vec<Buffer2<u16>>,
    ) -> Result<Self> {
        let first = planes
            .first()
            .ok_or_else(|| Error::InputValidation("image has no planes".to_string()))?;

        let dims = Dimensions {
            width: first.width(),
            height: first.height(),
            channels,
            slices,
            frames,
        };

        if dims.width == 0 || dims.height == 0 {
            return Err(Error::InputValidation("image is empty".to_string()));
        }
        if channels == 0 || slices == 0 || frames == 0 {
            return Err(Error::InputValidation(format!(
                "invalid hyperstack dimensions c={} z={} t={}",
                channels, slices, frames
            )));
        }
        if planes.len() != dims.plane_count() {
            return Err(Error::InputValidation(format!(
                "expected {} planes for c={} z={} t={}, got {}",
                dims.plane_count(),
                channels,
                slices,
                frames,
                planes.len()
            )));
        }
        if planes.iter().any(|plane| !plane.same_size(first)) {
            return Err(Error::InputValidation(
                "all planes must have the same size".to_string(),
            ));
        }
        let max_value = bit_depth.max_value();
        if planes
            .iter()
            .any(|plane| plane.iter().any(|&v| v > max_value))
        {
            return Err(Error::InputValidation(format!(
                "pixel values exceed {:?} range",
                bit_depth
            )));
        }

        Ok(Self {
            title: title.into(),
            dims,
            bit_depth,
            calibration: Calibration::default(),
            planes,
        })
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn width(&self) -> usize {
        self.dims.width
    }

    pub fn height(&self) -> usize {
        self.dims.height
    }

    pub fn channels(&self) -> usize {
        self.dims.channels
    }

    pub fn slices(&self) -> usize {
        self.dims.slices
    }

    pub fn frames(&self) -> usize {
        self.dims.frames
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    fn plane_index(&self, c: usize, z: usize, t: usize) -> usize {
        assert!(
            (1..=self.dims.channels).contains(&c)
                && (1..=self.dims.slices).contains(&z)
                && (1..=self.dims.frames).contains(&t),
            "position c={} z={} t={} outside {:?}",
            c,
            z,
            t,
            self.dims
        );
        (t - 1) * self.dims.channels * self.dims.slices + (z - 1) * self.dims.channels + (c - 1)
    }

    pub fn plane(&self, c: usize, z: usize, t: usize) -> &Buffer2<u16> {
        &self.planes[self.plane_index(c, z, t)]
    }

    pub fn planes(&self) -> &[Buffer2<u16>] {
        &self.planes
    }

    /// Reinterprets the plane list with new hyperstack dimensions.
    pub fn set_dimensions(&mut self, channels: usize, slices: usize, frames: usize) -> Result<()> {
        if channels * slices * frames != self.planes.len() {
            return Err(Error::InputValidation(format!(
                "cannot reshape {} planes to c={} z={} t={}",
                self.planes.len(),
                channels,
                slices,
                frames
            )));
        }
        self.dims.channels = channels;
        self.dims.slices = slices;
        self.dims.frames = frames;
        Ok(())
    }
}

/// Segmentation output: one channel, pixel value is the class id (0 = background).
#[derive(Debug, Clone)]
pub struct LabelImage {
    stack: Hyperstack,
}

impl LabelImage {
    pub fn new(stack: Hyperstack) -> Result<Self> {
        if stack.channels() != 1 {
            return Err(Error::InputValidation(format!(
                "label image must have a single channel, got {}",
                stack.channels()
            )));
        }
        Ok(Self { stack })
    }

    /// Builds a single-channel label image from `slices * frames` planes.
    pub fn from_planes(
        title: impl Into<String>,
        slices: usize,
        frames: usize,
        planes: Vec<Buffer2<u16>>,
    ) -> Result<Self> {
        Self::new(Hyperstack::new(
            title,
            1,
            slices,
            frames,
            BitDepth::Sixteen,
            planes,
        )?)
    }

    pub fn stack(&self) -> &Hyperstack {
        &self.stack
    }

    pub fn title(&self) -> &str {
        self.stack.title()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.stack.set_title(title);
    }

    pub fn width(&self) -> usize {
        self.stack.width()
    }

    pub fn height(&self) -> usize {
        self.stack.height()
    }

    pub fn slices(&self) -> usize {
        self.stack.slices()
    }

    pub fn frames(&self) -> usize {
        self.stack.frames()
    }

    pub fn plane_count(&self) -> usize {
        self.stack.planes().len()
    }

    pub fn calibration(&self) -> &Calibration {
        self.stack.calibration()
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.stack.set_calibration(calibration);
    }

    pub fn plane(&self, z: usize, t: usize) -> &Buffer2<u16> {
        self.stack.plane(1, z, t)
    }

    pub fn set_dimensions(&mut self, slices: usize, frames: usize) -> Result<()> {
        self.stack.set_dimensions(1, slices, frames)
    }

    /// Label values present anywhere in the stack that are not known classes.
    pub fn unknown_classes(&self, classes: &ClassLabelMap) -> BTreeSet<u16> {
        self.stack
            .planes()
            .iter()
            .flat_map(|plane| plane.iter().copied())
            .filter(|&value| value != 0 && !classes.contains(value))
            .collect()
    }
}
