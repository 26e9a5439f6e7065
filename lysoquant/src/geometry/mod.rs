//! Shapes on pixel grids and the label-grid to raw-grid rescale.
//!
//! Rescaling is two separate steps: [`scale_shape`] multiplies every
//! coordinate by the scale factor, and [`overwrite_origin`] then moves the
//! scaled shape so its bounding origin sits on `floor(origin * scale)` of the
//! unscaled integer bounds. Truncation makes the two steps order-sensitive, so
//! [`rescale`] always applies them in this order.

mod footprint;
mod roi;


use common::Buffer2;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use footprint::Footprint;
pub use roi::{union_mask, Roi, RoiKind};

/// Integer bounding rectangle (x, y, width, height).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }

    /// Intersection with the image `[0, width) x [0, height)`.
    pub fn clip(&self, width: usize, height: usize) -> Rect {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = self.right().min(width as i64);
        let y1 = self.bottom().min(height as i64);
        Rect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }

    pub fn to_drect(&self) -> DRect {
        DRect::new(
            DVec2::new(self.x as f64, self.y as f64),
            DVec2::new(self.right() as f64, self.bottom() as f64),
        )
    }
}

/// Half-open rectangle `[min, max)` with floating-point corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DRect {
    pub min: DVec2,
    pub max: DVec2,
}

impl DRect {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    pub fn union(&self, other: &DRect) -> DRect {
        DRect::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Smallest integer rectangle covering this one.
    pub fn to_rect(&self) -> Rect {
        let x = self.min.x.floor() as i64;
        let y = self.min.y.floor() as i64;
        Rect::new(
            x,
            y,
            self.max.x.ceil() as i64 - x,
            self.max.y.ceil() as i64 - y,
        )
    }
}

/// Pixel membership on an image grid, stored only over its bounding rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    bounds: Rect,
    pixels: Buffer2<bool>,
}

impl Mask {
    pub fn empty() -> Self {
        Self {
            bounds: Rect::default(),
            pixels: Buffer2::new(0, 0, Vec::new()),
        }
    }

    pub fn full(width: usize, height: usize) -> Self {
        Self {
            bounds: Rect::new(0, 0, width as i64, height as i64),
            pixels: Buffer2::new_filled(width, height, true),
        }
    }

    /// Bounds of the stored window, already clipped to the image.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        let lx = x as i64 - self.bounds.x;
        let ly = y as i64 - self.bounds.y;
        self.pixels.try_get(lx, ly).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.pixels.iter().filter(|&&inside| inside).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Image coordinates of every pixel inside the mask, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let bx = self.bounds.x as usize;
        let by = self.bounds.y as usize;
        let width = self.pixels.width();
        self.pixels
            .iter()
            .enumerate()
            .filter(|(_, &inside)| inside)
            .map(move |(idx, _)| (bx + idx % width, by + idx / width))
    }

    pub fn union_with(&self, other: &Mask, width: usize, height: usize) -> Mask {
        let mut pixels = Buffer2::new_filled(width, height, false);
        for (x, y) in self.iter().chain(other.iter()) {
            if x < width && y < height {
                pixels[(x, y)] = true;
            }
        }
        Mask {
            bounds: Rect::new(0, 0, width as i64, height as i64),
            pixels,
        }
    }
}

/// A region that can be scaled, moved and rasterized onto a pixel grid.
pub trait Shape: Sized {
    fn bounds(&self) -> DRect;

    fn scaled(&self, factor: f64) -> Self;

    /// Moves the shape rigidly, mapping every point `p` to `to + (p - from)`.
    fn relocated(&self, from: DVec2, to: DVec2) -> Self;

    fn contains(&self, point: DVec2) -> bool;

    fn int_bounds(&self) -> Rect {
        self.bounds().to_rect()
    }

    /// Marks each pixel whose centre lies inside the shape, clipped to the image.
    fn rasterize(&self, width: usize, height: usize) -> Mask {
        let bounds = self.int_bounds().clip(width, height);
        if bounds.is_empty() {
            return Mask::empty();
        }

        let pixels = Buffer2::from_fn(bounds.width as usize, bounds.height as usize, |lx, ly| {
            let centre = DVec2::new(
                (bounds.x + lx as i64) as f64 + 0.5,
                (bounds.y + ly as i64) as f64 + 0.5,
            );
            self.contains(centre)
        });

        Mask { bounds, pixels }
    }
}

fn check_scale(factor: f64) -> Result<()> {
    if factor > 0.0 && factor.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidScale(factor))
    }
}

/// Multiplies every coordinate of the shape by `factor`.
pub fn scale_shape<S: Shape>(shape: &S, factor: f64) -> Result<S> {
    check_scale(factor)?;
    Ok(shape.scaled(factor))
}

/// Moves the shape so its bounding origin is exactly `origin`.
pub fn overwrite_origin<S: Shape>(shape: &S, origin: (i64, i64)) -> S {
    let current = shape.bounds().min;
    shape.relocated(current, DVec2::new(origin.0 as f64, origin.1 as f64))
}

/// Maps a shape onto a grid `factor` times finer (or coarser).
///
/// The resulting integer origin is `floor(origin * factor)` of the original
/// integer bounds, regardless of where the shape scale alone would put it.
pub fn rescale<S: Shape>(shape: &S, factor: f64) -> Result<S> {
    check_scale(factor)?;
    let origin = shape.int_bounds();
    let new_origin = (
        (origin.x as f64 * factor).floor() as i64,
        (origin.y as f64 * factor).floor() as i64,
    );
    let scaled = scale_shape(shape, factor)?;
    Ok(overwrite_origin(&scaled, new_origin))
}
