use std::str::FromStr;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::{DRect, Mask, Shape};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoiKind {
    Rectangle { rect: DRect },
    Polygon { points: Vec<DVec2> },
}

/// Named region of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: RoiKind,
}

impl Roi {
    pub fn rect(name: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            name: name.into(),
            kind: RoiKind::Rectangle {
                rect: DRect::new(DVec2::new(x, y), DVec2::new(x + width, y + height)),
            },
        }
    }

    pub fn polygon(name: impl Into<String>, points: Vec<DVec2>) -> Self {
        Self {
            name: name.into(),
            kind: RoiKind::Polygon { points },
        }
    }

    /// `xxxx-yyyy` of the integer bounds, used as a cell id for an unnamed selection.
    pub fn cell_id(&self) -> String {
        let bounds = self.int_bounds();
        format!("{:04}-{:04}", bounds.x, bounds.y)
    }
}

impl Shape for Roi {
    fn bounds(&self) -> DRect {
        match &self.kind {
            RoiKind::Rectangle { rect } => *rect,
            RoiKind::Polygon { points } => {
                let Some((first, rest)) = points.split_first() else {
                    return DRect::new(DVec2::ZERO, DVec2::ZERO);
                };
                rest.iter().fold(DRect::new(*first, *first), |acc, p| {
                    DRect::new(acc.min.min(*p), acc.max.max(*p))
                })
            }
        }
    }

    fn scaled(&self, factor: f64) -> Self {
        let kind = match &self.kind {
            RoiKind::Rectangle { rect } => RoiKind::Rectangle {
                rect: DRect::new(rect.min * factor, rect.max * factor),
            },
            RoiKind::Polygon { points } => RoiKind::Polygon {
                points: points.iter().map(|p| *p * factor).collect(),
            },
        };
        Self {
            name: self.name.clone(),
            kind,
        }
    }

    fn relocated(&self, from: DVec2, to: DVec2) -> Self {
        let map = |p: DVec2| to + (p - from);
        let kind = match &self.kind {
            RoiKind::Rectangle { rect } => RoiKind::Rectangle {
                rect: DRect::new(map(rect.min), map(rect.max)),
            },
            RoiKind::Polygon { points } => RoiKind::Polygon {
                points: points.iter().map(|p| map(*p)).collect(),
            },
        };
        Self {
            name: self.name.clone(),
            kind,
        }
    }

    fn contains(&self, point: DVec2) -> bool {
        match &self.kind {
            RoiKind::Rectangle { rect } => rect.contains(point),
            RoiKind::Polygon { points } => polygon_contains(points, point),
        }
    }
}

/// Even-odd rule point-in-polygon test.
fn polygon_contains(points: &[DVec2], p: DVec2) -> bool {
    if points.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Union of several ROIs rasterized onto one image.
pub fn union_mask(rois: &[Roi], width: usize, height: usize) -> Mask {
    rois.iter().fold(Mask::empty(), |acc, roi| {
        acc.union_with(&roi.rasterize(width, height), width, height)
    })
}

/// Parses `name:x,y,w,h` (rectangle) or `name:x1,y1,x2,y2,x3,y3,...` (polygon).
impl FromStr for Roi {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (name, coords) = text.rsplit_once(':').unwrap_or(("", text));
        let values = coords
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Config(format!("invalid ROI {:?}: {}", text, e)))?;

        match values.len() {
            4 => Ok(Roi::rect(name, values[0], values[1], values[2], values[3])),
            n if n >= 6 && n % 2 == 0 => Ok(Roi::polygon(
                name,
                values
                    .chunks_exact(2)
                    .map(|pair| DVec2::new(pair[0], pair[1]))
                    .collect(),
            )),
            _ => Err(Error::Config(format!(
                "ROI {:?} needs x,y,w,h or at least three x,y points",
                text
            ))),
        }
    }
}
