//! Label Reader: per-class connected components of a label image.
//!
//! Components are found with run-based union-find labeling, so the output
//! order is the raster order of each component's first pixel. Each object's
//! footprint is its filled outer outline: background enclosed by the object
//! belongs to it, like a traced particle outline.

#[cfg(test)]
mod tests;

use common::Buffer2;

use crate::geometry::{Footprint, Mask};
use crate::image::LabelImage;

/// Pixel connectivity used to group pixels of one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Horizontal and vertical neighbours only.
    Four,
    /// Diagonal neighbours too.
    #[default]
    Eight,
}

/// One connected component of a single class at one (slice, frame).
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledObject {
    pub class_id: u16,
    /// 1-based position among the objects of this class returned by one call.
    pub ordinal: usize,
    /// Pixels of the class that make up the component.
    pub pixel_count: usize,
    pub footprint: Footprint,
}

/// Horizontal run of foreground pixels, `end` exclusive.
#[derive(Debug, Clone, Copy)]
struct Run {
    y: usize,
    start: usize,
    end: usize,
    label: u32,
}

impl Run {
    /// Search window over the previous row, `end` exclusive.
    #[inline]
    fn search_window(&self, connectivity: Connectivity) -> (usize, usize) {
        match connectivity {
            Connectivity::Four => (self.start, self.end),
            Connectivity::Eight => (self.start.saturating_sub(1), self.end + 1),
        }
    }
}

#[inline]
fn runs_connected(prev: &Run, curr: &Run, connectivity: Connectivity) -> bool {
    match connectivity {
        Connectivity::Four => prev.start < curr.end && prev.end > curr.start,
        Connectivity::Eight => prev.start < curr.end + 1 && prev.end + 1 > curr.start,
    }
}

fn extract_runs_from_row(mask: &Buffer2<bool>, y: usize, runs: &mut Vec<Run>) {
    let row = mask.row(y);
    let mut x = 0;
    while x < row.len() {
        if !row[x] {
            x += 1;
            continue;
        }
        let start = x;
        while x < row.len() && row[x] {
            x += 1;
        }
        runs.push(Run {
            y,
            start,
            end: x,
            label: 0,
        });
    }
}

/// Sequential union-find over provisional run labels.
#[derive(Debug)]
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new() -> Self {
        Self {
            parent: Vec::with_capacity(256),
        }
    }

    #[inline]
    fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32;
        self.parent.push(label);
        label
    }

    /// Find root with two-pass path compression.
    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        let mut current = label;
        while current != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }

        root
    }

    /// Keeps the smaller label as root, so roots follow raster order.
    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[larger as usize] = smaller;
        }
    }
}

/// Links each run of the current row to overlapping runs of the previous row.
fn merge_runs_with_prev(
    curr_runs: &mut [Run],
    prev_runs: &[Run],
    connectivity: Connectivity,
    uf: &mut UnionFind,
) {
    let mut prev_idx = 0;
    for run in curr_runs.iter_mut() {
        let (search_start, search_end) = run.search_window(connectivity);

        while prev_idx < prev_runs.len() && prev_runs[prev_idx].end <= search_start {
            prev_idx += 1;
        }

        let mut assigned_label = None;
        let mut check_idx = prev_idx;
        while check_idx < prev_runs.len() && prev_runs[check_idx].start < search_end {
            let prev_run = &prev_runs[check_idx];
            if runs_connected(prev_run, run, connectivity) {
                match assigned_label {
                    Some(label) if label != prev_run.label => uf.union(label, prev_run.label),
                    None => assigned_label = Some(prev_run.label),
                    _ => {}
                }
            }
            check_idx += 1;
        }

        run.label = assigned_label.unwrap_or_else(|| uf.make_set());
    }
}

/// Connected component as a list of runs in raster order.
#[derive(Debug, Clone, Default)]
struct Component {
    runs: Vec<(usize, usize, usize)>,
    pixel_count: usize,
}

fn find_components(mask: &Buffer2<bool>, connectivity: Connectivity) -> Vec<Component> {
    let mut uf = UnionFind::new();
    let mut all_runs: Vec<Run> = Vec::new();
    let mut prev_runs: Vec<Run> = Vec::new();
    let mut curr_runs: Vec<Run> = Vec::new();

    for y in 0..mask.height() {
        curr_runs.clear();
        extract_runs_from_row(mask, y, &mut curr_runs);

        if curr_runs.is_empty() {
            prev_runs.clear();
            continue;
        }

        merge_runs_with_prev(&mut curr_runs, &prev_runs, connectivity, &mut uf);
        all_runs.extend_from_slice(&curr_runs);
        std::mem::swap(&mut prev_runs, &mut curr_runs);
    }

    let mut component_of_root: Vec<Option<usize>> = vec![None; uf.parent.len()];
    let mut components: Vec<Component> = Vec::new();

    for run in &all_runs {
        let root = uf.find(run.label) as usize;
        let idx = *component_of_root[root].get_or_insert_with(|| {
            components.push(Component::default());
            components.len() - 1
        });
        let component = &mut components[idx];
        component.runs.push((run.y, run.start, run.end));
        component.pixel_count += run.end - run.start;
    }

    components
}

/// Footprint of a component with enclosed background filled in.
fn filled_footprint(component: &Component) -> Option<Footprint> {
    let x0 = component.runs.iter().map(|r| r.1).min()?;
    let x1 = component.runs.iter().map(|r| r.2).max()?;
    let y0 = component.runs.first()?.0;
    let y1 = component.runs.last()?.0 + 1;
    let (width, height) = (x1 - x0, y1 - y0);

    let mut object = Buffer2::new_filled(width, height, false);
    for &(y, start, end) in &component.runs {
        for x in start..end {
            object[(x - x0, y - y0)] = true;
        }
    }

    // background reachable from the window border is outside the outline
    let mut outside = Buffer2::new_filled(width, height, false);
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for x in 0..width {
        stack.push((x, 0));
        stack.push((x, height - 1));
    }
    for y in 0..height {
        stack.push((0, y));
        stack.push((width - 1, y));
    }
    while let Some((x, y)) = stack.pop() {
        if object[(x, y)] || outside[(x, y)] {
            continue;
        }
        outside[(x, y)] = true;
        if x > 0 {
            stack.push((x - 1, y));
        }
        if x + 1 < width {
            stack.push((x + 1, y));
        }
        if y > 0 {
            stack.push((x, y - 1));
        }
        if y + 1 < height {
            stack.push((x, y + 1));
        }
    }

    let filled = outside.map(|&out| !out);
    let mut runs = Vec::new();
    for ly in 0..height {
        let mut row_runs = Vec::new();
        extract_runs_from_row(&filled, ly, &mut row_runs);
        runs.extend(row_runs.into_iter().map(|run| {
            (
                (run.y + y0) as i64,
                (run.start + x0) as i64,
                (run.end + x0) as i64,
            )
        }));
    }

    Footprint::from_runs(runs)
}

/// Objects of `class_id` in one label plane.
///
/// Only pixels inside `region` (when given) are considered; components with
/// fewer than `min_size_pixels` pixels are dropped before ordinals are assigned.
pub fn extract_plane_objects(
    plane: &Buffer2<u16>,
    class_id: u16,
    region: Option<&Mask>,
    min_size_pixels: f64,
    connectivity: Connectivity,
) -> Vec<LabeledObject> {
    let mask = Buffer2::from_fn(plane.width(), plane.height(), |x, y| {
        plane[(x, y)] == class_id && region.is_none_or(|r| r.contains(x, y))
    });

    find_components(&mask, connectivity)
        .into_iter()
        .filter(|component| component.pixel_count as f64 >= min_size_pixels)
        .filter_map(|component| {
            filled_footprint(&component).map(|footprint| (component.pixel_count, footprint))
        })
        .enumerate()
        .map(|(idx, (pixel_count, footprint))| LabeledObject {
            class_id,
            ordinal: idx + 1,
            pixel_count,
            footprint,
        })
        .collect()
}

/// Objects of `class_id` at slice `z`, frame `t` of a label image, 8-connected.
pub fn extract_objects(
    labels: &LabelImage,
    class_id: u16,
    region: Option<&Mask>,
    min_size_pixels: f64,
    z: usize,
    t: usize,
) -> Vec<LabeledObject> {
    extract_plane_objects(
        labels.plane(z, t),
        class_id,
        region,
        min_size_pixels,
        Connectivity::Eight,
    )
}
