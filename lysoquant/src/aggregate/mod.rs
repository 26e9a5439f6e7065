//! Measurement Aggregator: per-object records and per-condition summaries.
//!
//! One [`Aggregator::count`] call processes every selected (frame, slice) of
//! one image for one region and appends to the caller's [`ResultSink`], so
//! repeated calls (one per ROI) accumulate in the same sink.


use crate::classes::ClassLabelMap;
use crate::error::{Error, Result};
use crate::geometry::{rescale, Roi, Shape};
use crate::image::{LabelImage, RawImage};
use crate::labeling::extract_objects;
use crate::measure::{cargo_area, measure, median};
use crate::range::DimRange;
use crate::sink::{ClassCount, MeasurementRecord, ResultSink, SummaryRecord};

/// Resolved parameters of one quantification run.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantSettings {
    pub lyso_channel: usize,
    pub protein_channel: usize,
    /// Channels measured for every object.
    pub channels: DimRange,
    pub slices: DimRange,
    pub frames: DimRange,
    /// Minimum object area in calibrated units of the label image.
    pub min_size: f64,
    /// Emit one measurement record per object and channel.
    pub show_values: bool,
    /// Lower bound of the cargo intensity window; `None` disables cargo measurement.
    pub cargo_threshold: Option<u16>,
    pub classes: ClassLabelMap,
}

/// Counts of one [`Aggregator::count`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub summaries: usize,
    pub measurements: usize,
    pub objects: usize,
}

impl std::ops::AddAssign for PassStats {
    fn add_assign(&mut self, other: Self) {
        self.summaries += other.summaries;
        self.measurements += other.measurements;
        self.objects += other.objects;
    }
}

/// Which label plane holds a given raw slice or frame.
#[derive(Debug, Clone, Copy)]
enum PlaneMap {
    /// Label stack has the raw stack's extent.
    Same,
    /// Label stack covers only the selected range.
    Offset(usize),
}

impl PlaneMap {
    fn resolve(label_count: usize, raw_count: usize, range: DimRange, what: &str) -> Result<Self> {
        if label_count == raw_count {
            Ok(PlaneMap::Same)
        } else if label_count == range.len() {
            Ok(PlaneMap::Offset(range.first - 1))
        } else {
            Err(Error::InputValidation(format!(
                "label image has {} {}, expected {} or {}",
                label_count,
                what,
                raw_count,
                range.len()
            )))
        }
    }

    fn label_index(self, raw_index: usize) -> usize {
        match self {
            PlaneMap::Same => raw_index,
            PlaneMap::Offset(offset) => raw_index - offset,
        }
    }
}

pub struct Aggregator<'a> {
    settings: &'a QuantSettings,
}

impl<'a> Aggregator<'a> {
    pub fn new(settings: &'a QuantSettings) -> Self {
        Self { settings }
    }

    /// Quantifies `labels` against `raw` for every selected (frame, slice).
    ///
    /// `roi`, when given, is on the label grid and restricts the object
    /// search; its name becomes part of each summary title.
    pub fn count(
        &self,
        labels: &LabelImage,
        raw: &RawImage,
        roi: Option<&Roi>,
        cell_id: &str,
        sink: &mut ResultSink,
    ) -> Result<PassStats> {
        let settings = self.settings;
        let n_slices = raw.slices();
        let n_frames = raw.frames();

        let ranges = [settings.channels, settings.slices, settings.frames];
        if ranges.iter().any(|range| range.first < 1 || range.first > range.last)
            || settings.channels.last > raw.channels()
            || settings.slices.last > n_slices
            || settings.frames.last > n_frames
        {
            return Err(Error::InputValidation(format!(
                "ranges c={} z={} t={} exceed image {:?}",
                settings.channels,
                settings.slices,
                settings.frames,
                raw.dims()
            )));
        }

        let slice_map = PlaneMap::resolve(labels.slices(), n_slices, settings.slices, "slices")?;
        let frame_map = PlaneMap::resolve(labels.frames(), n_frames, settings.frames, "frames")?;

        let scale = raw.width() as f64 / labels.width() as f64;
        let min_size_pixels = labels.calibration().area_to_pixels(settings.min_size);
        let region = roi.map(|roi| roi.rasterize(labels.width(), labels.height()));
        let roi_name = roi.map(|roi| roi.name.as_str()).unwrap_or("");

        log::debug!(
            "Counting {} against {} at scale {:.3}, min size {:.2} px",
            labels.title(),
            raw.title(),
            scale,
            min_size_pixels
        );

        let mut stats = PassStats::default();

        for t in settings.frames.iter() {
            for z in settings.slices.iter() {
                let slice_label = (n_slices > 1).then(|| format!("-z:{}/{}", z, n_slices));
                let frame_label = (n_frames > 1).then(|| format!("-t:{}/{}", t, n_frames));
                let title = format!(
                    "{}{}{}{}",
                    raw.title(),
                    roi_name,
                    slice_label.as_deref().unwrap_or(""),
                    frame_label.as_deref().unwrap_or("")
                );

                let mut class_counts = Vec::with_capacity(settings.classes.len());
                let mut cargo_values = Vec::new();

                for class in settings.classes.iter() {
                    let objects = extract_objects(
                        labels,
                        class.id,
                        region.as_ref(),
                        min_size_pixels,
                        slice_map.label_index(z),
                        frame_map.label_index(t),
                    );
                    class_counts.push(ClassCount {
                        class_id: class.id,
                        name: class.name.clone(),
                        count: objects.len(),
                    });
                    stats.objects += objects.len();

                    if !settings.show_values {
                        continue;
                    }

                    for object in &objects {
                        let mask = rescale(&object.footprint, scale)?
                            .rasterize(raw.width(), raw.height());

                        for c in settings.channels.iter() {
                            let plane = raw.plane(c, z, t);
                            let Some(intensity) = measure(plane, &mask, raw.calibration()) else {
                                log::debug!(
                                    "{}-{} has no pixels inside {}",
                                    class.name,
                                    object.ordinal,
                                    raw.title()
                                );
                                continue;
                            };
                            let cargo = settings
                                .cargo_threshold
                                .and_then(|threshold| cargo_area(plane, &mask, threshold));
                            if let Some(cargo) = &cargo {
                                cargo_values.push(cargo.percent);
                            }

                            sink.push_measurement(MeasurementRecord {
                                object_name: format!("{}-{}", class.name, object.ordinal),
                                class_name: class.name.clone(),
                                lyso_channel: settings.lyso_channel,
                                protein_channel: settings.protein_channel,
                                measurement_channel: c,
                                image: raw.title().to_string(),
                                cell_id: cell_id.to_string(),
                                slice: slice_label.clone(),
                                frame: frame_label.clone(),
                                stats: intensity,
                                cargo,
                            })?;
                            stats.measurements += 1;
                        }
                    }
                }

                let cargo_median = settings
                    .cargo_threshold
                    .map(|_| median(&mut cargo_values).unwrap_or(f64::NAN));
                let summary = SummaryRecord::from_counts(
                    title,
                    settings.lyso_channel,
                    settings.protein_channel,
                    class_counts,
                    cargo_median,
                );
                if summary.is_degenerate() {
                    log::warn!("No objects found for {}, class ratios are undefined", summary.title);
                }
                sink.push_summary(summary)?;
                stats.summaries += 1;
            }
        }

        Ok(stats)
    }
}
