//! One LysoQuant run: validate, preprocess, segment, quantify.

#[cfg(test)]
mod tests;

use std::borrow::Cow;

use crate::aggregate::{Aggregator, PassStats};
use crate::composite::make_composite;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::geometry::{rescale, union_mask, Roi, Shape};
use crate::image::{LabelImage, RawImage};
use crate::segmentation::{SegmentationParams, Segmenter};
use crate::sink::ResultSink;

/// Cell id used when no region selects a cell.
pub const NO_CELL_ID: &str = "0000-0000";

/// Outcome of [`Session::run`].
#[derive(Debug)]
pub struct RunSummary {
    /// Label image as quantified, titled `LQ_<raw title>`.
    pub labels: LabelImage,
    pub stats: PassStats,
    /// Aggregator passes, one per ROI or one for the whole image.
    pub passes: usize,
}

#[derive(Debug, Clone)]
pub struct Session {
    config: RunConfig,
}

impl Session {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Replaces the raw image calibration when the configuration sets one.
    pub fn apply_calibration(&self, raw: &mut RawImage) {
        if let Some(calibration) = &self.config.calibration {
            raw.set_calibration(calibration.clone());
        }
    }

    /// `raw` with the configured calibration, copied only when it differs.
    fn calibrated<'a>(&self, raw: &'a RawImage) -> Cow<'a, RawImage> {
        match &self.config.calibration {
            Some(calibration) if calibration != raw.calibration() => {
                log::debug!(
                    "Overriding calibration of {} with {:?}",
                    raw.title(),
                    calibration
                );
                Cow::Owned(raw.clone().with_calibration(calibration.clone()))
            }
            _ => Cow::Borrowed(raw),
        }
    }

    /// Checks the raw image against the configured channels before any work starts.
    pub fn validate_input(&self, raw: &RawImage) -> Result<()> {
        if raw.channels() < 2 {
            return Err(Error::InputValidation(
                "A minimum of 2 channels are required".to_string(),
            ));
        }
        if self.config.lyso_channel > raw.channels() {
            return Err(Error::InputValidation(
                "Selected lysosome channel is higher than total number of channels".to_string(),
            ));
        }
        if self.config.protein_channel > raw.channels() {
            return Err(Error::InputValidation(
                "Selected protein channel is higher than total number of channels".to_string(),
            ));
        }
        Ok(())
    }

    /// Runs the whole pipeline on `raw`.
    ///
    /// `rois` is the ROI list: when non-empty each ROI is quantified on its
    /// own. Otherwise `active_roi` only crops the segmentation input and
    /// provides the cell id. A configured calibration takes precedence over
    /// the one of `raw`. Nothing is written to `sink` unless segmentation
    /// succeeds.
    pub fn run(
        &self,
        raw: &RawImage,
        rois: &[Roi],
        active_roi: Option<&Roi>,
        segmenter: &mut dyn Segmenter,
        sink: &mut ResultSink,
    ) -> Result<RunSummary> {
        self.validate_input(raw)?;
        let raw = self.calibrated(raw);
        let raw: &RawImage = &raw;
        let settings = self.config.resolve(raw);

        log::info!(
            "LysoQuant on {} ({}x{}, c={} z={} t={})",
            raw.title(),
            raw.width(),
            raw.height(),
            raw.channels(),
            raw.slices(),
            raw.frames()
        );
        if raw.slices() > 1 && self.config.warn_3d {
            log::warn!("LysoQuant is a 2D deep learning model, 3D images are not supported");
        }

        let mut composite = make_composite(
            raw,
            settings.protein_channel,
            settings.lyso_channel,
            settings.slices,
            settings.frames,
        )?;
        if !rois.is_empty() {
            composite.clear_outside(&union_mask(rois, raw.width(), raw.height()));
        } else if let Some(roi) = active_roi {
            composite.clear_outside(&roi.rasterize(raw.width(), raw.height()));
        }

        let params = SegmentationParams::from(self.config.segmentation.clone());
        let labels = match segmenter.segment(&composite, &params) {
            Ok(labels) => labels,
            Err(Error::SegmentationInterrupted) => {
                log::error!("Segmentation of {} was interrupted, run aborted", raw.title());
                return Err(Error::SegmentationInterrupted);
            }
            Err(err) => return Err(err),
        };
        let labels = self.prepare_labels(labels, raw, composite.slices, composite.frames)?;

        let aggregator = Aggregator::new(&settings);
        let mut stats = PassStats::default();

        let passes = if rois.is_empty() {
            let cell_id = active_roi.map_or_else(|| NO_CELL_ID.to_string(), Roi::cell_id);
            stats += aggregator.count(&labels, raw, None, &cell_id, sink)?;
            1
        } else {
            let scale = labels.width() as f64 / raw.width() as f64;
            for roi in rois {
                let on_labels = rescale(roi, scale)?;
                stats += aggregator.count(&labels, raw, Some(&on_labels), &roi.name, sink)?;
            }
            rois.len()
        };

        log::info!(
            "Finished {}: {} objects, {} measurements, {} summaries",
            raw.title(),
            stats.objects,
            stats.measurements,
            stats.summaries
        );

        Ok(RunSummary {
            labels,
            stats,
            passes,
        })
    }

    /// Reshapes, titles and calibrates the segmenter output.
    fn prepare_labels(
        &self,
        mut labels: LabelImage,
        raw: &RawImage,
        selected_slices: usize,
        selected_frames: usize,
    ) -> Result<LabelImage> {
        let planes = labels.plane_count();
        let (slices, frames) = if planes == selected_slices * selected_frames {
            (selected_slices, selected_frames)
        } else if planes == raw.slices() * raw.frames() {
            (raw.slices(), raw.frames())
        } else {
            return Err(Error::InputValidation(format!(
                "label image has {} planes, expected {} or {}",
                planes,
                selected_slices * selected_frames,
                raw.slices() * raw.frames()
            )));
        };
        labels.set_dimensions(slices, frames)?;
        labels.set_title(format!("LQ_{}", raw.title()));

        let scale_x = raw.width() as f64 / labels.width() as f64;
        let scale_y = raw.height() as f64 / labels.height() as f64;
        if (scale_x - scale_y).abs() > scale_x * 0.01 {
            log::warn!(
                "Label image {}x{} is not a uniform rescale of {}x{}",
                labels.width(),
                labels.height(),
                raw.width(),
                raw.height()
            );
        }
        if labels.calibration().is_uncalibrated() {
            labels.set_calibration(raw.calibration().scaled(scale_x));
        }

        let unknown = labels.unknown_classes(&self.config.classes);
        if !unknown.is_empty() {
            log::warn!(
                "{} contains label values {:?} that are not known classes",
                labels.title(),
                unknown
            );
        }

        Ok(labels)
    }
}
