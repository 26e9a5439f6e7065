use common::Buffer2;

use super::*;
use crate::composite::CompositeStack;
use crate::image::{BitDepth, Calibration, Hyperstack};
use crate::measure::Measurement;
use crate::segmentation::PrecomputedLabels;

/// Returns fixed labels and keeps the composite it was given.
struct Recording {
    labels: LabelImage,
    seen: Option<CompositeStack>,
    parameters: Option<String>,
}

impl Recording {
    fn new(labels: LabelImage) -> Self {
        Self {
            labels,
            seen: None,
            parameters: None,
        }
    }
}

impl Segmenter for Recording {
    fn segment(&mut self, input: &CompositeStack, params: &SegmentationParams) -> Result<LabelImage> {
        self.seen = Some(input.clone());
        self.parameters = Some(params.to_parameter_string());
        Ok(self.labels.clone())
    }
}

struct Interrupted;

impl Segmenter for Interrupted {
    fn segment(&mut self, _: &CompositeStack, _: &SegmentationParams) -> Result<LabelImage> {
        Err(Error::SegmentationInterrupted)
    }
}

/// 4x4 image, channel 1 constant 100, channel 2 a ramp.
fn raw_4x4() -> RawImage {
    Hyperstack::new(
        "cells.tif",
        2,
        1,
        1,
        BitDepth::Sixteen,
        vec![
            Buffer2::new_filled(4, 4, 100),
            Buffer2::from_fn(4, 4, |x, y| (y * 4 + x) as u16),
        ],
    )
    .unwrap()
    .with_calibration(Calibration::new(0.5, 0.5, "micron"))
}

/// 2x2 labels: left column Empty, right column Loaded.
fn labels_2x2() -> LabelImage {
    LabelImage::from_planes("seg", 1, 1, vec![Buffer2::new(2, 2, vec![1, 2, 1, 2])]).unwrap()
}

fn config() -> RunConfig {
    RunConfig {
        lyso_channel: 2,
        protein_channel: 1,
        min_size: 0.0,
        show_values: true,
        ..RunConfig::default()
    }
}

#[test]
fn input_validation_messages() {
    let session = Session::new(config()).unwrap();
    let single = Hyperstack::new(
        "one.tif",
        1,
        1,
        1,
        BitDepth::Eight,
        vec![Buffer2::new_filled(2, 2, 0)],
    )
    .unwrap();
    match session.validate_input(&single) {
        Err(Error::InputValidation(message)) => {
            assert_eq!(message, "A minimum of 2 channels are required")
        }
        other => panic!("unexpected {:?}", other),
    }

    let session = Session::new(RunConfig {
        lyso_channel: 3,
        ..config()
    })
    .unwrap();
    match session.validate_input(&raw_4x4()) {
        Err(Error::InputValidation(message)) => assert!(message.contains("lysosome channel")),
        other => panic!("unexpected {:?}", other),
    }

    let session = Session::new(RunConfig {
        protein_channel: 4,
        ..config()
    })
    .unwrap();
    match session.validate_input(&raw_4x4()) {
        Err(Error::InputValidation(message)) => assert!(message.contains("protein channel")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn whole_image_run_without_rois() {
    let session = Session::new(config()).unwrap();
    let mut segmenter = PrecomputedLabels::new(labels_2x2());
    let mut sink = ResultSink::open(Measurement::default_set());

    let summary = session
        .run(&raw_4x4(), &[], None, &mut segmenter, &mut sink)
        .unwrap();

    assert_eq!(summary.passes, 1);
    assert_eq!(summary.labels.title(), "LQ_cells.tif");
    assert_eq!(summary.labels.calibration(), &Calibration::new(1.0, 1.0, "micron"));
    // two objects, each measured on both channels
    assert_eq!(summary.stats.measurements, 4);

    let totals = &sink.summaries()[0];
    assert_eq!(totals.title, "cells.tif");
    assert_eq!(totals.lyso_channel, 2);
    assert_eq!(totals.protein_channel, 1);
    assert_eq!(totals.ratio(1), Some(0.5));

    let loaded_ramp = sink
        .measurements()
        .iter()
        .find(|r| r.class_name == "Loaded" && r.measurement_channel == 2)
        .unwrap();
    // right half of the ramp: columns 2 and 3
    assert_eq!(loaded_ramp.stats.mean, 8.5);
    assert_eq!(loaded_ramp.cell_id, NO_CELL_ID);
}

#[test]
fn active_roi_crops_composite_and_names_the_cell() {
    let session = Session::new(config()).unwrap();
    let mut segmenter = Recording::new(labels_2x2());
    let mut sink = ResultSink::open(Measurement::default_set());
    let active = Roi::rect("", 2.0, 0.0, 2.0, 4.0);

    session
        .run(&raw_4x4(), &[], Some(&active), &mut segmenter, &mut sink)
        .unwrap();

    // lysosome ramp is non-zero at (1, 3) before clearing
    let composite = segmenter.seen.unwrap();
    assert_eq!(composite.plane(1, 1)[(1, 3)], [0, 0, 0]);
    assert_ne!(composite.plane(1, 1)[(3, 3)], [0, 0, 0]);
    assert!(segmenter
        .parameters
        .unwrap()
        .starts_with("modelFilename=/lyso7-16.modeldef.h5,"));
    // the active ROI does not restrict counting
    assert_eq!(sink.summaries()[0].total, 2);
    assert!(sink.measurements().iter().all(|r| r.cell_id == "0002-0000"));
}

#[test]
fn each_roi_is_counted_on_its_own() {
    let session = Session::new(config()).unwrap();
    let mut segmenter = Recording::new(labels_2x2());
    let mut sink = ResultSink::open(Measurement::default_set());
    let rois = [
        Roi::rect("left", 0.0, 0.0, 2.0, 4.0),
        Roi::rect("right", 2.0, 0.0, 2.0, 4.0),
    ];

    let summary = session
        .run(&raw_4x4(), &rois, None, &mut segmenter, &mut sink)
        .unwrap();

    assert_eq!(summary.passes, 2);
    let titles: Vec<&str> = sink.summaries().iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["cells.tifleft", "cells.tifright"]);
    assert_eq!(sink.summaries()[0].classes[0].count, 1);
    assert_eq!(sink.summaries()[0].classes[1].count, 0);
    assert_eq!(sink.summaries()[1].classes[1].count, 1);
    assert!(sink
        .measurements()
        .iter()
        .all(|r| (r.cell_id == "left") == (r.class_name == "Empty")));

    // union of both ROIs covers the image, so nothing is cleared
    let composite = segmenter.seen.unwrap();
    assert_ne!(composite.plane(1, 1)[(1, 3)], [0, 0, 0]);
}

#[test]
fn interrupted_segmentation_writes_nothing() {
    let session = Session::new(config()).unwrap();
    let mut sink = ResultSink::open(Measurement::default_set());

    let result = session.run(&raw_4x4(), &[], None, &mut Interrupted, &mut sink);

    assert!(matches!(result, Err(Error::SegmentationInterrupted)));
    assert!(sink.measurements().is_empty());
    assert!(sink.summaries().is_empty());
}

#[test]
fn label_plane_count_must_fit_the_stack() {
    let session = Session::new(config()).unwrap();
    let labels =
        LabelImage::from_planes("seg", 2, 1, vec![Buffer2::new_filled(2, 2, 1); 2]).unwrap();
    let mut sink = ResultSink::open(Measurement::default_set());

    let result = session.run(
        &raw_4x4(),
        &[],
        None,
        &mut PrecomputedLabels::new(labels),
        &mut sink,
    );

    assert!(matches!(result, Err(Error::InputValidation(_))));
}

#[test]
fn configured_calibration_replaces_image_calibration() {
    let session = Session::new(RunConfig {
        calibration: Some(Calibration::new(0.2, 0.2, "micron")),
        ..config()
    })
    .unwrap();
    let mut raw = raw_4x4();

    session.apply_calibration(&mut raw);

    assert_eq!(raw.calibration().pixel_width, 0.2);
}

#[test]
fn configured_calibration_applies_inside_run() {
    let session = Session::new(RunConfig {
        calibration: Some(Calibration::new(0.5, 0.5, "micron")),
        min_size: 2.0,
        ..config()
    })
    .unwrap();
    let raw = Hyperstack::new(
        "plain.tif",
        2,
        1,
        1,
        BitDepth::Sixteen,
        vec![Buffer2::new_filled(4, 4, 10); 2],
    )
    .unwrap();
    // top row Loaded (2 px), bottom-left Empty (1 px)
    let labels =
        LabelImage::from_planes("seg", 1, 1, vec![Buffer2::new(2, 2, vec![2, 2, 1, 0])]).unwrap();
    let mut sink = ResultSink::open(Measurement::default_set());

    let summary = session
        .run(&raw, &[], None, &mut PrecomputedLabels::new(labels), &mut sink)
        .unwrap();

    assert!(raw.calibration().is_uncalibrated());
    assert_eq!(summary.labels.calibration(), &Calibration::new(1.0, 1.0, "micron"));
    // 2 um^2 is 2 label pixels at 1 um, so the single-pixel object is dropped
    let counts: Vec<usize> = sink.summaries()[0].classes.iter().map(|c| c.count).collect();
    assert_eq!(counts, [0, 1]);
    assert_eq!(sink.measurements()[0].stats.area, 2.0);
}
