//! LysoQuant - quantification of segmented lysosomes in microscopy stacks.
//!
//! A run takes a multichannel hyperstack, builds an RGB composite of the
//! protein and lysosome channels, hands it to a segmentation job and then
//! classifies, counts and measures every lysosome in the returned label image:
//! - per-object intensity measurements on each selected channel
//! - per-condition class counts and ratios
//! - optional cargo area within an intensity window
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lysoquant::{load_stack, PrecomputedLabels, ResultSink, RunConfig, Session};
//!
//! let raw = load_stack("cells.tif".as_ref(), None)?;
//! let config = RunConfig::load("run.yaml".as_ref())?;
//! let mut sink = ResultSink::open(config.measurements.clone());
//! let mut labels = PrecomputedLabels::from_file("labels.tif".as_ref())?;
//!
//! Session::new(config)?.run(&raw, &[], None, &mut labels, &mut sink)?;
//! sink.close();
//! sink.write_tables("out".as_ref())?;
//! ```

pub mod aggregate;
pub mod classes;
pub mod composite;
pub mod config;
pub mod error;
pub mod geometry;
pub mod image;
pub mod labeling;
pub mod measure;
pub mod range;
pub mod segmentation;
pub mod session;
pub mod sink;

// ============================================================================
// Images and geometry
// ============================================================================

pub use image::{load_stack, BitDepth, Calibration, Hyperstack, LabelImage, RawImage};
pub use geometry::{rescale, Footprint, Mask, Roi, Shape};
pub use range::DimRange;

// ============================================================================
// Pipeline
// ============================================================================

pub use aggregate::{Aggregator, QuantSettings};
pub use classes::{ClassLabel, ClassLabelMap};
pub use composite::{make_composite, CompositeStack};
pub use config::RunConfig;
pub use segmentation::{
    ExternalCommand, GpuChoice, PrecomputedLabels, SegmentationParams, SegmentationSettings,
    Segmenter,
};
pub use session::{RunSummary, Session};

// ============================================================================
// Results
// ============================================================================

pub use error::{Error, Result};
pub use measure::{CargoArea, IntensityStats, Measurement};
pub use sink::{MeasurementRecord, ResultSink, SummaryRecord};
