//! Typed result records and the caller-owned sink that accumulates them.
//!
//! Records are stored as typed values; [`Table`] is only the presentation
//! layer used when writing them out.

mod table;


use std::path::{Path, PathBuf};

use common::FileFormat;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::measure::{CargoArea, IntensityStats, Measurement};

pub use table::{Cell, Delimiter, Table};

pub const RESULTS_FILE: &str = "Results.csv";
pub const SUMMARY_FILE: &str = "LysoQuant.csv";

/// Summary table columns that are not per-class.
pub const SUMMARY_FIXED_COLUMNS: [&str; 5] = [
    "Label",
    "Lysosome Ch",
    "Protein Ch",
    "Total #",
    "%Cargo Area Median",
];

/// Suffix of the per-class ratio column.
pub const RATIO_SUFFIX: &str = " Ratio";

/// One object measured on one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    /// `<class name>-<ordinal>`.
    pub object_name: String,
    pub class_name: String,
    pub lyso_channel: usize,
    pub protein_channel: usize,
    pub measurement_channel: usize,
    pub image: String,
    pub cell_id: String,
    /// `-z:<z>/<n>`, only for stacks with several slices.
    pub slice: Option<String>,
    /// `-t:<t>/<n>`, only for stacks with several frames.
    pub frame: Option<String>,
    pub stats: IntensityStats,
    pub cargo: Option<CargoArea>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCount {
    pub class_id: u16,
    pub name: String,
    pub count: usize,
}

/// Object counts of one (image, ROI, slice, frame) condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub title: String,
    pub lyso_channel: usize,
    pub protein_channel: usize,
    /// In class map order.
    pub classes: Vec<ClassCount>,
    pub total: usize,
    /// Median `%Cargo Area` of the condition's objects; `None` when cargo is not measured.
    pub cargo_median: Option<f64>,
}

impl SummaryRecord {
    pub fn from_counts(
        title: impl Into<String>,
        lyso_channel: usize,
        protein_channel: usize,
        classes: Vec<ClassCount>,
        cargo_median: Option<f64>,
    ) -> Self {
        let total = classes.iter().map(|c| c.count).sum();
        Self {
            title: title.into(),
            lyso_channel,
            protein_channel,
            classes,
            total,
            cargo_median,
        }
    }

    /// `count / total` for a class; NaN when no object was found at all.
    pub fn ratio(&self, class_id: u16) -> Option<f64> {
        self.classes
            .iter()
            .find(|c| c.class_id == class_id)
            .map(|c| c.count as f64 / self.total as f64)
    }

    pub fn ratios(&self) -> impl Iterator<Item = (&ClassCount, f64)> + '_ {
        self.classes
            .iter()
            .map(|c| (c, c.count as f64 / self.total as f64))
    }

    /// No objects of any class, so every ratio is undefined.
    pub fn is_degenerate(&self) -> bool {
        self.total == 0
    }
}

#[derive(Serialize)]
struct SinkContents<'a> {
    measurements: &'a [MeasurementRecord],
    summaries: &'a [SummaryRecord],
}

/// Accumulates records across aggregator passes between `open` and `close`.
#[derive(Debug)]
pub struct ResultSink {
    measurement_set: Vec<Measurement>,
    measurements: Vec<MeasurementRecord>,
    summaries: Vec<SummaryRecord>,
    closed: bool,
}

impl ResultSink {
    /// Opens an empty sink rendering `measurement_set` for each measurement record.
    pub fn open(measurement_set: Vec<Measurement>) -> Self {
        Self {
            measurement_set,
            measurements: Vec::new(),
            summaries: Vec::new(),
            closed: false,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    pub fn close(&mut self) {
        if !self.closed {
            log::debug!(
                "Result sink closed with {} measurements and {} summaries",
                self.measurements.len(),
                self.summaries.len()
            );
        }
        self.closed = true;
    }

    pub fn push_measurement(&mut self, record: MeasurementRecord) -> Result<()> {
        if self.closed {
            return Err(Error::SinkClosed);
        }
        self.measurements.push(record);
        Ok(())
    }

    pub fn push_summary(&mut self, record: SummaryRecord) -> Result<()> {
        if self.closed {
            return Err(Error::SinkClosed);
        }
        self.summaries.push(record);
        Ok(())
    }

    pub fn measurement_set(&self) -> &[Measurement] {
        &self.measurement_set
    }

    pub fn measurements(&self) -> &[MeasurementRecord] {
        &self.measurements
    }

    pub fn summaries(&self) -> &[SummaryRecord] {
        &self.summaries
    }

    /// The per-object "Results" table.
    pub fn results_table(&self) -> Table {
        let mut table = Table::new();
        for record in &self.measurements {
            table.add_row();
            table.set("Label", record.object_name.as_str());
            for &measurement in &self.measurement_set {
                for (column, value) in measurement
                    .columns()
                    .iter()
                    .zip(record.stats.values(measurement))
                {
                    table.set(column, value);
                }
            }
            table.set("Lysosome Type", record.class_name.as_str());
            table.set("Lysosome Channel", record.lyso_channel);
            table.set("Protein Channel", record.protein_channel);
            table.set("Measurement Channel", record.measurement_channel);
            table.set("Image", record.image.as_str());
            table.set("Cell ID", record.cell_id.as_str());
            if let Some(slice) = &record.slice {
                table.set("Slice", slice.as_str());
            }
            if let Some(frame) = &record.frame {
                table.set("Frame", frame.as_str());
            }
            if let Some(cargo) = &record.cargo {
                table.set("%Cargo Area", cargo.percent);
                table.set("Cargo Area minT", cargo.min_threshold);
                table.set("Cargo Area maxT", cargo.max_threshold);
            }
        }
        table
    }

    /// The per-condition "LysoQuant" table.
    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        for record in &self.summaries {
            table.add_row();
            table.set("Label", record.title.as_str());
            table.set("Lysosome Ch", record.lyso_channel);
            table.set("Protein Ch", record.protein_channel);
            for (class, ratio) in record.ratios() {
                table.set(&class.name, class.count);
                table.set(&format!("{}{}", class.name, RATIO_SUFFIX), ratio);
            }
            table.set("Total #", record.total);
            if let Some(median) = record.cargo_median {
                table.set("%Cargo Area Median", median);
            }
        }
        table
    }

    /// Writes both tables as CSV into `dir`, returning the written paths.
    pub fn write_tables(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for (name, table) in [
            (RESULTS_FILE, self.results_table()),
            (SUMMARY_FILE, self.summary_table()),
        ] {
            let path = dir.join(name);
            std::fs::write(&path, table.render(Delimiter::Comma))?;
            log::info!("Wrote {} rows to {}", table.row_count(), path.display());
            written.push(path);
        }
        Ok(written)
    }

    /// All records as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        let contents = SinkContents {
            measurements: &self.measurements,
            summaries: &self.summaries,
        };
        Ok(common::serialize(&contents, FileFormat::Json)?)
    }
}
