//! Seam to the external U-Net segmentation job.
//!
//! The job itself is not part of this crate. A [`Segmenter`] receives the RGB
//! composite and the flat parameter string the job expects and returns a
//! label image, or fails as a whole.


use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::composite::CompositeStack;
use crate::error::{Error, Result};
use crate::image::{load_stack, LabelImage};

/// GPU selection passed through to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GpuChoice {
    None,
    AllAvailable,
    /// `GPU 0` to `GPU 7`.
    Gpu(u8),
}

impl Default for GpuChoice {
    fn default() -> Self {
        GpuChoice::Gpu(0)
    }
}

impl fmt::Display for GpuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuChoice::None => write!(f, "none"),
            GpuChoice::AllAvailable => write!(f, "all available"),
            GpuChoice::Gpu(idx) => write!(f, "GPU {}", idx),
        }
    }
}

impl FromStr for GpuChoice {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        match text.trim() {
            "none" => Ok(GpuChoice::None),
            "all available" => Ok(GpuChoice::AllAvailable),
            other => other
                .strip_prefix("GPU ")
                .and_then(|idx| idx.parse::<u8>().ok())
                .filter(|&idx| idx <= 7)
                .map(GpuChoice::Gpu)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "unknown GPU {:?}, expected none, all available or GPU 0-7",
                        text
                    ))
                }),
        }
    }
}

impl TryFrom<String> for GpuChoice {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<GpuChoice> for String {
    fn from(value: GpuChoice) -> Self {
        value.to_string()
    }
}

/// User-facing settings of the segmentation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    pub model_folder: String,
    pub model_file: String,
    pub weights: String,
    pub tile_size: u32,
    pub gpu: GpuChoice,
    pub use_remote_host: bool,
    pub hostname: String,
    pub port: String,
    pub username: String,
    pub rsa_key_file: String,
    pub process_folder: String,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            model_folder: String::new(),
            model_file: "lyso7-16.modeldef.h5".to_string(),
            weights: String::new(),
            tile_size: 500,
            gpu: GpuChoice::default(),
            use_remote_host: false,
            hostname: String::new(),
            port: String::new(),
            username: String::new(),
            rsa_key_file: String::new(),
            process_folder: String::new(),
        }
    }
}

/// Everything the job receives; the output flags are fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationParams {
    pub settings: SegmentationSettings,
    pub average: &'static str,
    pub keep_original: bool,
    pub output_scores: bool,
    pub output_softmax_scores: bool,
}

impl From<SegmentationSettings> for SegmentationParams {
    fn from(settings: SegmentationSettings) -> Self {
        Self {
            settings,
            average: "none",
            keep_original: false,
            output_scores: false,
            output_softmax_scores: false,
        }
    }
}

impl SegmentationParams {
    /// Flat `key=value` list in the order the job parses it. Values are not escaped.
    pub fn to_parameter_string(&self) -> String {
        let s = &self.settings;
        format!(
            "modelFilename={}/{},Tile shape (px):={}x{},weightsFilename={},gpuId={},\
             useRemoteHost={},hostname={},port={},username={},RSAKeyFile={},processFolder={},\
             average={},keepOriginal={},outputScores={},outputSoftmaxScores={}",
            s.model_folder,
            s.model_file,
            s.tile_size,
            s.tile_size,
            s.weights,
            s.gpu,
            s.use_remote_host,
            s.hostname,
            s.port,
            s.username,
            s.rsa_key_file,
            s.process_folder,
            self.average,
            self.keep_original,
            self.output_scores,
            self.output_softmax_scores,
        )
    }
}

/// Produces a label image for a composite. A failed job yields no labels at all.
pub trait Segmenter {
    fn segment(&mut self, input: &CompositeStack, params: &SegmentationParams)
        -> Result<LabelImage>;
}

/// Labels computed beforehand, e.g. by running the job manually.
#[derive(Debug, Clone)]
pub struct PrecomputedLabels {
    labels: LabelImage,
}

impl PrecomputedLabels {
    pub fn new(labels: LabelImage) -> Self {
        Self { labels }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(LabelImage::new(load_stack(path, None)?)?))
    }
}

impl Segmenter for PrecomputedLabels {
    fn segment(&mut self, input: &CompositeStack, _: &SegmentationParams) -> Result<LabelImage> {
        log::info!("Using precomputed labels {} for {}", self.labels.title(), input.title);
        Ok(self.labels.clone())
    }
}

/// Runs an external program as the segmentation job.
///
/// The program is called as
/// `<program> [args..] --parameters <string> --input <tiff> --output <tiff>`
/// and must write a single-channel label TIFF to the output path.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: PathBuf,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Segmenter for ExternalCommand {
    fn segment(&mut self, input: &CompositeStack, params: &SegmentationParams) -> Result<LabelImage> {
        std::fs::create_dir_all(&self.work_dir)?;
        let input_path = self.work_dir.join("composite.tif");
        let output_path = self.work_dir.join("labels.tif");
        if output_path.exists() {
            std::fs::remove_file(&output_path)?;
        }
        input.save(&input_path)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--parameters")
            .arg(params.to_parameter_string())
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path);

        log::info!("Running segmentation job {}", self.program.display());
        log::debug!("Command: {:?}", cmd);

        let output = cmd.output()?;

        if !output.status.success() {
            if terminated_by_signal(&output.status) {
                return Err(Error::SegmentationInterrupted);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Segmentation(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        if !output_path.exists() {
            return Err(Error::Segmentation(format!(
                "{} wrote no labels to {}",
                self.program.display(),
                output_path.display()
            )));
        }

        LabelImage::new(load_stack(&output_path, None)?)
    }
}

#[cfg(unix)]
fn terminated_by_signal(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn terminated_by_signal(_: &std::process::ExitStatus) -> bool {
    false
}
