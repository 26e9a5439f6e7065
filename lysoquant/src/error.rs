#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InputValidation(String),
    #[error("Segmentation job was interrupted")]
    SegmentationInterrupted,
    #[error("Segmentation failed: {0}")]
    Segmentation(String),
    #[error("Scale factor must be positive, got {0}")]
    InvalidScale(f64),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Unsupported configuration file")]
    FileFormat(#[from] common::FileExtensionError),
    #[error("Failed to parse configuration")]
    Serde(#[from] common::SerdeFormatError),
    #[error("Result sink is closed")]
    SinkClosed,
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("TIFF error")]
    Tiff(#[from] tiff::TiffError),
}

pub type Result<T> = std::result::Result<T, Error>;
