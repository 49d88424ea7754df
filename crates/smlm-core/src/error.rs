use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmlmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Sample {index} is not representable as f32")]
    InvalidSample { index: usize },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Failed to read frame {index}: {reason}")]
    FrameAccess { index: usize, reason: String },

    #[error("Invalid analysis configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid region of interest: {0}")]
    InvalidRoi(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Preview controller has been disposed")]
    PreviewClosed,

    #[error("Empty frame sequence")]
    EmptySequence,
}

pub type Result<T> = std::result::Result<T, SmlmError>;
