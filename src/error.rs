use thiserror::Error;

/// Main error type for the clipveil library
#[derive(Error, Debug)]
pub enum ClipError {
    #[error("Open error: {0}")]
    Open(#[from] OpenError),

    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Invalid range: {0}")]
    Range(#[from] RangeError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// The asset cannot be opened for decoding. Fatal to the requested operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpenError {
    #[error("no decodable video track in {path}")]
    NoVideoTrack { path: String },

    #[error("unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("asset unreadable: {path} ({reason})")]
    Unreadable { path: String, reason: String },
}

/// Mid-stream decode failure. Aborts the job, partial output is kept when possible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    #[error("decoder failed: {reason}")]
    DecodeFailed { reason: String },

    #[error("short frame: expected {expected} bytes, got {actual}")]
    ShortFrame { expected: usize, actual: usize },
}

/// Per-frame face detection failure. Never fatal: the frame passes through unblurred.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("detector failed: {reason}")]
    Failed { reason: String },
}

/// The encoder sink rejected a frame or failed to finalize. Fatal to the job.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("encoder could not start: {reason}")]
    StartFailed { reason: String },

    #[error("frame rejected: {reason}")]
    FrameRejected { reason: String },

    #[error("finalization failed: {reason}")]
    FinalizeFailed { reason: String },

    #[error("output already in use by another job: {path}")]
    OutputBusy { path: String },
}

/// Trim range violates its invariants. Rejected before any pipeline work starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("invalid range {start:.3}s..{end:.3}s for duration {duration:.3}s: {reason}")]
    InvalidRange {
        start: f64,
        end: f64,
        duration: f64,
        reason: String,
    },
}

/// Color filter errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("unknown filter preset: {name}")]
    UnknownPreset { name: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using ClipError
pub type Result<T> = std::result::Result<T, ClipError>;

impl ClipError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Open(OpenError::NoVideoTrack { path }) => {
                format!("'{}' has no video that can be edited.", path)
            }
            Self::Open(OpenError::UnsupportedFormat { format }) => {
                format!("Videos encoded as '{}' are not supported.", format)
            }
            Self::Open(OpenError::Unreadable { path, .. }) => {
                format!("Could not open '{}'. Please check the file exists and is a video.", path)
            }
            Self::Read(e) => format!("Reading the video failed: {}", e),
            Self::Encode(EncodeError::OutputBusy { path }) => {
                format!("Another export is already writing '{}'.", path)
            }
            Self::Encode(e) => format!("Writing the video failed: {}", e),
            Self::Range(RangeError::InvalidRange { reason, .. }) => {
                format!("The selected trim is not valid: {}.", reason)
            }
            Self::Filter(FilterError::UnknownPreset { name }) => {
                format!(
                    "Filter '{}' not found. Available filters: {}",
                    name,
                    crate::filters::PresetRegistry::new().available_presets().join(", ")
                )
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
