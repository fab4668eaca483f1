/// Result alias that carries the custom [`VisualizerError`] type.
pub type Result<T> = std::result::Result<T, VisualizerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualizerError {
    /// The audio resource uses a container or codec the decoder cannot play.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    /// A control call arrived before the feature stream finished its first
    /// analysis cycle. Transport controls swallow this variant.
    #[error("audio stream is not ready: {0}")]
    NotReady(&'static str),
    /// Rejected configuration such as a zero-sized grid or empty text.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// The decoder accepted the format but failed while reading samples.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// A frame whose buffers violate the documented lengths or ranges.
    #[error("malformed audio frame: {0}")]
    MalformedFrame(String),
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl VisualizerError {
    /// Shorthand for a [`VisualizerError::Configuration`] error.
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    /// Shorthand for a [`VisualizerError::MalformedFrame`] error.
    pub fn malformed<T: Into<String>>(msg: T) -> Self {
        Self::MalformedFrame(msg.into())
    }
}

impl From<hound::Error> for VisualizerError {
    fn from(value: hound::Error) -> Self {
        match value {
            hound::Error::IoError(err) => Self::Io(err),
            hound::Error::FormatError(msg) => Self::UnsupportedFormat(msg.to_string()),
            hound::Error::Unsupported => {
                Self::UnsupportedFormat("wav encoding is not supported".to_string())
            }
            other => Self::Decode(other.to_string()),
        }
    }
}
