use thiserror::Error;

/// Failure classes callers need to tell apart.
///
/// Everything else travels as a plain `anyhow::Error`. These variants are
/// wrapped in `anyhow::Error` too and recovered with `downcast_ref` where the
/// distinction matters (start-up, HTTP status codes).
#[derive(Debug, Error)]
pub enum RecognizerError {
    /// Model artifacts or settings are missing, unreadable or inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Input bytes did not decode to a usable image or frame.
    #[error("decode error: {0}")]
    Decode(String),
    /// The network produced rows that do not match the label list.
    #[error("model output error: {0}")]
    ModelOutput(String),
}

impl RecognizerError {
    pub fn configuration(msg: impl Into<String>) -> anyhow::Error {
        Self::Configuration(msg.into()).into()
    }

    pub fn decode(msg: impl Into<String>) -> anyhow::Error {
        Self::Decode(msg.into()).into()
    }

    pub fn model_output(msg: impl Into<String>) -> anyhow::Error {
        Self::ModelOutput(msg.into()).into()
    }
}

/// Returns the `RecognizerError` carried by an `anyhow::Error`, if any.
pub fn classify(err: &anyhow::Error) -> Option<&RecognizerError> {
    err.chain().find_map(|cause| cause.downcast_ref::<RecognizerError>())
}
