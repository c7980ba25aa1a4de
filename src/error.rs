use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("failed to {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A candle operation failed; `context` names the step.
    #[error("tensor op `{context}` failed: {source}")]
    Tensor {
        context: &'static str,
        #[source]
        source: candle_core::Error,
    },
    /// The frame aligner broke its output contract.
    #[error("frame aligner returned {message}")]
    Alignment { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("utterance {utterance} produced no segment")]
    DegenerateSegmentation { utterance: usize },
}

impl SegmentationError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn tensor(context: &'static str, source: candle_core::Error) -> Self {
        Self::Tensor { context, source }
    }

    pub(crate) fn alignment(message: impl Into<String>) -> Self {
        Self::Alignment {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
