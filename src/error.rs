//! Error types for each pipeline stage.

use std::path::PathBuf;
use thiserror::Error;

/// Startup configuration problems. Fatal before any request is served.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure talking to a text or speech provider.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request canceled: {0}")]
    Canceled(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Transport(e)
        }
    }
}

impl ServiceError {
    /// Short reason code used when a synthesis failure is reported upstream.
    pub fn reason(&self) -> String {
        match self {
            ServiceError::Timeout => "Timeout".to_string(),
            ServiceError::Transport(_) => "Transport".to_string(),
            ServiceError::Status { status, .. } => format!("HTTP {}", status),
            ServiceError::Canceled(_) => "Canceled".to_string(),
            ServiceError::InvalidResponse(_) => "InvalidResponse".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to process content into conversation: {0}")]
    ServiceUnavailable(#[source] ServiceError),

    #[error("Failed to process content into conversation: model returned no dialogue lines")]
    EmptyScript,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("No voice configured for speaker '{0}'")]
    UnknownSpeaker(String),

    #[error("Speech synthesis failed for {speaker} ({reason}): {details}")]
    BackendFailure {
        speaker: String,
        reason: String,
        details: String,
    },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SynthesisError {
    pub fn speaker(&self) -> Option<&str> {
        match self {
            SynthesisError::UnknownSpeaker(s) => Some(s),
            SynthesisError::BackendFailure { speaker, .. } => Some(speaker),
            SynthesisError::Io { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Failed to combine audio segments: no segment could be loaded")]
    NoAudio,

    #[error("Failed to export {path}: {source}")]
    ExportFailure {
        path: PathBuf,
        source: hound::Error,
    },
}

/// Anything that stops a pipeline run. Flattened into a
/// `ConversationResult` message at the pipeline boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Failed to synthesize speech for {speaker}")]
    SynthesisFailed {
        speaker: String,
        #[source]
        source: SynthesisError,
    },

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("Failed to prepare temporary directory {path}: {source}")]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("An error occurred: {0}")]
    Internal(String),
}
