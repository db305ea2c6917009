//! Error types for every collaborator plus the orchestrator's stage outcome.

use super::jobs::JobState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not open media: {0}")]
    Open(String),
    #[error("media has no usable duration")]
    NoDuration,
    #[error("probe task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to launch extractor: {0}")]
    Launch(#[from] std::io::Error),
    #[error("extractor exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("extractor reported success but wrote no waveform")]
    MissingOutput,
}

#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("failed to launch vocal isolation: {0}")]
    Launch(#[from] std::io::Error),
    #[error("vocal isolation exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("vocal isolation wrote no vocal track at {0}")]
    MissingOutput(String),
}

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("failed to launch transcription: {0}")]
    Launch(#[from] std::io::Error),
    #[error("transcription exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("unreadable transcription output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("forced alignment unsupported for language '{0}'")]
    Unsupported(String),
    #[error("forced alignment failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch encoder: {0}")]
    Launch(#[from] std::io::Error),
    #[error("encoder {codec} exited with {status}: {stderr}")]
    Failed {
        codec: String,
        status: String,
        stderr: String,
    },
    #[error("encoder {0} produced no output file")]
    MissingOutput(String),
}

/// Outcome of a pipeline stage that did not go to plan.
///
/// Fatal ends the job. Degraded is logged and the pipeline continues on its
/// documented fallback.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("{stage} failed: {message}")]
    Fatal { stage: JobState, message: String },
    #[error("{stage} degraded: {message}")]
    Degraded { stage: JobState, message: String },
}

impl StageError {
    pub fn fatal(stage: JobState, message: impl Into<String>) -> Self {
        StageError::Fatal {
            stage,
            message: message.into(),
        }
    }

    pub fn degraded(stage: JobState, message: impl Into<String>) -> Self {
        StageError::Degraded {
            stage,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StageError::Fatal { .. })
    }

    pub fn stage(&self) -> JobState {
        match self {
            StageError::Fatal { stage, .. } | StageError::Degraded { stage, .. } => *stage,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StageError::Fatal { message, .. } | StageError::Degraded { message, .. } => message,
        }
    }
}
