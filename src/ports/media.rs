use crate::domain::errors::{ExtractionError, IsolationError, ProbeError};
use crate::domain::scene::FrameSize;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Stream layout and length of a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Seconds
    pub duration: f64,
    /// Frame size of the best video stream, if any
    pub video: Option<FrameSize>,
    pub has_audio: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Read duration and stream layout of a media file
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Convert any container/codec input to a mono 16 kHz PCM waveform at `target`
    async fn extract(&self, input: &Path, target: &Path) -> Result<PathBuf, ExtractionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VocalIsolator: Send + Sync {
    /// Separate the vocals of `waveform` into `target`.
    /// The engine may leave files and directories behind in `scratch_dir`.
    async fn isolate(
        &self,
        waveform: &Path,
        scratch_dir: &Path,
        target: &Path,
    ) -> Result<PathBuf, IsolationError>;
}
