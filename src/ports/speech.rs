use crate::domain::errors::{AlignmentError, TranscriptionError};
use crate::domain::transcript::Segment;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a mono 16 kHz waveform into phrase segments, ordered by start.
    /// An empty vector means no speech was found.
    async fn transcribe(
        &self,
        waveform: &Path,
        model: &str,
        word_timestamps: bool,
    ) -> Result<Vec<Segment>, TranscriptionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Aligner: Send + Sync {
    /// Refine word timestamps of `segments` against the source waveform
    async fn align(
        &self,
        waveform: &Path,
        segments: &[Segment],
        language: &str,
    ) -> Result<Vec<Segment>, AlignmentError>;
}
