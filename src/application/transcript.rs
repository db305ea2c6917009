use crate::domain::errors::StageError;
use crate::domain::jobs::JobState;
use crate::domain::transcript::Segment;
use crate::ports::speech::{Aligner, Transcriber};
use std::path::Path;
use std::sync::Arc;

/// One interface over speech-to-text and forced alignment.
///
/// Whatever the engines return comes back ordered by start time with no negative
/// timestamps.
pub struct TranscriptProvider {
    transcriber: Arc<dyn Transcriber>,
    aligner: Arc<dyn Aligner>,
    language: String,
}

impl TranscriptProvider {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        aligner: Arc<dyn Aligner>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            transcriber,
            aligner,
            language: language.into(),
        }
    }

    /// An empty result is not an error here; the caller decides what no speech means.
    pub async fn transcribe(
        &self,
        waveform: &Path,
        model: &str,
        want_word_timestamps: bool,
    ) -> Result<Vec<Segment>, StageError> {
        let segments = self
            .transcriber
            .transcribe(waveform, model, want_word_timestamps)
            .await
            .map_err(|e| StageError::fatal(JobState::Transcribing, e.to_string()))?;
        Ok(normalize_order(segments))
    }

    /// Refined word timings, or a degradation when the aligner cannot help.
    pub async fn align(&self, waveform: &Path, segments: &[Segment]) -> Result<Vec<Segment>, StageError> {
        let aligned = self
            .aligner
            .align(waveform, segments, &self.language)
            .await
            .map_err(|e| StageError::degraded(JobState::Aligning, e.to_string()))?;
        Ok(normalize_order(aligned))
    }
}

fn normalize_order(mut segments: Vec<Segment>) -> Vec<Segment> {
    for segment in &mut segments {
        segment.start = segment.start.max(0.0);
    }
    // Stable, so equal starts keep the engine's order
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{AlignmentError, TranscriptionError};
    use crate::domain::transcript::WordTiming;
    use crate::ports::speech::{MockAligner, MockTranscriber};

    #[tokio::test]
    async fn test_transcript_is_ordered_and_clamped() {
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .withf(|_, model, words| model == "base.en" && !*words)
            .returning(|_, _, _| {
                Ok(vec![
                    Segment::new(3.0, 4.0, "later"),
                    Segment::new(-0.2, 1.0, "first"),
                ])
            });
        let provider = TranscriptProvider::new(Arc::new(transcriber), Arc::new(MockAligner::new()), "en");

        let segments = provider
            .transcribe(Path::new("audio.wav"), "base.en", false)
            .await
            .unwrap();
        assert_eq!(segments[0].text, "first");
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[1].text, "later");
    }

    #[tokio::test]
    async fn test_engine_failure_is_fatal() {
        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().returning(|_, _, _| {
            Err(TranscriptionError::Failed {
                status: "exit code 1".to_string(),
                stderr: "boom".to_string(),
            })
        });
        let provider = TranscriptProvider::new(Arc::new(transcriber), Arc::new(MockAligner::new()), "en");

        let err = provider
            .transcribe(Path::new("audio.wav"), "base.en", false)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.stage(), JobState::Transcribing);
    }

    #[tokio::test]
    async fn test_align_uses_configured_language() {
        let mut aligner = MockAligner::new();
        aligner
            .expect_align()
            .withf(|_, _, language| language == "de")
            .returning(|_, segments, _| {
                Ok(segments
                    .iter()
                    .cloned()
                    .map(|s| {
                        let words = vec![WordTiming::new(s.text.clone(), s.start, s.end)];
                        s.with_words(words)
                    })
                    .collect())
            });
        let provider = TranscriptProvider::new(Arc::new(MockTranscriber::new()), Arc::new(aligner), "de");

        let aligned = provider
            .align(Path::new("audio.wav"), &[Segment::new(0.0, 1.0, "hallo")])
            .await
            .unwrap();
        assert_eq!(aligned[0].words.len(), 1);
    }

    #[tokio::test]
    async fn test_aligner_may_split_segments() {
        let mut aligner = MockAligner::new();
        aligner.expect_align().returning(|_, _, _| {
            Ok(vec![
                Segment::new(1.2, 2.0, "again")
                    .with_words(vec![WordTiming::new("again", 1.2, 2.0)]),
                Segment::new(0.0, 1.0, "hello hello").with_words(vec![
                    WordTiming::new("hello", 0.0, 0.5),
                    WordTiming::new("hello", 0.5, 1.0),
                ]),
            ])
        });
        let provider = TranscriptProvider::new(Arc::new(MockTranscriber::new()), Arc::new(aligner), "en");

        let aligned = provider
            .align(Path::new("audio.wav"), &[Segment::new(0.0, 2.0, "hello hello again")])
            .await
            .unwrap();
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].text, "hello hello");
        assert_eq!(aligned[1].text, "again");
    }

    #[tokio::test]
    async fn test_alignment_failure_is_degraded() {
        let mut aligner = MockAligner::new();
        aligner
            .expect_align()
            .returning(|_, _, language| Err(AlignmentError::Unsupported(language.to_string())));
        let provider = TranscriptProvider::new(Arc::new(MockTranscriber::new()), Arc::new(aligner), "xx");

        let err = provider
            .align(Path::new("audio.wav"), &[Segment::new(0.0, 1.0, "hi")])
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.message().contains("xx"));
    }
}
