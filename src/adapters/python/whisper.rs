use super::parse_json_output;
use crate::adapters::cmd::{describe_status, path_arg, stderr_tail, CommandRunner};
use crate::domain::errors::TranscriptionError;
use crate::domain::transcript::Segment;
use crate::ports::speech::Transcriber;
use async_trait::async_trait;
use std::path::Path;

const TRANSCRIBE_SCRIPT: &str = r#"
import json
import sys
import whisper

audio_path, model_name, language, with_words = sys.argv[1], sys.argv[2], sys.argv[3], sys.argv[4] == "1"
model = whisper.load_model(model_name)
result = model.transcribe(audio_path, language=language, fp16=False, verbose=None, word_timestamps=with_words)

segments = []
for seg in result.get("segments", []):
    segments.append({
        "start": seg["start"],
        "end": seg["end"],
        "text": seg["text"],
        "words": [
            {"text": w["word"], "start": w["start"], "end": w["end"]}
            for w in (seg.get("words") or [])
        ],
    })

print(json.dumps(segments))
"#;

/// Transcription through openai-whisper.
pub struct WhisperTranscriber<R> {
    python: String,
    language: String,
    runner: R,
}

impl<R: CommandRunner> WhisperTranscriber<R> {
    pub fn new(python: impl Into<String>, language: impl Into<String>, runner: R) -> Self {
        Self {
            python: python.into(),
            language: language.into(),
            runner,
        }
    }
}

#[async_trait]
impl<R: CommandRunner> Transcriber for WhisperTranscriber<R> {
    async fn transcribe(
        &self,
        waveform: &Path,
        model: &str,
        word_timestamps: bool,
    ) -> Result<Vec<Segment>, TranscriptionError> {
        let args = vec![
            "-c".to_string(),
            TRANSCRIBE_SCRIPT.to_string(),
            path_arg(waveform),
            model.to_string(),
            self.language.clone(),
            if word_timestamps { "1" } else { "0" }.to_string(),
        ];
        let output = self.runner.run(&self.python, &args).await?;
        if !output.status.success() {
            return Err(TranscriptionError::Failed {
                status: describe_status(&output),
                stderr: stderr_tail(&output),
            });
        }

        let mut segments: Vec<Segment> = parse_json_output(&output.stdout)?;
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        tracing::debug!(model, segments = segments.len(), word_timestamps, "transcribed");
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cmd::testing::create_mock_std_output;
    use crate::adapters::cmd::MockCommandRunner;

    #[tokio::test]
    async fn test_transcribe_passes_model_and_word_flag() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|program, args| {
                program == "python3"
                    && args[2] == "/work/audio.wav"
                    && args[3] == "small.en"
                    && args[4] == "en"
                    && args[5] == "1"
            })
            .times(1)
            .returning(|_, _| {
                create_mock_std_output(
                    r#"[{"start":2.0,"end":3.0,"text":" second","words":[{"text":" second","start":2.1,"end":2.8}]},{"start":0.0,"end":2.0,"text":" first","words":[]}]"#,
                    "",
                    0,
                )
            });

        let transcriber = WhisperTranscriber::new("python3", "en", runner);
        let segments = transcriber
            .transcribe(Path::new("/work/audio.wav"), "small.en", true)
            .await
            .unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, " first");
        assert_eq!(segments[1].words.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_transcript_is_not_an_error() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| create_mock_std_output("[]", "", 0));

        let transcriber = WhisperTranscriber::new("python3", "en", runner);
        let segments = transcriber
            .transcribe(Path::new("a.wav"), "tiny", false)
            .await
            .unwrap();
        assert!(segments.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            create_mock_std_output("", "RuntimeError: Model huge not found", 1)
        });

        let transcriber = WhisperTranscriber::new("python3", "en", runner);
        let err = transcriber
            .transcribe(Path::new("a.wav"), "huge", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Model huge not found"));
    }
}
