use super::parse_json_output;
use crate::adapters::cmd::{describe_status, path_arg, stderr_tail, CommandRunner};
use crate::domain::errors::AlignmentError;
use crate::domain::transcript::Segment;
use crate::ports::speech::Aligner;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Exit code the script uses when no alignment model exists for the language.
const UNSUPPORTED_LANGUAGE_EXIT: i32 = 3;

const ALIGN_SCRIPT: &str = r#"
import json
import sys
import whisperx

audio_path, segments_path, language = sys.argv[1], sys.argv[2], sys.argv[3]
with open(segments_path) as f:
    segments = json.load(f)

try:
    model, metadata = whisperx.load_align_model(language_code=language, device="cpu")
except ValueError as e:
    print(e, file=sys.stderr)
    sys.exit(3)

audio = whisperx.load_audio(audio_path)
result = whisperx.align(segments, model, metadata, audio, "cpu", return_char_alignments=False)

aligned = []
for seg in result["segments"]:
    aligned.append({
        "start": seg["start"],
        "end": seg["end"],
        "text": seg["text"],
        "words": [
            {"text": w["word"], "start": w["start"], "end": w["end"]}
            for w in seg.get("words", [])
            if "start" in w and "end" in w
        ],
    })

print(json.dumps(aligned))
"#;

/// Forced alignment through whisperx's phoneme models.
pub struct WhisperxAligner<R> {
    python: String,
    runner: R,
}

impl<R: CommandRunner> WhisperxAligner<R> {
    pub fn new(python: impl Into<String>, runner: R) -> Self {
        Self {
            python: python.into(),
            runner,
        }
    }
}

fn segments_file(waveform: &Path) -> PathBuf {
    waveform.with_extension("segments.json")
}

#[async_trait]
impl<R: CommandRunner> Aligner for WhisperxAligner<R> {
    async fn align(
        &self,
        waveform: &Path,
        segments: &[Segment],
        language: &str,
    ) -> Result<Vec<Segment>, AlignmentError> {
        let input = segments_file(waveform);
        let payload =
            serde_json::to_vec(segments).map_err(|e| AlignmentError::Failed(e.to_string()))?;
        tokio::fs::write(&input, payload)
            .await
            .map_err(|e| AlignmentError::Failed(e.to_string()))?;

        let args = vec![
            "-c".to_string(),
            ALIGN_SCRIPT.to_string(),
            path_arg(waveform),
            path_arg(&input),
            language.to_string(),
        ];
        let result = self.runner.run(&self.python, &args).await;
        if let Err(e) = tokio::fs::remove_file(&input).await {
            tracing::warn!(path = %input.display(), error = %e, "could not remove alignment input");
        }

        let output = result.map_err(|e| AlignmentError::Failed(e.to_string()))?;
        if output.status.code() == Some(UNSUPPORTED_LANGUAGE_EXIT) {
            return Err(AlignmentError::Unsupported(language.to_string()));
        }
        if !output.status.success() {
            return Err(AlignmentError::Failed(format!(
                "{}: {}",
                describe_status(&output),
                stderr_tail(&output)
            )));
        }

        let aligned: Vec<Segment> =
            parse_json_output(&output.stdout).map_err(|e| AlignmentError::Failed(e.to_string()))?;
        // A result without any timed word is no refinement at all
        if aligned.is_empty() || aligned.iter().all(|segment| segment.words.is_empty()) {
            return Err(AlignmentError::Failed(
                "aligner returned no word timings".to_string(),
            ));
        }
        Ok(aligned)
    }
}
