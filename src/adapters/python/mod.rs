//! Speech-model collaborators driven through a python interpreter.
//!
//! Each adapter passes a small inline script to `python -c` with its parameters as
//! argv and reads a JSON document from the last line of stdout. Model libraries tend
//! to print progress chatter before that line.

pub mod demucs;
pub mod whisper;
pub mod whisperx;

pub use demucs::DemucsIsolator;
pub use whisper::WhisperTranscriber;
pub use whisperx::WhisperxAligner;

use serde::de::DeserializeOwned;

/// Parses the last stdout line that looks like a JSON document.
pub(crate) fn parse_json_output<T: DeserializeOwned>(stdout: &[u8]) -> Result<T, serde_json::Error> {
    let text = String::from_utf8_lossy(stdout);
    let document = text
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with('[') || line.starts_with('{'))
        .unwrap_or(text.trim());
    serde_json::from_str(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transcript::Segment;

    #[test]
    fn test_parse_skips_progress_chatter() {
        let stdout = b"Detected language: English\n100%|#####| 3/3\n[{\"start\":0.0,\"end\":1.5,\"text\":\" hi\"}]\n";
        let segments: Vec<Segment> = parse_json_output(stdout).unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].words.is_empty());
    }

    #[test]
    fn test_parse_fails_without_document() {
        let result: Result<Vec<Segment>, _> = parse_json_output(b"Traceback (most recent call last):\n");
        assert!(result.is_err());
    }
}
