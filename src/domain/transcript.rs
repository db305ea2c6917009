use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A sub-span of a segment attributed to one spoken word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl WordTiming {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// One phrase-level transcript unit.
///
/// Times are seconds on the transcribed waveform's timeline. `words` is empty when
/// the engine produced no word timing for this phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            words: Vec::new(),
        }
    }

    pub fn with_words(mut self, words: Vec<WordTiming>) -> Self {
        self.words = words;
        self
    }

    /// Phrase text with surrounding whitespace removed and inner runs collapsed.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }

    pub fn has_word_timing(&self) -> bool {
        !self.words.is_empty()
    }
}

fn whitespace_runs() -> &'static Regex {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    RUNS.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

pub fn normalize_text(text: &str) -> String {
    whitespace_runs().replace_all(text.trim(), " ").into_owned()
}

/// True when every segment that has something to show also carries word timing.
pub fn has_usable_word_timing(segments: &[Segment]) -> bool {
    segments
        .iter()
        .filter(|segment| !segment.normalized_text().is_empty())
        .all(Segment::has_word_timing)
}
