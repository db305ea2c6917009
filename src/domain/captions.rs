//! Caption timing: turns transcript segments into time-bounded caption layers and
//! derives, for every instant of a layer's lifetime, how much of its text is revealed.

use super::transcript::{Segment, WordTiming};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Frame rate the reveal animation is sampled at.
pub const DEFAULT_FPS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionMode {
    /// One static caption per phrase.
    #[default]
    Phrase,
    /// Word-by-word highlight wipe.
    Karaoke,
}

/// A word onset paired with the character count revealed once it is reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealPoint {
    /// Seconds since the caption's start.
    pub at: f64,
    /// Cumulative character end (exclusive) within the caption text.
    pub char_end: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharTimingMap {
    pub points: Vec<RevealPoint>,
    /// Word tokens that could not be located at or after the running cursor.
    pub skipped: Vec<String>,
}

/// Locates `token` in `text` at or after the byte offset `cursor`.
///
/// Returns the matched byte range. Never looks behind the cursor, so repeated words
/// map to successive occurrences.
pub fn match_step(text: &str, cursor: usize, token: &str) -> Option<Range<usize>> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    let rest = text.get(cursor..)?;
    rest.find(token)
        .map(|offset| cursor + offset..cursor + offset + token.len())
}

/// Maps each word onto the character range it occupies in `text`.
///
/// `origin` is the absolute time the caption starts at; onsets are stored relative to
/// it. Onsets that go backwards are held at the previous onset.
pub fn map_words_to_chars(text: &str, words: &[WordTiming], origin: f64) -> CharTimingMap {
    let (_, map) = words.iter().fold(
        (0usize, CharTimingMap::default()),
        |(cursor, mut map), word| match match_step(text, cursor, &word.text) {
            Some(found) => {
                let onset = word.start - origin;
                let at = map
                    .points
                    .last()
                    .map_or(onset, |previous| previous.at.max(onset));
                map.points.push(RevealPoint {
                    at,
                    char_end: text[..found.end].chars().count(),
                });
                (found.end, map)
            }
            None => {
                map.skipped.push(word.text.clone());
                (cursor, map)
            }
        },
    );
    map
}

/// How a layer's text is revealed over time.
#[derive(Debug, Clone, PartialEq)]
pub enum Reveal {
    /// Phrase captions: all or nothing.
    Toggle,
    /// Karaoke caption without word timing: fully highlighted from the start.
    Full,
    /// Karaoke caption that grows at each word onset.
    Progressive(CharTimingMap),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RevealAmount {
    Shown(bool),
    Fraction(f64),
}

/// A contiguous frame range over which the revealed character count is constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealRun {
    pub start: f64,
    pub end: f64,
    pub revealed_chars: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayer {
    /// Index of the segment the layer was built from.
    pub segment_index: usize,
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub reveal: Reveal,
    total_chars: usize,
}

impl CaptionLayer {
    pub fn new(segment_index: usize, text: String, start: f64, end: f64, reveal: Reveal) -> Self {
        let total_chars = text.chars().count();
        Self {
            segment_index,
            text,
            start,
            end,
            reveal,
            total_chars,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    /// Characters highlighted `t` seconds after the layer starts.
    pub fn revealed_chars(&self, t: f64) -> usize {
        match &self.reveal {
            Reveal::Toggle => {
                if (0.0..self.duration()).contains(&t) {
                    self.total_chars
                } else {
                    0
                }
            }
            Reveal::Full => self.total_chars,
            Reveal::Progressive(map) => {
                let reached = map.points.partition_point(|point| point.at <= t);
                match reached {
                    0 => 0,
                    n => map.points[n - 1].char_end,
                }
            }
        }
    }

    pub fn reveal_fraction(&self, t: f64) -> f64 {
        if self.total_chars == 0 {
            return 0.0;
        }
        self.revealed_chars(t) as f64 / self.total_chars as f64
    }

    pub fn reveal_at(&self, t: f64) -> RevealAmount {
        match self.reveal {
            Reveal::Toggle => RevealAmount::Shown(self.revealed_chars(t) > 0),
            _ => RevealAmount::Fraction(self.reveal_fraction(t)),
        }
    }

    /// Samples the reveal function once per frame and coalesces equal neighbours.
    ///
    /// Interval bounds snap to the nearest frame boundary.
    pub fn frame_runs(&self, fps: u32) -> Vec<RevealRun> {
        let fps = f64::from(fps.max(1));
        let first = (self.start * fps).round() as u64;
        let last = (self.end * fps).round() as u64;

        let mut runs: Vec<RevealRun> = Vec::new();
        for frame in first..last {
            let frame_start = frame as f64 / fps;
            let frame_end = (frame + 1) as f64 / fps;
            let elapsed = (frame_start - self.start).max(0.0);
            let revealed_chars = self.revealed_chars(elapsed);

            match runs.last_mut() {
                Some(run) if run.revealed_chars == revealed_chars => run.end = frame_end,
                _ => runs.push(RevealRun {
                    start: frame_start,
                    end: frame_end,
                    revealed_chars,
                }),
            }
        }
        runs
    }
}

/// Caption layers for a whole transcript plus the reasons for anything left out.
#[derive(Debug, Clone, Default)]
pub struct CaptionPlan {
    pub layers: Vec<CaptionLayer>,
    pub notes: Vec<String>,
}

/// Builds one layer per surviving segment.
///
/// Each layer ends at the earliest of its own end, the next segment's start and the
/// media duration, so no two layers overlap and none outlives the media.
pub fn build_caption_layers(
    segments: &[Segment],
    mode: CaptionMode,
    media_duration: f64,
) -> CaptionPlan {
    let mut plan = CaptionPlan::default();

    for (index, segment) in segments.iter().enumerate() {
        let text = segment.normalized_text();
        if text.is_empty() {
            plan.notes
                .push(format!("Segment {index} omitted: no text to show."));
            continue;
        }

        let start = segment.start.max(0.0);
        if start >= media_duration {
            plan.notes.push(format!(
                "Segment {index} dropped: starts at {start:.2}s, media ends at {media_duration:.2}s."
            ));
            continue;
        }

        let next_start = segments
            .get(index + 1)
            .map_or(media_duration, |next| next.start);
        let end = segment.end.min(next_start).min(media_duration);
        if end - start <= 0.0 {
            plan.notes.push(format!(
                "Segment {index} dropped: no visible time left ({start:.2}s to {end:.2}s)."
            ));
            continue;
        }

        let reveal = match mode {
            CaptionMode::Phrase => Reveal::Toggle,
            CaptionMode::Karaoke if !segment.has_word_timing() => {
                plan.notes.push(format!(
                    "Segment {index} has no word timing, showing it fully highlighted."
                ));
                Reveal::Full
            }
            CaptionMode::Karaoke => {
                let map = map_words_to_chars(&text, &segment.words, start);
                for word in &map.skipped {
                    plan.notes.push(format!(
                        "Segment {index}: word '{}' not found in phrase, skipped.",
                        word.trim()
                    ));
                }
                Reveal::Progressive(map)
            }
        };

        plan.layers
            .push(CaptionLayer::new(index, text, start, end, reveal));
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat_sat_cat() -> Segment {
        Segment::new(0.0, 1.5, "cat sat cat").with_words(vec![
            WordTiming::new("cat", 0.0, 0.5),
            WordTiming::new("sat", 0.5, 1.0),
            WordTiming::new("cat", 1.0, 1.5),
        ])
    }

    fn karaoke_layer(segment: Segment, duration: f64) -> CaptionLayer {
        let plan = build_caption_layers(&[segment], CaptionMode::Karaoke, duration);
        plan.layers.into_iter().next().unwrap()
    }

    #[test]
    fn test_match_step_resumes_after_cursor() {
        assert_eq!(match_step("cat sat cat", 0, "cat"), Some(0..3));
        assert_eq!(match_step("cat sat cat", 3, "cat"), Some(8..11));
        assert_eq!(match_step("cat sat cat", 11, "cat"), None);
        assert_eq!(match_step("cat", 0, "  "), None);
    }

    #[test]
    fn test_repeated_word_maps_to_next_occurrence() {
        let map = map_words_to_chars("cat sat cat", &cat_sat_cat().words, 0.0);
        let ends: Vec<usize> = map.points.iter().map(|p| p.char_end).collect();
        assert_eq!(ends, vec![3, 7, 11]);
        assert!(map.skipped.is_empty());
    }

    #[test]
    fn test_reveal_fraction_follows_word_onsets() {
        let layer = karaoke_layer(cat_sat_cat(), 10.0);
        assert_eq!(layer.reveal_fraction(1.0), 1.0);
        assert_eq!(layer.reveal_fraction(0.6), 7.0 / 11.0);
        assert_eq!(layer.reveal_fraction(0.0), 3.0 / 11.0);
    }

    #[test]
    fn test_nothing_revealed_before_first_onset() {
        let segment = Segment::new(2.0, 4.0, "la la")
            .with_words(vec![WordTiming::new("la", 2.5, 3.0), WordTiming::new("la", 3.0, 3.5)]);
        let layer = karaoke_layer(segment, 10.0);
        assert_eq!(layer.revealed_chars(0.2), 0);
        assert_eq!(layer.revealed_chars(0.5), 2);
        assert_eq!(layer.revealed_chars(1.0), 5);
    }

    #[test]
    fn test_unmatched_word_is_skipped_without_moving_cursor() {
        let words = vec![
            WordTiming::new("la", 0.0, 0.2),
            WordTiming::new("zz", 0.2, 0.4),
            WordTiming::new("la", 0.4, 0.6),
        ];
        let map = map_words_to_chars("la la", &words, 0.0);
        assert_eq!(map.skipped, vec!["zz".to_string()]);
        let ends: Vec<usize> = map.points.iter().map(|p| p.char_end).collect();
        assert_eq!(ends, vec![2, 5]);
    }

    #[test]
    fn test_backwards_onsets_keep_reveal_monotonic() {
        let segment = Segment::new(0.0, 3.0, "one two three").with_words(vec![
            WordTiming::new("one", 1.0, 1.2),
            WordTiming::new("two", 0.5, 0.7),
            WordTiming::new("three", 2.0, 2.5),
        ]);
        let layer = karaoke_layer(segment, 10.0);
        let mut previous = 0.0;
        for step in 0..300 {
            let fraction = layer.reveal_fraction(step as f64 * 0.01);
            assert!(fraction >= previous);
            previous = fraction;
        }
        assert_eq!(layer.revealed_chars(0.6), 0);
        assert_eq!(layer.revealed_chars(1.0), 7);
    }

    #[test]
    fn test_karaoke_without_words_is_fully_revealed() {
        let layer = karaoke_layer(Segment::new(1.0, 3.0, "hello there"), 10.0);
        assert_eq!(layer.reveal, Reveal::Full);
        for t in [0.0, 0.5, 1.99] {
            assert_eq!(layer.reveal_at(t), RevealAmount::Fraction(1.0));
        }
    }

    #[test]
    fn test_word_timing_outside_window_is_tolerated() {
        let segment = Segment::new(1.0, 2.0, "far away")
            .with_words(vec![WordTiming::new("far", 7.0, 7.5), WordTiming::new("away", 8.0, 9.0)]);
        let layer = karaoke_layer(segment, 10.0);
        assert_eq!(layer.start, 1.0);
        assert_eq!(layer.end, 2.0);
        assert_eq!(layer.reveal_fraction(0.5), 0.0);
    }

    #[test]
    fn test_phrase_layers_never_overlap_and_stay_inside_media() {
        let segments = vec![
            Segment::new(0.0, 3.0, "first"),
            Segment::new(2.0, 5.0, "second"),
            Segment::new(4.5, 12.0, "third"),
        ];
        let plan = build_caption_layers(&segments, CaptionMode::Phrase, 8.0);
        assert_eq!(plan.layers.len(), 3);
        for pair in plan.layers.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert_eq!(plan.layers[2].end, 8.0);
    }

    #[test]
    fn test_segment_end_past_media_clamps_to_media_duration() {
        let plan = build_caption_layers(&[Segment::new(3.0, 15.0, "long")], CaptionMode::Phrase, 10.0);
        assert_eq!(plan.layers[0].end, 10.0);
    }

    #[test]
    fn test_segments_without_visible_time_are_dropped_with_reason() {
        let segments = vec![
            Segment::new(1.0, 2.0, "same start"),
            Segment::new(1.0, 3.0, "winner"),
            Segment::new(12.0, 13.0, "too late"),
            Segment::new(13.0, 14.0, "   "),
        ];
        let plan = build_caption_layers(&segments, CaptionMode::Phrase, 10.0);
        assert_eq!(plan.layers.len(), 1);
        assert_eq!(plan.layers[0].text, "winner");
        assert_eq!(plan.notes.len(), 3);
    }

    #[test]
    fn test_phrase_toggle_is_on_only_inside_interval() {
        let plan = build_caption_layers(&[Segment::new(1.0, 2.0, "hi")], CaptionMode::Phrase, 10.0);
        let layer = &plan.layers[0];
        assert_eq!(layer.reveal_at(0.5), RevealAmount::Shown(true));
        assert_eq!(layer.reveal_at(1.0), RevealAmount::Shown(false));
    }

    #[test]
    fn test_frame_runs_step_at_word_onsets() {
        let layer = karaoke_layer(cat_sat_cat(), 10.0);
        let runs = layer.frame_runs(DEFAULT_FPS);
        let chars: Vec<usize> = runs.iter().map(|r| r.revealed_chars).collect();
        assert_eq!(chars, vec![3, 7, 11]);
        assert_eq!(runs[0].start, 0.0);
        assert_eq!(runs[1].start, 0.5);
        assert_eq!(runs[2].start, 1.0);
        assert_eq!(runs[2].end, 1.5);
    }

    #[test]
    fn test_touching_layers_produce_disjoint_frames() {
        let segments = vec![Segment::new(0.0, 1.01, "a"), Segment::new(1.01, 2.0, "b")];
        let plan = build_caption_layers(&segments, CaptionMode::Phrase, 10.0);
        let first = plan.layers[0].frame_runs(DEFAULT_FPS);
        let second = plan.layers[1].frame_runs(DEFAULT_FPS);
        assert!(first.last().unwrap().end <= second[0].start);
    }
}
