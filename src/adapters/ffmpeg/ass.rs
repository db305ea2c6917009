//! Advanced SubStation Alpha script for a scene's caption layers.
//!
//! Every caption layer becomes one or more dialogue events. Phrase layers are a
//! single boxed event spanning the layer. Karaoke layers emit one event per
//! constant-reveal run, colouring the revealed prefix with the highlight colour and
//! the rest with the base colour, so the wipe advances exactly on frame boundaries.

use crate::domain::captions::CaptionMode;
use crate::domain::scene::{CaptionPlacement, Rgba, Scene};

const STYLE_NAME: &str = "Caption";

/// `&HAABBGGRR`, where AA is transparency rather than opacity.
pub fn ass_colour(colour: Rgba) -> String {
    format!(
        "&H{:02X}{:02X}{:02X}{:02X}",
        255 - colour.a,
        colour.b,
        colour.g,
        colour.r
    )
}

/// Override-tag form of a colour, `&HBBGGRR&`.
fn inline_colour(colour: Rgba) -> String {
    format!("&H{:02X}{:02X}{:02X}&", colour.b, colour.g, colour.r)
}

/// `H:MM:SS.cc`; rounding keeps touching events touching.
pub fn format_ass_time(seconds: f64) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    let hours = centis / 360_000;
    let minutes = (centis % 360_000) / 6_000;
    let secs = (centis % 6_000) / 100;
    let cs = centis % 100;
    format!("{hours}:{minutes:02}:{secs:02}.{cs:02}")
}

/// Neutralises override blocks and line-break escapes in caption text.
pub fn escape_text(text: &str) -> String {
    text.replace('\\', "\u{FF3C}")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('\n', " ")
}

fn split_at_char(text: &str, chars: usize) -> (&str, &str) {
    let byte = text
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index);
    text.split_at(byte)
}

fn style_line(scene: &Scene) -> String {
    let size = scene.base.size();
    let style = &scene.style;
    let (family, bold) = match style.font_family.strip_suffix("-Bold") {
        Some(family) => (family, true),
        None => (style.font_family.as_str(), false),
    };

    let (alignment, margin_v) = match style.placement {
        CaptionPlacement::Centered => (5, 0),
        CaptionPlacement::FromTop(fraction) => {
            (2, (f64::from(size.height) * (1.0 - fraction)).round() as u32)
        }
    };
    let side_margin = (f64::from(size.width) * (1.0 - style.max_width) / 2.0).round() as u32;

    // BorderStyle 3 draws an opaque box; renderers disagree on which colour fills it
    let (border_style, outline_colour, back_colour, outline) = match style.background {
        Some(background) => (3, ass_colour(background), ass_colour(background), 8),
        None => (1, ass_colour(Rgba::BLACK), ass_colour(Rgba::BLACK), 2),
    };

    format!(
        "Style: {STYLE_NAME},{family},{size},{primary},{secondary},{outline_colour},{back_colour},{bold},0,0,0,100,100,0,0,{border_style},{outline},0,{alignment},{side_margin},{side_margin},{margin_v},1",
        size = style.font_size,
        primary = ass_colour(style.highlight),
        secondary = ass_colour(style.base),
        bold = if bold { -1 } else { 0 },
    )
}

fn dialogue(out: &mut String, start: f64, end: f64, text: &str) {
    out.push_str(&format!(
        "Dialogue: 0,{},{},{STYLE_NAME},,0,0,0,,{text}\n",
        format_ass_time(start),
        format_ass_time(end)
    ));
}

/// Full script text for `scene`.
pub fn build_script(scene: &Scene) -> String {
    let size = scene.base.size();
    let mut out = String::new();

    out.push_str("[Script Info]\n");
    out.push_str("ScriptType: v4.00+\n");
    out.push_str(&format!("PlayResX: {}\n", size.width));
    out.push_str(&format!("PlayResY: {}\n", size.height));
    out.push_str("WrapStyle: 0\n");
    out.push_str("ScaledBorderAndShadow: yes\n\n");

    out.push_str("[V4+ Styles]\n");
    out.push_str("Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n");
    out.push_str(&style_line(scene));
    out.push_str("\n\n");

    out.push_str("[Events]\n");
    out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");

    let highlight = inline_colour(scene.style.highlight);
    let base = inline_colour(scene.style.base);

    for layer in &scene.captions {
        for run in layer.frame_runs(scene.fps) {
            let text = match scene.mode {
                CaptionMode::Phrase => escape_text(&layer.text),
                CaptionMode::Karaoke => {
                    let (shown, pending) = split_at_char(&layer.text, run.revealed_chars);
                    format!(
                        "{{\\1c{highlight}}}{}{{\\1c{base}}}{}",
                        escape_text(shown),
                        escape_text(pending)
                    )
                }
            };
            dialogue(&mut out, run.start, run.end, &text);
        }
    }
    out
}
