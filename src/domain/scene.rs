//! Scene description handed to the renderer: base layer, caption layers, audio track
//! and the encoder profile to use.

use super::captions::{CaptionLayer, CaptionMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Size of the generated canvas for audio-only input.
pub const CANVAS_SIZE: FrameSize = FrameSize {
    width: 1280,
    height: 720,
};
/// Taller input video is downscaled to this height before rendering.
pub const MAX_RENDER_HEIGHT: u32 = 720;
/// Caption font size as a fraction of the base layer width.
pub const RELATIVE_FONT_SIZE: f64 = 0.045;
/// Vertical caption position for video input, as a fraction of the height.
pub const SUBTITLE_Y_POSITION: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scales down to `max_height` keeping the aspect ratio; width stays even for
    /// yuv420p.
    pub fn fit_height(self, max_height: u32) -> FrameSize {
        if self.height <= max_height || self.height == 0 {
            return self;
        }
        let scaled = f64::from(self.width) * f64::from(max_height) / f64::from(self.height);
        let width = ((scaled / 2.0).round() as u32 * 2).max(2);
        FrameSize {
            width,
            height: max_height,
        }
    }
}

pub fn font_size_for(width: u32) -> u32 {
    (f64::from(width) * RELATIVE_FONT_SIZE) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 255 is opaque.
    pub a: u8,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const GRAY30: Rgba = Rgba::opaque(77, 77, 77);
}

#[derive(Debug, Clone, PartialEq)]
pub enum BaseLayer {
    Video {
        path: PathBuf,
        source: FrameSize,
        size: FrameSize,
    },
    Canvas {
        size: FrameSize,
        color: Rgba,
    },
}

impl BaseLayer {
    pub fn video(path: PathBuf, source: FrameSize) -> Self {
        BaseLayer::Video {
            path,
            source,
            size: source.fit_height(MAX_RENDER_HEIGHT),
        }
    }

    pub fn canvas() -> Self {
        BaseLayer::Canvas {
            size: CANVAS_SIZE,
            color: Rgba::BLACK,
        }
    }

    /// Size the base layer is rendered at.
    pub fn size(&self) -> FrameSize {
        match self {
            BaseLayer::Video { size, .. } | BaseLayer::Canvas { size, .. } => *size,
        }
    }

    pub fn is_downscaled(&self) -> bool {
        match self {
            BaseLayer::Video { source, size, .. } => source != size,
            BaseLayer::Canvas { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    IsolatedVocals,
    OriginalMedia,
    ExtractedWaveform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub source: AudioSource,
    /// Seconds of audio to keep; never longer than the visual track.
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptionPlacement {
    Centered,
    /// Fraction of the frame height measured from the top.
    FromTop(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font_family: String,
    pub font_size: u32,
    /// Colour of revealed text (all text in phrase mode).
    pub highlight: Rgba,
    /// Colour of not-yet-revealed text in karaoke mode.
    pub base: Rgba,
    /// Box drawn behind phrase captions.
    pub background: Option<Rgba>,
    pub placement: CaptionPlacement,
    /// Share of the frame width a caption line may use.
    pub max_width: f64,
}

impl CaptionStyle {
    pub fn for_mode(mode: CaptionMode, size: FrameSize, is_video: bool) -> Self {
        let placement = if is_video {
            CaptionPlacement::FromTop(SUBTITLE_Y_POSITION)
        } else {
            CaptionPlacement::Centered
        };
        match mode {
            CaptionMode::Phrase => CaptionStyle {
                font_family: "Arial-Bold".to_string(),
                font_size: font_size_for(size.width),
                highlight: Rgba::WHITE,
                base: Rgba::WHITE,
                background: Some(Rgba {
                    r: 0,
                    g: 0,
                    b: 0,
                    a: 153,
                }),
                placement,
                max_width: 0.9,
            },
            // Monospace keeps the wipe aligned with character counts.
            CaptionMode::Karaoke => CaptionStyle {
                font_family: "Courier-Bold".to_string(),
                font_size: font_size_for(size.width),
                highlight: Rgba::WHITE,
                base: Rgba::GRAY30,
                background: None,
                placement,
                max_width: 0.9,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderProfile {
    pub video_codec: String,
    pub hardware: bool,
}

/// Settings both encoder tiers share so the fallback renders at equivalent quality.
pub const VIDEO_BITRATE: &str = "5M";
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "192k";

impl EncoderProfile {
    pub fn hardware(codec: impl Into<String>) -> Self {
        Self {
            video_codec: codec.into(),
            hardware: true,
        }
    }

    pub fn software(codec: impl Into<String>) -> Self {
        Self {
            video_codec: codec.into(),
            hardware: false,
        }
    }

    pub fn tier(&self) -> &'static str {
        if self.hardware {
            "hardware"
        } else {
            "software"
        }
    }

    /// Codec arguments for ffmpeg's output side.
    pub fn codec_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-b:v".to_string(),
            VIDEO_BITRATE.to_string(),
        ];
        if !self.hardware {
            args.extend(["-preset".to_string(), "fast".to_string()]);
        }
        args.extend([
            "-c:a".to_string(),
            AUDIO_CODEC.to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
        ]);
        args
    }
}

/// Everything the renderer needs for one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub base: BaseLayer,
    pub captions: Vec<CaptionLayer>,
    pub mode: CaptionMode,
    pub style: CaptionStyle,
    pub audio: AudioTrack,
    /// Length of the visual track in seconds.
    pub duration: f64,
    pub fps: u32,
}
