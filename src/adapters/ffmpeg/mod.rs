//! ffmpeg-backed collaborators: probing, waveform extraction, caption scripts and
//! the final render.

pub mod ass;
pub mod extract;
pub mod probe;
pub mod render;

pub use extract::FfmpegExtractor;
pub use probe::FfmpegProbe;
pub use render::FfmpegRenderer;
