//! Adapters - Concrete implementations of ports.

pub mod cmd;
pub mod ffmpeg;
pub mod http;
pub mod python;

use crate::application::orchestrator::Collaborators;
use crate::config::ToolSettings;
use cmd::RealCommandRunner;
use std::sync::Arc;

/// Wires the ffmpeg and python adapters for the given tool paths.
pub fn collaborators(tools: &ToolSettings, language: &str) -> Collaborators {
    Collaborators {
        probe: Arc::new(ffmpeg::FfmpegProbe),
        extractor: Arc::new(ffmpeg::FfmpegExtractor::new(&tools.ffmpeg, RealCommandRunner)),
        isolator: Arc::new(python::DemucsIsolator::new(
            &tools.python,
            &tools.demucs_model,
            RealCommandRunner,
        )),
        transcriber: Arc::new(python::WhisperTranscriber::new(
            &tools.python,
            language,
            RealCommandRunner,
        )),
        aligner: Arc::new(python::WhisperxAligner::new(&tools.python, RealCommandRunner)),
        renderer: Arc::new(ffmpeg::FfmpegRenderer::new(&tools.ffmpeg, RealCommandRunner)),
    }
}
