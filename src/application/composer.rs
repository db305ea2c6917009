//! Scene Composer: lays caption layers over a base layer, picks the audio track and
//! drives the two-tier render.

use crate::domain::captions::{CaptionLayer, CaptionMode, DEFAULT_FPS};
use crate::domain::errors::StageError;
use crate::domain::jobs::JobState;
use crate::domain::scene::{
    AudioSource, AudioTrack, BaseLayer, CaptionStyle, EncoderProfile, FrameSize, Scene,
};
use crate::ports::media::{MediaInfo, MediaProbe};
use crate::ports::render::Renderer;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inputs for one scene, gathered by the orchestrator.
#[derive(Debug, Clone)]
pub struct SceneRequest<'a> {
    pub input: &'a Path,
    pub info: &'a MediaInfo,
    pub is_video: bool,
    pub mode: CaptionMode,
    pub layers: Vec<CaptionLayer>,
    pub waveform: &'a Path,
    pub vocals: Option<&'a Path>,
    pub replace_audio_with_vocals: bool,
}

/// Which profile produced the file, and why the first one did not.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub profile: EncoderProfile,
    pub fallback_reason: Option<String>,
}

pub struct SceneComposer {
    renderer: Arc<dyn Renderer>,
    probe: Arc<dyn MediaProbe>,
    primary: EncoderProfile,
    fallback: EncoderProfile,
}

impl SceneComposer {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        probe: Arc<dyn MediaProbe>,
        primary: EncoderProfile,
        fallback: EncoderProfile,
    ) -> Self {
        Self {
            renderer,
            probe,
            primary,
            fallback,
        }
    }

    fn base_layer(request: &SceneRequest<'_>) -> Result<BaseLayer, StageError> {
        if !request.is_video {
            return Ok(BaseLayer::canvas());
        }
        match request.info.video {
            Some(size) if size.width > 0 && size.height > 0 => {
                Ok(BaseLayer::video(request.input.to_path_buf(), size))
            }
            _ => Err(StageError::fatal(
                JobState::Rendering,
                "input was submitted as video but has no video stream",
            )),
        }
    }

    fn audio_choice(request: &SceneRequest<'_>) -> (PathBuf, AudioSource) {
        match request.vocals {
            Some(vocals) if request.replace_audio_with_vocals => {
                (vocals.to_path_buf(), AudioSource::IsolatedVocals)
            }
            _ if request.is_video => (request.input.to_path_buf(), AudioSource::OriginalMedia),
            _ => (request.waveform.to_path_buf(), AudioSource::ExtractedWaveform),
        }
    }

    /// Audio length of the chosen track. Derived waveforms are probed since decoding
    /// can shift their length slightly from the container's.
    async fn audio_duration(&self, path: &Path, source: AudioSource, info: &MediaInfo) -> f64 {
        if source == AudioSource::OriginalMedia {
            return info.duration;
        }
        match self.probe.probe(path).await {
            Ok(audio) => audio.duration,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not probe audio track, using media duration");
                info.duration
            }
        }
    }

    /// Builds the scene. Caption timing is passed through untouched.
    pub async fn compose(&self, request: SceneRequest<'_>) -> Result<Scene, StageError> {
        let base = Self::base_layer(&request)?;
        let visual_duration = request.info.duration;

        let (audio_path, source) = Self::audio_choice(&request);
        let audio_duration = self
            .audio_duration(&audio_path, source, request.info)
            .await;
        // Trimmed to the visual track, never padded
        let audio = AudioTrack {
            path: audio_path,
            source,
            duration: audio_duration.min(visual_duration),
        };

        let size: FrameSize = base.size();
        Ok(Scene {
            style: CaptionStyle::for_mode(request.mode, size, request.is_video),
            base,
            captions: request.layers,
            mode: request.mode,
            audio,
            duration: visual_duration,
            fps: DEFAULT_FPS,
        })
    }

    /// Primary profile first, the fallback exactly once after any failure.
    pub async fn render(&self, scene: &Scene, output: &Path) -> Result<RenderOutcome, StageError> {
        let first_error = match self.renderer.render(scene, output, &self.primary).await {
            Ok(()) => {
                return Ok(RenderOutcome {
                    profile: self.primary.clone(),
                    fallback_reason: None,
                })
            }
            Err(e) => e,
        };
        tracing::warn!(
            codec = %self.primary.video_codec,
            error = %first_error,
            fallback = %self.fallback.video_codec,
            "primary encoder failed"
        );

        match self.renderer.render(scene, output, &self.fallback).await {
            Ok(()) => Ok(RenderOutcome {
                profile: self.fallback.clone(),
                fallback_reason: Some(first_error.to_string()),
            }),
            Err(second_error) => Err(StageError::fatal(
                JobState::Rendering,
                format!(
                    "{} encoder failed ({first_error}); {} encoder failed ({second_error})",
                    self.primary.tier(),
                    self.fallback.tier()
                ),
            )),
        }
    }
}
