use crate::domain::errors::ProbeError;
use crate::domain::scene::FrameSize;
use crate::ports::media::{MediaInfo, MediaProbe};
use async_trait::async_trait;
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};
use tokio::task;

/// Container durations are expressed in these units.
const AV_TIME_BASE: f64 = 1_000_000.0;

/// Reads stream layout through libavformat without decoding anything.
pub struct FfmpegProbe;

#[async_trait]
impl MediaProbe for FfmpegProbe {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let path = path.to_path_buf();
        task::spawn_blocking(move || probe_blocking(&path))
            .await
            .map_err(|e| ProbeError::Task(e.to_string()))?
    }
}

fn probe_blocking(path: &PathBuf) -> Result<MediaInfo, ProbeError> {
    ffmpeg::init().map_err(|e| ProbeError::Open(e.to_string()))?;
    let context = ffmpeg::format::input(path).map_err(|e| ProbeError::Open(e.to_string()))?;

    let mut duration = if context.duration() > 0 {
        context.duration() as f64 / AV_TIME_BASE
    } else {
        0.0
    };
    if duration <= 0.0 {
        // Some containers only carry per-stream durations
        duration = context
            .streams()
            .filter(|stream| stream.duration() > 0)
            .map(|stream| {
                let time_base = stream.time_base();
                stream.duration() as f64 * time_base.numerator() as f64
                    / time_base.denominator().max(1) as f64
            })
            .fold(0.0, f64::max);
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(ProbeError::NoDuration);
    }

    // Cover art in audio files shows up as a single-frame video stream
    let video = context
        .streams()
        .filter(|stream| stream.parameters().medium() == ffmpeg::media::Type::Video)
        .find(|stream| {
            !stream
                .disposition()
                .contains(ffmpeg::format::stream::Disposition::ATTACHED_PIC)
        })
        .map(|stream| -> Result<FrameSize, ProbeError> {
            let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .and_then(|context| context.decoder().video())
                .map_err(|e| ProbeError::Open(e.to_string()))?;
            Ok(FrameSize::new(decoder.width(), decoder.height()))
        })
        .transpose()?;

    let has_audio = context
        .streams()
        .best(ffmpeg::media::Type::Audio)
        .is_some();

    tracing::debug!(path = %path.display(), duration, ?video, has_audio, "probed media");
    Ok(MediaInfo {
        duration,
        video,
        has_audio,
    })
}
