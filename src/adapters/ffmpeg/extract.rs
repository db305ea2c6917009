use crate::adapters::cmd::{describe_status, path_arg, stderr_tail, CommandRunner};
use crate::domain::errors::ExtractionError;
use crate::ports::media::AudioExtractor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Sample rate the speech models expect.
pub const WAVEFORM_SAMPLE_RATE: u32 = 16_000;

/// Decodes any container into a mono 16 kHz signed 16-bit PCM wav.
pub struct FfmpegExtractor<R> {
    ffmpeg: String,
    runner: R,
}

impl<R: CommandRunner> FfmpegExtractor<R> {
    pub fn new(ffmpeg: impl Into<String>, runner: R) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            runner,
        }
    }
}

fn extract_args(input: &Path, target: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-vn".to_string(),
        "-ac".to_string(),
        "1".to_string(),
        "-ar".to_string(),
        WAVEFORM_SAMPLE_RATE.to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
        path_arg(target),
    ]
}

#[async_trait]
impl<R: CommandRunner> AudioExtractor for FfmpegExtractor<R> {
    async fn extract(&self, input: &Path, target: &Path) -> Result<PathBuf, ExtractionError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = self
            .runner
            .run(&self.ffmpeg, &extract_args(input, target))
            .await?;
        if !output.status.success() {
            return Err(ExtractionError::Failed {
                status: describe_status(&output),
                stderr: stderr_tail(&output),
            });
        }
        if !tokio::fs::try_exists(target).await.unwrap_or(false) {
            return Err(ExtractionError::MissingOutput);
        }
        Ok(target.to_path_buf())
    }
}
