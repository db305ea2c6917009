use super::ass::build_script;
use crate::adapters::cmd::{describe_status, path_arg, stderr_tail, CommandRunner};
use crate::domain::errors::RenderError;
use crate::domain::scene::{BaseLayer, EncoderProfile, Scene};
use crate::ports::render::Renderer;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Burns the caption script into the base layer in a single ffmpeg pass.
pub struct FfmpegRenderer<R> {
    ffmpeg: String,
    runner: R,
}

impl<R: CommandRunner> FfmpegRenderer<R> {
    pub fn new(ffmpeg: impl Into<String>, runner: R) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            runner,
        }
    }
}

/// Caption script written next to the output while rendering.
pub fn script_path(output: &Path) -> PathBuf {
    output.with_extension("ass")
}

/// Escapes a path for use inside a filtergraph option value.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

fn seconds(value: f64) -> String {
    format!("{value:.3}")
}

pub fn build_args(scene: &Scene, script: &Path, output: &Path, profile: &EncoderProfile) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(std::string::ToString::to_string)
        .collect();

    // Input 0: the visual base
    match &scene.base {
        BaseLayer::Video { path, .. } => {
            args.push("-i".to_string());
            args.push(path_arg(path));
        }
        BaseLayer::Canvas { size, color } => {
            args.push("-f".to_string());
            args.push("lavfi".to_string());
            args.push("-i".to_string());
            args.push(format!(
                "color=c=0x{:02X}{:02X}{:02X}:s={}x{}:r={}:d={}",
                color.r,
                color.g,
                color.b,
                size.width,
                size.height,
                scene.fps,
                seconds(scene.duration)
            ));
        }
    }

    // Input 1: audio, read no further than the chosen duration
    args.push("-t".to_string());
    args.push(seconds(scene.audio.duration));
    args.push("-i".to_string());
    args.push(path_arg(&scene.audio.path));

    args.extend(
        ["-map", "0:v:0", "-map", "1:a:0"]
            .iter()
            .map(std::string::ToString::to_string),
    );

    let mut filters = Vec::new();
    if scene.base.is_downscaled() {
        let size = scene.base.size();
        filters.push(format!("scale={}:{}", size.width, size.height));
    }
    filters.push(format!("ass='{}'", escape_filter_path(script)));
    args.push("-vf".to_string());
    args.push(filters.join(","));

    args.extend(profile.codec_args());
    args.push("-r".to_string());
    args.push(scene.fps.to_string());
    args.push("-pix_fmt".to_string());
    args.push("yuv420p".to_string());
    args.push("-t".to_string());
    args.push(seconds(scene.duration));
    args.push("-movflags".to_string());
    args.push("+faststart".to_string());
    args.push(path_arg(output));
    args
}

#[async_trait]
impl<R: CommandRunner> Renderer for FfmpegRenderer<R> {
    async fn render(
        &self,
        scene: &Scene,
        output: &Path,
        profile: &EncoderProfile,
    ) -> Result<(), RenderError> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let script = script_path(output);
        tokio::fs::write(&script, build_script(scene)).await?;

        let args = build_args(scene, &script, output, profile);
        tracing::info!(
            codec = %profile.video_codec,
            tier = profile.tier(),
            output = %output.display(),
            layers = scene.captions.len(),
            "rendering"
        );
        let result = self.runner.run(&self.ffmpeg, &args).await;

        if let Err(e) = tokio::fs::remove_file(&script).await {
            tracing::warn!(path = %script.display(), error = %e, "could not remove caption script");
        }

        let output_status = result?;
        if !output_status.status.success() {
            return Err(RenderError::Failed {
                codec: profile.video_codec.clone(),
                status: describe_status(&output_status),
                stderr: stderr_tail(&output_status),
            });
        }
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(RenderError::MissingOutput(profile.video_codec.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cmd::testing::create_mock_std_output;
    use crate::adapters::cmd::MockCommandRunner;
    use crate::domain::captions::{CaptionMode, DEFAULT_FPS};
    use crate::domain::scene::{AudioSource, AudioTrack, CaptionStyle, FrameSize};
    use tempfile::tempdir;

    fn scene(base: BaseLayer) -> Scene {
        let size = base.size();
        Scene {
            base,
            captions: Vec::new(),
            mode: CaptionMode::Phrase,
            style: CaptionStyle::for_mode(CaptionMode::Phrase, size, true),
            audio: AudioTrack {
                path: PathBuf::from("/work/job/vocals.wav"),
                source: AudioSource::IsolatedVocals,
                duration: 9.5,
            },
            duration: 9.5,
            fps: DEFAULT_FPS,
        }
    }

    #[test]
    fn test_canvas_input_is_a_lavfi_color_source() {
        let args = build_args(
            &scene(BaseLayer::canvas()),
            Path::new("/out/x.ass"),
            Path::new("/out/x.mp4"),
            &EncoderProfile::software("libx264"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-f lavfi -i color=c=0x000000:s=1280x720:r=24:d=9.500"));
        assert!(joined.contains("-t 9.500 -i /work/job/vocals.wav"));
        assert!(joined.contains("-vf ass='/out/x.ass'"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert_eq!(args.last().map(String::as_str), Some("/out/x.mp4"));
    }

    #[test]
    fn test_tall_video_is_scaled_before_captions() {
        let base = BaseLayer::video(PathBuf::from("in.mov"), FrameSize::new(1920, 1080));
        let args = build_args(
            &scene(base),
            Path::new("/out/x.ass"),
            Path::new("/out/x.mp4"),
            &EncoderProfile::hardware("h264_videotoolbox"),
        );
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "scale=1280:720,ass='/out/x.ass'");
        assert!(!args.iter().any(|a| a == "lavfi"));
    }

    #[test]
    fn test_filter_path_escaping() {
        assert_eq!(
            escape_filter_path(Path::new("C:/it's/subs.ass")),
            "C\\:/it\\'s/subs.ass"
        );
    }

    #[tokio::test]
    async fn test_render_failure_names_codec_and_removes_script() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("song_lyrics.mp4");

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_, _| create_mock_std_output("", "Unknown encoder 'h264_videotoolbox'", 1));

        let renderer = FfmpegRenderer::new("ffmpeg", runner);
        let err = renderer
            .render(
                &scene(BaseLayer::canvas()),
                &output,
                &EncoderProfile::hardware("h264_videotoolbox"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Failed { ref codec, .. } if codec == "h264_videotoolbox"));
        assert!(!script_path(&output).exists());
    }

    #[tokio::test]
    async fn test_render_requires_output_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("song_lyrics.mp4");

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| create_mock_std_output("", "", 0));

        let renderer = FfmpegRenderer::new("ffmpeg", runner);
        let err = renderer
            .render(
                &scene(BaseLayer::canvas()),
                &output,
                &EncoderProfile::software("libx264"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingOutput(_)));
    }
}
