//! One-shot CLI: turn a single audio or video file into a lyrics video.

use anyhow::{bail, Context};
use clap::Parser;
use lyricwipe::adapters::{self, http::media_kind};
use lyricwipe::application::orchestrator::{JobReporter, Pipeline};
use lyricwipe::config::AppConfig;
use lyricwipe::domain::captions::CaptionMode;
use lyricwipe::domain::jobs::{Job, JobId, JobOptions, JobState};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Generate a lyrics video from an audio or video file.")]
struct Args {
    /// Path to the input video or audio file
    input_file: PathBuf,

    /// Path to the output video file (defaults to <input stem>_lyrics.mp4)
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Whisper model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Use the karaoke wipe effect
    #[arg(long)]
    wipe_text: bool,

    /// Separate vocals before transcription (very slow)
    #[arg(long)]
    separate_vocals: bool,
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{stem}_lyrics.mp4"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if !args.input_file.is_file() {
        bail!("input file not found at '{}'", args.input_file.display());
    }
    let extension = args
        .input_file
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    let is_video = media_kind(extension)
        .with_context(|| format!("unsupported input type '{extension}'"))?;

    let output = args
        .output_file
        .unwrap_or_else(|| default_output(&args.input_file));
    let output_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("output path has no file name")?;
    config.pipeline.output_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let options = JobOptions {
        model: args
            .model
            .unwrap_or_else(|| config.pipeline.default_model.clone()),
        caption_mode: if args.wipe_text {
            CaptionMode::Karaoke
        } else {
            CaptionMode::Phrase
        },
        isolate_vocals: args.separate_vocals,
        is_video,
    };

    let collaborators = adapters::collaborators(&config.tools, &config.pipeline.language);
    let pipeline = Pipeline::new(collaborators, config.pipeline.clone());

    let (sender, receiver) = watch::channel(Job::new(JobId::new(), options));
    let reporter = JobReporter::new(sender);
    pipeline
        .run(&reporter, &args.input_file, &output_name)
        .await;

    let job = receiver.borrow().clone();
    match job.state {
        JobState::Complete => {
            println!("{}", config.pipeline.output_dir.join(output_name).display());
            Ok(())
        }
        _ => bail!(
            "{} failed: {}",
            job.failed_stage.unwrap_or(job.state),
            job.error.unwrap_or_default()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_uses_input_stem() {
        assert_eq!(
            default_output(Path::new("/music/My Song.flac")),
            PathBuf::from("My Song_lyrics.mp4")
        );
    }

    #[test]
    fn test_flags_parse() {
        let args = Args::parse_from(["lyricize", "in.mp4", "-m", "small.en", "--wipe-text"]);
        assert_eq!(args.model.as_deref(), Some("small.en"));
        assert!(args.wipe_text);
        assert!(!args.separate_vocals);
        assert_eq!(args.output_file, None);
    }
}
