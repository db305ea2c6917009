//! Configuration loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Settings the pipeline itself depends on.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    /// Root for per-job scratch directories
    pub work_dir: PathBuf,
    /// Where rendered videos are written
    pub output_dir: PathBuf,
    /// Model used when a submission names none
    pub default_model: String,
    /// Language code for transcription and forced alignment
    pub language: String,
    /// Codec of the primary (hardware) encoder profile
    pub hardware_encoder: String,
    /// Codec of the fallback (software) encoder profile
    pub software_encoder: String,
    /// Use the isolated vocals as the final audio track when isolation succeeded
    pub replace_audio_with_vocals: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("work"),
            output_dir: PathBuf::from("outputs"),
            default_model: String::from("medium.en"),
            language: String::from("en"),
            hardware_encoder: String::from("h264_videotoolbox"),
            software_encoder: String::from("libx264"),
            replace_audio_with_vocals: true,
        }
    }
}

/// Paths of the external programs the adapters shell out to.
#[derive(Clone, Debug)]
pub struct ToolSettings {
    pub ffmpeg: String,
    pub python: String,
    pub demucs_model: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: String::from("ffmpeg"),
            python: String::from("python3"),
            demucs_model: String::from("htdemucs_ft"),
        }
    }
}

/// Configuration for the monolith server.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Directory for persisted uploads
    pub upload_dir: PathBuf,
    /// Upper bound on request bodies
    pub max_upload_bytes: usize,
    /// Jobs allowed to run at the same time
    pub max_concurrent_jobs: usize,
    /// Log lines returned by a status query
    pub status_log_tail: usize,
    /// Keep uploaded inputs once their job has ended
    pub keep_uploads: bool,
    pub pipeline: PipelineSettings,
    pub tools: ToolSettings,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = PipelineSettings::default();
        let tools = ToolSettings::default();

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("5001")),
            upload_dir: env_path("UPLOAD_DIR", "uploads"),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 500 * 1024 * 1024),
            max_concurrent_jobs: parse_or("MAX_CONCURRENT_JOBS", 1usize).max(1),
            status_log_tail: parse_or("STATUS_LOG_TAIL", 50),
            keep_uploads: parse_or("KEEP_UPLOADS", false),
            pipeline: PipelineSettings {
                work_dir: env_path("WORK_DIR", "work"),
                output_dir: env_path("OUTPUT_DIR", "outputs"),
                default_model: env::var("WHISPER_MODEL").unwrap_or(defaults.default_model),
                language: env::var("TRANSCRIBE_LANGUAGE").unwrap_or(defaults.language),
                hardware_encoder: env::var("HW_ENCODER").unwrap_or(defaults.hardware_encoder),
                software_encoder: env::var("SW_ENCODER").unwrap_or(defaults.software_encoder),
                replace_audio_with_vocals: parse_or(
                    "REPLACE_AUDIO_WITH_VOCALS",
                    defaults.replace_audio_with_vocals,
                ),
            },
            tools: ToolSettings {
                ffmpeg: env::var("FFMPEG_BIN").unwrap_or(tools.ffmpeg),
                python: env::var("PYTHON_BIN").unwrap_or(tools.python),
                demucs_model: env::var("DEMUCS_MODEL").unwrap_or(tools.demucs_model),
            },
        }
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(key).unwrap_or_else(|_| String::from(default)))
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        env::set_var("LYRICWIPE_TEST_GARBAGE", "not-a-number");
        assert_eq!(parse_or("LYRICWIPE_TEST_GARBAGE", 7usize), 7);
        env::set_var("LYRICWIPE_TEST_BOOL", " false ");
        assert!(!parse_or("LYRICWIPE_TEST_BOOL", true));
        assert_eq!(parse_or("LYRICWIPE_TEST_UNSET_KEY", 3u32), 3);
    }

    #[test]
    fn test_pipeline_defaults_match_documented_values() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.default_model, "medium.en");
        assert_eq!(settings.software_encoder, "libx264");
        assert!(settings.replace_audio_with_vocals);
    }
}
