use crate::adapters::cmd::{describe_status, path_arg, stderr_tail, CommandRunner};
use crate::domain::errors::IsolationError;
use crate::ports::media::VocalIsolator;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Source separation with demucs, keeping only the vocal stem.
pub struct DemucsIsolator<R> {
    python: String,
    model: String,
    runner: R,
}

impl<R: CommandRunner> DemucsIsolator<R> {
    pub fn new(python: impl Into<String>, model: impl Into<String>, runner: R) -> Self {
        Self {
            python: python.into(),
            model: model.into(),
            runner,
        }
    }

    /// demucs writes `<scratch>/<model>/<input stem>/{vocals,no_vocals}.wav`.
    fn stem_dir(&self, waveform: &Path, scratch_dir: &Path) -> PathBuf {
        let stem = waveform
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        scratch_dir.join(&self.model).join(stem)
    }

    fn args(&self, waveform: &Path, scratch_dir: &Path) -> Vec<String> {
        vec![
            "-m".to_string(),
            "demucs.separate".to_string(),
            "-n".to_string(),
            self.model.clone(),
            "--two-stems=vocals".to_string(),
            "-o".to_string(),
            path_arg(scratch_dir),
            path_arg(waveform),
        ]
    }
}

#[async_trait]
impl<R: CommandRunner> VocalIsolator for DemucsIsolator<R> {
    async fn isolate(
        &self,
        waveform: &Path,
        scratch_dir: &Path,
        target: &Path,
    ) -> Result<PathBuf, IsolationError> {
        tokio::fs::create_dir_all(scratch_dir).await?;

        let output = self
            .runner
            .run(&self.python, &self.args(waveform, scratch_dir))
            .await?;
        if !output.status.success() {
            return Err(IsolationError::Failed {
                status: describe_status(&output),
                stderr: stderr_tail(&output),
            });
        }

        let stem_dir = self.stem_dir(waveform, scratch_dir);
        let vocals = stem_dir.join("vocals.wav");
        if !tokio::fs::try_exists(&vocals).await.unwrap_or(false) {
            return Err(IsolationError::MissingOutput(vocals.display().to_string()));
        }
        tokio::fs::rename(&vocals, target).await?;

        // The accompaniment stem is never used
        let accompaniment = stem_dir.join("no_vocals.wav");
        if tokio::fs::try_exists(&accompaniment).await.unwrap_or(false) {
            tokio::fs::remove_file(&accompaniment).await?;
        }
        Ok(target.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cmd::testing::create_mock_std_output;
    use crate::adapters::cmd::MockCommandRunner;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_vocal_stem_is_moved_to_target() {
        let dir = tempdir().unwrap();
        let waveform = dir.path().join("audio.wav");
        let scratch = dir.path().join("separation");
        let target = dir.path().join("vocals.wav");
        let stems = scratch.join("htdemucs_ft").join("audio");

        let stems_for_mock = stems.clone();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|program, args| {
                program == "python3"
                    && args.iter().any(|a| a == "--two-stems=vocals")
                    && args.iter().any(|a| a == "htdemucs_ft")
            })
            .times(1)
            .returning(move |_, _| {
                std::fs::create_dir_all(&stems_for_mock).unwrap();
                std::fs::write(stems_for_mock.join("vocals.wav"), b"v").unwrap();
                std::fs::write(stems_for_mock.join("no_vocals.wav"), b"n").unwrap();
                create_mock_std_output("", "", 0)
            });

        let isolator = DemucsIsolator::new("python3", "htdemucs_ft", runner);
        let result = isolator.isolate(&waveform, &scratch, &target).await.unwrap();

        assert_eq!(result, target);
        assert!(target.exists());
        assert!(!stems.join("vocals.wav").exists());
        assert!(!stems.join("no_vocals.wav").exists());
        // Directory layout is left for the orchestrator's cleanup
        assert!(stems.exists());
    }

    #[tokio::test]
    async fn test_missing_stem_is_an_error() {
        let dir = tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| create_mock_std_output("", "", 0));

        let isolator = DemucsIsolator::new("python3", "htdemucs_ft", runner);
        let err = isolator
            .isolate(
                &dir.path().join("audio.wav"),
                &dir.path().join("separation"),
                &dir.path().join("vocals.wav"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IsolationError::MissingOutput(_)));
    }
}
