use crate::domain::errors::StageError;
use crate::domain::jobs::{JobId, JobState};
use crate::ports::media::{AudioExtractor, MediaInfo, MediaProbe, VocalIsolator};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-job scratch paths under `WORK_DIR/<job id>/`.
///
/// Every intermediate file a job creates lives here, so jobs running side by side
/// never share a path and cleanup can be derived from the id alone.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    pub fn new(work_dir: &Path, id: JobId) -> Self {
        Self {
            root: work_dir.join(id.to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn waveform(&self) -> PathBuf {
        self.root.join("audio.wav")
    }

    pub fn vocals(&self) -> PathBuf {
        self.root.join("vocals.wav")
    }

    /// Output directory handed to the isolation engine.
    pub fn separation_dir(&self) -> PathBuf {
        self.root.join("separation")
    }

    /// Removes intermediate waveforms and empty scratch directories.
    ///
    /// Returns one note per thing it could not or would not remove. A directory that
    /// still holds files is kept.
    pub async fn clean(&self) -> Vec<String> {
        let mut notes = Vec::new();
        for file in [self.waveform(), self.vocals()] {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => notes.push(format!("Could not remove {}: {e}", file.display())),
            }
        }

        let root = self.root.clone();
        let separation = self.separation_dir();
        let pruned = tokio::task::spawn_blocking(move || -> io::Result<Vec<String>> {
            let mut kept = Vec::new();
            if separation.is_dir() && !prune_empty_dirs(&separation)? {
                kept.push(format!(
                    "Kept non-empty scratch directory {}",
                    separation.display()
                ));
            }
            if root.is_dir() && kept.is_empty() {
                prune_empty_dirs(&root)?;
            }
            Ok(kept)
        })
        .await;

        match pruned {
            Ok(Ok(kept)) => notes.extend(kept),
            Ok(Err(e)) => notes.push(format!("Scratch cleanup failed: {e}")),
            Err(e) => notes.push(format!("Scratch cleanup task failed: {e}")),
        }
        notes
    }
}

/// Depth-first removal of empty directories. Returns whether `dir` itself is gone.
fn prune_empty_dirs(dir: &Path) -> io::Result<bool> {
    let mut empty = true;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            empty &= prune_empty_dirs(&entry.path())?;
        } else {
            empty = false;
        }
    }
    if empty {
        std::fs::remove_dir(dir)?;
    }
    Ok(empty)
}

/// Turns arbitrary input media into the waveform the speech collaborators consume.
pub struct MediaPreprocessor {
    probe: Arc<dyn MediaProbe>,
    extractor: Arc<dyn AudioExtractor>,
    isolator: Arc<dyn VocalIsolator>,
}

impl MediaPreprocessor {
    pub fn new(
        probe: Arc<dyn MediaProbe>,
        extractor: Arc<dyn AudioExtractor>,
        isolator: Arc<dyn VocalIsolator>,
    ) -> Self {
        Self {
            probe,
            extractor,
            isolator,
        }
    }

    /// Duration and stream layout of the input. Unreadable media ends the job.
    pub async fn inspect(&self, input: &Path) -> Result<MediaInfo, StageError> {
        let info = self
            .probe
            .probe(input)
            .await
            .map_err(|e| StageError::fatal(JobState::Extracting, e.to_string()))?;
        if !info.has_audio {
            return Err(StageError::fatal(
                JobState::Extracting,
                "input has no audio stream",
            ));
        }
        Ok(info)
    }

    pub async fn extract(&self, input: &Path, workspace: &JobWorkspace) -> Result<PathBuf, StageError> {
        tokio::fs::create_dir_all(workspace.root())
            .await
            .map_err(|e| {
                StageError::fatal(
                    JobState::Extracting,
                    format!("cannot create {}: {e}", workspace.root().display()),
                )
            })?;
        self.extractor
            .extract(input, &workspace.waveform())
            .await
            .map_err(|e| StageError::fatal(JobState::Extracting, e.to_string()))
    }

    /// Best effort. Any failure is a degradation the caller recovers from.
    pub async fn isolate_vocals(
        &self,
        waveform: &Path,
        workspace: &JobWorkspace,
    ) -> Result<PathBuf, StageError> {
        self.isolator
            .isolate(waveform, &workspace.separation_dir(), &workspace.vocals())
            .await
            .map_err(|e| StageError::degraded(JobState::Separating, e.to_string()))
    }
}
