//! In-memory job registry and worker scheduling.
//!
//! Each job gets its own watch channel: the worker task owns the sender, the
//! registry keeps a receiver for status queries and event streams. The registry map
//! is only locked to insert or look up an entry, never while a job runs.

use super::orchestrator::{JobReporter, Pipeline};
use crate::domain::jobs::{Job, JobId, JobOptions, JobSnapshot};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, RwLock, Semaphore};

/// A persisted upload waiting to be processed.
#[derive(Debug, Clone)]
pub struct Submission {
    pub input: PathBuf,
    /// Name the client gave the file; the output name derives from it.
    pub original_name: String,
    pub options: JobOptions,
}

/// `<original stem>_<short job id>_lyrics.mp4`
pub fn output_name(original_name: &str, id: JobId) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());
    format!("{stem}_{}_lyrics.mp4", id.short())
}

pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, watch::Receiver<Job>>>,
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    keep_uploads: bool,
}

impl JobRegistry {
    pub fn new(pipeline: Arc<Pipeline>, max_concurrent_jobs: usize, keep_uploads: bool) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            pipeline,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            keep_uploads,
        }
    }

    /// Registers the job and spawns its worker. Returns without waiting for a slot.
    pub async fn submit(&self, submission: Submission) -> JobId {
        let id = JobId::new();
        let (sender, receiver) = watch::channel(Job::new(id, submission.options));
        self.jobs.write().await.insert(id, receiver);

        let reporter = JobReporter::new(sender);
        reporter.log(format!("Queued {}", submission.original_name));
        tracing::info!(job_id = %id, input = %submission.input.display(), "job submitted");

        tokio::spawn(run_job(
            self.pipeline.clone(),
            self.permits.clone(),
            reporter,
            submission.input,
            output_name(&submission.original_name, id),
            self.keep_uploads,
        ));
        id
    }

    pub async fn status(&self, id: JobId, log_tail: usize) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().await;
        let receiver = jobs.get(&id)?;
        let snapshot = receiver.borrow().snapshot(log_tail);
        Some(snapshot)
    }

    pub async fn subscribe(&self, id: JobId) -> Option<watch::Receiver<Job>> {
        self.jobs.read().await.get(&id).cloned()
    }
}

async fn run_job(
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    reporter: JobReporter,
    input: PathBuf,
    output_name: String,
    keep_uploads: bool,
) {
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            reporter.fail(reporter.state(), &format!("worker pool closed: {e}"));
            return;
        }
    };

    // The pipeline runs in its own task so a panic inside a stage surfaces here as a
    // JoinError instead of leaving the job stuck in a running state.
    let worker = {
        let pipeline = pipeline.clone();
        let reporter = reporter.clone();
        let input = input.clone();
        tokio::spawn(async move { pipeline.run(&reporter, &input, &output_name).await })
    };
    if let Err(e) = worker.await {
        tracing::error!(job_id = %reporter.id(), error = %e, "job worker crashed");
        pipeline.cleanup(&reporter).await;
        reporter.fail(reporter.state(), &format!("internal error: {e}"));
    }

    if !keep_uploads {
        if let Err(e) = tokio::fs::remove_file(&input).await {
            tracing::warn!(job_id = %reporter.id(), path = %input.display(), error = %e, "could not remove upload");
        }
    }
}
