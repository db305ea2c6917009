//! Pipeline Orchestrator: runs one job through its stages and publishes every state
//! change and log line on the job's watch channel.

use super::composer::{SceneComposer, SceneRequest};
use super::preprocessor::{JobWorkspace, MediaPreprocessor};
use super::transcript::TranscriptProvider;
use crate::config::PipelineSettings;
use crate::domain::captions::{build_caption_layers, CaptionMode};
use crate::domain::errors::StageError;
use crate::domain::jobs::{Job, JobId, JobOptions, JobState};
use crate::domain::scene::EncoderProfile;
use crate::domain::transcript::has_usable_word_timing;
use crate::ports::media::{AudioExtractor, MediaProbe, VocalIsolator};
use crate::ports::render::Renderer;
use crate::ports::speech::{Aligner, Transcriber};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Every external collaborator the pipeline calls.
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn MediaProbe>,
    pub extractor: Arc<dyn AudioExtractor>,
    pub isolator: Arc<dyn VocalIsolator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub aligner: Arc<dyn Aligner>,
    pub renderer: Arc<dyn Renderer>,
}

/// Write side of a job record. The worker running the job holds the only one.
///
/// State and outcome are changed in a single `send_modify`, so a reader never sees
/// `Complete` without an output or `Failed` without an error.
#[derive(Clone)]
pub struct JobReporter {
    sender: Arc<watch::Sender<Job>>,
    id: JobId,
}

impl JobReporter {
    pub fn new(sender: watch::Sender<Job>) -> Self {
        let id = sender.borrow().id;
        Self {
            sender: Arc::new(sender),
            id,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn options(&self) -> JobOptions {
        self.sender.borrow().options.clone()
    }

    pub fn state(&self) -> JobState {
        self.sender.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<Job> {
        self.sender.subscribe()
    }

    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(job_id = %self.id, "{message}");
        self.sender.send_modify(|job| job.push_log(message));
    }

    /// Logs a recoverable stage failure together with the fallback taken.
    pub fn degraded(&self, error: &StageError, fallback: &str) {
        let message = format!("{}; {fallback}", error);
        warn!(job_id = %self.id, stage = %error.stage(), "{message}");
        self.sender.send_modify(|job| job.push_log(message));
    }

    pub fn advance(&self, next: JobState) -> Result<(), StageError> {
        let mut outcome = Ok(());
        self.sender.send_modify(|job| {
            outcome = job.advance(next);
            if outcome.is_ok() {
                job.push_log(format!("Stage: {next}"));
            }
        });
        outcome.map_err(|e| StageError::fatal(self.state(), e.to_string()))?;
        info!(job_id = %self.id, state = %next, "job advanced");
        Ok(())
    }

    pub fn complete(&self, output: &str) {
        let mut done = false;
        self.sender.send_modify(|job| {
            done = job.complete(output).is_ok();
            if done {
                job.push_log(format!("Done: {output}"));
            }
        });
        if done {
            info!(job_id = %self.id, output, "job complete");
        } else {
            error!(job_id = %self.id, output, "job could not be completed from its current state");
        }
    }

    pub fn fail(&self, stage: JobState, message: &str) {
        error!(job_id = %self.id, %stage, "{message}");
        self.sender.send_modify(|job| {
            if job.fail(stage, message).is_ok() {
                job.push_log(format!("Error during {stage}: {message}"));
            }
        });
    }
}

pub struct Pipeline {
    preprocessor: MediaPreprocessor,
    transcripts: TranscriptProvider,
    composer: SceneComposer,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        let Collaborators {
            probe,
            extractor,
            isolator,
            transcriber,
            aligner,
            renderer,
        } = collaborators;
        Self {
            preprocessor: MediaPreprocessor::new(probe.clone(), extractor, isolator),
            transcripts: TranscriptProvider::new(transcriber, aligner, settings.language.clone()),
            composer: SceneComposer::new(
                renderer,
                probe,
                EncoderProfile::hardware(settings.hardware_encoder.clone()),
                EncoderProfile::software(settings.software_encoder.clone()),
            ),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn workspace(&self, id: JobId) -> JobWorkspace {
        JobWorkspace::new(&self.settings.work_dir, id)
    }

    /// Runs the job to a terminal state. Cleanup happens on every path, before the
    /// terminal state is published.
    pub async fn run(&self, reporter: &JobReporter, input: &Path, output_name: &str) {
        let result = self.execute(reporter, input, output_name).await;
        self.cleanup(reporter).await;
        match result {
            Ok(_) => reporter.complete(output_name),
            Err(e) => reporter.fail(e.stage(), e.message()),
        }
    }

    pub async fn cleanup(&self, reporter: &JobReporter) {
        for note in self.workspace(reporter.id()).clean().await {
            reporter.log(note);
        }
    }

    async fn execute(
        &self,
        reporter: &JobReporter,
        input: &Path,
        output_name: &str,
    ) -> Result<PathBuf, StageError> {
        let options = reporter.options();
        let workspace = self.workspace(reporter.id());

        reporter.advance(JobState::Extracting)?;
        let info = self.preprocessor.inspect(input).await?;
        reporter.log(format!(
            "Input is {:.2}s long{}",
            info.duration,
            info.video
                .map(|size| format!(", {}x{}", size.width, size.height))
                .unwrap_or_default()
        ));
        let waveform = self.preprocessor.extract(input, &workspace).await?;
        reporter.log("Audio extracted");

        let mut vocals = None;
        if options.isolate_vocals {
            reporter.advance(JobState::Separating)?;
            match self.preprocessor.isolate_vocals(&waveform, &workspace).await {
                Ok(path) => {
                    reporter.log("Vocals isolated");
                    vocals = Some(path);
                }
                Err(e) => reporter.degraded(&e, "continuing with the original audio"),
            }
        }

        reporter.advance(JobState::Transcribing)?;
        let speech = vocals.as_deref().unwrap_or(&waveform);
        let karaoke = options.caption_mode == CaptionMode::Karaoke;
        let mut segments = self
            .transcripts
            .transcribe(speech, &options.model, karaoke)
            .await?;
        if segments.is_empty() {
            return Err(StageError::fatal(
                JobState::Transcribing,
                "no speech found, nothing to render",
            ));
        }
        reporter.log(format!(
            "Transcribed {} segments with {}",
            segments.len(),
            options.model
        ));

        if karaoke && !has_usable_word_timing(&segments) {
            reporter.advance(JobState::Aligning)?;
            match self.transcripts.align(speech, &segments).await {
                Ok(aligned) => {
                    reporter.log("Word timings refined by forced alignment");
                    segments = aligned;
                }
                Err(e) => reporter.degraded(&e, "using transcription word timings"),
            }
        }

        reporter.advance(JobState::Rendering)?;
        let plan = build_caption_layers(&segments, options.caption_mode, info.duration);
        for note in &plan.notes {
            reporter.log(note.as_str());
        }
        if plan.layers.is_empty() {
            return Err(StageError::fatal(JobState::Rendering, "no captions to render"));
        }
        reporter.log(format!("Composing {} caption layers", plan.layers.len()));

        let scene = self
            .composer
            .compose(SceneRequest {
                input,
                info: &info,
                is_video: options.is_video,
                mode: options.caption_mode,
                layers: plan.layers,
                waveform: &waveform,
                vocals: vocals.as_deref(),
                replace_audio_with_vocals: self.settings.replace_audio_with_vocals,
            })
            .await?;

        tokio::fs::create_dir_all(&self.settings.output_dir)
            .await
            .map_err(|e| {
                StageError::fatal(
                    JobState::Rendering,
                    format!("cannot create {}: {e}", self.settings.output_dir.display()),
                )
            })?;
        let output = self.settings.output_dir.join(output_name);
        let outcome = self.composer.render(&scene, &output).await?;
        if let Some(reason) = &outcome.fallback_reason {
            reporter.degraded(
                &StageError::degraded(JobState::Rendering, reason.clone()),
                &format!("rendered with {}", outcome.profile.video_codec),
            );
        }
        Ok(output)
    }
}
