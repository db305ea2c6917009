use super::captions::CaptionMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Opaque job identifier, assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, used in file names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Extracting,
    Separating,
    Transcribing,
    Aligning,
    Rendering,
    Complete,
    Failed,
}

/// Happy-path order. Failed sits outside it.
const PIPELINE_ORDER: [JobState; 7] = [
    JobState::Pending,
    JobState::Extracting,
    JobState::Separating,
    JobState::Transcribing,
    JobState::Aligning,
    JobState::Rendering,
    JobState::Complete,
];

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }

    pub fn is_optional(self) -> bool {
        matches!(self, JobState::Separating | JobState::Aligning)
    }

    fn position(self) -> Option<usize> {
        PIPELINE_ORDER.iter().position(|state| *state == self)
    }

    /// Sequential moves only; optional stages may be passed over, Failed is reachable
    /// from every non-terminal state.
    pub fn can_advance_to(self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobState::Failed {
            return true;
        }
        match (self.position(), next.position()) {
            (Some(from), Some(to)) if to > from => PIPELINE_ORDER[from + 1..to]
                .iter()
                .all(|skipped| skipped.is_optional()),
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Extracting => "extracting",
            JobState::Separating => "separating",
            JobState::Transcribing => "transcribing",
            JobState::Aligning => "aligning",
            JobState::Rendering => "rendering",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal job transition from {from} to {to}")]
pub struct TransitionError {
    pub from: JobState,
    pub to: JobState,
}

/// Immutable per-job choices made at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    pub model: String,
    pub caption_mode: CaptionMode,
    pub isolate_vocals: bool,
    pub is_video: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// One processing request and everything a status query may see of it.
///
/// `output` is only ever set together with `Complete`, `error` and `failed_stage`
/// only together with `Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub options: JobOptions,
    pub state: JobState,
    pub log: Vec<LogLine>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub failed_stage: Option<JobState>,
}

impl Job {
    pub fn new(id: JobId, options: JobOptions) -> Self {
        Self {
            id,
            options,
            state: JobState::Pending,
            log: Vec::new(),
            output: None,
            error: None,
            failed_stage: None,
        }
    }

    pub fn push_log(&mut self, message: impl Into<String>) {
        self.log.push(LogLine {
            at: Utc::now(),
            message: message.into(),
        });
    }

    pub fn advance(&mut self, next: JobState) -> Result<(), TransitionError> {
        if next.is_terminal() || !self.state.can_advance_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn complete(&mut self, output: impl Into<String>) -> Result<(), TransitionError> {
        if !self.state.can_advance_to(JobState::Complete) {
            return Err(TransitionError {
                from: self.state,
                to: JobState::Complete,
            });
        }
        self.state = JobState::Complete;
        self.output = Some(output.into());
        Ok(())
    }

    pub fn fail(&mut self, stage: JobState, error: impl Into<String>) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError {
                from: self.state,
                to: JobState::Failed,
            });
        }
        self.state = JobState::Failed;
        self.failed_stage = Some(stage);
        self.error = Some(error.into());
        Ok(())
    }

    /// Status view carrying only the last `lines` log lines.
    pub fn snapshot(&self, lines: usize) -> JobSnapshot {
        let skip = self.log.len().saturating_sub(lines);
        JobSnapshot {
            id: self.id,
            state: self.state,
            log: self.log[skip..].to_vec(),
            output: self.output.clone(),
            error: self.error.clone(),
            failed_stage: self.failed_stage,
        }
    }
}

/// What a status query returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub state: JobState,
    pub log: Vec<LogLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<JobState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> JobOptions {
        JobOptions {
            model: "small.en".to_string(),
            caption_mode: CaptionMode::Karaoke,
            isolate_vocals: false,
            is_video: true,
        }
    }

    #[test]
    fn test_full_path_is_sequential() {
        for pair in PIPELINE_ORDER.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_optional_stages_may_be_passed_over() {
        assert!(JobState::Extracting.can_advance_to(JobState::Transcribing));
        assert!(JobState::Transcribing.can_advance_to(JobState::Rendering));
    }

    #[test]
    fn test_mandatory_stages_cannot_be_skipped() {
        assert!(!JobState::Pending.can_advance_to(JobState::Transcribing));
        assert!(!JobState::Extracting.can_advance_to(JobState::Rendering));
        assert!(!JobState::Rendering.can_advance_to(JobState::Extracting));
    }

    #[test]
    fn test_failed_reachable_from_any_running_state() {
        for state in &PIPELINE_ORDER[..6] {
            assert!(state.can_advance_to(JobState::Failed));
        }
        assert!(!JobState::Complete.can_advance_to(JobState::Failed));
        assert!(!JobState::Failed.can_advance_to(JobState::Failed));
    }

    #[test]
    fn test_complete_sets_output_only_from_rendering() {
        let mut job = Job::new(JobId::new(), options());
        assert!(job.complete("out.mp4").is_err());
        assert_eq!(job.output, None);

        job.advance(JobState::Extracting).unwrap();
        job.advance(JobState::Transcribing).unwrap();
        job.advance(JobState::Rendering).unwrap();
        job.complete("out.mp4").unwrap();
        assert_eq!(job.state, JobState::Complete);
        assert_eq!(job.output.as_deref(), Some("out.mp4"));
        assert_eq!(job.error, None);
    }

    #[test]
    fn test_fail_records_stage_and_is_final() {
        let mut job = Job::new(JobId::new(), options());
        job.advance(JobState::Extracting).unwrap();
        job.fail(JobState::Extracting, "no audio stream").unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failed_stage, Some(JobState::Extracting));
        assert!(job.fail(JobState::Extracting, "again").is_err());
        assert!(job.advance(JobState::Transcribing).is_err());
        assert_eq!(job.error.as_deref(), Some("no audio stream"));
    }

    #[test]
    fn test_advance_refuses_terminal_states() {
        let mut job = Job::new(JobId::new(), options());
        assert!(job.advance(JobState::Failed).is_err());
        assert_eq!(job.state, JobState::Pending);
    }

    #[test]
    fn test_log_tail_keeps_latest_lines() {
        let mut job = Job::new(JobId::new(), options());
        for i in 0..5 {
            job.push_log(format!("line {i}"));
        }
        let tail = job.snapshot(2);
        let messages: Vec<&str> = tail.log.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["line 3", "line 4"]);
        assert_eq!(job.snapshot(10).log.len(), 5);
    }

    #[test]
    fn test_snapshot_serializes_only_the_set_outcome() {
        let mut job = Job::new(JobId::new(), options());
        job.advance(JobState::Extracting).unwrap();
        job.fail(JobState::Extracting, "unreadable").unwrap();
        let json = serde_json::to_value(job.snapshot(5)).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "unreadable");
        assert_eq!(json["failed_stage"], "extracting");
        assert!(json.get("output").is_none());
    }

    #[test]
    fn test_job_id_round_trips_through_display() {
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert_eq!(id.short().len(), 8);
    }
}
