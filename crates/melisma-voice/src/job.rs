//! Training job snapshots.
//!
//! A [`TrainingJob`] is the externally visible record of one background
//! training run. Workers mutate a snapshot through the methods here and
//! persist it after every change; progress never decreases, and once a job
//! reaches a terminal status further mutations are ignored.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::characteristics::VoiceCharacteristics;

/// Lifecycle state of a training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, worker not started yet.
    Pending,
    /// Worker is running.
    Processing,
    /// Training finished and the voice was installed.
    Completed,
    /// Training aborted with an error.
    Failed,
    /// Stopped by a cancellation request.
    Cancelled,
}

impl JobStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Snapshot of one training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingJob {
    /// Unique job identifier.
    pub job_id: String,
    /// Display name the finished voice will carry.
    pub voice_name: String,
    pub status: JobStatus,
    /// Completion percentage, 0 to 100, non-decreasing.
    pub progress: u8,
    /// Audio files the job was started with.
    pub input_files: Vec<PathBuf>,
    /// Analysis result, populated once measurement finishes.
    #[serde(default)]
    pub characteristics: Option<VoiceCharacteristics>,
    /// Identifier of the installed voice, populated on completion.
    #[serde(default)]
    pub voice_id: Option<String>,
    /// Failure description, populated on failure.
    #[serde(default)]
    pub error: Option<String>,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: u64,
    /// Last mutation time, seconds since the Unix epoch.
    pub updated_at: u64,
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl TrainingJob {
    /// Creates a fresh pending job at progress 0.
    pub fn pending(
        job_id: impl Into<String>,
        voice_name: impl Into<String>,
        input_files: Vec<PathBuf>,
    ) -> Self {
        let now = epoch_seconds();
        Self {
            job_id: job_id.into(),
            voice_name: voice_name.into(),
            status: JobStatus::Pending,
            progress: 0,
            input_files,
            characteristics: None,
            voice_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves a pending job into the processing state.
    pub fn mark_processing(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Processing;
        self.touch();
    }

    /// Raises progress to `progress` (capped at 100).
    ///
    /// Progress is monotonic: a lower value than the current one is
    /// ignored. Terminal jobs ignore the call entirely.
    pub fn advance_progress(&mut self, progress: u8) {
        if self.is_terminal() {
            return;
        }
        let capped = progress.min(100);
        if capped > self.progress {
            self.progress = capped;
            self.touch();
        }
    }

    /// Records the analysis result.
    pub fn set_characteristics(&mut self, characteristics: VoiceCharacteristics) {
        if self.is_terminal() {
            return;
        }
        self.characteristics = Some(characteristics);
        self.touch();
    }

    /// Finishes the job successfully, pinning progress at 100.
    pub fn complete(&mut self, voice_id: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.voice_id = Some(voice_id.into());
        self.touch();
    }

    /// Finishes the job with a failure description.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.touch();
    }

    /// Finishes the job as cancelled.
    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Cancelled;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = epoch_seconds().max(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job() -> TrainingJob {
        TrainingJob::pending("job-1", "My Voice", vec![PathBuf::from("a.wav")])
    }

    #[test]
    fn test_new_job_is_pending_at_zero() {
        let j = job();
        assert_eq!(j.status, JobStatus::Pending);
        assert_eq!(j.progress, 0);
        assert!(!j.is_terminal());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut j = job();
        j.mark_processing();
        j.advance_progress(30);
        j.advance_progress(10);
        assert_eq!(j.progress, 30);
        j.advance_progress(55);
        assert_eq!(j.progress, 55);
    }

    #[test]
    fn test_progress_caps_at_100() {
        let mut j = job();
        j.advance_progress(250);
        assert_eq!(j.progress, 100);
    }

    #[test]
    fn test_complete_pins_progress_and_voice_id() {
        let mut j = job();
        j.mark_processing();
        j.advance_progress(60);
        j.complete("voice-xyz");
        assert_eq!(j.status, JobStatus::Completed);
        assert_eq!(j.progress, 100);
        assert_eq!(j.voice_id.as_deref(), Some("voice-xyz"));
    }

    #[test]
    fn test_terminal_states_ignore_mutation() {
        let mut j = job();
        j.cancel();
        assert_eq!(j.status, JobStatus::Cancelled);

        j.mark_processing();
        j.advance_progress(90);
        j.fail("too late");
        j.complete("voice-xyz");
        assert_eq!(j.status, JobStatus::Cancelled);
        assert_eq!(j.progress, 0);
        assert_eq!(j.error, None);
        assert_eq!(j.voice_id, None);
    }

    #[test]
    fn test_fail_records_error() {
        let mut j = job();
        j.fail("no usable audio");
        assert_eq!(j.status, JobStatus::Failed);
        assert_eq!(j.error.as_deref(), Some("no usable audio"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut j = job();
        j.mark_processing();
        j.advance_progress(42);
        let json = serde_json::to_string(&j).unwrap();
        let back: TrainingJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, j);
    }
}
