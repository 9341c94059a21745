use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done { filename: String },
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done { .. } | JobStatus::Failed { .. })
    }
}

/// Live state of one job, owned by the [`JobStore`](super::job_store::JobStore).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressRecord {
    /// Container frame count; may differ from what actually decodes.
    pub total_frames: usize,
    /// Index of the most recently examined frame.
    pub current_frame: usize,
    /// Frames examined so far; 0 until the first progress report.
    pub frames_examined: usize,
    pub status: JobStatus,
}

impl ProgressRecord {
    pub fn new(total_frames: usize) -> Self {
        Self {
            total_frames,
            current_frame: 0,
            frames_examined: 0,
            status: JobStatus::Pending,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let (done, failed, filename, error) = match &self.status {
            JobStatus::Pending | JobStatus::Running => (false, false, String::new(), None),
            JobStatus::Done { filename } => (true, false, filename.clone(), None),
            JobStatus::Failed { reason } => (true, true, String::new(), Some(reason.clone())),
        };
        ProgressSnapshot {
            total: self.total_frames,
            current: self.current_frame,
            examined: self.frames_examined,
            done,
            failed,
            filename,
            error,
        }
    }
}

/// Wire form of a progress poll.
///
/// `done` turns true on success and on failure so pollers always stop;
/// `failed` and `error` tell the two apart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub current: usize,
    pub examined: usize,
    pub done: bool,
    pub failed: bool,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
