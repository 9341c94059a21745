use dashmap::DashMap;

use super::job_id::JobId;
use super::progress::{JobStatus, ProgressRecord, ProgressSnapshot};

/// Concurrent table of job progress.
///
/// Each job has one writer (its worker) and any number of pollers. Reads
/// and writes lock only the shard holding the key. Once a job reaches
/// `Done` or `Failed` every further update to it is ignored.
#[derive(Default)]
pub struct JobStore {
    records: DashMap<JobId, ProgressRecord>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending job. Returns `false` if the id is already taken.
    pub fn create(&self, id: JobId, total_frames: usize) -> bool {
        match self.records.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ProgressRecord::new(total_frames));
                true
            }
        }
    }

    pub fn mark_running(&self, id: JobId) -> bool {
        self.update(id, |record| record.status = JobStatus::Running)
    }

    /// Records the index of the frame just examined.
    pub fn set_current(&self, id: JobId, frame_index: usize) -> bool {
        self.update(id, |record| {
            record.current_frame = frame_index;
            record.frames_examined = frame_index + 1;
        })
    }

    pub fn complete(&self, id: JobId, filename: impl Into<String>) -> bool {
        let filename = filename.into();
        self.update(id, |record| record.status = JobStatus::Done { filename })
    }

    pub fn fail(&self, id: JobId, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.update(id, |record| record.status = JobStatus::Failed { reason })
    }

    pub fn get(&self, id: JobId) -> Option<ProgressRecord> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    pub fn snapshot(&self, id: JobId) -> Option<ProgressSnapshot> {
        self.records.get(&id).map(|r| r.snapshot())
    }

    pub fn remove(&self, id: JobId) -> Option<ProgressRecord> {
        self.records.remove(&id).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Applies `f` to a live record. `false` if unknown or already finished.
    fn update(&self, id: JobId, f: impl FnOnce(&mut ProgressRecord)) -> bool {
        match self.records.get_mut(&id) {
            Some(mut record) if !record.status.is_terminal() => {
                f(record.value_mut());
                true
            }
            _ => false,
        }
    }
}
