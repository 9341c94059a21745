use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::pipeline::build_sheet_use_case::{BuildSheetUseCase, SheetOutcome};
use crate::pipeline::probe_source_use_case::{ProbeSourceUseCase, SourceProbe};
use crate::pipeline::sheet_error::SheetError;
use crate::pipeline::sheet_request::SheetRequest;
use crate::shared::constants::THUMBNAIL_PREFIX;

use super::engine_factory::EngineFactory;
use super::job_id::JobId;
use super::job_store::JobStore;
use super::progress::ProgressSnapshot;
use super::source_stager::{SourceError, SourceLocation, SourceStager, StagedSource};

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error("job {0} is already registered")]
    Duplicate(JobId),
    #[error("cannot start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A probed source with a pending progress record, waiting for parameters.
#[derive(Debug)]
pub struct AcceptedJob {
    id: JobId,
    probe: SourceProbe,
    source: StagedSource,
}

impl AcceptedJob {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn total_frames(&self) -> usize {
        self.probe.total_frames
    }

    pub fn probe(&self) -> &SourceProbe {
        &self.probe
    }

    pub fn thumbnail(&self) -> Option<&Path> {
        self.probe.thumbnail.as_deref()
    }

    pub fn source_path(&self) -> &Path {
        self.source.path()
    }
}

/// Accepts sources, starts one supervised worker thread per job and
/// publishes progress into a shared [`JobStore`].
///
/// Every worker outcome, including a panic, ends in a terminal record.
/// The staged input is removed before the record turns terminal, and
/// `Done` is only published once the document is in place.
pub struct JobRunner {
    store: Arc<JobStore>,
    factory: Arc<dyn EngineFactory>,
    stager: SourceStager,
    workers: Mutex<HashMap<JobId, JoinHandle<()>>>,
    finished_tx: Sender<JobId>,
    finished_rx: Receiver<JobId>,
}

impl JobRunner {
    pub fn new(factory: Arc<dyn EngineFactory>, stager: SourceStager) -> Self {
        let (finished_tx, finished_rx) = crossbeam_channel::unbounded();
        Self {
            store: Arc::new(JobStore::new()),
            factory,
            stager,
            workers: Mutex::new(HashMap::new()),
            finished_tx,
            finished_rx,
        }
    }

    pub fn store(&self) -> Arc<JobStore> {
        self.store.clone()
    }

    pub fn snapshot(&self, id: JobId) -> Option<ProgressSnapshot> {
        self.store.snapshot(id)
    }

    /// Ids of jobs whose record just became terminal, in completion order.
    pub fn finished(&self) -> Receiver<JobId> {
        self.finished_rx.clone()
    }

    /// Stages and probes a source, then registers a pending job.
    ///
    /// On any failure the staged copy is discarded and no record exists.
    pub fn accept(
        &self,
        location: &SourceLocation,
        thumbnail_dir: Option<&Path>,
    ) -> Result<AcceptedJob, JobError> {
        let source = self.stager.stage(location)?;
        let id = JobId::random();

        let thumbnail: Option<PathBuf> =
            thumbnail_dir.map(|dir| dir.join(format!("{THUMBNAIL_PREFIX}{id}.jpg")));
        let mut probe_use_case =
            ProbeSourceUseCase::new(self.factory.video_reader(), self.factory.image_writer());
        let probe = probe_use_case.execute(source.path(), thumbnail.as_deref())?;

        if !self.store.create(id, probe.total_frames) {
            return Err(JobError::Duplicate(id));
        }
        log::info!(
            "Accepted job {id}: {} ({} frames)",
            source.path().display(),
            probe.total_frames
        );
        Ok(AcceptedJob { id, probe, source })
    }

    /// Validates `request` and starts the job's worker.
    ///
    /// An invalid request or a failed spawn marks the job failed.
    pub fn launch(&self, job: AcceptedJob, request: SheetRequest) -> Result<JobId, JobError> {
        let id = job.id;
        if let Err(e) = request.validate() {
            self.store.fail(id, e.to_string());
            let _ = self.finished_tx.send(id);
            return Err(e.into());
        }

        let store = self.store.clone();
        let factory = self.factory.clone();
        let finished_tx = self.finished_tx.clone();
        let source = job.source;

        let spawned = thread::Builder::new()
            .name(format!("job-{id}"))
            .spawn(move || {
                store.mark_running(id);
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_job(factory.as_ref(), &store, id, source.path(), &request)
                }));

                if let Err(e) = source.close() {
                    log::warn!("Job {id}: failed to remove staged input: {e}");
                }

                match outcome {
                    Ok(Ok(sheet)) => {
                        log::info!("Job {id} done: {}", sheet.path.display());
                        store.complete(id, sheet.filename);
                    }
                    Ok(Err(e)) => {
                        log::error!("Job {id} failed: {e}");
                        store.fail(id, e.to_string());
                    }
                    Err(payload) => {
                        let reason = format!("worker panicked: {}", panic_message(payload.as_ref()));
                        log::error!("Job {id} {reason}");
                        store.fail(id, reason);
                    }
                }
                let _ = finished_tx.send(id);
            });

        match spawned {
            Ok(handle) => {
                self.lock_workers().insert(id, handle);
                Ok(id)
            }
            Err(e) => {
                self.store.fail(id, format!("cannot start worker thread: {e}"));
                let _ = self.finished_tx.send(id);
                Err(JobError::Spawn(e))
            }
        }
    }

    /// Waits for a job's worker thread. `None` if no worker was started.
    pub fn join(&self, id: JobId) -> Option<thread::Result<()>> {
        let handle = self.lock_workers().remove(&id)?;
        Some(handle.join())
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, JoinHandle<()>>> {
        self.workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn run_job(
    factory: &dyn EngineFactory,
    store: &Arc<JobStore>,
    id: JobId,
    input: &Path,
    request: &SheetRequest,
) -> Result<SheetOutcome, SheetError> {
    let progress_store = store.clone();
    let mut use_case = BuildSheetUseCase::new(
        factory.video_reader(),
        factory.document_writer(request.page),
        factory.similarity_scorer(),
        factory.pipeline_logger(),
        Some(Box::new(move |frame_index| {
            progress_store.set_current(id, frame_index);
        })),
    );
    use_case.execute(input, request)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::progress::JobStatus;
    use crate::jobs::source_stager::tests::{local_stager, serve_once};
    use crate::layout::domain::document_writer::DocumentWriter;
    use crate::layout::domain::page_geometry::{PageRect, PageSize};
    use crate::layout::infrastructure::pdf_document_writer::PdfDocumentWriter;
    use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
    use crate::sampling::domain::similarity_scorer::SimilarityScorer;
    use crate::sampling::infrastructure::ssim_scorer::SsimScorer;
    use crate::shared::frame::Frame;
    use crate::shared::region::Roi;
    use crate::shared::video_metadata::VideoMetadata;
    use crate::video::domain::image_writer::ImageWriter;
    use crate::video::domain::video_reader::VideoReader;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    // --- Stubs ---

    struct StubReader {
        frames: Vec<Frame>,
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Ok(VideoMetadata {
                width: 8,
                height: 8,
                fps: 25.0,
                total_frames: self.frames.len(),
                codec: "stub".into(),
                source_path: None,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(self.frames.drain(..).map(Ok))
        }

        fn close(&mut self) {}
    }

    struct NullImageWriter;

    impl ImageWriter for NullImageWriter {
        fn write(
            &self,
            _path: &Path,
            _frame: &Frame,
            _max_side: Option<u32>,
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    struct PanickingScorer;

    impl SimilarityScorer for PanickingScorer {
        fn score(&self, _a: &Frame, _b: &Frame) -> Result<f64, Box<dyn std::error::Error>> {
            panic!("scorer blew up");
        }
    }

    /// Lays out normally but cannot persist.
    struct UnwritableDocument;

    impl DocumentWriter for UnwritableDocument {
        fn draw_image(
            &mut self,
            _image: &Frame,
            _target: &PageRect,
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }

        fn show_page(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }

        fn save(&mut self, _path: &Path) -> Result<(), Box<dyn std::error::Error>> {
            Err("no space left on device".into())
        }
    }

    struct StubFactory {
        frames: Vec<Frame>,
        panic_in_scorer: bool,
        unwritable_output: bool,
    }

    impl StubFactory {
        fn with_levels(levels: &[u8]) -> Self {
            let frames = levels
                .iter()
                .enumerate()
                .map(|(i, &level)| {
                    let data = (0..64u32)
                        .flat_map(|p| [level.wrapping_add((p * 3) as u8); 3])
                        .collect();
                    Frame::new(data, 8, 8, 3, i)
                })
                .collect();
            Self {
                frames,
                panic_in_scorer: false,
                unwritable_output: false,
            }
        }
    }

    impl EngineFactory for StubFactory {
        fn video_reader(&self) -> Box<dyn VideoReader> {
            Box::new(StubReader {
                frames: self.frames.clone(),
            })
        }

        fn image_writer(&self) -> Box<dyn ImageWriter> {
            Box::new(NullImageWriter)
        }

        fn document_writer(&self, page: PageSize) -> Box<dyn DocumentWriter> {
            if self.unwritable_output {
                Box::new(UnwritableDocument)
            } else {
                Box::new(PdfDocumentWriter::new(page))
            }
        }

        fn similarity_scorer(&self) -> Box<dyn SimilarityScorer> {
            if self.panic_in_scorer {
                Box::new(PanickingScorer)
            } else {
                Box::new(SsimScorer::default())
            }
        }

        fn pipeline_logger(&self) -> Box<dyn PipelineLogger> {
            Box::new(NullPipelineLogger)
        }
    }

    // --- Helpers ---

    fn local_input(dir: &TempDir) -> SourceLocation {
        let path = dir.path().join("input.mp4");
        fs::write(&path, b"stub").unwrap();
        SourceLocation::Local(path)
    }

    fn runner(factory: StubFactory) -> JobRunner {
        JobRunner::new(Arc::new(factory), local_stager())
    }

    fn wait_finished(runner: &JobRunner, id: JobId) {
        let finished = runner.finished();
        let got = finished
            .recv_timeout(Duration::from_secs(30))
            .expect("job did not finish");
        assert_eq!(got, id);
    }

    // --- Tests ---

    #[test]
    fn test_accept_registers_pending_job() {
        let dir = TempDir::new().unwrap();
        let runner = runner(StubFactory::with_levels(&[10, 10, 200]));
        let job = runner
            .accept(&local_input(&dir), Some(dir.path()))
            .unwrap();

        assert_eq!(job.total_frames(), 3);
        let expected_thumb = dir.path().join(format!("thumb_{}.jpg", job.id()));
        assert_eq!(job.thumbnail(), Some(expected_thumb.as_path()));
        assert_eq!(
            runner.store().get(job.id()).unwrap().status,
            JobStatus::Pending
        );
    }

    #[test]
    fn test_accept_empty_source_creates_no_record() {
        let dir = TempDir::new().unwrap();
        let runner = runner(StubFactory::with_levels(&[]));
        let result = runner.accept(&local_input(&dir), None);

        assert!(matches!(
            result,
            Err(JobError::Sheet(SheetError::EmptySource(_)))
        ));
        assert!(runner.store().is_empty());
    }

    #[test]
    fn test_accept_missing_file_creates_no_record() {
        let runner = runner(StubFactory::with_levels(&[1]));
        let result = runner.accept(&SourceLocation::Local("/no/such/video.mp4".into()), None);
        assert!(matches!(
            result,
            Err(JobError::Source(SourceError::NotFound(_)))
        ));
        assert!(runner.store().is_empty());
    }

    #[test]
    fn test_job_runs_to_done_with_visible_output() {
        let dir = TempDir::new().unwrap();
        let out_dir = dir.path().join("out");
        let runner = runner(StubFactory::with_levels(&[10, 10, 10, 200, 200]));
        let job = runner.accept(&local_input(&dir), None).unwrap();

        let mut request = SheetRequest::new(&out_dir);
        request.rows = 2;
        request.cols = 2;
        let id = runner.launch(job, request).unwrap();
        wait_finished(&runner, id);

        let snapshot = runner.snapshot(id).unwrap();
        assert!(snapshot.done);
        assert!(!snapshot.failed);
        assert_eq!(snapshot.current, 4);
        assert_eq!(snapshot.examined, 5);
        assert!(snapshot.filename.starts_with("tab_"));
        assert!(out_dir.join(&snapshot.filename).is_file());
        assert!(matches!(runner.join(id), Some(Ok(()))));
    }

    #[test]
    fn test_geometry_error_marks_job_failed() {
        let dir = TempDir::new().unwrap();
        let runner = runner(StubFactory::with_levels(&[10, 20]));
        let job = runner.accept(&local_input(&dir), None).unwrap();

        let mut request = SheetRequest::new(dir.path().join("out"));
        request.roi = Some(Roi::new(4, 4, 8, 8));
        let id = runner.launch(job, request).unwrap();
        wait_finished(&runner, id);

        let snapshot = runner.snapshot(id).unwrap();
        assert!(snapshot.done && snapshot.failed);
        assert!(snapshot.error.unwrap().contains("outside"));
        assert!(snapshot.filename.is_empty());
    }

    #[test]
    fn test_output_write_failure_marks_job_failed() {
        let dir = TempDir::new().unwrap();
        let out_dir = dir.path().join("out");
        let mut factory = StubFactory::with_levels(&[10, 10, 200]);
        factory.unwritable_output = true;
        let runner = runner(factory);
        let location = local_input(&dir);
        let job = runner.accept(&location, None).unwrap();

        let id = runner.launch(job, SheetRequest::new(&out_dir)).unwrap();
        wait_finished(&runner, id);

        let snapshot = runner.snapshot(id).unwrap();
        assert!(snapshot.done && snapshot.failed);
        assert!(snapshot.filename.is_empty());
        let error = snapshot.error.unwrap();
        assert!(error.contains("no space left on device"), "error was {error}");
        assert_eq!(snapshot.examined, 3);
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 0);
        assert!(dir.path().join("input.mp4").exists());
        assert!(matches!(runner.join(id), Some(Ok(()))));
    }

    #[test]
    fn test_worker_panic_is_caught_and_recorded() {
        let dir = TempDir::new().unwrap();
        let mut factory = StubFactory::with_levels(&[10, 90, 200]);
        factory.panic_in_scorer = true;
        let runner = runner(factory);
        let job = runner.accept(&local_input(&dir), None).unwrap();

        let id = runner
            .launch(job, SheetRequest::new(dir.path().join("out")))
            .unwrap();
        wait_finished(&runner, id);

        assert_eq!(
            runner.store().get(id).unwrap().status,
            JobStatus::Failed {
                reason: "worker panicked: scorer blew up".into()
            }
        );
        assert!(matches!(runner.join(id), Some(Ok(()))));
    }

    #[test]
    fn test_invalid_request_fails_job_without_worker() {
        let dir = TempDir::new().unwrap();
        let runner = runner(StubFactory::with_levels(&[10]));
        let job = runner.accept(&local_input(&dir), None).unwrap();
        let id = job.id();

        let mut request = SheetRequest::new(dir.path().join("out"));
        request.rows = 0;
        assert!(matches!(
            runner.launch(job, request),
            Err(JobError::Sheet(SheetError::InvalidConfig(_)))
        ));
        assert!(runner.snapshot(id).unwrap().failed);
        assert!(runner.join(id).is_none());
    }

    #[test]
    fn test_downloaded_input_is_removed_after_job() {
        let dir = TempDir::new().unwrap();
        let url = serve_once("200 OK", b"stub video".to_vec(), "clip.mp4");
        let runner = runner(StubFactory::with_levels(&[10, 200]));
        let job = runner.accept(&SourceLocation::Remote(url), None).unwrap();
        let staged_dir = job.source_path().parent().unwrap().to_path_buf();
        assert!(staged_dir.exists());

        let id = runner
            .launch(job, SheetRequest::new(dir.path().join("out")))
            .unwrap();
        wait_finished(&runner, id);

        assert!(runner.snapshot(id).unwrap().done);
        assert!(!staged_dir.exists());
    }

    #[test]
    fn test_local_input_is_kept_after_job() {
        let dir = TempDir::new().unwrap();
        let location = local_input(&dir);
        let runner = runner(StubFactory::with_levels(&[10]));
        let job = runner.accept(&location, None).unwrap();
        let id = runner
            .launch(job, SheetRequest::new(dir.path().join("out")))
            .unwrap();
        wait_finished(&runner, id);

        assert!(dir.path().join("input.mp4").exists());
    }

    #[test]
    fn test_concurrent_jobs_are_independent() {
        let dir = TempDir::new().unwrap();
        let runner = runner(StubFactory::with_levels(&[10, 200, 10, 200]));
        let ids: Vec<JobId> = (0..3)
            .map(|_| {
                let job = runner.accept(&local_input(&dir), None).unwrap();
                runner
                    .launch(job, SheetRequest::new(dir.path().join("out")))
                    .unwrap()
            })
            .collect();

        let finished = runner.finished();
        let mut seen: Vec<JobId> = (0..3)
            .map(|_| finished.recv_timeout(Duration::from_secs(30)).unwrap())
            .collect();
        seen.sort_by_key(|id| id.to_string());
        let mut expected = ids.clone();
        expected.sort_by_key(|id| id.to_string());
        assert_eq!(seen, expected);

        let filenames: std::collections::HashSet<String> = ids
            .iter()
            .map(|&id| runner.snapshot(id).unwrap().filename)
            .collect();
        assert_eq!(filenames.len(), 3);
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
