use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::layout::domain::document_writer::DocumentWriter;
use crate::layout::domain::page_layout::PageLayout;
use crate::sampling::domain::frame_sampler::FrameSampler;
use crate::sampling::domain::similarity_scorer::SimilarityScorer;
use crate::shared::constants::{OUTPUT_EXTENSION, OUTPUT_PREFIX};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

use super::pipeline_logger::PipelineLogger;
use super::sheet_error::SheetError;
use super::sheet_request::SheetRequest;

/// Result of a completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetOutcome {
    /// File name inside the output directory, e.g. `tab_1a2b3c4d.pdf`.
    pub filename: String,
    pub path: PathBuf,
    pub frames_examined: usize,
    pub frames_retained: usize,
    pub pages: usize,
}

/// Samples distinct frames from a video and tiles them onto pages.
///
/// Decoding, scoring and drawing happen in a single streaming pass: each
/// retained frame is handed to the document writer as soon as it is found,
/// so at most the current frame and the last retained reference are held.
/// Single-use: `execute` takes the reader and writer, a second call fails
/// with [`SheetError::AlreadyExecuted`].
pub struct BuildSheetUseCase {
    reader: Option<Box<dyn VideoReader>>,
    writer: Option<Box<dyn DocumentWriter>>,
    scorer: Box<dyn SimilarityScorer>,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<Box<dyn Fn(usize) + Send>>,
}

impl BuildSheetUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn DocumentWriter>,
        scorer: Box<dyn SimilarityScorer>,
        logger: Box<dyn PipelineLogger>,
        on_progress: Option<Box<dyn Fn(usize) + Send>>,
    ) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
            scorer,
            logger,
            on_progress,
        }
    }

    /// Runs the pass over `input` and saves the document into
    /// `request.out_dir`. The progress callback sees every decoded frame
    /// index exactly once, in order.
    pub fn execute(
        &mut self,
        input: &Path,
        request: &SheetRequest,
    ) -> Result<SheetOutcome, SheetError> {
        request.validate()?;
        let mut reader = self.reader.take().ok_or(SheetError::AlreadyExecuted)?;
        let mut writer = self.writer.take().ok_or(SheetError::AlreadyExecuted)?;

        let metadata = reader
            .open(input)
            .map_err(|e| SheetError::SourceUnavailable {
                path: input.to_path_buf(),
                reason: e.to_string(),
            })?;

        let result = self.run(reader.as_mut(), writer.as_mut(), &metadata, request);
        reader.close();
        result
    }

    fn run(
        &mut self,
        reader: &mut dyn VideoReader,
        writer: &mut dyn DocumentWriter,
        metadata: &VideoMetadata,
        request: &SheetRequest,
    ) -> Result<SheetOutcome, SheetError> {
        let settings = request.sampling_settings(metadata)?;
        let grid = request.grid()?;
        let total = metadata.total_frames;

        self.logger.info(&format!(
            "Sampling {}x{} video ({} frames) in ROI {}, {}x{} grid, step {}, threshold {}",
            metadata.width,
            metadata.height,
            total,
            settings.roi(),
            grid.rows(),
            grid.cols(),
            settings.sample_step(),
            settings.threshold()
        ));

        let logger = RefCell::new(self.logger.as_mut());
        let on_progress = self.on_progress.as_deref();
        let report = |frame_index: usize| {
            if let Some(callback) = on_progress {
                callback(frame_index);
            }
            logger.borrow_mut().progress(frame_index + 1, total);
        };

        let mut layout = PageLayout::new(grid, request.page);
        let mut sampler =
            FrameSampler::new(reader.frames(), self.scorer.as_ref(), settings, Some(&report));

        loop {
            let sample_start = Instant::now();
            let Some(next) = sampler.next() else {
                break;
            };
            logger
                .borrow_mut()
                .timing("sample", sample_start.elapsed().as_secs_f64() * 1000.0);
            let retained = next?;

            let layout_start = Instant::now();
            layout
                .place(writer, &retained.color)
                .map_err(|e| SheetError::Output(e.to_string()))?;
            logger
                .borrow_mut()
                .timing("layout", layout_start.elapsed().as_secs_f64() * 1000.0);
        }

        let stats = sampler.stats();
        drop(sampler);
        let logger = logger.into_inner();

        let summary = layout
            .finish(writer)
            .map_err(|e| SheetError::Output(e.to_string()))?;

        let (filename, path) = unique_output_path(&request.out_dir);
        writer
            .save(&path)
            .map_err(|e| SheetError::Output(format!("{}: {e}", path.display())))?;

        logger.metric("retained", stats.retained as f64);
        logger.metric("pages", summary.pages as f64);
        logger.info(&format!(
            "Kept {} of {} frames on {} page(s): {}",
            stats.retained,
            stats.examined,
            summary.pages,
            path.display()
        ));
        logger.summary();

        Ok(SheetOutcome {
            filename,
            path,
            frames_examined: stats.examined,
            frames_retained: stats.retained,
            pages: summary.pages,
        })
    }
}

/// Picks `tab_<8 hex>.pdf`, redrawing on the rare clash with an existing file.
fn unique_output_path(out_dir: &Path) -> (String, PathBuf) {
    loop {
        let filename = format!(
            "{OUTPUT_PREFIX}{:08x}.{OUTPUT_EXTENSION}",
            rand::random::<u32>()
        );
        let path = out_dir.join(&filename);
        if !path.exists() {
            return (filename, path);
        }
    }
}
