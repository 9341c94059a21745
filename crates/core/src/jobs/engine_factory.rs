use crate::layout::domain::document_writer::DocumentWriter;
use crate::layout::domain::page_geometry::PageSize;
use crate::layout::infrastructure::pdf_document_writer::PdfDocumentWriter;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger, StdoutPipelineLogger};
use crate::sampling::domain::similarity_scorer::SimilarityScorer;
use crate::sampling::infrastructure::ssim_scorer::SsimScorer;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crate::video::infrastructure::image_file_writer::ImageFileWriter;

/// Builds fresh engine components for each job.
///
/// Every job gets its own reader, writer and scorer, so workers never share
/// mutable state.
pub trait EngineFactory: Send + Sync {
    fn video_reader(&self) -> Box<dyn VideoReader>;
    fn image_writer(&self) -> Box<dyn ImageWriter>;
    fn document_writer(&self, page: PageSize) -> Box<dyn DocumentWriter>;
    fn similarity_scorer(&self) -> Box<dyn SimilarityScorer>;
    fn pipeline_logger(&self) -> Box<dyn PipelineLogger>;
}

/// ffmpeg decoding, SSIM scoring, PDF output.
#[derive(Default)]
pub struct DefaultEngineFactory {
    stage_logging: bool,
}

impl DefaultEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs log throttled progress and a per-stage summary.
    pub fn with_stage_logging() -> Self {
        Self {
            stage_logging: true,
        }
    }
}

impl EngineFactory for DefaultEngineFactory {
    fn video_reader(&self) -> Box<dyn VideoReader> {
        Box::new(FfmpegReader::new())
    }

    fn image_writer(&self) -> Box<dyn ImageWriter> {
        Box::new(ImageFileWriter::new())
    }

    fn document_writer(&self, page: PageSize) -> Box<dyn DocumentWriter> {
        Box::new(PdfDocumentWriter::new(page))
    }

    fn similarity_scorer(&self) -> Box<dyn SimilarityScorer> {
        Box::new(SsimScorer::default())
    }

    fn pipeline_logger(&self) -> Box<dyn PipelineLogger> {
        if self.stage_logging {
            Box::new(StdoutPipelineLogger::default())
        } else {
            Box::new(NullPipelineLogger)
        }
    }
}
