use std::path::PathBuf;

use thiserror::Error;

use crate::sampling::domain::frame_sampler::SamplingError;
use crate::shared::region::GeometryError;

/// Failures of a contact-sheet run, from source probing to the saved file.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("cannot open video source {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("video source {0} has no decodable frames")]
    EmptySource(PathBuf),

    #[error("invalid region of interest at frame {index}: {source}")]
    Geometry {
        index: usize,
        #[source]
        source: GeometryError,
    },

    #[error("similarity scoring failed at frame {index}: {reason}")]
    Scoring { index: usize, reason: String },

    #[error("cannot write output: {0}")]
    Output(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("pipeline already executed")]
    AlreadyExecuted,
}

impl From<SamplingError> for SheetError {
    fn from(e: SamplingError) -> Self {
        match e {
            SamplingError::Geometry { index, source } => SheetError::Geometry { index, source },
            SamplingError::Scoring { index, reason } => SheetError::Scoring { index, reason },
        }
    }
}
