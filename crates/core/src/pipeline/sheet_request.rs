use std::fs;
use std::path::PathBuf;

use crate::layout::domain::grid::GridShape;
use crate::layout::domain::page_geometry::PageSize;
use crate::sampling::domain::frame_sampler::SamplingSettings;
use crate::shared::constants::{
    DEFAULT_COLS, DEFAULT_ROWS, DEFAULT_SAMPLE_STEP, DEFAULT_SSIM_THRESHOLD,
};
use crate::shared::region::Roi;
use crate::shared::video_metadata::VideoMetadata;

use super::sheet_error::SheetError;

/// Caller-facing parameters of one contact-sheet run.
///
/// A missing `roi` means the whole frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SheetRequest {
    pub roi: Option<Roi>,
    pub rows: usize,
    pub cols: usize,
    pub sample_step: usize,
    pub threshold: f64,
    pub out_dir: PathBuf,
    pub page: PageSize,
}

impl SheetRequest {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            roi: None,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            sample_step: DEFAULT_SAMPLE_STEP,
            threshold: DEFAULT_SSIM_THRESHOLD,
            out_dir: out_dir.into(),
            page: PageSize::A4,
        }
    }

    pub fn grid(&self) -> Result<GridShape, SheetError> {
        GridShape::new(self.rows, self.cols).map_err(|e| SheetError::InvalidConfig(e.to_string()))
    }

    /// Resolves the sampling parameters against the opened source.
    pub fn sampling_settings(
        &self,
        metadata: &VideoMetadata,
    ) -> Result<SamplingSettings, SheetError> {
        let roi = self.roi.unwrap_or_else(|| metadata.full_frame_roi());
        SamplingSettings::new(roi, self.sample_step, self.threshold)
            .map_err(|e| SheetError::InvalidConfig(e.to_string()))
    }

    /// Checks everything that can be checked without opening the source and
    /// makes sure the output directory exists.
    pub fn validate(&self) -> Result<(), SheetError> {
        self.grid()?;
        if self.sample_step < 1 {
            return Err(SheetError::InvalidConfig(
                "sample_step must be >= 1".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.threshold) {
            return Err(SheetError::InvalidConfig(format!(
                "threshold {} is outside [-1, 1]",
                self.threshold
            )));
        }
        fs::create_dir_all(&self.out_dir).map_err(|e| {
            SheetError::Output(format!(
                "cannot create output directory {}: {e}",
                self.out_dir.display()
            ))
        })
    }
}
