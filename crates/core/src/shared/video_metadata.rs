use std::path::PathBuf;

use super::region::Roi;

/// Container-level facts about a video, read once when the source opens.
///
/// `total_frames` comes from the container header and may be 0 or
/// inaccurate; the sampler never relies on it for termination.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Region covering the whole frame, used when the caller gives none.
    pub fn full_frame_roi(&self) -> Roi {
        Roi::full_frame(self.width, self.height)
    }

    pub fn duration_secs(&self) -> Option<f64> {
        if self.fps > 0.0 && self.total_frames > 0 {
            Some(self.total_frames as f64 / self.fps)
        } else {
            None
        }
    }
}
