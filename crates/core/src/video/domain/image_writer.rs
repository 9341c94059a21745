use std::path::Path;

use crate::shared::frame::Frame;

/// Writes a single frame to an image file; used for preview thumbnails.
pub trait ImageWriter: Send {
    /// Encodes `frame` at `path`, the format following the file extension.
    /// `max_side` bounds the longer edge while keeping the aspect ratio.
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        max_side: Option<u32>,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
