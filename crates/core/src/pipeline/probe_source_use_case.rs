use std::path::{Path, PathBuf};

use crate::shared::constants::THUMBNAIL_MAX_SIDE;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

use super::sheet_error::SheetError;

#[derive(Clone, Debug, PartialEq)]
pub struct SourceProbe {
    pub metadata: VideoMetadata,
    /// Frame count from the container header; the progress denominator.
    pub total_frames: usize,
    pub thumbnail: Option<PathBuf>,
}

/// Checks that a source is usable before any job is created.
///
/// Opens the video, decodes the first frame and optionally saves it as a
/// preview image. Fails with [`SheetError::SourceUnavailable`] when the
/// source cannot be opened and [`SheetError::EmptySource`] when no frame
/// can be decoded.
pub struct ProbeSourceUseCase {
    reader: Box<dyn VideoReader>,
    image_writer: Box<dyn ImageWriter>,
}

impl ProbeSourceUseCase {
    pub fn new(reader: Box<dyn VideoReader>, image_writer: Box<dyn ImageWriter>) -> Self {
        Self {
            reader,
            image_writer,
        }
    }

    pub fn execute(
        &mut self,
        input: &Path,
        thumbnail: Option<&Path>,
    ) -> Result<SourceProbe, SheetError> {
        let metadata = self
            .reader
            .open(input)
            .map_err(|e| SheetError::SourceUnavailable {
                path: input.to_path_buf(),
                reason: e.to_string(),
            })?;
        let result = self.probe(input, metadata, thumbnail);
        self.reader.close();
        result
    }

    fn probe(
        &mut self,
        input: &Path,
        metadata: VideoMetadata,
        thumbnail: Option<&Path>,
    ) -> Result<SourceProbe, SheetError> {
        let first = match self.reader.frames().next() {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                log::warn!("First frame of {} failed to decode: {e}", input.display());
                return Err(SheetError::EmptySource(input.to_path_buf()));
            }
            None => return Err(SheetError::EmptySource(input.to_path_buf())),
        };

        let thumbnail = match thumbnail {
            Some(path) => {
                self.image_writer
                    .write(path, &first, Some(THUMBNAIL_MAX_SIDE))
                    .map_err(|e| {
                        SheetError::Output(format!("thumbnail {}: {e}", path.display()))
                    })?;
                Some(path.to_path_buf())
            }
            None => None,
        };

        log::debug!(
            "Probed {}: {}x{}, {} frames ({:.1}s), codec {}",
            input.display(),
            metadata.width,
            metadata.height,
            metadata.total_frames,
            metadata.duration_secs().unwrap_or(0.0),
            metadata.codec
        );
        Ok(SourceProbe {
            total_frames: metadata.total_frames,
            metadata,
            thumbnail,
        })
    }
}
