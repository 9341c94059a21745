use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, RgbImage};

use crate::shared::constants::JPEG_QUALITY;
use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Writes preview thumbnails with the `image` crate.
///
/// `.jpg`/`.jpeg` paths are encoded at a fixed quality; any other
/// extension goes through `image`'s format detection.
pub struct ImageFileWriter {
    jpeg_quality: u8,
}

impl ImageFileWriter {
    pub fn new() -> Self {
        Self {
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        max_side: Option<u32>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut img = to_dynamic_image(frame)?;
        if let Some(limit) = max_side {
            if img.width() > limit || img.height() > limit {
                img = img.resize(limit, limit, image::imageops::FilterType::Triangle);
            }
        }

        if is_jpeg(path) {
            let file = BufWriter::new(File::create(path)?);
            let mut encoder = JpegEncoder::new_with_quality(file, self.jpeg_quality);
            encoder.encode(img.as_bytes(), img.width(), img.height(), img.color().into())?;
        } else {
            img.save(path)?;
        }
        Ok(())
    }
}

fn to_dynamic_image(frame: &Frame) -> Result<DynamicImage, Box<dyn std::error::Error>> {
    let data = frame.data().to_vec();
    let img = match frame.channels() {
        1 => GrayImage::from_raw(frame.width(), frame.height(), data).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(frame.width(), frame.height(), data).map(DynamicImage::ImageRgb8),
        n => return Err(format!("Unsupported channel count for image output: {n}").into()),
    };
    img.ok_or_else(|| "Frame data does not match its dimensions".into())
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg"))
        .unwrap_or(false)
}
