use ndarray::ArrayView3;

use super::region::{GeometryError, Roi};

/// A decoded video frame: contiguous pixel bytes in row-major order.
///
/// Color frames are RGB (3 channels); the grayscale form used for
/// similarity scoring has a single channel. `index` is the zero-based
/// position in decode order and survives cropping and conversion.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels inside `roi` into a new frame with the same index.
    ///
    /// Fails instead of clipping when the region leaves the frame.
    pub fn crop(&self, roi: &Roi) -> Result<Frame, GeometryError> {
        roi.check_within(self.width, self.height)?;

        let channels = self.channels as usize;
        let stride = self.width as usize * channels;
        let row_len = roi.width as usize * channels;
        let x_offset = roi.x as usize * channels;

        let mut data = Vec::with_capacity(row_len * roi.height as usize);
        for row in roi.y as usize..(roi.y + roi.height) as usize {
            let start = row * stride + x_offset;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Ok(Frame::new(
            data,
            roi.width,
            roi.height,
            self.channels,
            self.index,
        ))
    }

    /// Single-channel luma (BT.601 weights). Already-gray frames are cloned.
    pub fn to_grayscale(&self) -> Frame {
        let channels = self.channels as usize;
        if channels == 1 {
            return self.clone();
        }

        let data = self
            .data
            .chunks_exact(channels)
            .map(|px| {
                if channels >= 3 {
                    luma(px[0], px[1], px[2])
                } else {
                    px[0]
                }
            })
            .collect();

        Frame::new(data, self.width, self.height, 1, self.index)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    y.round().clamp(0.0, 255.0) as u8
}
