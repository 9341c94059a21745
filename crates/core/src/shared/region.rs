use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("region {roi} lies outside the {frame_width}x{frame_height} frame")]
    OutOfBounds {
        roi: Roi,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("region {0} has zero area")]
    EmptyRegion(Roi),
}

/// Region of interest in source-frame pixel coordinates (top-left origin).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The region covering an entire `width` x `height` frame.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Checks that the region is non-empty and fully contained in the frame.
    ///
    /// Edges are computed in `u64` so `x + width` cannot wrap.
    pub fn check_within(&self, frame_width: u32, frame_height: u32) -> Result<(), GeometryError> {
        if self.width == 0 || self.height == 0 {
            return Err(GeometryError::EmptyRegion(*self));
        }
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        if right > frame_width as u64 || bottom > frame_height as u64 {
            return Err(GeometryError::OutOfBounds {
                roi: *self,
                frame_width,
                frame_height,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

impl TryFrom<&[u32]> for Roi {
    type Error = String;

    /// Parses `[x, y, width, height]`, the order used on the command line.
    fn try_from(values: &[u32]) -> Result<Self, Self::Error> {
        match values {
            [x, y, w, h] => Ok(Roi::new(*x, *y, *w, *h)),
            _ => Err(format!(
                "region needs exactly 4 values (x,y,width,height), got {}",
                values.len()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_full_frame_covers_everything() {
        let roi = Roi::full_frame(640, 480);
        assert_eq!(roi, Roi::new(0, 0, 640, 480));
        assert_eq!(roi.area(), 640 * 480);
        assert!(roi.check_within(640, 480).is_ok());
    }

    #[test]
    fn test_touching_right_and_bottom_edges_is_valid() {
        let roi = Roi::new(600, 400, 40, 80);
        assert!(roi.check_within(640, 480).is_ok());
    }

    #[rstest]
    #[case::past_right(Roi::new(601, 0, 40, 10))]
    #[case::past_bottom(Roi::new(0, 401, 10, 80))]
    #[case::origin_outside(Roi::new(700, 500, 1, 1))]
    #[case::huge_width(Roi::new(1, 0, u32::MAX, 1))]
    fn test_out_of_bounds(#[case] roi: Roi) {
        let err = roi.check_within(640, 480).unwrap_err();
        assert_eq!(
            err,
            GeometryError::OutOfBounds {
                roi,
                frame_width: 640,
                frame_height: 480
            }
        );
    }

    #[rstest]
    #[case::zero_width(Roi::new(0, 0, 0, 10))]
    #[case::zero_height(Roi::new(0, 0, 10, 0))]
    fn test_empty_region_rejected(#[case] roi: Roi) {
        assert_eq!(
            roi.check_within(640, 480),
            Err(GeometryError::EmptyRegion(roi))
        );
    }

    #[test]
    fn test_try_from_slice() {
        let roi = Roi::try_from(&[1u32, 2, 3, 4][..]).unwrap();
        assert_eq!(roi, Roi::new(1, 2, 3, 4));
    }

    #[test]
    fn test_try_from_wrong_length() {
        let err = Roi::try_from(&[1u32, 2, 3][..]).unwrap_err();
        assert!(err.contains("got 3"));
    }

    #[test]
    fn test_error_message_mentions_frame_size() {
        let err = Roi::new(10, 10, 100, 100).check_within(50, 50).unwrap_err();
        assert_eq!(
            err.to_string(),
            "region (10, 10, 100x100) lies outside the 50x50 frame"
        );
    }
}
