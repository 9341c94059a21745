//! Page-space arithmetic for placing images in grid cells.
//!
//! Layout happens in a top-left-origin space (y grows downward) so reading
//! order is visual order. Renderers with a bottom-left origin convert a
//! finished rectangle with [`to_bottom_left`].

use super::grid::{GridPosition, GridShape};
use crate::shared::constants::{A4_HEIGHT_PT, A4_WIDTH_PT};

/// Page dimensions in document units (points for PDF).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width: A4_WIDTH_PT,
        height: A4_HEIGHT_PT,
    };

    pub fn new(width: f64, height: f64) -> Result<Self, &'static str> {
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            return Err("page dimensions must be positive and finite");
        }
        Ok(Self { width, height })
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Axis-aligned rectangle; `(x, y)` is the corner nearest the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Cell rectangle for `position`, top-left origin.
pub fn cell_rect(page: PageSize, grid: GridShape, position: GridPosition) -> PageRect {
    let cell_width = page.width / grid.cols() as f64;
    let cell_height = page.height / grid.rows() as f64;
    PageRect {
        x: position.col as f64 * cell_width,
        y: position.row as f64 * cell_height,
        width: cell_width,
        height: cell_height,
    }
}

/// Uniformly scales an `image_width` x `image_height` image to fit `cell`
/// and centers it, leaving equal margins on opposite sides.
///
/// Small images are scaled up; aspect ratio is always preserved.
pub fn fit_centered(cell: &PageRect, image_width: u32, image_height: u32) -> PageRect {
    if image_width == 0 || image_height == 0 {
        return PageRect {
            x: cell.x + cell.width / 2.0,
            y: cell.y + cell.height / 2.0,
            width: 0.0,
            height: 0.0,
        };
    }

    let scale = (cell.width / image_width as f64).min(cell.height / image_height as f64);
    let width = image_width as f64 * scale;
    let height = image_height as f64 * scale;
    PageRect {
        x: cell.x + (cell.width - width) / 2.0,
        y: cell.y + (cell.height - height) / 2.0,
        width,
        height,
    }
}

/// Mirrors a top-left-origin rectangle into bottom-left-origin coordinates.
pub fn to_bottom_left(rect: &PageRect, page_height: f64) -> PageRect {
    PageRect {
        x: rect.x,
        y: page_height - rect.y - rect.height,
        width: rect.width,
        height: rect.height,
    }
}
