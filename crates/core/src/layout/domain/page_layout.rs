use super::document_writer::DocumentWriter;
use super::grid::{GridPosition, GridShape};
use super::page_geometry::{cell_rect, fit_centered, PageRect, PageSize};
use crate::shared::frame::Frame;

/// Where one image landed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Zero-based page number.
    pub page: usize,
    pub position: GridPosition,
    pub rect: PageRect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutSummary {
    pub pages: usize,
    pub images_placed: usize,
    pub cells_on_last_page: usize,
}

/// Streams images onto a rows x cols grid, page after page.
///
/// Only the running per-page count is kept; images go straight to the
/// writer. A page is finalized lazily, when the next image would overflow
/// it, and [`PageLayout::finish`] always finalizes the last page, so an
/// empty run still yields one blank page.
pub struct PageLayout {
    grid: GridShape,
    page: PageSize,
    on_page: usize,
    finished_pages: usize,
    placed: usize,
}

impl PageLayout {
    pub fn new(grid: GridShape, page: PageSize) -> Self {
        Self {
            grid,
            page,
            on_page: 0,
            finished_pages: 0,
            placed: 0,
        }
    }

    pub fn place(
        &mut self,
        writer: &mut dyn DocumentWriter,
        image: &Frame,
    ) -> Result<Placement, Box<dyn std::error::Error>> {
        let mut position = self.grid.position(self.on_page);
        if position.row == self.grid.rows() {
            writer.show_page()?;
            self.finished_pages += 1;
            self.on_page = 0;
            position = GridPosition { row: 0, col: 0 };
        }

        let cell = cell_rect(self.page, self.grid, position);
        let rect = fit_centered(&cell, image.width(), image.height());
        writer.draw_image(image, &rect)?;

        self.on_page += 1;
        self.placed += 1;
        Ok(Placement {
            page: self.finished_pages,
            position,
            rect,
        })
    }

    /// Finalizes the last, possibly partial or blank, page.
    pub fn finish(
        self,
        writer: &mut dyn DocumentWriter,
    ) -> Result<LayoutSummary, Box<dyn std::error::Error>> {
        writer.show_page()?;
        Ok(LayoutSummary {
            pages: self.finished_pages + 1,
            images_placed: self.placed,
            cells_on_last_page: self.on_page,
        })
    }
}
