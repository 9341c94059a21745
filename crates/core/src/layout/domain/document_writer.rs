use std::path::Path;

use super::page_geometry::PageRect;
use crate::shared::frame::Frame;

/// Abstracts the paged output document so layout does not depend on a
/// specific file format.
///
/// Rectangles are given in top-left-origin page space; implementations
/// convert to their own coordinate system.
pub trait DocumentWriter: Send {
    /// Draws `image` stretched to `target` on the current page.
    fn draw_image(
        &mut self,
        image: &Frame,
        target: &PageRect,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Finalizes the current page (blank or not) and starts a fresh one.
    fn show_page(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    /// Persists all finalized pages to `path`. The file appears at `path`
    /// only once it is complete.
    fn save(&mut self, path: &Path) -> Result<(), Box<dyn std::error::Error>>;
}
