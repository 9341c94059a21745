/// Fixed rows x cols grid of image cells on every page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    rows: usize,
    cols: usize,
}

/// Cell coordinates, row-major from the top-left cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridPosition {
    pub row: usize,
    pub col: usize,
}

impl GridShape {
    pub fn new(rows: usize, cols: usize) -> Result<Self, &'static str> {
        if rows < 1 || cols < 1 {
            return Err("grid needs at least one row and one column");
        }
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells_per_page(&self) -> usize {
        self.rows * self.cols
    }

    /// `divmod(count, cols)` for the `count`-th image on the current page.
    ///
    /// Not wrapped: `row == rows` means the page is already full.
    pub fn position(&self, count_on_page: usize) -> GridPosition {
        GridPosition {
            row: count_on_page / self.cols,
            col: count_on_page % self.cols,
        }
    }

    /// Zero-based page and cell of the `retained_index`-th retained frame.
    pub fn locate(&self, retained_index: usize) -> (usize, GridPosition) {
        let per_page = self.cells_per_page();
        (
            retained_index / per_page,
            self.position(retained_index % per_page),
        )
    }

    /// Pages needed for `retained` images; an empty document still has one.
    pub fn page_count(&self, retained: usize) -> usize {
        retained.div_ceil(self.cells_per_page()).max(1)
    }

    /// Filled cells on each page, in page order.
    pub fn occupancy(&self, retained: usize) -> Vec<usize> {
        let per_page = self.cells_per_page();
        (0..self.page_count(retained))
            .map(|page| retained.saturating_sub(page * per_page).min(per_page))
            .collect()
    }
}
