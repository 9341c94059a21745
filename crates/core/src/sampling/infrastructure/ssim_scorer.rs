use std::sync::Mutex;

use ndarray::Array2;

use crate::sampling::domain::similarity_scorer::SimilarityScorer;
use crate::shared::constants::SSIM_WINDOW;
use crate::shared::frame::Frame;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Mean structural similarity (SSIM) over a sliding square window.
///
/// Uses a uniform window with sample covariance and averages the SSIM map
/// over windows fully inside the image. Window statistics come from
/// summed-area tables, so cost is linear in pixel count regardless of
/// window size. The tables are kept between calls and reallocated only
/// when the frame size changes.
pub struct SsimScorer {
    window: usize,
    scratch: Mutex<Option<Moments>>,
}

impl SsimScorer {
    pub fn new(window: usize) -> Result<Self, &'static str> {
        if window < 1 || window % 2 == 0 {
            return Err("SSIM window must be a positive odd size");
        }
        Ok(Self {
            window,
            scratch: Mutex::new(None),
        })
    }

    /// Largest odd window not exceeding the request that fits the image.
    fn effective_window(&self, width: usize, height: usize) -> usize {
        let mut win = self.window.min(width).min(height);
        if win % 2 == 0 {
            win -= 1;
        }
        win.max(1)
    }
}

impl Default for SsimScorer {
    fn default() -> Self {
        Self {
            window: SSIM_WINDOW,
            scratch: Mutex::new(None),
        }
    }
}

impl SimilarityScorer for SsimScorer {
    fn score(&self, a: &Frame, b: &Frame) -> Result<f64, Box<dyn std::error::Error>> {
        if a.channels() != 1 || b.channels() != 1 {
            return Err("SSIM requires single-channel frames".into());
        }
        if a.width() != b.width() || a.height() != b.height() {
            return Err(format!(
                "SSIM requires equal dimensions, got {}x{} and {}x{}",
                a.width(),
                a.height(),
                b.width(),
                b.height()
            )
            .into());
        }

        let width = a.width() as usize;
        let height = a.height() as usize;
        if width == 0 || height == 0 {
            return Err("SSIM requires non-empty frames".into());
        }

        let win = self.effective_window(width, height);
        let mut scratch = self
            .scratch
            .lock()
            .map_err(|_| "SSIM scratch buffers poisoned")?;
        if !scratch.as_ref().is_some_and(|m| m.fits(width, height)) {
            *scratch = Some(Moments::new(width, height));
        }
        let moments = scratch.get_or_insert_with(|| Moments::new(width, height));
        moments.fill(a, b);

        let np = (win * win) as f64;
        let cov_norm = if np > 1.0 { np / (np - 1.0) } else { 1.0 };
        let c1 = (K1 * DATA_RANGE).powi(2);
        let c2 = (K2 * DATA_RANGE).powi(2);

        let mut total = 0.0;
        let mut count = 0usize;
        for row in 0..=height - win {
            for col in 0..=width - win {
                let ux = moments.a.window_sum(row, col, win) / np;
                let uy = moments.b.window_sum(row, col, win) / np;
                let uxx = moments.aa.window_sum(row, col, win) / np;
                let uyy = moments.bb.window_sum(row, col, win) / np;
                let uxy = moments.ab.window_sum(row, col, win) / np;

                let vx = cov_norm * (uxx - ux * ux);
                let vy = cov_norm * (uyy - uy * uy);
                let vxy = cov_norm * (uxy - ux * uy);

                let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
                let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
                total += numerator / denominator;
                count += 1;
            }
        }

        Ok(total / count as f64)
    }
}

/// Summed-area table with a zero border row and column.
struct Integral(Array2<f64>);

impl Integral {
    fn window_sum(&self, row: usize, col: usize, win: usize) -> f64 {
        let t = &self.0;
        t[[row + win, col + win]] - t[[row, col + win]] - t[[row + win, col]] + t[[row, col]]
    }
}

/// First and second moments of both images, as integral tables.
struct Moments {
    a: Integral,
    b: Integral,
    aa: Integral,
    bb: Integral,
    ab: Integral,
}

impl Moments {
    fn new(width: usize, height: usize) -> Self {
        let table = || Integral(Array2::zeros((height + 1, width + 1)));
        Self {
            a: table(),
            b: table(),
            aa: table(),
            bb: table(),
            ab: table(),
        }
    }

    fn fits(&self, width: usize, height: usize) -> bool {
        self.a.0.dim() == (height + 1, width + 1)
    }

    /// Overwrites every interior cell; the zero border is never touched.
    fn fill(&mut self, a: &Frame, b: &Frame) {
        let height = a.height() as usize;
        let width = a.width() as usize;
        let pa = a.as_ndarray();
        let pb = b.as_ndarray();

        let mut tables = [
            &mut self.a.0,
            &mut self.b.0,
            &mut self.aa.0,
            &mut self.bb.0,
            &mut self.ab.0,
        ];
        for row in 0..height {
            for col in 0..width {
                let x = pa[[row, col, 0]] as f64;
                let y = pb[[row, col, 0]] as f64;
                let values = [x, y, x * x, y * y, x * y];
                for (table, value) in tables.iter_mut().zip(values) {
                    table[[row + 1, col + 1]] =
                        value + table[[row, col + 1]] + table[[row + 1, col]] - table[[row, col]];
                }
            }
        }
    }
}
