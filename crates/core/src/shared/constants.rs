pub const DEFAULT_ROWS: usize = 6;
pub const DEFAULT_COLS: usize = 1;
pub const DEFAULT_SAMPLE_STEP: usize = 1;

/// Candidates scoring above this against the last kept frame are dropped.
pub const DEFAULT_SSIM_THRESHOLD: f64 = 0.93;
pub const SSIM_WINDOW: usize = 7;

pub const JPEG_QUALITY: u8 = 75;

/// ISO A4 in PDF points (1/72 inch).
pub const A4_WIDTH_PT: f64 = 595.275_590_551_181_2;
pub const A4_HEIGHT_PT: f64 = 841.889_763_779_527_6;

pub const OUTPUT_PREFIX: &str = "tab_";
pub const OUTPUT_EXTENSION: &str = "pdf";
pub const THUMBNAIL_PREFIX: &str = "thumb_";
/// Longest edge of a preview thumbnail, in pixels.
pub const THUMBNAIL_MAX_SIDE: u32 = 480;

pub const PROGRESS_POLL_INTERVAL_MS: u64 = 500;

pub const DOWNLOAD_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Extension given to downloaded sources whose URL has none.
pub const DEFAULT_SOURCE_EXTENSION: &str = "mp4";
