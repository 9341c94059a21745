use crate::shared::frame::Frame;

/// Domain interface for perceptual similarity between two grayscale frames.
///
/// Scores lie roughly in [-1, 1]; 1 means identical. Both frames must be
/// single-channel and share dimensions.
pub trait SimilarityScorer: Send {
    fn score(&self, a: &Frame, b: &Frame) -> Result<f64, Box<dyn std::error::Error>>;
}
