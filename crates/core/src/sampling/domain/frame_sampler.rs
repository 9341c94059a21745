use thiserror::Error;

use crate::sampling::domain::similarity_scorer::SimilarityScorer;
use crate::shared::frame::Frame;
use crate::shared::region::{GeometryError, Roi};

#[derive(Error, Debug)]
pub enum SamplingError {
    #[error("cannot crop frame {index}: {source}")]
    Geometry {
        index: usize,
        #[source]
        source: GeometryError,
    },
    #[error("similarity scoring failed at frame {index}: {reason}")]
    Scoring { index: usize, reason: String },
}

/// Parameters of the retain/skip decision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplingSettings {
    roi: Roi,
    sample_step: usize,
    threshold: f64,
}

impl SamplingSettings {
    pub fn new(roi: Roi, sample_step: usize, threshold: f64) -> Result<Self, &'static str> {
        if sample_step < 1 {
            return Err("sample_step must be >= 1");
        }
        if !(-1.0..=1.0).contains(&threshold) {
            return Err("similarity threshold must be within [-1, 1]");
        }
        Ok(Self {
            roi,
            sample_step,
            threshold,
        })
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    pub fn sample_step(&self) -> usize {
        self.sample_step
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// A frame kept for the document: the cropped color pixels plus the gray
/// form it was compared with.
#[derive(Clone, Debug)]
pub struct RetainedFrame {
    pub index: usize,
    pub gray: Frame,
    pub color: Frame,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplingStats {
    /// Frames pulled from the source, decimated or not.
    pub examined: usize,
    /// Frames dropped by `index % sample_step != 0` without scoring.
    pub decimated: usize,
    /// Similarity computations performed.
    pub compared: usize,
    /// Candidates dropped as near-duplicates of the last retained frame.
    pub duplicates: usize,
    pub retained: usize,
}

/// Lazily filters a decoded frame stream down to visually distinct frames.
///
/// Each candidate is compared against the most recently *retained* frame,
/// not the previous candidate, so slow drift only produces a new frame once
/// it has accumulated past the threshold. The progress callback fires once
/// per examined frame, in decode order. A decode error ends the stream like
/// end-of-file does.
pub struct FrameSampler<'a, I> {
    frames: I,
    scorer: &'a dyn SimilarityScorer,
    settings: SamplingSettings,
    on_examined: Option<&'a dyn Fn(usize)>,
    reference: Option<Frame>,
    stats: SamplingStats,
    finished: bool,
}

impl<'a, I> FrameSampler<'a, I>
where
    I: Iterator<Item = Result<Frame, Box<dyn std::error::Error>>>,
{
    pub fn new(
        frames: I,
        scorer: &'a dyn SimilarityScorer,
        settings: SamplingSettings,
        on_examined: Option<&'a dyn Fn(usize)>,
    ) -> Self {
        Self {
            frames,
            scorer,
            settings,
            on_examined,
            reference: None,
            stats: SamplingStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> SamplingStats {
        self.stats
    }

    fn examine(&mut self, frame: Frame) -> Result<Option<RetainedFrame>, SamplingError> {
        let index = frame.index();
        if index % self.settings.sample_step != 0 {
            self.stats.decimated += 1;
            return Ok(None);
        }

        let color = frame
            .crop(&self.settings.roi)
            .map_err(|source| SamplingError::Geometry { index, source })?;
        let gray = color.to_grayscale();

        if let Some(reference) = &self.reference {
            self.stats.compared += 1;
            let score = self
                .scorer
                .score(&gray, reference)
                .map_err(|e| SamplingError::Scoring {
                    index,
                    reason: e.to_string(),
                })?;
            if score > self.settings.threshold {
                log::trace!("Frame {index}: similarity {score:.4}, skipped");
                self.stats.duplicates += 1;
                return Ok(None);
            }
            log::debug!("Frame {index}: similarity {score:.4}, retained");
        }

        self.reference = Some(gray.clone());
        self.stats.retained += 1;
        Ok(Some(RetainedFrame { index, gray, color }))
    }

    fn report(&self, index: usize) {
        if let Some(callback) = self.on_examined {
            callback(index);
        }
    }
}

impl<I> Iterator for FrameSampler<'_, I>
where
    I: Iterator<Item = Result<Frame, Box<dyn std::error::Error>>>,
{
    type Item = Result<RetainedFrame, SamplingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let frame = match self.frames.next() {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    log::warn!(
                        "Decoding stopped after {} frames: {e}",
                        self.stats.examined
                    );
                    self.finished = true;
                    return None;
                }
                None => {
                    self.finished = true;
                    return None;
                }
            };

            let index = frame.index();
            self.stats.examined += 1;

            match self.examine(frame) {
                Ok(Some(retained)) => {
                    self.report(index);
                    return Some(Ok(retained));
                }
                Ok(None) => self.report(index),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::infrastructure::ssim_scorer::SsimScorer;
    use std::sync::{Arc, Mutex};

    type FrameResult = Result<Frame, Box<dyn std::error::Error>>;

    fn flat_frame(level: u8, index: usize) -> Frame {
        Frame::new(vec![level; 16 * 12 * 3], 16, 12, 3, index)
    }

    fn stream(levels: &[u8]) -> Vec<FrameResult> {
        levels
            .iter()
            .enumerate()
            .map(|(i, &level)| Ok(flat_frame(level, i)))
            .collect()
    }

    fn settings(step: usize) -> SamplingSettings {
        SamplingSettings::new(Roi::full_frame(16, 12), step, 0.93).unwrap()
    }

    /// Scores everything as identical and counts calls.
    struct CountingScorer {
        calls: Arc<Mutex<usize>>,
        score: f64,
    }

    impl SimilarityScorer for CountingScorer {
        fn score(&self, _a: &Frame, _b: &Frame) -> Result<f64, Box<dyn std::error::Error>> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.score)
        }
    }

    struct FailingScorer;

    impl SimilarityScorer for FailingScorer {
        fn score(&self, _a: &Frame, _b: &Frame) -> Result<f64, Box<dyn std::error::Error>> {
            Err("scorer exploded".into())
        }
    }

    fn collect_indices(
        frames: Vec<FrameResult>,
        scorer: &dyn SimilarityScorer,
        settings: SamplingSettings,
    ) -> (Vec<usize>, Vec<usize>, SamplingStats) {
        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = progress.clone();
        let callback = move |i: usize| sink.lock().unwrap().push(i);
        let mut sampler = FrameSampler::new(frames.into_iter(), scorer, settings, Some(&callback));
        let retained: Vec<usize> = sampler.by_ref().map(|r| r.unwrap().index).collect();
        let stats = sampler.stats();
        let reported = progress.lock().unwrap().clone();
        (retained, reported, stats)
    }

    #[test]
    fn test_two_scenes_keep_first_frame_of_each() {
        let scorer = SsimScorer::default();
        let frames = stream(&[10, 10, 10, 10, 10, 200, 200, 200, 200, 200]);
        let (retained, reported, stats) = collect_indices(frames, &scorer, settings(1));

        assert_eq!(retained, vec![0, 5]);
        assert_eq!(reported, (0..10).collect::<Vec<_>>());
        assert_eq!(stats.examined, 10);
        assert_eq!(stats.retained, 2);
        assert_eq!(stats.duplicates, 8);
    }

    #[test]
    fn test_decimation_skips_scoring_but_reports_every_frame() {
        let calls = Arc::new(Mutex::new(0));
        let scorer = CountingScorer {
            calls: calls.clone(),
            score: 1.0,
        };
        let frames = stream(&[1; 10]);
        let (retained, reported, stats) = collect_indices(frames, &scorer, settings(2));

        assert_eq!(retained, vec![0]);
        assert_eq!(reported, (0..10).collect::<Vec<_>>());
        // 0, 2, 4, 6, 8 survive decimation; the first has nothing to compare to.
        assert_eq!(*calls.lock().unwrap(), 4);
        assert_eq!(stats.decimated, 5);
        assert_eq!(stats.compared, 4);
    }

    #[test]
    fn test_first_surviving_frame_is_retained_without_scoring() {
        let calls = Arc::new(Mutex::new(0));
        let scorer = CountingScorer {
            calls: calls.clone(),
            score: 1.0,
        };
        let frames = stream(&[1, 2, 3]);
        let (retained, _, _) = collect_indices(frames, &scorer, settings(1));

        assert_eq!(retained, vec![0]);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_step_one_examines_every_frame() {
        let calls = Arc::new(Mutex::new(0));
        let scorer = CountingScorer {
            calls: calls.clone(),
            score: -1.0,
        };
        let (retained, _, stats) = collect_indices(stream(&[5; 7]), &scorer, settings(1));

        assert_eq!(retained, (0..7).collect::<Vec<_>>());
        assert_eq!(stats.decimated, 0);
    }

    #[test]
    fn test_score_equal_to_threshold_is_retained() {
        let calls = Arc::new(Mutex::new(0));
        let scorer = CountingScorer {
            calls,
            score: 0.93,
        };
        let (retained, _, _) = collect_indices(stream(&[5, 5, 5]), &scorer, settings(1));
        assert_eq!(retained, vec![0, 1, 2]);
    }

    /// Reference is the last retained frame, so gradual drift is caught
    /// once it accumulates even though neighbours stay similar.
    #[test]
    fn test_drift_is_measured_against_last_retained_frame() {
        let scorer = SsimScorer::default();
        // Each step is close to its neighbour; the end differs from the start.
        let textured = |shift: u8, index: usize| {
            let mut data = Vec::with_capacity(16 * 12 * 3);
            for y in 0..12u8 {
                for x in 0..16u8 {
                    let v: u8 = if (x / 4 + y / 4) % 2 == 0 { 40 } else { 200 };
                    let v = v.saturating_add(shift);
                    data.extend_from_slice(&[v, v, v]);
                }
            }
            Frame::new(data, 16, 12, 3, index)
        };
        let frames: Vec<FrameResult> = (0..8)
            .map(|i| Ok(textured((i * 12) as u8, i)))
            .collect();

        let settings = SamplingSettings::new(Roi::full_frame(16, 12), 1, 0.99).unwrap();
        let (retained, _, _) = collect_indices(frames, &scorer, settings);

        assert_eq!(retained[0], 0);
        assert!(retained.len() >= 2, "drift never produced a new checkpoint");
        assert!(retained.len() < 8, "every frame was retained: {retained:?}");
    }

    #[test]
    fn test_decode_error_ends_stream_without_error_item() {
        let scorer = SsimScorer::default();
        let mut frames = stream(&[10, 200]);
        frames.push(Err("corrupt packet".into()));
        frames.push(Ok(flat_frame(90, 3)));

        let (retained, reported, stats) = collect_indices(frames, &scorer, settings(1));
        assert_eq!(retained, vec![0, 1]);
        assert_eq!(reported, vec![0, 1]);
        assert_eq!(stats.examined, 2);
    }

    #[test]
    fn test_roi_outside_frame_fails_fast() {
        let scorer = SsimScorer::default();
        let settings = SamplingSettings::new(Roi::new(10, 10, 20, 20), 1, 0.93).unwrap();
        let mut sampler = FrameSampler::new(stream(&[1, 2]).into_iter(), &scorer, settings, None);

        let err = sampler.next().unwrap().unwrap_err();
        assert!(matches!(err, SamplingError::Geometry { index: 0, .. }));
        assert!(sampler.next().is_none());
    }

    #[test]
    fn test_decimated_frames_are_not_cropped() {
        // Frame 1 is smaller than the ROI but never cropped with step 2.
        let scorer = SsimScorer::default();
        let frames: Vec<FrameResult> = vec![
            Ok(flat_frame(10, 0)),
            Ok(Frame::new(vec![0; 3], 1, 1, 3, 1)),
            Ok(flat_frame(200, 2)),
        ];
        let (retained, _, _) = collect_indices(frames, &scorer, settings(2));
        assert_eq!(retained, vec![0, 2]);
    }

    #[test]
    fn test_scorer_failure_surfaces_index() {
        let settings = settings(1);
        let mut sampler =
            FrameSampler::new(stream(&[1, 2]).into_iter(), &FailingScorer, settings, None);

        assert!(sampler.next().unwrap().is_ok());
        let err = sampler.next().unwrap().unwrap_err();
        assert!(matches!(err, SamplingError::Scoring { index: 1, .. }));
    }

    #[test]
    fn test_retained_frame_carries_crop_and_gray() {
        let scorer = SsimScorer::default();
        let settings = SamplingSettings::new(Roi::new(2, 3, 8, 4), 1, 0.93).unwrap();
        let mut sampler = FrameSampler::new(stream(&[77]).into_iter(), &scorer, settings, None);

        let retained = sampler.next().unwrap().unwrap();
        assert_eq!((retained.color.width(), retained.color.height()), (8, 4));
        assert_eq!(retained.color.channels(), 3);
        assert_eq!(retained.gray.channels(), 1);
        assert!(retained.gray.data().iter().all(|&v| v == 77));
    }

    #[test]
    fn test_settings_validation() {
        let roi = Roi::full_frame(4, 4);
        assert!(SamplingSettings::new(roi, 0, 0.9).is_err());
        assert!(SamplingSettings::new(roi, 1, 1.5).is_err());
        assert!(SamplingSettings::new(roi, 1, -1.0).is_ok());
    }
}
