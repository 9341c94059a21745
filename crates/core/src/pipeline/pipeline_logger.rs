use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for a contact-sheet run.
///
/// Use cases report through this trait instead of printing, so the CLI can
/// show throttled progress while jobs and tests stay silent.
pub trait PipelineLogger: Send {
    /// Frames examined so far out of the container's frame count (may be 0).
    fn progress(&mut self, current: usize, total: usize);

    /// Time spent in a named stage (`sample`, `layout`) for one step.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-run report. Default: nothing.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logs through the `log` facade and accumulates per-stage totals for a
/// closing summary.
///
/// Progress lines are emitted at most once per `throttle_frames` frames.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    last_reported: Option<usize>,
    stages: BTreeMap<String, StageTotals>,
    metrics: BTreeMap<String, f64>,
    started: Instant,
    frames_seen: usize,
}

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct StageTotals {
    calls: usize,
    total_ms: f64,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            last_reported: None,
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Formatted summary, or `None` before anything was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Sheet summary ({} frames examined, {:.1}s):",
            self.frames_seen,
            elapsed_ms / 1000.0
        )];

        for (stage, totals) in &self.stages {
            let avg_ms = totals.total_ms / totals.calls.max(1) as f64;
            lines.push(format!(
                "  {stage:8}: {calls:6} calls  avg {avg_ms:6.2}ms  total {total:7.0}ms",
                calls = totals.calls,
                total = totals.total_ms
            ));
        }
        for (name, value) in &self.metrics {
            lines.push(format!("  {name}: {value}"));
        }
        if self.frames_seen > 0 && elapsed_ms > 0.0 {
            let fps = self.frames_seen as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} frames/s"));
        }

        Some(lines.join("\n"))
    }

    fn stage(&self, stage: &str) -> Option<StageTotals> {
        self.stages.get(stage).copied()
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = self.frames_seen.max(current);
        let due = match self.last_reported {
            None => true,
            Some(last) => current >= last + self.throttle_frames,
        };
        if !due {
            return;
        }
        self.last_reported = Some(current);
        if total > 0 {
            let pct = current.min(total) as f64 / total as f64 * 100.0;
            log::info!("Examined {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Examined {current} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        let totals = self.stages.entry(stage.to_string()).or_default();
        totals.calls += 1;
        totals.total_ms += duration_ms;
    }

    /// Metrics are gauges: the latest value wins.
    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
