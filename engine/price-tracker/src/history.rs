//! Rolling per-minute history of a tracker's multiplier

use crate::HISTORY_LENGTH;
use serde::Serialize;
use std::collections::VecDeque;

/// Partial block glyphs, one eighth of a cell each
const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Fixed-length trace of multipliers, newest first
///
/// Slot 0 is the live sample and gets overwritten by every trade; `shift`
/// freezes it once per minute. A fresh trace is all 1.0, which is also the
/// state every tracker relaxes back to.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTrace {
    samples: VecDeque<f64>,
    deltas: VecDeque<f64>,
}

/// One sample with its change against the previous minute
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub multiplier: f64,
    pub delta: f64,
}

/// Display-ready digest of a trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    /// Oldest first
    pub points: Vec<HistoryPoint>,
}

impl HistoryTrace {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::from(vec![1.0; HISTORY_LENGTH]),
            deltas: VecDeque::from(vec![0.0; HISTORY_LENGTH]),
        }
    }

    /// Overwrite the live sample
    pub fn record(&mut self, multiplier: f64) {
        self.samples[0] = multiplier;
        self.deltas[0] = self.samples[0] - self.samples[1];
    }

    /// Start a new minute; the live sample carries over
    pub fn shift(&mut self) {
        let head = self.samples[0];
        self.samples.pop_back();
        self.samples.push_front(head);
        self.deltas.pop_back();
        self.deltas.push_front(0.0);
    }

    pub fn latest(&self) -> f64 {
        self.samples[0]
    }

    /// `true` when every sample is neutral to within one ulp of 1.0
    pub fn is_idle(&self) -> bool {
        self.samples.iter().all(|sample| (sample - 1.0).abs() <= f64::EPSILON)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summary(&self) -> HistorySummary {
        let points: Vec<HistoryPoint> = self
            .samples
            .iter()
            .zip(self.deltas.iter())
            .rev()
            .map(|(&multiplier, &delta)| HistoryPoint { multiplier, delta })
            .collect();
        let min = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        HistorySummary { min, max, latest: self.latest(), points }
    }

    /// Render the trace as a block-glyph chart `lines` rows tall, past on the
    /// left, now on the right, followed by a time axis row
    pub fn render(&self, lines: usize) -> Vec<String> {
        let lines = lines.max(1);
        let summary = self.summary();
        let (mut low, mut high) = (summary.min, summary.max);
        if high - low <= f64::EPSILON * high.abs().max(1.0) {
            // flat trace floats around the middle
            low = ((high + low) / 2.0 - 0.5).max(0.0);
            high = low + 1.0;
        }
        let resolution = (lines * 8) as f64;
        let heights: Vec<usize> = summary
            .points
            .iter()
            .map(|point| (((point.multiplier - low) / (high - low)) * resolution).round().max(0.0) as usize)
            .collect();

        let mut rows = Vec::with_capacity(lines + 1);
        for row in (0..lines).rev() {
            let floor = row * 8;
            let mut text: String = heights
                .iter()
                .map(|&height| {
                    if height <= floor {
                        ' '
                    } else {
                        BLOCKS[(height - floor).min(8) - 1]
                    }
                })
                .collect();
            if row == lines - 1 {
                text.push_str(&format!(" ‾ {:.3}", summary.max));
            } else if row == 0 {
                text.push_str(&format!(" _ {:.3}", summary.min));
            }
            rows.push(text);
        }

        let label = format!("{}min ago", self.samples.len());
        let width = self.samples.len().max(label.len() + 4);
        rows.push(format!("{label:<w$}now", w = width - 3));
        rows
    }
}

impl Default for HistoryTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trace_is_idle() {
        let trace = HistoryTrace::new();
        assert!(trace.is_idle());
        assert_eq!(trace.len(), HISTORY_LENGTH);
        assert_eq!(trace.latest(), 1.0);
    }

    #[test]
    fn test_record_and_shift() {
        let mut trace = HistoryTrace::new();
        trace.record(1.2);
        assert!(!trace.is_idle());

        trace.shift();
        trace.record(1.1);

        let summary = trace.summary();
        let newest = summary.points[HISTORY_LENGTH - 1];
        let previous = summary.points[HISTORY_LENGTH - 2];
        assert_eq!(newest.multiplier, 1.1);
        assert!((newest.delta + 0.1).abs() < 1e-12);
        assert_eq!(previous.multiplier, 1.2);
        assert_eq!(summary.max, 1.2);
        assert_eq!(summary.min, 1.0);
    }

    #[test]
    fn test_old_samples_fall_off() {
        let mut trace = HistoryTrace::new();
        trace.record(2.0);
        for _ in 0..HISTORY_LENGTH {
            trace.shift();
            trace.record(1.0);
        }
        assert!(trace.is_idle());
    }

    #[test]
    fn test_render_dimensions() {
        let mut trace = HistoryTrace::new();
        trace.record(1.5);
        let rows = trace.render(4);

        assert_eq!(rows.len(), 5);
        assert!(rows[0].ends_with("1.500"));
        assert!(rows[3].ends_with("1.000"));
        // newest column is full height, oldest is empty
        assert!(rows[0].starts_with(' '));
        assert_eq!(rows[0].chars().nth(HISTORY_LENGTH - 1), Some('█'));
        assert!(rows[4].starts_with("25min ago"));
        assert!(rows[4].ends_with("now"));
    }

    #[test]
    fn test_render_flat_trace() {
        let rows = HistoryTrace::new().render(2);
        assert_eq!(rows.len(), 3);
        // 1.0 sits in the middle of a [0.5, 1.5] window
        assert!(rows[1].starts_with('█'));
        assert!(rows[0].starts_with(' '));
    }
}
