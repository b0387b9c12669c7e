//! Anomaly-decision policies: point-wise and batch-wise comparison of
//! observations against a window's statistics.

use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::stats::Stats;

/// Deviation threshold, in standard deviations. Fixed, not tunable.
pub const DEVIATION_MULTIPLIER: f64 = 2.0;

/// Which decision procedure a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// One verdict per record, evaluated against its window as it arrives.
    Point,
    /// One verdict per window key, comparing a submission's aggregate to
    /// the pre-submission window.
    Batch,
}

/// Classification outcome. `InsufficientHistory` is a valid verdict,
/// not an error: it means the window has not yet been filled once and
/// no statistical comparison is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Anomaly,
    Normal,
    InsufficientHistory,
}

/// History is sufficient once the window has been fully written at
/// least once. Until then every record and batch for the key is
/// classified `InsufficientHistory` -- the cold-start guard.
pub fn sufficient_history(total_writes: u64, capacity: usize) -> bool {
    total_writes >= capacity as u64
}

/// Point policy: a record is anomalous if any feature deviates from the
/// window mean by strictly more than two window standard deviations.
/// Features are checked in ascending position order and the first
/// violation decides.
pub fn evaluate_point(features: &FeatureVector, window: &Stats) -> Verdict {
    for i in 0..FEATURE_COUNT {
        let diff = (features[i] - window.avg[i]).abs();
        if diff > DEVIATION_MULTIPLIER * window.std[i] {
            return Verdict::Anomaly;
        }
    }
    Verdict::Normal
}

/// Batch policy: same comparison as the point policy, but the left side
/// is the batch's mean per feature rather than a single observation.
pub fn evaluate_batch(batch: &Stats, window: &Stats) -> Verdict {
    for i in 0..FEATURE_COUNT {
        let diff = (batch.avg[i] - window.avg[i]).abs();
        if diff > DEVIATION_MULTIPLIER * window.std[i] {
            return Verdict::Anomaly;
        }
    }
    Verdict::Normal
}
