//! Mean / standard-deviation computation over windows and batches.
//!
//! Standard deviation is the population form (divide by N, not N-1)
//! in both routines; the anomaly policies depend on the two sides of
//! a comparison using the same formula.

use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::window::{Record, Window};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("window has only {filled} of {capacity} slots filled")]
    PartialWindow { filled: usize, capacity: usize },
    #[error("cannot compute statistics over an empty batch")]
    EmptyBatch,
}

/// Per-feature mean and population standard deviation. Ephemeral:
/// recomputed on demand, never cached or persisted.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Stats {
    pub avg: FeatureVector,
    pub std: FeatureVector,
}

/// Statistics over every slot of a full window.
///
/// Callers are expected to gate on the sufficiency threshold first, by
/// which point every slot is occupied. Calling earlier is a contract
/// violation and fails explicitly rather than silently averaging empty
/// slots into the baseline.
pub fn window_stats(window: &Window) -> Result<Stats, StatsError> {
    let snapshot = window.snapshot();
    let capacity = snapshot.len();

    let mut vectors = Vec::with_capacity(capacity);
    for slot in snapshot {
        match slot {
            Some(features) => vectors.push(features),
            None => {
                return Err(StatsError::PartialWindow {
                    filled: vectors.len(),
                    capacity,
                })
            }
        }
    }

    Ok(from_vectors(&vectors))
}

/// Statistics over an arbitrary-length batch of records, not tied to
/// any window capacity.
pub fn batch_stats(records: &[Record]) -> Result<Stats, StatsError> {
    if records.is_empty() {
        return Err(StatsError::EmptyBatch);
    }
    let vectors: Vec<FeatureVector> = records.iter().map(|r| r.features).collect();
    Ok(from_vectors(&vectors))
}

fn from_vectors(vectors: &[FeatureVector]) -> Stats {
    let count = vectors.len() as f64;
    let mut avg = [0.0; FEATURE_COUNT];
    let mut std = [0.0; FEATURE_COUNT];

    for i in 0..FEATURE_COUNT {
        let sum: f64 = vectors.iter().map(|v| v[i]).sum();
        avg[i] = sum / count;

        let sum_sq_diff: f64 = vectors.iter().map(|v| (v[i] - avg[i]).powi(2)).sum();
        std[i] = (sum_sq_diff / count).sqrt();
    }

    Stats { avg, std }
}
