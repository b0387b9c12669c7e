//! Ingest orchestration -- feature extraction, policy evaluation, and
//! window writes for one submitted batch of keyed records.
//!
//! A submission is fully decoded and feature-extracted before any
//! window is touched: malformed input never leaves partial state
//! behind. There is no submission-level rollback beyond that -- once
//! writes start, an aborted caller may leave some windows written and
//! others not.

use crate::features::{self, FeatureVector};
use crate::policy::{self, DetectionMode, Verdict};
use crate::stats;
use crate::window::{Record, StoreError, Window, WindowKey, WindowStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed submission: {0}")]
    Malformed(String),
}

/// One incoming batch: a stream name and an ordered list of groups,
/// each group a set of field/value pairs observed together.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub stream: String,
    pub data: Vec<serde_json::Map<String, Value>>,
}

/// Verdict for one key. In point mode `key` is the field name within a
/// group; in batch mode it is the full window key.
#[derive(Debug, Clone, Serialize)]
pub struct KeyVerdict {
    pub key: String,
    pub verdict: Verdict,
}

/// Point-mode verdicts for one submitted group, correlated by the
/// group's generated id.
#[derive(Debug, Serialize)]
pub struct GroupReport {
    pub id: Uuid,
    pub predictions: Vec<KeyVerdict>,
}

/// What a submission produced, shaped by the deployment's mode.
#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IngestReport {
    /// One verdict per (group, field).
    Point { groups: Vec<GroupReport> },
    /// One verdict per window key; records sharing a key in one
    /// submission share one verdict.
    Batch { verdicts: Vec<KeyVerdict> },
}

struct ExtractedGroup {
    id: Uuid,
    records: Vec<(String, Record)>,
}

/// Runs submissions through extraction, policy evaluation, and window
/// writes. One coordinator per process; safe to call from any number
/// of request handlers concurrently.
pub struct IngestCoordinator {
    mode: DetectionMode,
    store: WindowStore,
}

impl IngestCoordinator {
    pub fn new(mode: DetectionMode, capacity: usize) -> Self {
        Self {
            mode,
            store: WindowStore::new(capacity),
        }
    }

    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    pub fn store(&self) -> &WindowStore {
        &self.store
    }

    /// Process one submission end to end and return its verdicts.
    pub fn process(&self, submission: &Submission) -> Result<IngestReport, IngestError> {
        let groups = self.extract(submission)?;
        let report = match self.mode {
            DetectionMode::Point => IngestReport::Point {
                groups: self.process_per_record(groups),
            },
            DetectionMode::Batch => IngestReport::Batch {
                verdicts: self.process_per_batch(groups),
            },
        };
        Ok(report)
    }

    /// Reset the cursor and write counter of one window, addressed by
    /// its raw `stream#field` key.
    pub fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.store.reset(&WindowKey::from_raw(key))
    }

    /// Turn every field/value pair of every group into a record,
    /// assigning one id per group. Fails without touching any window
    /// when any value is unusable.
    fn extract(&self, submission: &Submission) -> Result<Vec<ExtractedGroup>, IngestError> {
        if submission.stream.is_empty() {
            return Err(IngestError::Malformed("empty stream name".into()));
        }

        let mut groups = Vec::with_capacity(submission.data.len());
        for group in &submission.data {
            let id = Uuid::new_v4();
            let mut records = Vec::with_capacity(group.len());
            for (field, value) in group {
                let features = features_for(value).ok_or_else(|| {
                    IngestError::Malformed(format!(
                        "field '{field}' has unsupported value type; expected string or number"
                    ))
                })?;
                let key = WindowKey::new(&submission.stream, field);
                records.push((field.clone(), Record::new(key, features, id)));
            }
            groups.push(ExtractedGroup { id, records });
        }
        Ok(groups)
    }

    /// Per-record mode: each record is judged against its window's
    /// current contents, then written, before the next record is
    /// considered.
    fn process_per_record(&self, groups: Vec<ExtractedGroup>) -> Vec<GroupReport> {
        groups
            .into_iter()
            .map(|group| {
                let predictions = group
                    .records
                    .into_iter()
                    .map(|(field, record)| {
                        let window = self.store.get_or_create(&record.key);
                        let verdict = self.classify_point(&window, &record.features);
                        tracing::debug!(key = %record.key, ?verdict, "point verdict");
                        window.write(record);
                        KeyVerdict { key: field, verdict }
                    })
                    .collect();
                GroupReport {
                    id: group.id,
                    predictions,
                }
            })
            .collect()
    }

    /// Per-batch mode: all verdicts are computed against pre-submission
    /// window state; only then do this submission's writes land.
    fn process_per_batch(&self, groups: Vec<ExtractedGroup>) -> Vec<KeyVerdict> {
        let mut by_key: BTreeMap<WindowKey, Vec<Record>> = BTreeMap::new();
        for group in groups {
            for (_, record) in group.records {
                by_key.entry(record.key.clone()).or_default().push(record);
            }
        }

        let mut verdicts = Vec::with_capacity(by_key.len());
        for (key, records) in &by_key {
            let window = self.store.get_or_create(key);
            let verdict = self.classify_batch(&window, records);
            tracing::debug!(key = %key, count = records.len(), ?verdict, "batch verdict");
            verdicts.push(KeyVerdict {
                key: key.to_string(),
                verdict,
            });
        }

        for (_, records) in by_key {
            for record in records {
                let window = self.store.get_or_create(&record.key);
                window.write(record);
            }
        }

        verdicts
    }

    fn classify_point(&self, window: &Window, features: &FeatureVector) -> Verdict {
        if !policy::sufficient_history(window.total_writes(), window.capacity()) {
            return Verdict::InsufficientHistory;
        }
        match stats::window_stats(window) {
            Ok(window_stats) => policy::evaluate_point(features, &window_stats),
            Err(err) => {
                // The gate guarantees a full window; a miss here means a
                // reset raced this read. Decline to classify.
                tracing::warn!(%err, "window passed the gate but is not full");
                Verdict::InsufficientHistory
            }
        }
    }

    fn classify_batch(&self, window: &Window, records: &[Record]) -> Verdict {
        if !policy::sufficient_history(window.total_writes(), window.capacity()) {
            return Verdict::InsufficientHistory;
        }
        match (stats::batch_stats(records), stats::window_stats(window)) {
            (Ok(batch), Ok(window_stats)) => policy::evaluate_batch(&batch, &window_stats),
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(%err, "batch verdict unavailable");
                Verdict::InsufficientHistory
            }
        }
    }
}

/// Map a JSON value to its feature vector. Strings get text features,
/// numbers get numeric features; booleans, nulls, arrays, and nested
/// objects are malformed input rather than silently coerced to zero.
fn features_for(value: &Value) -> Option<FeatureVector> {
    match value {
        Value::String(s) => Some(features::extract_text(s)),
        Value::Number(n) => n.as_f64().map(features::extract_numeric),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(stream: &str, data: Value) -> Submission {
        serde_json::from_value(json!({ "stream": stream, "data": data })).unwrap()
    }

    fn single(stream: &str, field: &str, value: f64) -> Submission {
        let mut group = serde_json::Map::new();
        group.insert(field.to_string(), json!(value));
        Submission {
            stream: stream.to_string(),
            data: vec![group],
        }
    }

    fn point_verdicts(report: IngestReport) -> Vec<Verdict> {
        match report {
            IngestReport::Point { groups } => groups
                .into_iter()
                .flat_map(|g| g.predictions.into_iter().map(|p| p.verdict))
                .collect(),
            IngestReport::Batch { .. } => panic!("expected point report"),
        }
    }

    fn batch_verdicts(report: IngestReport) -> Vec<KeyVerdict> {
        match report {
            IngestReport::Batch { verdicts } => verdicts,
            IngestReport::Point { .. } => panic!("expected batch report"),
        }
    }

    #[test]
    fn cold_start_gate_opens_on_record_after_capacity() {
        let coordinator = IngestCoordinator::new(DetectionMode::Point, 3);

        // The first `capacity` records cannot be classified.
        for v in [1.0, 2.0, 3.0] {
            let report = coordinator.process(&single("s", "f", v)).unwrap();
            assert_eq!(point_verdicts(report), vec![Verdict::InsufficientHistory]);
        }

        // Record capacity+1 is the first with a real verdict.
        let report = coordinator.process(&single("s", "f", 2.0)).unwrap();
        assert_eq!(point_verdicts(report), vec![Verdict::Normal]);
    }

    #[test]
    fn point_mode_flags_outlier_after_warmup() {
        let coordinator = IngestCoordinator::new(DetectionMode::Point, 5);
        for v in [10.0, 11.0, 9.0, 10.0, 10.5] {
            coordinator.process(&single("s", "f", v)).unwrap();
        }
        let report = coordinator.process(&single("s", "f", 100.0)).unwrap();
        assert_eq!(point_verdicts(report), vec![Verdict::Anomaly]);
    }

    #[test]
    fn batch_mode_end_to_end() {
        // Capacity 3, seed values [1,2,3]: window avg 2, std sqrt(2/3).
        let coordinator = IngestCoordinator::new(DetectionMode::Batch, 3);
        for v in [1.0, 2.0, 3.0] {
            let report = coordinator.process(&single("s", "f", v)).unwrap();
            let verdicts = batch_verdicts(report);
            assert_eq!(verdicts[0].verdict, Verdict::InsufficientHistory);
        }

        // Batch [10,12]: avg 11, diff 9 > 2 * 0.8165.
        let report = coordinator
            .process(&submission("s", json!([{ "f": 10.0 }, { "f": 12.0 }])))
            .unwrap();
        let verdicts = batch_verdicts(report);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].key, "s#f");
        assert_eq!(verdicts[0].verdict, Verdict::Anomaly);

        // Both writes landed after the verdict: counter 5, cursor wrapped to 2.
        let window = coordinator
            .store()
            .get(&WindowKey::new("s", "f"))
            .unwrap();
        assert_eq!(window.total_writes(), 5);
        assert_eq!(window.cursor_position(), 2);
    }

    #[test]
    fn batch_verdict_reads_pre_submission_state() {
        // Window holds [5,5,5]; a batch of identical outliers must be
        // judged against the seeded window, not against itself.
        let coordinator = IngestCoordinator::new(DetectionMode::Batch, 3);
        for _ in 0..3 {
            coordinator.process(&single("s", "f", 5.0)).unwrap();
        }
        let report = coordinator
            .process(&submission("s", json!([{ "f": 50.0 }, { "f": 50.0 }, { "f": 50.0 }])))
            .unwrap();
        assert_eq!(batch_verdicts(report)[0].verdict, Verdict::Anomaly);
    }

    #[test]
    fn records_sharing_a_key_share_one_batch_verdict() {
        let coordinator = IngestCoordinator::new(DetectionMode::Batch, 100);
        let report = coordinator
            .process(&submission(
                "s",
                json!([{ "a": 1.0, "b": "x" }, { "a": 2.0 }]),
            ))
            .unwrap();
        let verdicts = batch_verdicts(report);
        let keys: Vec<&str> = verdicts.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["s#a", "s#b"]);
    }

    #[test]
    fn point_mode_reports_per_group_and_field() {
        let coordinator = IngestCoordinator::new(DetectionMode::Point, 7);
        let report = coordinator
            .process(&submission(
                "accounts",
                json!([{ "name": "rajdeep", "dob": "20-10-1997" }, { "name": "x" }]),
            ))
            .unwrap();
        match report {
            IngestReport::Point { groups } => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].predictions.len(), 2);
                assert_eq!(groups[1].predictions.len(), 1);
                assert_ne!(groups[0].id, groups[1].id);
            }
            _ => panic!("expected point report"),
        }
    }

    #[test]
    fn unsupported_value_types_mutate_nothing() {
        let coordinator = IngestCoordinator::new(DetectionMode::Point, 7);
        let bad = submission("s", json!([{ "ok": 1.0, "bad": [1, 2, 3] }]));
        let err = coordinator.process(&bad).unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
        assert!(coordinator.store().is_empty(), "no window may be created");
    }

    #[test]
    fn empty_stream_is_malformed() {
        let coordinator = IngestCoordinator::new(DetectionMode::Point, 7);
        let err = coordinator.process(&single("", "f", 1.0)).unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
    }

    #[test]
    fn reset_unknown_key_is_not_found() {
        let coordinator = IngestCoordinator::new(DetectionMode::Point, 7);
        assert!(matches!(
            coordinator.reset("s#ghost"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn reset_restarts_the_cold_start_gate() {
        let coordinator = IngestCoordinator::new(DetectionMode::Point, 2);
        for v in [1.0, 2.0, 3.0] {
            coordinator.process(&single("s", "f", v)).unwrap();
        }
        coordinator.reset("s#f").unwrap();
        let report = coordinator.process(&single("s", "f", 1000.0)).unwrap();
        assert_eq!(point_verdicts(report), vec![Verdict::InsufficientHistory]);
    }
}
