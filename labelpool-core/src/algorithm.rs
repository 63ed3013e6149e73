//! Learning algorithm seam.
//!
//! The query-selection policy, model, and update rule live behind
//! [`LearningAlgorithm`]. The serving core only calls it.

use crate::entities::SampleIndex;
use crate::error::LabelPoolResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scalar parameters handed to the algorithm at experiment start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmInit {
    /// Target-set size
    pub n: usize,
    pub failure_probability: f64,
    /// Dimensionality parameter
    pub d: i64,
}

/// A participant-supplied label for one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledAnswer {
    pub target_index: SampleIndex,
    pub target_label: String,
}

/// Pluggable active-learning algorithm.
#[async_trait]
pub trait LearningAlgorithm: Send + Sync {
    /// Label identifying this algorithm within the experiment.
    fn alg_label(&self) -> &str;

    /// Initialize with experiment parameters.
    async fn initialize(&self, init: &AlgorithmInit) -> LabelPoolResult<()>;

    /// Choose the next sample to show a participant.
    async fn select_query(&self, participant_uid: &str) -> LabelPoolResult<SampleIndex>;

    /// Incorporate a recorded answer.
    async fn process_answer(&self, answer: &LabeledAnswer) -> LabelPoolResult<()>;

    /// Current model or diagnostic snapshot.
    async fn model(&self) -> LabelPoolResult<Value>;
}

/// Number of answers between model refreshes for dimensionality `d`.
///
/// Algorithms may use this to decide when to refresh; the core never
/// schedules refreshes itself.
pub fn snapshot_interval(d: i64) -> i64 {
    ((d + 4) / 4).max(1)
}

/// Whether the `answer_count`-th answer should trigger a refresh.
pub fn refresh_due(answer_count: i64, d: i64) -> bool {
    answer_count > 0 && answer_count % snapshot_interval(d) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_interval() {
        assert_eq!(snapshot_interval(0), 1);
        assert_eq!(snapshot_interval(8), 3);
        assert_eq!(snapshot_interval(100), 26);
        assert_eq!(snapshot_interval(-50), 1);
    }

    #[test]
    fn test_refresh_due() {
        assert!(!refresh_due(0, 8));
        assert!(!refresh_due(2, 8));
        assert!(refresh_due(3, 8));
        assert!(refresh_due(6, 8));
        assert!(refresh_due(1, 0));
    }
}
