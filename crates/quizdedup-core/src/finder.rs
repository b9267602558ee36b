use serde::Serialize;
use tracing::debug;

use crate::models::QuizRecord;
use crate::similarity::similarity;

/// Default detection threshold, in percent.
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 80.0;

/// Stricter threshold used to confirm a pass converged.
pub const DEFAULT_VERIFICATION_THRESHOLD: f64 = 85.0;

/// Two records whose question texts are at least `score` percent similar.
/// `first` is the key of the record that comes earlier in the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicatePair {
    pub first: u64,
    pub second: u64,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct DuplicateFinder {
    threshold: f64,
}

impl Default for DuplicateFinder {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DETECTION_THRESHOLD,
        }
    }
}

impl DuplicateFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 100.0);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compare every unordered pair of records once, keeping pairs at or
    /// above the threshold, most similar first.
    pub fn find(&self, records: &[QuizRecord]) -> Vec<DuplicatePair> {
        let mut pairs = Vec::new();

        for i in 0..records.len() {
            if !records[i].has_text() {
                continue;
            }
            for j in (i + 1)..records.len() {
                if !records[j].has_text() {
                    continue;
                }

                let score = similarity(&records[i].question_text, &records[j].question_text);
                if score >= self.threshold {
                    let pair = DuplicatePair {
                        first: records[i].key_at(i),
                        second: records[j].key_at(j),
                        score,
                    };
                    debug!(first = pair.first, second = pair.second, score, "duplicate candidate");
                    pairs.push(pair);
                }
            }
        }

        // Stable: equal scores keep scan order.
        pairs.sort_by(|left, right| right.score.total_cmp(&left.score));
        pairs
    }
}

pub fn find_duplicates(records: &[QuizRecord], threshold: f64) -> Vec<DuplicatePair> {
    DuplicateFinder::new().with_threshold(threshold).find(records)
}
