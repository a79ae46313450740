//! Per-URL step measurements.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metric keys written by the pipeline steps.
pub mod keys {
    pub const FETCH_TIME_MS: &str = "fetch_time_ms";
    pub const PREPROCESS_TIME_MS: &str = "preprocess_time_ms";

    pub const EXTRACTION_TIME_MS: &str = "extraction_time_ms";
    pub const EXTRACTION_INPUT_TOKENS: &str = "extraction_input_tokens";
    pub const EXTRACTION_OUTPUT_TOKENS: &str = "extraction_output_tokens";
    pub const EXTRACTION_COST: &str = "cost_per_profile_extraction";

    pub const VALIDATION_TIME_MS: &str = "validation_time_ms";
    pub const VALIDATION_INPUT_TOKENS: &str = "validation_input_tokens";
    pub const VALIDATION_OUTPUT_TOKENS: &str = "validation_output_tokens";
    pub const VALIDATION_COST: &str = "cost_per_profile_validation";

    pub const TIME_KEYS: [&str; 4] = [
        FETCH_TIME_MS,
        PREPROCESS_TIME_MS,
        EXTRACTION_TIME_MS,
        VALIDATION_TIME_MS,
    ];

    pub const TOKEN_KEYS: [&str; 4] = [
        EXTRACTION_INPUT_TOKENS,
        EXTRACTION_OUTPUT_TOKENS,
        VALIDATION_INPUT_TOKENS,
        VALIDATION_OUTPUT_TOKENS,
    ];

    pub const COST_KEYS: [&str; 2] = [EXTRACTION_COST, VALIDATION_COST];
}

/// Named numeric measurements for one URL.
///
/// Each step owns its keys. Recording a key that is already present adds to
/// it rather than replacing it, so one step can never wipe another's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepMetrics(BTreeMap<String, f64>);

impl StepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str, value: f64) {
        *self.0.entry(key.to_string()).or_insert(0.0) += value;
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// Sum of the given keys, treating absent keys as zero.
    pub fn sum(&self, keys: &[&str]) -> f64 {
        keys.iter().filter_map(|k| self.get(k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StepMetrics {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut metrics = Self::new();
        for (key, value) in iter {
            metrics.record(&key.into(), value);
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut metrics = StepMetrics::new();
        metrics.record(keys::FETCH_TIME_MS, 10.0);
        metrics.record(keys::FETCH_TIME_MS, 5.0);
        metrics.record(keys::PREPROCESS_TIME_MS, 1.0);

        assert_eq!(metrics.get(keys::FETCH_TIME_MS), Some(15.0));
        assert_eq!(metrics.sum(&keys::TIME_KEYS), 16.0);
        assert_eq!(metrics.get(keys::EXTRACTION_COST), None);
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let metrics: StepMetrics = [(keys::EXTRACTION_COST, 0.002)].into_iter().collect();
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["cost_per_profile_extraction"], 0.002);
    }
}
