// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Calibration state: per-bucket outcome frequencies and drift health

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub observations: u64,
    pub successes: u64,
}

impl BucketStats {
    pub fn observed_rate(&self) -> Option<f64> {
        if self.observations == 0 {
            None
        } else {
            Some(self.successes as f64 / self.observations as f64)
        }
    }

    pub fn record(&mut self, success: bool) {
        self.observations += 1;
        if success {
            self.successes += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationHealth {
    Healthy,
    /// Rolling calibration error above the drift threshold
    Drifting,
}

/// Serializable view of the calibrator, for inspection and audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub buckets: Vec<BucketStats>,
    pub mean_absolute_error: f64,
    pub window_len: usize,
    pub health: CalibrationHealth,
    pub resets: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_rate() {
        let mut bucket = BucketStats::default();
        assert_eq!(bucket.observed_rate(), None);
        bucket.record(true);
        bucket.record(false);
        bucket.record(true);
        bucket.record(true);
        assert_eq!(bucket.observed_rate(), Some(0.75));
    }
}
