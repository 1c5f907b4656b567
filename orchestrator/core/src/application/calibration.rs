// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Confidence Calibrator
//!
//! Converts raw match strength into a calibrated probability of correct
//! routing. Each raw score falls into one of `bucket_count` equal-width
//! buckets; the calibrated value blends the raw score with the bucket's
//! observed success rate, trusting observations more as they accumulate:
//!
//! ```text
//! w = n / (n + prior_strength)
//! p = (1 - w) * raw + w * observed_rate
//! ```
//!
//! A rolling window of (bucket, prediction, outcome) triples tracks the mean
//! absolute gap between predicted and observed success per bucket; a window
//! whose error exceeds the drift threshold marks the calibrator as drifting.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, VecDeque};
use tracing::{info, warn};

use crate::domain::calibration::{BucketStats, CalibrationHealth, CalibrationSnapshot};
use crate::domain::confidence::{clamp_unit, ConfidenceRecord, ConfidenceSubject, ConfidenceThresholds};
use crate::domain::config::ConfidenceConfig;
use crate::domain::handler::{DomainId, HandlerId};

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    bucket: usize,
    predicted: f64,
    success: bool,
}

struct CalibrationState {
    buckets: Vec<BucketStats>,
    window: VecDeque<WindowEntry>,
    health: CalibrationHealth,
    resets: u64,
}

pub struct ConfidenceCalibrator {
    thresholds: ConfidenceThresholds,
    bucket_count: usize,
    prior_strength: f64,
    drift_window: usize,
    drift_threshold: f64,
    reset_on_drift: bool,
    state: RwLock<CalibrationState>,
}

impl ConfidenceCalibrator {
    pub fn new(config: &ConfidenceConfig) -> Self {
        let bucket_count = config.bucket_count.max(1);
        Self {
            thresholds: config.thresholds(),
            bucket_count,
            prior_strength: config.prior_strength.max(0.0),
            drift_window: config.drift_window.max(1),
            drift_threshold: config.drift_threshold,
            reset_on_drift: config.reset_on_drift,
            state: RwLock::new(CalibrationState {
                buckets: vec![BucketStats::default(); bucket_count],
                window: VecDeque::new(),
                health: CalibrationHealth::Healthy,
                resets: 0,
            }),
        }
    }

    pub fn thresholds(&self) -> &ConfidenceThresholds {
        &self.thresholds
    }

    pub fn bucket_of(&self, raw: f64) -> usize {
        let raw = clamp_unit(raw);
        ((raw * self.bucket_count as f64) as usize).min(self.bucket_count - 1)
    }

    /// Calibrated probability for a raw score, without recording anything
    pub fn probability(&self, raw: f64) -> (f64, u64, usize) {
        let raw = clamp_unit(raw);
        let bucket = self.bucket_of(raw);
        let state = self.state.read();
        let stats = &state.buckets[bucket];

        let probability = match stats.observed_rate() {
            Some(observed) => {
                let n = stats.observations as f64;
                let w = n / (n + self.prior_strength);
                (1.0 - w) * raw + w * observed
            }
            None => raw,
        };
        (clamp_unit(probability), stats.observations, bucket)
    }

    pub fn calibrate(&self, domain: &DomainId, raw: f64) -> ConfidenceRecord {
        self.record_for(ConfidenceSubject::Domain(domain.clone()), raw)
    }

    pub fn calibrate_sequence(&self, handlers: &[HandlerId], raw: f64) -> ConfidenceRecord {
        self.record_for(ConfidenceSubject::HandlerSequence(handlers.to_vec()), raw)
    }

    fn record_for(&self, subject: ConfidenceSubject, raw: f64) -> ConfidenceRecord {
        let (probability, sample_count, bucket) = self.probability(raw);
        ConfidenceRecord {
            subject,
            probability,
            raw_score: clamp_unit(raw),
            sample_count,
            bucket,
            band: self.thresholds.band(probability),
            updated_at: Utc::now(),
        }
    }

    /// Fold one routing outcome into the bucket for `raw`.
    ///
    /// `predicted` is the calibrated probability issued at decision time.
    /// Returns the new health when it changed.
    pub fn record_outcome(&self, raw: f64, predicted: f64, success: bool) -> Option<CalibrationHealth> {
        let bucket = self.bucket_of(raw);
        let mut state = self.state.write();

        state.buckets[bucket].record(success);
        state.window.push_back(WindowEntry {
            bucket,
            predicted: clamp_unit(predicted),
            success,
        });
        while state.window.len() > self.drift_window {
            state.window.pop_front();
        }

        let error = window_error(&state.window);
        let health = if state.window.len() >= self.drift_window && error > self.drift_threshold {
            CalibrationHealth::Drifting
        } else {
            CalibrationHealth::Healthy
        };

        if health == state.health {
            return None;
        }
        state.health = health;

        match health {
            CalibrationHealth::Drifting => {
                warn!(
                    mean_absolute_error = error,
                    threshold = self.drift_threshold,
                    "Confidence calibration drifting"
                );
                if self.reset_on_drift {
                    state.buckets = vec![BucketStats::default(); self.bucket_count];
                    state.window.clear();
                    state.health = CalibrationHealth::Healthy;
                    state.resets += 1;
                    info!(resets = state.resets, "Calibration buckets reset after drift");
                }
            }
            CalibrationHealth::Healthy => info!(mean_absolute_error = error, "Confidence calibration recovered"),
        }
        Some(health)
    }

    pub fn health(&self) -> CalibrationHealth {
        self.state.read().health
    }

    pub fn mean_absolute_error(&self) -> f64 {
        window_error(&self.state.read().window)
    }

    pub fn snapshot(&self) -> CalibrationSnapshot {
        let state = self.state.read();
        CalibrationSnapshot {
            buckets: state.buckets.clone(),
            mean_absolute_error: window_error(&state.window),
            window_len: state.window.len(),
            health: state.health,
            resets: state.resets,
        }
    }
}

/// Count-weighted mean of |mean prediction − observed success| per bucket
fn window_error(window: &VecDeque<WindowEntry>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }

    let mut per_bucket: BTreeMap<usize, (f64, f64, usize)> = BTreeMap::new();
    for entry in window {
        let slot = per_bucket.entry(entry.bucket).or_insert((0.0, 0.0, 0));
        slot.0 += entry.predicted;
        slot.1 += if entry.success { 1.0 } else { 0.0 };
        slot.2 += 1;
    }

    let total: f64 = per_bucket
        .values()
        .map(|(predicted, successes, n)| {
            let n = *n as f64;
            (predicted / n - successes / n).abs() * n
        })
        .sum();
    clamp_unit(total / window.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::confidence::ConfidenceBand;

    fn calibrator(config: ConfidenceConfig) -> ConfidenceCalibrator {
        ConfidenceCalibrator::new(&config)
    }

    #[test]
    fn test_uncalibrated_bucket_trusts_raw_score() {
        let cal = calibrator(ConfidenceConfig::default());
        let record = cal.calibrate(&DomainId::new("testing"), 0.78);
        assert_eq!(record.probability, 0.78);
        assert_eq!(record.sample_count, 0);
        assert_eq!(record.bucket, 7);
        assert_eq!(record.band, ConfidenceBand::High);
    }

    #[test]
    fn test_observations_pull_toward_observed_rate() {
        let cal = calibrator(ConfidenceConfig::default());
        for _ in 0..10 {
            cal.record_outcome(0.75, 0.75, false);
        }
        // w = 10 / (10 + 10) = 0.5 → 0.5 * 0.75 + 0.5 * 0.0
        let (p, n, _) = cal.probability(0.75);
        assert_eq!(n, 10);
        assert!((p - 0.375).abs() < 1e-9);

        for _ in 0..990 {
            cal.record_outcome(0.75, 0.75, false);
        }
        let (p, _, _) = cal.probability(0.75);
        assert!(p < 0.01);
    }

    #[test]
    fn test_probability_always_in_unit_range() {
        let cal = calibrator(ConfidenceConfig::default());
        for i in 0..200 {
            let raw = (i as f64) / 100.0 - 0.5;
            cal.record_outcome(raw, raw, i % 3 == 0);
            let (p, _, bucket) = cal.probability(raw);
            assert!((0.0..=1.0).contains(&p));
            assert!(bucket < 10);
        }
    }

    #[test]
    fn test_top_edge_maps_to_last_bucket() {
        let cal = calibrator(ConfidenceConfig::default());
        assert_eq!(cal.bucket_of(1.0), 9);
        assert_eq!(cal.bucket_of(0.0), 0);
        assert_eq!(cal.bucket_of(0.15), 1);
    }

    #[test]
    fn test_drift_detected_over_full_window() {
        let cal = calibrator(ConfidenceConfig {
            drift_window: 20,
            ..ConfidenceConfig::default()
        });

        let mut changed = None;
        for _ in 0..20 {
            if let Some(h) = cal.record_outcome(0.9, 0.9, false) {
                changed = Some(h);
            }
        }
        assert_eq!(changed, Some(CalibrationHealth::Drifting));
        assert_eq!(cal.health(), CalibrationHealth::Drifting);
        assert!(cal.mean_absolute_error() > 0.8);
    }

    #[test]
    fn test_well_calibrated_stays_healthy() {
        let cal = calibrator(ConfidenceConfig {
            drift_window: 20,
            ..ConfidenceConfig::default()
        });
        // 0.75 predicted, 3 of every 4 succeed
        for i in 0..40 {
            cal.record_outcome(0.75, 0.75, i % 4 != 0);
        }
        assert_eq!(cal.health(), CalibrationHealth::Healthy);
        assert!(cal.mean_absolute_error() < 0.15);
    }

    #[test]
    fn test_reset_on_drift_clears_buckets() {
        let cal = calibrator(ConfidenceConfig {
            drift_window: 10,
            reset_on_drift: true,
            ..ConfidenceConfig::default()
        });
        for _ in 0..10 {
            cal.record_outcome(0.9, 0.9, false);
        }
        let snapshot = cal.snapshot();
        assert_eq!(snapshot.resets, 1);
        assert_eq!(snapshot.window_len, 0);
        assert!(snapshot.buckets.iter().all(|b| b.observations == 0));
        assert_eq!(snapshot.health, CalibrationHealth::Healthy);
    }

    #[test]
    fn test_sequence_subject() {
        let cal = calibrator(ConfidenceConfig::default());
        let handlers = vec![HandlerId::new("a"), HandlerId::new("b")];
        let record = cal.calibrate_sequence(&handlers, 0.55);
        assert_eq!(record.subject, ConfidenceSubject::HandlerSequence(handlers));
        assert_eq!(record.band, ConfidenceBand::Medium);
    }
}
