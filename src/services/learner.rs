//! Feedback learning: turning execution outcomes into weight, threshold,
//! and confidence adjustments.
//!
//! Two entry points: `process_outcome` learns from a single logged
//! execution, `process_batch` aggregates a window of executions per context
//! and applies more conservative adjustments (half the learning rate, a
//! higher materiality floor). Every applied adjustment writes a new
//! `MetricWeight` version; the active record is never mutated in place.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ExecutionRecord, ExecutionStatus, InsightKind, InsightPriority, LearningConfig,
    LearningInsight, MetricWeight, WeightKey, CONFIDENCE_MAX, CONFIDENCE_MIN, WEIGHT_MAX,
    WEIGHT_MIN,
};
use crate::domain::ports::{ExecutionLog, WeightStore};

/// Window for historical success-rate and stability lookups.
const HISTORY_WINDOW: Duration = Duration::from_secs(30 * 24 * 3600);
/// Samples fetched for the stability (coefficient-of-variation) factor.
const STABILITY_SAMPLE_LIMIT: u32 = 50;
/// Minimum unclamped weight change worth a new version (single outcome).
const WEIGHT_FLOOR_SINGLE: f64 = 0.01;
/// Minimum unclamped weight change worth a new version (batch).
const WEIGHT_FLOOR_BATCH: f64 = 0.02;
/// Minimum relative threshold change worth recalibrating.
const THRESHOLD_FLOOR: f64 = 0.05;
/// Improvement above which a performance-anomaly insight is emitted.
const ANOMALY_IMPROVEMENT: f64 = 0.2;
/// Fallback improvement magnitude when a record carries no impact metrics.
const DEFAULT_IMPROVEMENT: f64 = 0.05;

/// Which tunable an adjustment touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentKind {
    Weight,
    Threshold,
    Confidence,
}

/// One applied adjustment, for reporting and insight evidence.
#[derive(Debug, Clone)]
pub struct AppliedAdjustment {
    pub kind: AdjustmentKind,
    pub previous: Option<f64>,
    pub new: f64,
}

/// Result of analyzing one outcome or one batch group.
#[derive(Debug, Clone)]
pub struct OutcomeAnalysis {
    pub execution_id: Option<Uuid>,
    pub key: WeightKey,
    pub success: bool,
    pub confidence: f64,
    pub improvement: f64,
    pub adjustments: Vec<AppliedAdjustment>,
    pub insights: Vec<LearningInsight>,
}

pub struct FeedbackLearner {
    log: Arc<dyn ExecutionLog>,
    weights: Arc<dyn WeightStore>,
    config: LearningConfig,
}

impl FeedbackLearner {
    pub fn new(
        log: Arc<dyn ExecutionLog>,
        weights: Arc<dyn WeightStore>,
        config: LearningConfig,
    ) -> Self {
        Self {
            log,
            weights,
            config,
        }
    }

    /// Learn from a single logged execution.
    pub async fn process_outcome(&self, execution_id: Uuid) -> DomainResult<OutcomeAnalysis> {
        let record = self
            .log
            .get(execution_id)
            .await?
            .ok_or(DomainError::ExecutionNotFound(execution_id))?;

        let key = weight_key_for(&record);
        let success = record.status == ExecutionStatus::Completed && record.result.success;
        let improvement = record_improvement(&record, success);

        let history_rate = self
            .log
            .success_rate(&key, HISTORY_WINDOW)
            .await?
            .unwrap_or(0.5);
        let trigger_values = self
            .log
            .recent_trigger_values(&key, HISTORY_WINDOW, STABILITY_SAMPLE_LIMIT)
            .await?;
        let stability = stability_score(&trigger_values);
        let sample_size = trigger_values.len() as u64;

        // Unweighted mean of five factors.
        let factors = [
            if success { 0.8 } else { 0.2 },
            if record.result.impact_metrics.is_some() { 0.7 } else { 0.3 },
            history_rate,
            stability,
            reliability(sample_size, self.config.min_sample_size),
        ];
        let confidence = factors.iter().sum::<f64>() / factors.len() as f64;

        let mut analysis = OutcomeAnalysis {
            execution_id: Some(execution_id),
            key: key.clone(),
            success,
            confidence,
            improvement,
            adjustments: Vec::new(),
            insights: Vec::new(),
        };

        if confidence >= self.config.confidence_threshold {
            let applied = self
                .apply_adjustments(
                    &key,
                    improvement,
                    history_rate,
                    record.trigger_value,
                    record.threshold,
                    success,
                    self.config.learning_rate,
                    WEIGHT_FLOOR_SINGLE,
                    stability,
                    1,
                )
                .await?;
            analysis.adjustments = applied;
            analysis.insights = self
                .emit_insights(&key, improvement, confidence, &analysis.adjustments, 1)
                .await?;
        } else {
            tracing::debug!(
                key = %key,
                confidence,
                threshold = self.config.confidence_threshold,
                "Confidence below threshold; no adjustments applied"
            );
        }

        Ok(analysis)
    }

    /// Learn from all completed/failed executions in the window, grouped by
    /// context. Adjustments use half the learning rate to avoid overreacting
    /// to small samples.
    pub async fn process_batch(
        &self,
        agent_type: Option<&str>,
        metric_type: Option<&str>,
        window_hours: u64,
    ) -> DomainResult<Vec<OutcomeAnalysis>> {
        let window = Duration::from_secs(window_hours * 3600);
        let records = self.log.recent(window, agent_type, metric_type).await?;

        let mut groups: HashMap<WeightKey, Vec<&ExecutionRecord>> = HashMap::new();
        for record in &records {
            groups.entry(weight_key_for(record)).or_default().push(record);
        }

        let batch_rate = self.config.learning_rate / 2.0;
        let mut analyses = Vec::new();

        for (key, group) in groups {
            let n = group.len() as u64;
            let successes = group
                .iter()
                .filter(|r| r.status == ExecutionStatus::Completed && r.result.success)
                .count();
            let success_rate = successes as f64 / n as f64;
            let improvement = group
                .iter()
                .map(|r| {
                    record_improvement(
                        r,
                        r.status == ExecutionStatus::Completed && r.result.success,
                    )
                })
                .sum::<f64>()
                / n as f64;

            let trigger_values: Vec<f64> =
                group.iter().filter_map(|r| r.trigger_value).collect();
            let stability = stability_score(&trigger_values);
            let impact_ratio = group
                .iter()
                .filter(|r| r.result.impact_metrics.is_some())
                .count() as f64
                / n as f64;

            let factors = [
                if success_rate >= 0.5 { 0.8 } else { 0.2 },
                0.3 + 0.4 * impact_ratio,
                success_rate,
                stability,
                reliability(n, self.config.min_sample_size),
            ];
            let confidence = factors.iter().sum::<f64>() / factors.len() as f64;

            let mut analysis = OutcomeAnalysis {
                execution_id: None,
                key: key.clone(),
                success: success_rate >= 0.5,
                confidence,
                improvement,
                adjustments: Vec::new(),
                insights: Vec::new(),
            };

            if confidence >= self.config.confidence_threshold {
                let latest_value = group.iter().find_map(|r| r.trigger_value);
                let latest_threshold = group.iter().find_map(|r| r.threshold);
                let applied = self
                    .apply_adjustments(
                        &key,
                        improvement,
                        success_rate,
                        latest_value,
                        latest_threshold,
                        success_rate >= 0.5,
                        batch_rate,
                        WEIGHT_FLOOR_BATCH,
                        stability,
                        n,
                    )
                    .await?;
                analysis.adjustments = applied;
                analysis.insights = self
                    .emit_insights(&key, improvement, confidence, &analysis.adjustments, n)
                    .await?;
            }

            analyses.push(analysis);
        }

        Ok(analyses)
    }

    /// Apply weight/threshold/confidence adjustments as one new version.
    #[allow(clippy::too_many_arguments)]
    async fn apply_adjustments(
        &self,
        key: &WeightKey,
        improvement: f64,
        success_rate: f64,
        trigger_value: Option<f64>,
        rule_threshold: Option<f64>,
        success: bool,
        rate: f64,
        weight_floor: f64,
        stability: f64,
        sample_increment: u64,
    ) -> DomainResult<Vec<AppliedAdjustment>> {
        let current = match self.weights.active(key).await? {
            Some(w) => w,
            None => {
                let seed = MetricWeight::seed(key.clone(), rule_threshold);
                self.weights.put_version(&seed).await?;
                seed
            }
        };

        let mut next = current.next_version();
        next.sample_size = current.sample_size + sample_increment;
        next.stability = stability;
        let mut applied = Vec::new();

        // Weight: multiplicative nudge, clamped, gated by materiality floor.
        let factor = if improvement > 0.0 {
            1.0 + rate * improvement
        } else {
            1.0 - rate * improvement.abs()
        };
        let unclamped = current.weight * factor;
        if (unclamped - current.weight).abs() > weight_floor {
            next.weight = unclamped.clamp(WEIGHT_MIN, WEIGHT_MAX);
            applied.push(AppliedAdjustment {
                kind: AdjustmentKind::Weight,
                previous: Some(current.weight),
                new: next.weight,
            });
        }

        // Threshold: nudge toward the observed trigger value.
        if let Some(value) = trigger_value {
            let target = if success { value * 0.95 } else { value * 1.05 };
            match current.threshold {
                Some(cur) if cur != 0.0 => {
                    if ((target - cur) / cur).abs() > THRESHOLD_FLOOR {
                        next.threshold = Some(target);
                        applied.push(AppliedAdjustment {
                            kind: AdjustmentKind::Threshold,
                            previous: Some(cur),
                            new: target,
                        });
                    }
                }
                _ => {
                    next.threshold = Some(target);
                    applied.push(AppliedAdjustment {
                        kind: AdjustmentKind::Threshold,
                        previous: current.threshold,
                        new: target,
                    });
                }
            }
        }

        // Confidence: drift toward the observed success rate.
        let delta = (success_rate - 0.5) * rate;
        if delta != 0.0 {
            next.confidence = (current.confidence + delta).clamp(CONFIDENCE_MIN, CONFIDENCE_MAX);
            if next.confidence != current.confidence {
                applied.push(AppliedAdjustment {
                    kind: AdjustmentKind::Confidence,
                    previous: Some(current.confidence),
                    new: next.confidence,
                });
            }
        }

        if applied.is_empty() {
            return Ok(applied);
        }

        self.weights.put_version(&next).await?;
        tracing::info!(
            key = %key,
            version = next.version,
            weight = next.weight,
            confidence = next.confidence,
            adjustments = applied.len(),
            "Applied learning adjustments"
        );
        Ok(applied)
    }

    async fn emit_insights(
        &self,
        key: &WeightKey,
        improvement: f64,
        confidence: f64,
        adjustments: &[AppliedAdjustment],
        evidence_count: u64,
    ) -> DomainResult<Vec<LearningInsight>> {
        let mut insights = Vec::new();

        if improvement > ANOMALY_IMPROVEMENT {
            insights.push(LearningInsight {
                id: Uuid::new_v4(),
                kind: InsightKind::PerformanceAnomaly,
                priority: InsightPriority::High,
                key: key.clone(),
                title: format!("Unusual improvement for {key}"),
                detail: format!(
                    "Observed improvement of {:.0}% after remediation; worth reviewing what changed.",
                    improvement * 100.0
                ),
                confidence,
                expected_impact: improvement,
                evidence_count,
                created_at: Utc::now(),
            });
        }

        if let Some(threshold_adj) = adjustments
            .iter()
            .find(|a| a.kind == AdjustmentKind::Threshold)
        {
            insights.push(LearningInsight {
                id: Uuid::new_v4(),
                kind: InsightKind::ThresholdOptimization,
                priority: InsightPriority::Medium,
                key: key.clone(),
                title: format!("Threshold recalibrated for {key}"),
                detail: format!(
                    "Threshold moved from {} to {:.4} based on observed trigger values.",
                    threshold_adj
                        .previous
                        .map_or_else(|| "unset".to_string(), |v| format!("{v:.4}")),
                    threshold_adj.new
                ),
                confidence,
                expected_impact: improvement.abs(),
                evidence_count,
                created_at: Utc::now(),
            });
        }

        for insight in &insights {
            self.weights.record_insight(insight).await?;
        }
        Ok(insights)
    }
}

impl std::fmt::Debug for FeedbackLearner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackLearner")
            .field("learning_rate", &self.config.learning_rate)
            .field("confidence_threshold", &self.config.confidence_threshold)
            .finish()
    }
}

/// Learning context for a record. Records with no metric context (manual
/// triggers) learn under the `general` metric type.
fn weight_key_for(record: &ExecutionRecord) -> WeightKey {
    WeightKey {
        agent_type: record.agent_type.clone(),
        metric_type: record
            .metric_type
            .clone()
            .unwrap_or_else(|| "general".to_string()),
        metric_subtype: record.metric_subtype.clone(),
        category: record.category.clone(),
        scope: record.campaign_id.clone(),
    }
}

/// Impact-metric mean when present; otherwise a small outcome-signed drift.
fn record_improvement(record: &ExecutionRecord, success: bool) -> f64 {
    match record.result.impact_metrics {
        Some(ref metrics) if !metrics.is_empty() => {
            metrics.values().sum::<f64>() / metrics.len() as f64
        }
        _ => {
            if success {
                DEFAULT_IMPROVEMENT
            } else {
                -DEFAULT_IMPROVEMENT
            }
        }
    }
}

/// `max(0, 1 - coefficient_of_variation)`; neutral 0.5 with fewer than two
/// samples or a zero mean.
fn stability_score(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.5;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.5;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let cv = variance.sqrt() / mean.abs();
    (1.0 - cv).max(0.0)
}

fn reliability(sample_size: u64, min_sample_size: u64) -> f64 {
    if min_sample_size == 0 {
        return 1.0;
    }
    (sample_size as f64 / min_sample_size as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stability_is_high_for_steady_series() {
        let steady = stability_score(&[5.0, 5.1, 4.9, 5.0]);
        let noisy = stability_score(&[1.0, 9.0, 2.0, 8.0]);
        assert!(steady > 0.9);
        assert!(noisy < steady);
    }

    #[test]
    fn stability_neutral_without_samples() {
        assert_eq!(stability_score(&[]), 0.5);
        assert_eq!(stability_score(&[7.0]), 0.5);
        assert_eq!(stability_score(&[0.0, 0.0]), 0.5);
    }

    #[test]
    fn reliability_saturates_at_min_sample_size() {
        assert_eq!(reliability(0, 10), 0.0);
        assert_eq!(reliability(5, 10), 0.5);
        assert_eq!(reliability(25, 10), 1.0);
    }

    proptest! {
        /// Any sequence of improvements keeps the weight within bounds.
        #[test]
        fn weight_stays_clamped(improvements in prop::collection::vec(-5.0f64..5.0, 1..200)) {
            let rate = 0.1;
            let mut weight = 1.0f64;
            for improvement in improvements {
                let factor = if improvement > 0.0 {
                    1.0 + rate * improvement
                } else {
                    1.0 - rate * improvement.abs()
                };
                weight = (weight * factor).clamp(WEIGHT_MIN, WEIGHT_MAX);
                prop_assert!((WEIGHT_MIN..=WEIGHT_MAX).contains(&weight));
            }
        }
    }
}
