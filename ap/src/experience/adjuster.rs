//! EpisodicHeuristicAdjuster - rescales heuristic estimates from past outcomes
//!
//! Records of the same task type whose action descriptors resemble the
//! state's latest action vote on how optimistic or pessimistic estimates
//! have been. The vote is a similarity-weighted average of
//! `observed / predicted`, clamped so that a handful of outliers can at most
//! halve or double an estimate.

use std::sync::Arc;
use tracing::{debug, warn};

use experiencestore::{ExperienceMatch, ExperienceRecord, ExperienceStore, StoreError};

use super::feedback::ExecutionFeedback;
use crate::config::ExperienceConfig;
use crate::search::{Estimate, PlanningState};

/// Lower bound of the correction factor
pub const MIN_FACTOR: f64 = 0.5;

/// Upper bound of the correction factor
pub const MAX_FACTOR: f64 = 2.0;

pub struct EpisodicHeuristicAdjuster {
    store: Arc<dyn ExperienceStore>,
    task_type: String,
    min_matches: usize,
    similarity_threshold: f64,
    query_limit: usize,
}

impl EpisodicHeuristicAdjuster {
    pub fn new(store: Arc<dyn ExperienceStore>, task_type: impl Into<String>, config: &ExperienceConfig) -> Self {
        let task_type = task_type.into();
        debug!(%task_type, min_matches = config.min_matches, "EpisodicHeuristicAdjuster::new: called");
        Self {
            store,
            task_type,
            min_matches: config.min_matches.max(1),
            similarity_threshold: config.similarity_threshold,
            query_limit: config.query_limit.max(1),
        }
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// `round(base × factor)`; `Unknown` passes through untouched
    pub fn adjust(&self, base: Estimate, state: &PlanningState) -> Estimate {
        let Estimate::Finite(h) = base else {
            return base;
        };
        let Some(action) = state.last_action() else {
            return base;
        };
        let factor = self.correction_factor(&action.descriptor());
        if factor == 1.0 {
            return base;
        }
        let adjusted = (h as f64 * factor).round() as u64;
        debug!(state = %state.id, h, factor, adjusted, "EpisodicHeuristicAdjuster::adjust: rescaled");
        Estimate::Finite(adjusted)
    }

    /// Correction factor for an action descriptor, always in `[MIN_FACTOR, MAX_FACTOR]`
    pub fn correction_factor(&self, action_descriptor: &str) -> f64 {
        match self
            .store
            .query(&self.task_type, action_descriptor, self.similarity_threshold, self.query_limit)
        {
            Ok(matches) => factor_from_matches(&matches, self.min_matches, self.similarity_threshold),
            Err(e) => {
                warn!(error = %e, "EpisodicHeuristicAdjuster::correction_factor: store query failed, no correction");
                1.0
            }
        }
    }

    /// Append one record per reported outcome
    pub fn record_feedback(&self, feedback: &ExecutionFeedback) -> Result<usize, StoreError> {
        debug!(task_type = %feedback.task_type, outcomes = feedback.outcomes.len(), "EpisodicHeuristicAdjuster::record_feedback: called");
        let task_type = if feedback.task_type.is_empty() {
            self.task_type.as_str()
        } else {
            feedback.task_type.as_str()
        };
        let records: Vec<ExperienceRecord> = feedback
            .outcomes
            .iter()
            .map(|o| ExperienceRecord::new(task_type, &o.action_descriptor, o.predicted_cost, o.observed_cost))
            .collect();
        let count = records.len();
        self.store.append_batch(records)?;
        Ok(count)
    }
}

/// Similarity-weighted mean of `observed / predicted`, clamped
///
/// Returns 1.0 with fewer than `min_matches` usable records or when the
/// arithmetic degenerates (no weight, non-finite result).
pub fn factor_from_matches(matches: &[ExperienceMatch], min_matches: usize, similarity_threshold: f64) -> f64 {
    let usable: Vec<(f64, f64)> = matches
        .iter()
        .filter(|m| m.similarity >= similarity_threshold && m.similarity.is_finite() && m.similarity > 0.0)
        .filter_map(|m| m.record.ratio().map(|r| (m.similarity, r)))
        .collect();

    if usable.len() < min_matches {
        return 1.0;
    }

    let (weighted, total_weight) = usable
        .iter()
        .fold((0.0, 0.0), |(sum, weight), (w, ratio)| (sum + w * ratio, weight + w));
    if total_weight <= 0.0 {
        return 1.0;
    }

    let factor = weighted / total_weight;
    if !factor.is_finite() {
        return 1.0;
    }
    factor.clamp(MIN_FACTOR, MAX_FACTOR)
}
