//! Recycler: scoring and batch selection.
//!
//! Per design note, the
//! Recycler never touches a `BrowserInstance` directly — it reads a
//! snapshot and produces `RecyclingCandidate`s; the Pool Manager is the
//! only thing that actually destroys an instance (`manager.rs`).
//!
//! Recycler weights are `PoolConfig::recycler_weights`, a `RecyclerWeights`
//! config value rather than hard-coded constants, so a deployment can tune
//! them the same way every other pool threshold is tuned.

use std::collections::{BTreeSet, HashMap};

use gateway_types::{
    BrowserId, BrowserInstance, HealthRecord, PoolConfig, RecycleReason, RecyclerWeights,
    RecyclingCandidate, TimestampMs, Urgency,
};
use parking_lot::Mutex;

fn ratio_score(value: f64, cap: f64) -> f64 {
    if cap <= 0.0 {
        return 0.0;
    }
    (value / cap).clamp(0.0, 1.0) * 100.0
}

/// Computes the composite score for one instance.
pub fn score_instance(
    inst: &BrowserInstance,
    health: Option<&HealthRecord>,
    config: &PoolConfig,
    weights: &RecyclerWeights,
    now: TimestampMs,
) -> RecyclingCandidate {
    let age_score = ratio_score(inst.age_ms(now) as f64, config.max_age_ms as f64);
    let use_score = ratio_score(inst.use_count as f64, config.recycle_after_uses as f64);
    let memory_score = health
        .and_then(|h| h.memory_mb)
        .map(|mb| ratio_score(mb as f64, config.max_memory_per_browser_mb as f64))
        .unwrap_or(0.0);
    let cpu_score = health
        .and_then(|h| h.cpu_percent)
        .map(|cpu| ratio_score(cpu as f64, config.max_cpu_per_browser as f64))
        .unwrap_or(0.0);
    let unresponsive_score = if health.is_some_and(|h| !h.responsive) {
        100.0
    } else {
        0.0
    };
    let page_leak_score = ratio_score(
        inst.page_count() as f64,
        config.max_pages_per_browser as f64,
    );
    // No dedicated per-instance error counter exists in the data model;
    // consecutive unhealthy checks is the closest rolling proxy.
    let error_rate_score = health
        .map(|h| ratio_score(h.consecutive_unhealthy as f64, 3.0))
        .unwrap_or(0.0);

    let composite = weights.age * age_score
        + weights.use_count * use_score
        + weights.memory * memory_score
        + weights.cpu * cpu_score
        + weights.unresponsive * unresponsive_score
        + weights.page_leak * page_leak_score
        + weights.error_rate * error_rate_score;
    let score = composite.clamp(0.0, 100.0).round() as u8;

    let mut reasons = BTreeSet::new();
    if age_score >= 90.0 {
        reasons.insert(RecycleReason::Age);
    }
    if use_score >= 90.0 {
        reasons.insert(RecycleReason::UseCount);
    }
    if memory_score >= 50.0 {
        reasons.insert(RecycleReason::Memory);
    }
    if cpu_score >= 50.0 {
        reasons.insert(RecycleReason::Cpu);
    }
    if unresponsive_score > 0.0 {
        reasons.insert(RecycleReason::Unresponsive);
    }
    if page_leak_score >= 90.0 {
        reasons.insert(RecycleReason::PageLeak);
    }
    if error_rate_score >= 50.0 {
        reasons.insert(RecycleReason::ErrorRate);
    }

    RecyclingCandidate {
        browser_id: inst.id,
        score,
        reasons,
        urgency: Urgency::from_score(score),
        last_used_at: inst.last_used_at,
    }
}

/// Scores every Idle/Active instance and returns those at or above
/// `recyclingThreshold`, highest score first.
pub fn candidates(
    instances: &HashMap<BrowserId, BrowserInstance>,
    healths: &HashMap<BrowserId, HealthRecord>,
    config: &PoolConfig,
    weights: &RecyclerWeights,
    now: TimestampMs,
) -> Vec<RecyclingCandidate> {
    let mut out: Vec<RecyclingCandidate> = instances
        .values()
        .map(|inst| score_instance(inst, healths.get(&inst.id), config, weights, now))
        .filter(|c| c.score >= config.recycling_threshold)
        .collect();
    out.sort_by(|a, b| {
        b.urgency
            .cmp(&a.urgency)
            .then(b.score.cmp(&a.score))
            .then(a.last_used_at.cmp(&b.last_used_at))
    });
    out
}

/// Truncates to `maxBatchSize`, already sorted by urgency/score/age per
/// [`candidates`].
pub fn select_batch(
    mut candidates: Vec<RecyclingCandidate>,
    max_batch_size: usize,
) -> Vec<RecyclingCandidate> {
    candidates.truncate(max_batch_size);
    candidates
}

/// Tracks the recycling cooldown so `executeRecycling` can skip a round
/// while thrash protection is active.
pub struct Recycler {
    weights: RecyclerWeights,
    last_recycled_at: Mutex<Option<TimestampMs>>,
}

impl Recycler {
    pub fn new(weights: RecyclerWeights) -> Self {
        Self {
            weights,
            last_recycled_at: Mutex::new(None),
        }
    }

    pub fn weights(&self) -> RecyclerWeights {
        self.weights
    }

    pub fn in_cooldown(&self, now: TimestampMs, cooldown_ms: u64) -> bool {
        self.last_recycled_at
            .lock()
            .is_some_and(|t| now.saturating_sub(t) < cooldown_ms)
    }

    pub fn mark_recycled(&self, now: TimestampMs) {
        *self.last_recycled_at.lock() = Some(now);
    }
}

impl Default for Recycler {
    fn default() -> Self {
        Self::new(RecyclerWeights::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::{now_ms, BrowserInstance, HealthRecord};

    #[test]
    fn a_fresh_instance_scores_low() {
        let config = PoolConfig::default();
        let inst = BrowserInstance::new(BrowserId::new(), None);
        let candidate = score_instance(&inst, None, &config, &RecyclerWeights::default(), now_ms());
        assert!(candidate.score < config.recycling_threshold);
    }

    #[test]
    fn an_unresponsive_instance_is_flagged_unresponsive() {
        let config = PoolConfig::default();
        let inst = BrowserInstance::new(BrowserId::new(), None);
        let mut health = HealthRecord::healthy_now(now_ms());
        health.responsive = false;
        health.healthy = false;
        let candidate =
            score_instance(&inst, Some(&health), &config, &RecyclerWeights::default(), now_ms());
        assert!(candidate.reasons.contains(&RecycleReason::Unresponsive));
    }

    #[test]
    fn candidates_are_sorted_urgency_then_score_then_oldest_first() {
        let config = PoolConfig {
            recycling_threshold: 0,
            ..Default::default()
        };
        let mut instances = HashMap::new();
        let mut old_inst = BrowserInstance::new(BrowserId::new(), None);
        old_inst.last_used_at = 1;
        let new_inst = BrowserInstance::new(BrowserId::new(), None);
        instances.insert(old_inst.id, old_inst.clone());
        instances.insert(new_inst.id, new_inst.clone());

        let candidates = candidates(
            &instances,
            &HashMap::new(),
            &config,
            &RecyclerWeights::default(),
            now_ms(),
        );
        // Both score equally (fresh instances); the older one sorts first.
        assert_eq!(candidates[0].browser_id, old_inst.id);
    }

    #[test]
    fn select_batch_respects_max_batch_size() {
        let candidates: Vec<RecyclingCandidate> = (0..5)
            .map(|_| RecyclingCandidate {
                browser_id: BrowserId::new(),
                score: 80,
                reasons: BTreeSet::new(),
                urgency: Urgency::High,
                last_used_at: 0,
            })
            .collect();
        assert_eq!(select_batch(candidates, 3).len(), 3);
    }
}
