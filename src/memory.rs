use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::core::numerics::{cosine_similarity, normalize};
use crate::core::ring::RingBuffer;
use crate::models::outcome::{FeatureVector, TradeOutcome};
use crate::models::regime::MarketRegime;

/// Default pattern capacity.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Recently stored pattern ids retained.
const RECENT_IDS: usize = 1_000;
/// Patterns returned by the outcome slices.
const OUTCOME_SLICE: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalPattern {
    pub id: String,
    pub timestamp: i64,
    /// Min-max-normalized thirteen-value fingerprint.
    pub fingerprint: Vec<f64>,
    pub outcome: TradeOutcome,
    pub regime: MarketRegime,
    /// 1.0 for the pattern itself; set on retrieval for matches.
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub by_regime: HashMap<MarketRegime, usize>,
}

/// Long-lived pattern store with similarity retrieval. Patterns are
/// indexed by regime, outcome sign, and hour bucket; the indices stay
/// consistent with the store through insert, eviction, and import.
pub struct FractalMemory {
    capacity: usize,
    patterns: HashMap<String, HistoricalPattern>,
    recent_ids: RingBuffer<String>,
    by_regime: HashMap<MarketRegime, Vec<String>>,
    positive_ids: Vec<String>,
    negative_ids: Vec<String>,
    by_hour: HashMap<u8, Vec<String>>,
    pattern_counter: u64,
}

impl FractalMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            patterns: HashMap::new(),
            recent_ids: RingBuffer::new(RECENT_IDS),
            by_regime: HashMap::new(),
            positive_ids: Vec::new(),
            negative_ids: Vec::new(),
            by_hour: HashMap::new(),
            pattern_counter: 0,
        }
    }

    /// Fingerprint the vector, insert the pattern into the store and
    /// every index, and evict the oldest patterns once over capacity.
    pub fn store(
        &mut self,
        vector: &FeatureVector,
        outcome: TradeOutcome,
        regime: MarketRegime,
        timestamp: i64,
    ) -> String {
        self.pattern_counter += 1;
        let id = format!("pat-{}", self.pattern_counter);
        let pattern = HistoricalPattern {
            id: id.clone(),
            timestamp,
            fingerprint: normalize(&vector.to_vec()),
            outcome,
            regime,
            similarity: 1.0,
        };

        self.index(&pattern);
        self.patterns.insert(id.clone(), pattern);
        self.recent_ids.push(id.clone());

        while self.patterns.len() > self.capacity {
            self.evict_oldest();
        }
        debug!(pattern = %id, %regime, total = self.patterns.len(), "pattern stored");
        id
    }

    /// Nearest patterns by cosine similarity: the same-regime bucket is
    /// scanned first, the rest of the store only if it comes up short.
    pub fn retrieve_similar(
        &self,
        vector: &FeatureVector,
        regime: MarketRegime,
        limit: usize,
    ) -> Vec<HistoricalPattern> {
        let query = normalize(&vector.to_vec());
        let same_regime: Vec<&String> = self
            .by_regime
            .get(&regime)
            .map(|ids| ids.iter().collect())
            .unwrap_or_default();

        let mut scored: Vec<HistoricalPattern> = self.score(&query, &same_regime);
        if same_regime.len() < limit {
            let rest: Vec<&String> = self
                .patterns
                .keys()
                .filter(|id| !same_regime.contains(id))
                .collect();
            scored.extend(self.score(&query, &rest));
        }

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        scored
    }

    /// The last 50 positive or negative patterns, newest last.
    pub fn by_outcome(&self, positive: bool) -> Vec<&HistoricalPattern> {
        let ids = if positive {
            &self.positive_ids
        } else {
            &self.negative_ids
        };
        let start = ids.len().saturating_sub(OUTCOME_SLICE);
        ids[start..]
            .iter()
            .filter_map(|id| self.patterns.get(id))
            .collect()
    }

    /// The `n` most recently stored patterns, newest first.
    pub fn recent_patterns(&self, n: usize) -> Vec<&HistoricalPattern> {
        self.recent_ids
            .recent(n)
            .iter()
            .filter_map(|id| self.patterns.get(id))
            .collect()
    }

    pub fn by_regime(&self, regime: MarketRegime) -> Vec<&HistoricalPattern> {
        self.by_regime
            .get(&regime)
            .map(|ids| ids.iter().filter_map(|id| self.patterns.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> PatternStats {
        PatternStats {
            total: self.patterns.len(),
            positive: self.positive_ids.len(),
            negative: self.negative_ids.len(),
            by_regime: self
                .by_regime
                .iter()
                .map(|(&r, ids)| (r, ids.len()))
                .collect(),
        }
    }

    /// Flat export, oldest first.
    pub fn export_patterns(&self) -> Vec<HistoricalPattern> {
        let mut all: Vec<HistoricalPattern> = self.patterns.values().cloned().collect();
        all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        all
    }

    /// Replace the store contents, rebuilding every index.
    pub fn import_patterns(&mut self, patterns: Vec<HistoricalPattern>) {
        self.clear();
        for pattern in patterns {
            self.index(&pattern);
            self.recent_ids.push(pattern.id.clone());
            let numeric: u64 = pattern
                .id
                .strip_prefix("pat-")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            self.pattern_counter = self.pattern_counter.max(numeric);
            self.patterns.insert(pattern.id.clone(), pattern);
        }
        while self.patterns.len() > self.capacity {
            self.evict_oldest();
        }
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.recent_ids.clear();
        self.by_regime.clear();
        self.positive_ids.clear();
        self.negative_ids.clear();
        self.by_hour.clear();
    }

    fn score(&self, query: &[f64], ids: &[&String]) -> Vec<HistoricalPattern> {
        ids.iter()
            .filter_map(|id| self.patterns.get(*id))
            .map(|p| {
                let mut hit = p.clone();
                hit.similarity = cosine_similarity(query, &p.fingerprint);
                hit
            })
            .collect()
    }

    fn index(&mut self, pattern: &HistoricalPattern) {
        self.by_regime
            .entry(pattern.regime)
            .or_default()
            .push(pattern.id.clone());
        if pattern.outcome.pnl > 0.0 {
            self.positive_ids.push(pattern.id.clone());
        } else {
            self.negative_ids.push(pattern.id.clone());
        }
        self.by_hour
            .entry(hour_bucket(pattern.timestamp))
            .or_default()
            .push(pattern.id.clone());
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .patterns
            .values()
            .min_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)))
            .map(|p| p.id.clone());
        if let Some(id) = oldest {
            if let Some(pattern) = self.patterns.remove(&id) {
                if let Some(ids) = self.by_regime.get_mut(&pattern.regime) {
                    ids.retain(|x| x != &id);
                }
                self.positive_ids.retain(|x| x != &id);
                self.negative_ids.retain(|x| x != &id);
                if let Some(ids) = self.by_hour.get_mut(&hour_bucket(pattern.timestamp)) {
                    ids.retain(|x| x != &id);
                }
                debug!(pattern = %id, "evicted oldest pattern");
            }
        }
    }
}

fn hour_bucket(timestamp_ms: i64) -> u8 {
    ((timestamp_ms / 3_600_000).rem_euclid(24)) as u8
}
