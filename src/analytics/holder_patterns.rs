//! Holder Pattern Analyzer - Temporal classification of top holders
//!
//! Tracks every address's rank and share across an ordered series of top-N
//! holder snapshots and sorts the notable ones into behavioural groups:
//! - Persistent whales (high, stable rank, holdings not shrinking)
//! - Frequent traders (rank swings wildly between snapshots)
//! - New entrants (first seen in the latest snapshots, already ranked high)
//! - Disappeared holders (dropped out of the top-N recently)
//!
//! ## Notes
//! The thresholds are heuristics. They are exposed on [`HolderPatternConfig`]
//! so callers can tune them without touching the classification code.

use crate::analytics::records::{Address, HolderRecord, Snapshot, SnapshotRecord};
use crate::error::{AnalysisError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

/// Fewer distinct snapshot times than this and no trend can be computed
pub const MIN_SNAPSHOT_TIMES: usize = 2;

/// Configuration for the holder pattern analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HolderPatternConfig {
    /// Holders kept per snapshot, by percentage (default: 100)
    pub top_n: usize,
    /// Sightings required before an address is classified (default: 3)
    pub min_snapshots: usize,
    /// Persistent whale: earliest rank at or above this (default: 20)
    pub whale_max_earliest_rank: u32,
    /// Persistent whale: rank volatility at most this (default: 30)
    pub whale_max_rank_volatility: u32,
    /// Persistent whale: percentage change at least this (default: -0.5)
    pub whale_min_percentage_change: f64,
    /// Persistent whale: high confidence at or below this volatility (default: 15)
    pub whale_high_confidence_volatility: u32,
    /// Frequent trader: rank volatility above this (default: 50)
    pub churner_min_rank_volatility: u32,
    /// Frequent trader: high confidence above this volatility (default: 80)
    pub churner_high_confidence_volatility: u32,
    /// New entrant: first seen within this many latest snapshots (default: 3)
    pub new_entrant_window: usize,
    /// New entrant: latest rank at or above this (default: 50)
    pub new_entrant_max_rank: u32,
    /// New entrant: high confidence at or above this latest rank (default: 20)
    pub new_entrant_high_confidence_rank: u32,
    /// Disappeared: not seen within this many latest snapshots (default: 2)
    pub disappeared_window: usize,
    pub max_whales: usize,
    pub max_churners: usize,
    pub max_new_entrants: usize,
    pub max_disappeared: usize,
}

impl Default for HolderPatternConfig {
    fn default() -> Self {
        Self {
            top_n: 100,
            min_snapshots: 3,
            whale_max_earliest_rank: 20,
            whale_max_rank_volatility: 30,
            whale_min_percentage_change: -0.5,
            whale_high_confidence_volatility: 15,
            churner_min_rank_volatility: 50,
            churner_high_confidence_volatility: 80,
            new_entrant_window: 3,
            new_entrant_max_rank: 50,
            new_entrant_high_confidence_rank: 20,
            disappeared_window: 2,
            max_whales: 20,
            max_churners: 15,
            max_new_entrants: 10,
            max_disappeared: 10,
        }
    }
}

/// One in-scope sighting of an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub snapshot_time: DateTime<Utc>,
    /// 1-based rank by percentage within the snapshot
    pub rank: u32,
    pub percentage: f64,
    pub balance: f64,
}

/// History of one address across all snapshots it appeared in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressProfile {
    pub address: Address,
    /// Sightings in snapshot order
    pub observations: Vec<Observation>,
    pub snapshot_count: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub earliest_rank: u32,
    pub latest_rank: u32,
    pub avg_rank: f64,
    /// max rank - min rank
    pub rank_volatility: u32,
    pub avg_percentage: f64,
    /// last percentage - first percentage
    pub percentage_change: f64,
}

impl AddressProfile {
    fn from_observations(address: Address, observations: Vec<Observation>) -> Option<Self> {
        let first = observations.first()?.clone();
        let last = observations.last()?.clone();
        let count = observations.len();

        let min_rank = observations.iter().map(|o| o.rank).min().unwrap_or(first.rank);
        let max_rank = observations.iter().map(|o| o.rank).max().unwrap_or(first.rank);
        let avg_rank = observations.iter().map(|o| o.rank as f64).sum::<f64>() / count as f64;
        let avg_percentage = observations.iter().map(|o| o.percentage).sum::<f64>() / count as f64;

        Some(Self {
            address,
            observations,
            snapshot_count: count,
            first_seen: first.snapshot_time,
            last_seen: last.snapshot_time,
            earliest_rank: first.rank,
            latest_rank: last.rank,
            avg_rank,
            rank_volatility: max_rank - min_rank,
            avg_percentage,
            percentage_change: last.percentage - first.percentage,
        })
    }

    fn last_percentage(&self) -> f64 {
        self.observations.last().map_or(0.0, |o| o.percentage)
    }
}

/// Classification confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
}

/// Behavioural category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderPattern {
    PersistentWhale,
    FrequentTrader,
    NewEntrant,
}

/// A classified address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub address: Address,
    pub pattern: HolderPattern,
    pub confidence: Confidence,
    pub snapshot_count: usize,
    pub earliest_rank: u32,
    pub latest_rank: u32,
    pub avg_rank: f64,
    pub rank_volatility: u32,
    pub avg_percentage: f64,
    pub percentage_change: f64,
    /// snapshot_count / total_snapshots * (1 - rank_volatility / 100)
    pub stability_score: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// An address that dropped out of the top-N
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisappearedHolder {
    pub address: Address,
    pub last_seen: DateTime<Utc>,
    pub last_rank: u32,
    pub last_percentage: f64,
    pub snapshot_count: usize,
}

/// Category sizes before display truncation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub persistent_whales: usize,
    pub frequent_traders: usize,
    pub new_entrants: usize,
    pub disappeared_holders: usize,
}

/// Complete holder pattern analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderPatternReport {
    pub total_snapshots: usize,
    pub first_snapshot: DateTime<Utc>,
    pub last_snapshot: DateTime<Utc>,
    /// Distinct addresses seen in scope
    pub tracked_addresses: usize,
    pub persistent_whales: Vec<PatternEntry>,
    pub frequent_traders: Vec<PatternEntry>,
    pub new_entrants: Vec<PatternEntry>,
    pub disappeared_holders: Vec<DisappearedHolder>,
    pub summary: PatternSummary,
}

/// Holder Pattern Analyzer
pub struct HolderPatternAnalyzer {
    config: HolderPatternConfig,
}

impl HolderPatternAnalyzer {
    /// Create a new holder pattern analyzer
    pub fn new(config: HolderPatternConfig) -> Self {
        debug!(
            "Initialized HolderPatternAnalyzer with top_n={}, min_snapshots={}",
            config.top_n, config.min_snapshots
        );
        Self { config }
    }

    /// Analyze snapshots given as snapshot objects
    pub fn analyze_snapshots(&self, snapshots: &[Snapshot]) -> Result<HolderPatternReport> {
        let records: Vec<SnapshotRecord> = snapshots.iter().flat_map(Snapshot::records).collect();
        self.analyze(&records)
    }

    /// Classify addresses from flat, time-stamped holder records
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn analyze(&self, records: &[SnapshotRecord]) -> Result<HolderPatternReport> {
        let times = snapshot_times(records);
        if times.len() < MIN_SNAPSHOT_TIMES {
            return Err(AnalysisError::InsufficientSnapshots {
                found: times.len(),
                required: MIN_SNAPSHOT_TIMES,
            });
        }

        let profiles = self.build_profiles(records);
        let total = times.len();
        info!(
            "Analyzing {} addresses across {} snapshots",
            profiles.len(),
            total
        );

        let min_snapshots = self.config.min_snapshots.max(MIN_SNAPSHOT_TIMES);
        let new_entrant_cutoff = window_start(&times, self.config.new_entrant_window);

        let mut whales = Vec::new();
        let mut churners = Vec::new();
        let mut new_entrants = Vec::new();

        for profile in profiles.values().filter(|p| p.snapshot_count >= min_snapshots) {
            if let Some((pattern, confidence)) = self.classify(profile, new_entrant_cutoff) {
                let entry = to_entry(profile, pattern, confidence, total);
                match pattern {
                    HolderPattern::PersistentWhale => whales.push(entry),
                    HolderPattern::FrequentTrader => churners.push(entry),
                    HolderPattern::NewEntrant => new_entrants.push(entry),
                }
            }
        }

        let disappeared_cutoff = window_start(&times, self.config.disappeared_window);
        let mut disappeared: Vec<DisappearedHolder> = profiles
            .values()
            .filter(|p| p.snapshot_count >= MIN_SNAPSHOT_TIMES && p.last_seen < disappeared_cutoff)
            .map(|p| DisappearedHolder {
                address: p.address.clone(),
                last_seen: p.last_seen,
                last_rank: p.latest_rank,
                last_percentage: p.last_percentage(),
                snapshot_count: p.snapshot_count,
            })
            .collect();

        let summary = PatternSummary {
            persistent_whales: whales.len(),
            frequent_traders: churners.len(),
            new_entrants: new_entrants.len(),
            disappeared_holders: disappeared.len(),
        };

        whales.sort_by(|a, b| {
            cmp_f64(b.stability_score, a.stability_score)
                .then_with(|| cmp_f64(a.avg_rank, b.avg_rank))
                .then_with(|| a.address.cmp(&b.address))
        });
        churners.sort_by(|a, b| {
            b.rank_volatility
                .cmp(&a.rank_volatility)
                .then_with(|| a.address.cmp(&b.address))
        });
        new_entrants.sort_by(|a, b| {
            a.latest_rank
                .cmp(&b.latest_rank)
                .then_with(|| a.address.cmp(&b.address))
        });
        disappeared.sort_by(|a, b| {
            a.last_rank
                .cmp(&b.last_rank)
                .then_with(|| a.address.cmp(&b.address))
        });

        whales.truncate(self.config.max_whales);
        churners.truncate(self.config.max_churners);
        new_entrants.truncate(self.config.max_new_entrants);
        disappeared.truncate(self.config.max_disappeared);

        info!(
            "Holder patterns: {} whales, {} traders, {} new entrants, {} disappeared",
            summary.persistent_whales,
            summary.frequent_traders,
            summary.new_entrants,
            summary.disappeared_holders
        );

        Ok(HolderPatternReport {
            total_snapshots: total,
            first_snapshot: times[0],
            last_snapshot: times[total - 1],
            tracked_addresses: profiles.len(),
            persistent_whales: whales,
            frequent_traders: churners,
            new_entrants,
            disappeared_holders: disappeared,
            summary,
        })
    }

    /// Build a profile for every address that appears in scope in any snapshot.
    ///
    /// Each snapshot is ranked by percentage (missing = 0) descending and cut to
    /// `top_n`; a repeated address within one snapshot keeps its first sighting.
    pub fn build_profiles(&self, records: &[SnapshotRecord]) -> BTreeMap<Address, AddressProfile> {
        let mut by_time: BTreeMap<DateTime<Utc>, Vec<&HolderRecord>> = BTreeMap::new();
        for record in records {
            by_time
                .entry(record.snapshot_time)
                .or_default()
                .push(&record.holder);
        }

        let mut observations: BTreeMap<Address, Vec<Observation>> = BTreeMap::new();
        for (time, mut holders) in by_time {
            holders.sort_by(|a, b| cmp_f64(b.percentage_or_zero(), a.percentage_or_zero()));

            let mut seen = HashSet::new();
            let in_scope = holders
                .into_iter()
                .filter(|h| !h.address.is_empty() && seen.insert(h.address.as_str()))
                .take(self.config.top_n);

            for (idx, holder) in in_scope.enumerate() {
                observations
                    .entry(holder.address.clone())
                    .or_default()
                    .push(Observation {
                        snapshot_time: time,
                        rank: idx as u32 + 1,
                        percentage: holder.percentage_or_zero(),
                        balance: holder.balance_or_zero(),
                    });
            }
        }

        observations
            .into_iter()
            .filter_map(|(address, obs)| {
                AddressProfile::from_observations(address.clone(), obs).map(|p| (address, p))
            })
            .collect()
    }

    /// First matching rule wins: whale, then trader, then new entrant
    fn classify(
        &self,
        profile: &AddressProfile,
        new_entrant_cutoff: DateTime<Utc>,
    ) -> Option<(HolderPattern, Confidence)> {
        let c = &self.config;

        if profile.earliest_rank <= c.whale_max_earliest_rank
            && profile.rank_volatility <= c.whale_max_rank_volatility
            && profile.percentage_change >= c.whale_min_percentage_change
        {
            let confidence = if profile.rank_volatility <= c.whale_high_confidence_volatility {
                Confidence::High
            } else {
                Confidence::Medium
            };
            return Some((HolderPattern::PersistentWhale, confidence));
        }

        if profile.rank_volatility > c.churner_min_rank_volatility {
            let confidence = if profile.rank_volatility > c.churner_high_confidence_volatility {
                Confidence::High
            } else {
                Confidence::Medium
            };
            return Some((HolderPattern::FrequentTrader, confidence));
        }

        if profile.first_seen >= new_entrant_cutoff && profile.latest_rank <= c.new_entrant_max_rank {
            let confidence = if profile.latest_rank <= c.new_entrant_high_confidence_rank {
                Confidence::High
            } else {
                Confidence::Medium
            };
            return Some((HolderPattern::NewEntrant, confidence));
        }

        None
    }

    /// Get configuration
    pub fn config(&self) -> &HolderPatternConfig {
        &self.config
    }
}

impl Default for HolderPatternAnalyzer {
    fn default() -> Self {
        Self::new(HolderPatternConfig::default())
    }
}

fn snapshot_times(records: &[SnapshotRecord]) -> Vec<DateTime<Utc>> {
    let mut times: Vec<DateTime<Utc>> = records.iter().map(|r| r.snapshot_time).collect();
    times.sort_unstable();
    times.dedup();
    times
}

/// Earliest time among the last `window` snapshot times (first time if the window covers all)
fn window_start(times: &[DateTime<Utc>], window: usize) -> DateTime<Utc> {
    let idx = times.len().saturating_sub(window.max(1));
    times[idx]
}

fn to_entry(
    profile: &AddressProfile,
    pattern: HolderPattern,
    confidence: Confidence,
    total_snapshots: usize,
) -> PatternEntry {
    let stability_score = (profile.snapshot_count as f64 / total_snapshots as f64)
        * (1.0 - profile.rank_volatility as f64 / 100.0);

    PatternEntry {
        address: profile.address.clone(),
        pattern,
        confidence,
        snapshot_count: profile.snapshot_count,
        earliest_rank: profile.earliest_rank,
        latest_rank: profile.latest_rank,
        avg_rank: profile.avg_rank,
        rank_volatility: profile.rank_volatility,
        avg_percentage: profile.avg_percentage,
        percentage_change: profile.percentage_change,
        stability_score,
        first_seen: profile.first_seen,
        last_seen: profile.last_seen,
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
