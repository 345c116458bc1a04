//! Run summaries and multi-seed sweep statistics

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::core::config::{SimulationConfig, METRIC_MAX, METRIC_MIN};
use crate::core::error::Result;
use crate::sim::engine::Run;
use crate::sim::record::TurnRecord;
use crate::sim::scenario::Scenario;
use crate::sim::state::FactionMetric;

/// A run counts as collapsed when support bottomed out at this value...
const COLLAPSE_SUPPORT: f64 = 0.0;
/// ...while average unrest stayed at or above this
const COLLAPSE_UNREST: f64 = 70.0;

/// Aggregate view of one run's records
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub turns: u64,
    /// Turns that ended bankrupt
    pub bankruptcies: u64,
    /// Turns that ended in a riot
    pub riots: u64,
    pub avg_public_support: f64,
    pub min_public_support: f64,
    pub avg_unrest: f64,
    /// Faction-turns spent pinned at 0 or 100 power
    pub faction_clamp_hits: u64,
    pub final_factions: Vec<FactionMetric>,
    pub event_counts: BTreeMap<String, u64>,
}

impl RunSummary {
    pub fn from_records(records: &[TurnRecord]) -> Self {
        let mut bankruptcies = 0;
        let mut riots = 0;
        let mut support_total = 0.0;
        let mut unrest_total = 0.0;
        let mut min_public_support = METRIC_MAX;
        let mut faction_clamp_hits = 0;
        let mut event_counts = BTreeMap::new();

        for record in records {
            let state = &record.state;
            bankruptcies += u64::from(record.bankrupt);
            riots += u64::from(record.riot);
            support_total += state.public_support;
            unrest_total += state.unrest;
            min_public_support = min_public_support.min(state.public_support);
            faction_clamp_hits += state
                .factions
                .iter()
                .filter(|f| f.power <= METRIC_MIN || f.power >= METRIC_MAX)
                .count() as u64;
            if let Some(id) = &record.event_id {
                *event_counts.entry(id.clone()).or_insert(0) += 1;
            }
        }

        let turns = records.len() as u64;
        let divisor = records.len().max(1) as f64;
        Self {
            turns,
            bankruptcies,
            riots,
            avg_public_support: support_total / divisor,
            min_public_support,
            avg_unrest: unrest_total / divisor,
            faction_clamp_hits,
            final_factions: records
                .last()
                .map(|r| r.state.factions.clone())
                .unwrap_or_default(),
            event_counts,
        }
    }

    pub fn collapsed(&self) -> bool {
        self.turns > 0
            && self.min_public_support <= COLLAPSE_SUPPORT
            && self.avg_unrest >= COLLAPSE_UNREST
    }
}

/// One seed's line in a sweep
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub seed: u64,
    pub riots: u64,
    pub bankruptcies: u64,
    pub avg_public_support: f64,
    pub avg_unrest: f64,
    pub min_public_support: f64,
    pub faction_clamp_hits: u64,
    pub collapsed: bool,
}

impl SweepRow {
    pub fn new(seed: u64, summary: &RunSummary) -> Self {
        Self {
            seed,
            riots: summary.riots,
            bankruptcies: summary.bankruptcies,
            avg_public_support: summary.avg_public_support,
            avg_unrest: summary.avg_unrest,
            min_public_support: summary.min_public_support,
            faction_clamp_hits: summary.faction_clamp_hits,
            collapsed: summary.collapsed(),
        }
    }
}

/// Mean and population standard deviation
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub std: f64,
}

impl MetricStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Distribution of the sweep metrics over a seed range
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepStats {
    pub runs: usize,
    pub riots: MetricStats,
    pub bankruptcies: MetricStats,
    pub avg_public_support: MetricStats,
    pub avg_unrest: MetricStats,
    pub min_public_support: MetricStats,
    pub faction_clamp_hits: MetricStats,
    /// Share of runs that collapsed, in `[0, 1]`
    pub collapse_rate: f64,
}

impl SweepStats {
    pub fn from_rows(rows: &[SweepRow]) -> Self {
        let stats = |f: fn(&SweepRow) -> f64| {
            let values: Vec<f64> = rows.iter().map(f).collect();
            MetricStats::from_values(&values)
        };
        let collapsed = rows.iter().filter(|r| r.collapsed).count();

        Self {
            runs: rows.len(),
            riots: stats(|r| r.riots as f64),
            bankruptcies: stats(|r| r.bankruptcies as f64),
            avg_public_support: stats(|r| r.avg_public_support),
            avg_unrest: stats(|r| r.avg_unrest),
            min_public_support: stats(|r| r.min_public_support),
            faction_clamp_hits: stats(|r| r.faction_clamp_hits as f64),
            collapse_rate: collapsed as f64 / rows.len().max(1) as f64,
        }
    }
}

/// Play one scenario for `turns` turns and summarize it
pub fn run_scenario(
    scenario: Scenario,
    seed: u64,
    turns: u64,
    config: &SimulationConfig,
) -> Result<RunSummary> {
    let mut run = Run::with_config(scenario.initial_state(), seed, config.clone())?;
    let log = run.run_turns(turns)?;
    run.complete();
    Ok(RunSummary::from_records(log.records()))
}

/// Run every seed in `seeds` (inclusive) in parallel, one independent run each.
/// Rows come back in seed order.
pub fn sweep(
    scenario: Scenario,
    seeds: RangeInclusive<u64>,
    turns: u64,
    config: &SimulationConfig,
) -> Result<Vec<SweepRow>> {
    tracing::info!("Sweeping {} over seeds {:?} ({} turns)", scenario, seeds, turns);
    seeds
        .into_par_iter()
        .map(|seed| -> Result<SweepRow> {
            let summary = run_scenario(scenario, seed, turns, config)?;
            Ok(SweepRow::new(seed, &summary))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::SimulationState;

    fn record(turn: u64, support: f64, unrest: f64, event: Option<&str>) -> TurnRecord {
        let mut state: SimulationState = Scenario::Baseline.initial_state();
        state.turn = turn;
        state.public_support = support;
        state.unrest = unrest;
        TurnRecord {
            turn,
            state,
            event_id: event.map(str::to_string),
            choice: None,
            rng_draw: None,
            bankrupt: turn % 2 == 0,
            riot: false,
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut pinned = record(2, 0.0, 80.0, Some("tax-reform"));
        pinned.state.factions[0].power = 100.0;
        pinned.state.factions[1].power = 0.0;
        let records = vec![
            record(1, 40.0, 60.0, Some("tax-reform")),
            pinned,
            record(3, 20.0, 100.0, Some("black-market")),
        ];

        let summary = RunSummary::from_records(&records);
        assert_eq!(summary.turns, 3);
        assert_eq!(summary.bankruptcies, 1);
        assert_eq!(summary.riots, 0);
        assert_eq!(summary.min_public_support, 0.0);
        assert!((summary.avg_public_support - 20.0).abs() < 1e-9);
        assert!((summary.avg_unrest - 80.0).abs() < 1e-9);
        assert_eq!(summary.faction_clamp_hits, 2);
        assert_eq!(summary.event_counts.get("tax-reform"), Some(&2));
        assert_eq!(summary.event_counts.get("black-market"), Some(&1));
        assert_eq!(summary.final_factions.len(), 5);
        assert!(summary.collapsed());
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::from_records(&[]);
        assert_eq!(summary.turns, 0);
        assert_eq!(summary.avg_unrest, 0.0);
        assert!(summary.final_factions.is_empty());
        assert!(!summary.collapsed());
    }

    #[test]
    fn test_population_std() {
        let stats = MetricStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std, 2.0);
        assert_eq!(MetricStats::from_values(&[]), MetricStats::default());
    }

    #[test]
    fn test_sweep_stats_collapse_rate() {
        let summary = RunSummary::from_records(&[record(1, 50.0, 20.0, None)]);
        let mut rows: Vec<SweepRow> = (0..4).map(|seed| SweepRow::new(seed, &summary)).collect();
        rows[3].collapsed = true;

        let stats = SweepStats::from_rows(&rows);
        assert_eq!(stats.runs, 4);
        assert_eq!(stats.collapse_rate, 0.25);
        assert_eq!(stats.avg_unrest.std, 0.0);
    }

    #[test]
    fn test_parallel_sweep_matches_sequential_runs() {
        let config = SimulationConfig::default();
        let rows = sweep(Scenario::Famine, 3..=6, 40, &config).unwrap();
        assert_eq!(rows.iter().map(|r| r.seed).collect::<Vec<_>>(), vec![3, 4, 5, 6]);

        for row in &rows {
            let summary = run_scenario(Scenario::Famine, row.seed, 40, &config).unwrap();
            assert_eq!(row, &SweepRow::new(row.seed, &summary));
        }
    }
}
