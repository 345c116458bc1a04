//! Turn engine - one seeded run and the per-turn pipeline

use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::core::config::{ConditionConfig, SimulationConfig, METRIC_MAX};
use crate::core::error::{Result, SimError};
use crate::sim::catalog::{BUREAUCRATS, COURT_FACTIONS, MERCHANTS, WARLORDS};
use crate::sim::events::{apply_effect, select, Catalog, SimRng};
use crate::sim::record::{TurnLog, TurnRecord};
use crate::sim::state::{clamp_metric, Deltas, SimulationState};

/// Neutral point of the percentage metrics the baseline rules pull around
const METRIC_MIDPOINT: f64 = 50.0;

/// Lifecycle of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Created with a starting state and seed, no turn played yet
    Initialized,
    Running,
    /// The caller declared the run finished
    Completed,
    /// An invariant broke; the run cannot continue
    Failed,
}

/// One simulation run: owns its state, its RNG stream and its config.
///
/// Runs share nothing, so independent runs can be driven from different
/// threads. A single run is strictly sequential.
#[derive(Clone, Debug)]
pub struct Run {
    state: SimulationState,
    rng: SimRng,
    seed: u64,
    config: SimulationConfig,
    catalog: Catalog,
    faction_ids: Vec<String>,
    phase: RunPhase,
}

impl Run {
    /// Start a run with the default config and the standard catalog
    pub fn new(initial_state: SimulationState, seed: u64) -> Result<Self> {
        Self::with_config(initial_state, seed, SimulationConfig::default())
    }

    pub fn with_config(
        initial_state: SimulationState,
        seed: u64,
        config: SimulationConfig,
    ) -> Result<Self> {
        Self::with_catalog(initial_state, seed, config, Catalog::standard())
    }

    pub fn with_catalog(
        initial_state: SimulationState,
        seed: u64,
        config: SimulationConfig,
        catalog: Catalog,
    ) -> Result<Self> {
        config.validate()?;
        initial_state.validate(&config.bounds)?;

        let faction_ids = initial_state.factions.iter().map(|f| f.id.clone()).collect();
        tracing::info!(
            "Run initialized: seed={} turn={} factions={} events={}",
            seed,
            initial_state.turn,
            initial_state.factions.len(),
            catalog.len()
        );

        Ok(Self {
            state: initial_state,
            rng: SimRng::seed_from_u64(seed),
            seed,
            config,
            catalog,
            faction_ids,
            phase: RunPhase::Initialized,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn turn(&self) -> u64 {
        self.state.turn
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Borrow the live state
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Detached copy of the live state
    pub fn current_state(&self) -> SimulationState {
        self.state.snapshot()
    }

    /// Stop the run; later `advance` calls fail
    pub fn complete(&mut self) {
        if self.phase != RunPhase::Failed {
            self.phase = RunPhase::Completed;
        }
    }

    /// Play one turn.
    ///
    /// The turn runs against copies of the state and stream. They replace the
    /// live ones only when every invariant holds, so a failing turn leaves the
    /// run at its last good state and yields no record.
    pub fn advance(&mut self) -> Result<TurnRecord> {
        match self.phase {
            RunPhase::Initialized | RunPhase::Running => {}
            RunPhase::Completed => {
                return Err(SimError::invalid_state("advance called on a completed run"));
            }
            RunPhase::Failed => {
                return Err(SimError::invalid_state(
                    "advance called on a failed run; start a fresh run",
                ));
            }
        }

        let mut state = self.state.clone();
        let mut rng = self.rng.clone();
        match self.play_turn(&mut state, &mut rng) {
            Ok(record) => {
                self.state = state;
                self.rng = rng;
                self.phase = RunPhase::Running;
                Ok(record)
            }
            Err(err) => {
                tracing::error!("Run seed={} failed on turn {}: {}", self.seed, self.state.turn, err);
                self.phase = RunPhase::Failed;
                Err(err)
            }
        }
    }

    /// Drive `turns` advances and collect the records
    pub fn run_turns(&mut self, turns: u64) -> Result<TurnLog> {
        let mut log = TurnLog::new();
        for _ in 0..turns {
            log.push(self.advance()?);
        }
        Ok(log)
    }

    fn play_turn(&self, state: &mut SimulationState, rng: &mut SimRng) -> Result<TurnRecord> {
        let bounds = &self.config.bounds;

        // 1-2. Baseline rules, then clamp
        apply_baseline(state, &self.config);
        state.clamp_all(bounds);

        // 3-5. Pick at most one event and apply it on the same stream
        let eligible = self.catalog.eligible(state);
        let selection = select(&eligible, rng);
        let choice = selection.event.map(|event| {
            let outcome = apply_effect(state, event, rng, bounds);
            tracing::debug!(
                "Turn {}: event {} ({}) chose {} [draw {:?}]",
                state.turn + 1,
                event.id,
                event.title,
                outcome.choice,
                selection.draw
            );
            outcome.choice.to_string()
        });

        // 6. Clamp again, then verify
        state.clamp_all(bounds);
        self.check_invariants(state)?;

        let bankrupt = is_bankrupt(state, &self.config.conditions);
        let riot = is_riot(state, &self.config.conditions);
        if bankrupt && state.history_flags.insert(BANKRUPT_FLAG.to_string()) {
            tracing::warn!("Treasury exhausted on turn {}: {:.2}", state.turn + 1, state.treasury);
        }
        if riot && state.history_flags.insert(RIOT_FLAG.to_string()) {
            tracing::warn!("First riot on turn {}: unrest {:.2}", state.turn + 1, state.unrest);
        }

        // 7-8. Close the turn
        state.turn = state
            .turn
            .checked_add(1)
            .ok_or_else(|| SimError::invalid_state("turn counter overflow"))?;

        Ok(TurnRecord {
            turn: state.turn,
            state: state.snapshot(),
            event_id: selection.event.map(|e| e.id.to_string()),
            choice,
            rng_draw: selection.draw,
            bankrupt,
            riot,
        })
    }

    fn check_invariants(&self, state: &SimulationState) -> Result<()> {
        let same_factions = state.factions.len() == self.faction_ids.len()
            && state
                .factions
                .iter()
                .zip(&self.faction_ids)
                .all(|(f, id)| &f.id == id);
        if !same_factions {
            return Err(SimError::invalid_state(format!(
                "faction set changed: expected {:?}, found {:?}",
                self.faction_ids,
                state.faction_ids()
            )));
        }

        if let Some(problem) = state.domain_violation(&self.config.bounds) {
            return Err(SimError::invalid_state(problem));
        }
        Ok(())
    }
}

/// History flag set the first time the treasury runs dry
pub const BANKRUPT_FLAG: &str = "condition:bankrupt";
/// History flag set the first time the capital riots
pub const RIOT_FLAG: &str = "condition:riot";

/// Deterministic per-turn drift. Reads the state as it was at the start of
/// the turn and applies every delta in one step.
///
/// Court realms draw income from the bureaucrats and merchants, and feel
/// pressure from the warlords. Other realms use the flat fallback rates and
/// the strongest faction instead.
pub fn apply_baseline(state: &mut SimulationState, config: &SimulationConfig) {
    let b = &config.baseline;
    let fallback = &config.fallback;

    let spread = state.power_spread();
    let shortage = (b.food_target - state.food).max(0.0);

    let court = court_pressures(state);
    let (income, military, decay, consumption) = match court {
        Some((income_power, warlords)) => (income_power / b.income_divisor, warlords, 0.0, 0.0),
        None => (
            fallback.treasury_drift,
            state.max_power(),
            fallback.unrest_decay,
            fallback.food_consumption,
        ),
    };

    let deltas = Deltas {
        treasury: income
            - spread / b.spread_treasury_divisor
            - shortage / b.shortage_treasury_divisor,
        public_support: (state.legitimacy - METRIC_MIDPOINT) / b.legitimacy_support_divisor
            - spread / b.spread_support_divisor
            - shortage / b.shortage_support_divisor,
        stability: (state.public_support - METRIC_MIDPOINT) / b.support_stability_divisor
            - spread / b.spread_stability_divisor
            - shortage / b.shortage_stability_divisor,
        unrest: -decay
            + (b.unrest_support_floor - state.public_support).max(0.0) / b.unrest_support_divisor
            + (military - b.unrest_power_ceiling).max(0.0) / b.unrest_power_divisor
            + (b.unrest_food_floor - state.food).max(0.0) / b.unrest_food_divisor
            - (state.stability - b.unrest_stability_ceiling).max(0.0) / b.unrest_stability_divisor,
        food: -consumption,
        legitimacy: 0.0,
    };
    let approval = (state.stability - METRIC_MIDPOINT) / fallback.stability_approval_divisor;

    state.apply_deltas(&deltas, &config.bounds);
    if court.is_none() {
        for faction in &mut state.factions {
            faction.approval = clamp_metric(faction.approval + approval);
        }
    }
}

/// Combined bureaucrat and merchant power, and warlord power, when the realm
/// seats every court faction
fn court_pressures(state: &SimulationState) -> Option<(f64, f64)> {
    if !COURT_FACTIONS.iter().all(|id| state.faction(id).is_some()) {
        return None;
    }
    let income_power = state.power_of(BUREAUCRATS)? + state.power_of(MERCHANTS)?;
    Some((income_power, state.power_of(WARLORDS)?))
}

/// True when the realm seats every court faction and follows the court rules
pub fn is_court_realm(state: &SimulationState) -> bool {
    court_pressures(state).is_some()
}

pub fn is_bankrupt(state: &SimulationState, conditions: &ConditionConfig) -> bool {
    state.treasury <= conditions.bankruptcy_line
}

/// Mass unrest: weak support, shaky order and high unrest together, or
/// unrest pinned at its ceiling.
pub fn is_riot(state: &SimulationState, conditions: &ConditionConfig) -> bool {
    let unrest_maxed = state.unrest >= METRIC_MAX;
    let uprising = state.public_support <= conditions.riot_support_max
        && state.stability <= conditions.riot_stability_max
        && state.unrest >= conditions.riot_unrest_min;
    unrest_maxed || uprising
}

/// Create a run from a caller-supplied starting state
pub fn create_run(initial_state: SimulationState, seed: u64) -> Result<Run> {
    Run::new(initial_state, seed)
}

pub fn advance(run: &mut Run) -> Result<TurnRecord> {
    run.advance()
}

pub fn current_state(run: &Run) -> SimulationState {
    run.current_state()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Bounds;
    use crate::sim::events::{pick_weighted, EventDefinition, EventOutcome};
    use crate::sim::scenario::Scenario;
    use crate::sim::state::FactionMetric;
    use rand::Rng;

    fn two_faction_state() -> SimulationState {
        SimulationState::new(
            vec![
                FactionMetric::new("A", 50.0, 50.0),
                FactionMetric::new("B", 50.0, 50.0),
            ],
            1000.0,
            10.0,
            &Bounds::default(),
        )
        .unwrap()
    }

    fn always(_: &SimulationState) -> bool {
        true
    }

    fn poison_treasury(state: &mut SimulationState, _: &mut SimRng, _: &Bounds) -> EventOutcome {
        state.treasury = f64::NAN;
        EventOutcome { choice: "poison" }
    }

    fn drop_faction(state: &mut SimulationState, _: &mut SimRng, _: &Bounds) -> EventOutcome {
        state.factions.pop();
        EventOutcome { choice: "purge" }
    }

    fn broken_catalog(effect: fn(&mut SimulationState, &mut SimRng, &Bounds) -> EventOutcome) -> Catalog {
        Catalog::new(vec![EventDefinition {
            id: "broken",
            title: "Broken",
            weight: 1.0,
            once_only: false,
            choices: &["poison", "purge"],
            eligibility: always,
            effect,
        }])
        .unwrap()
    }

    #[test]
    fn test_create_run_rejects_invalid_state() {
        let mut state = two_faction_state();
        state.factions[1].id = "A".into();
        assert!(matches!(create_run(state, 1), Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_create_run_rejects_invalid_config() {
        let mut config = SimulationConfig::default();
        config.bounds.treasury_ceiling = config.bounds.treasury_floor;
        let err = Run::with_config(two_faction_state(), 1, config).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn test_first_turn_uses_first_draw_of_stream() {
        let mut run = create_run(two_faction_state(), 42).unwrap();
        assert_eq!(run.phase(), RunPhase::Initialized);

        // After the baseline step only the first-turn, legitimacy and support
        // events apply to a neutral two-faction realm
        let mut drifted = two_faction_state();
        apply_baseline(&mut drifted, run.config());
        let catalog = Catalog::standard();
        let eligible = catalog.eligible(&drifted);
        let ids: Vec<_> = eligible.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["granary-crackdown", "royal-guard", "black-market"]);

        let draw: f64 = SimRng::seed_from_u64(42).gen();
        let expected = pick_weighted(&eligible, draw).map(|e| e.id);

        let record = advance(&mut run).unwrap();
        assert_eq!(run.phase(), RunPhase::Running);
        assert_eq!(record.turn, 1);
        assert_eq!(record.rng_draw, Some(draw));
        assert_eq!(record.event_id.as_deref(), expected);
        assert!(record.choice.is_some());
        assert_eq!(current_state(&run), record.state);
    }

    #[test]
    fn test_two_faction_first_record_is_pinned() {
        let mut run = create_run(two_faction_state(), 42).unwrap();
        let record = run.advance().unwrap();

        assert_eq!(record.turn, 1);
        assert_eq!(record.event_id.as_deref(), Some("royal-guard"));
        assert_eq!(record.choice.as_deref(), Some("delay"));
        assert_eq!(record.rng_draw, Some(0.6818961923066714));
        assert_eq!(record.state.treasury, 1002.0);
        assert_eq!(record.state.unrest, 9.5);
        assert_eq!(record.state.stability, 48.0);
        assert_eq!(record.state.legitimacy, 49.0);
        assert_eq!(record.state.food, 49.75);
        assert_eq!(record.state.public_support, 50.0);
        assert!(record.state.factions.iter().all(|f| f.power == 50.0 && f.approval == 50.0));
        assert!(record.state.history_flags.contains("royal-guard"));
        assert!(!record.bankrupt);
        assert!(!record.riot);
        assert_eq!(run.state(), &record.state);
    }

    #[test]
    fn test_baseline_deltas_on_neutral_realm() {
        let mut state = two_faction_state();
        assert!(!is_court_realm(&state));
        apply_baseline(&mut state, &SimulationConfig::default());
        assert_eq!(state.treasury, 1002.0);
        assert_eq!(state.unrest, 9.5);
        assert_eq!(state.food, 49.75);
        assert_eq!(state.public_support, 50.0);
        assert_eq!(state.stability, 50.0);
        assert_eq!(state.factions[0].approval, 50.0);
    }

    #[test]
    fn test_baseline_court_realm_follows_court_rules() {
        let mut state = Scenario::Baseline.initial_state();
        assert!(is_court_realm(&state));
        apply_baseline(&mut state, &SimulationConfig::default());

        // bureaucrats 52 + merchants 48 income; royal 58 vs warlords 41 spread
        let spread = 17.0;
        assert!((state.treasury - (55.0 + 100.0 / 50.0 - spread / 60.0)).abs() < 1e-9);
        assert!((state.public_support - (57.0 + 8.0 / 18.0 - spread / 55.0)).abs() < 1e-9);
        assert!((state.stability - (62.0 + 7.0 / 20.0 - spread / 65.0)).abs() < 1e-9);
        // No decay; royal power above 55 does not count, only the warlords do
        assert!((state.unrest - (24.0 - 2.0 / 22.0)).abs() < 1e-9);
        assert_eq!(state.food, 60.0);
        assert!(state.factions.iter().all(|f| f.approval == 50.0));
    }

    #[test]
    fn test_baseline_warlord_pressure() {
        let mut state = Scenario::Warlord.initial_state();
        apply_baseline(&mut state, &SimulationConfig::default());
        // warlords 68 over the 55 ceiling; stability 52 gives no relief
        assert!((state.unrest - (24.0 + 13.0 / 18.0)).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_shortage_and_spread_pressure() {
        let mut state = Scenario::Famine.initial_state();
        let before = state.clone();
        apply_baseline(&mut state, &SimulationConfig::default());
        // royal 58 vs warlords 41: spread 17; food 32: shortage 18
        let expected_treasury = before.treasury + 100.0 / 50.0 - 17.0 / 60.0 - 18.0 / 25.0;
        assert!((state.treasury - expected_treasury).abs() < 1e-9);
        assert!(state.unrest > before.unrest);
        assert_eq!(state.food, before.food);
    }

    #[test]
    fn test_fallback_rates_ignored_by_court_realm() {
        let mut config = SimulationConfig::default();
        config.fallback.treasury_drift = -500.0;
        config.fallback.unrest_decay = 50.0;
        config.fallback.food_consumption = 30.0;

        let mut with_fallback = Scenario::Baseline.initial_state();
        let mut plain = with_fallback.clone();
        apply_baseline(&mut with_fallback, &config);
        apply_baseline(&mut plain, &SimulationConfig::default());
        assert_eq!(with_fallback, plain);

        let mut realm = two_faction_state();
        apply_baseline(&mut realm, &config);
        assert_eq!(realm.treasury, 500.0);
        assert_eq!(realm.unrest, 0.0);
    }

    #[test]
    fn test_completed_run_refuses_advance() {
        let mut run = create_run(two_faction_state(), 7).unwrap();
        run.advance().unwrap();
        run.complete();
        assert_eq!(run.phase(), RunPhase::Completed);
        let err = run.advance().unwrap_err();
        assert!(matches!(err, SimError::InvalidState(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_nan_effect_fails_run_without_record() {
        let mut run = Run::with_catalog(
            two_faction_state(),
            3,
            SimulationConfig::default(),
            broken_catalog(poison_treasury),
        )
        .unwrap();
        let before = run.current_state();

        let err = run.advance().unwrap_err();
        assert!(matches!(err, SimError::InvalidState(_)));
        assert_eq!(run.phase(), RunPhase::Failed);
        assert_eq!(run.current_state(), before);

        // Fatal: no retry succeeds
        assert!(run.advance().is_err());
        run.complete();
        assert_eq!(run.phase(), RunPhase::Failed);
    }

    #[test]
    fn test_vanished_faction_is_invalid_state() {
        let mut run = Run::with_catalog(
            two_faction_state(),
            3,
            SimulationConfig::default(),
            broken_catalog(drop_faction),
        )
        .unwrap();
        let err = run.advance().unwrap_err();
        assert!(err.to_string().contains("faction set changed"));
    }

    #[test]
    fn test_bankruptcy_and_riot_flags() {
        let mut config = SimulationConfig::default();
        config.bounds.treasury_floor = -50.0;
        let mut state = two_faction_state();
        state.treasury = -40.0;
        state.unrest = 100.0;
        state.public_support = 20.0;
        state.stability = 30.0;

        let mut run = Run::with_config(state, 9, config).unwrap();
        let record = run.advance().unwrap();
        assert!(record.bankrupt);
        assert!(record.riot);
        assert!(record.state.treasury < 0.0);
        assert!(record.state.treasury >= -50.0);
        assert!(record.state.unrest <= 100.0);
        assert!(record.state.history_flags.contains(BANKRUPT_FLAG));
        assert!(record.state.history_flags.contains(RIOT_FLAG));
    }

    #[test]
    fn test_riot_predicate() {
        let conditions = ConditionConfig::default();
        let mut state = Scenario::Baseline.initial_state();
        assert!(!is_riot(&state, &conditions));
        state.public_support = 25.0;
        state.stability = 35.0;
        state.unrest = 65.0;
        assert!(is_riot(&state, &conditions));

        let mut calm = Scenario::Baseline.initial_state();
        calm.unrest = 100.0;
        assert!(is_riot(&calm, &conditions));
        calm.unrest = 99.9;
        assert!(!is_riot(&calm, &conditions));

        calm.treasury = 0.0;
        assert!(is_bankrupt(&calm, &conditions));
        calm.treasury = 0.01;
        assert!(!is_bankrupt(&calm, &conditions));
    }

    #[test]
    fn test_run_turns_collects_sequential_records() {
        let mut run = create_run(Scenario::Baseline.initial_state(), 1).unwrap();
        let log = run.run_turns(120).unwrap();
        assert_eq!(log.len(), 120);
        for (i, record) in log.records().iter().enumerate() {
            assert_eq!(record.turn, i as u64 + 1);
            assert_eq!(record.state.turn, record.turn);
        }
    }
}
