use crate::algorithms::SteppableOptimizer;
use crate::common::{check_rate, ConfigError, ConfigResult, Objective, SolverConfig};
use crate::state::{BaseSnapshot, History, PopulationState, Snapshot};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaParams {
    pub crossover_rate: f64,
    /// Per-coordinate probability of a uniform reset.
    pub mutation_rate: f64,
    pub tournament_size: usize,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            crossover_rate: 0.7,
            mutation_rate: 0.01,
            tournament_size: 3,
        }
    }
}

impl GaParams {
    pub fn validate(&self) -> ConfigResult<()> {
        check_rate("crossover_rate", self.crossover_rate)?;
        check_rate("mutation_rate", self.mutation_rate)?;
        if self.tournament_size == 0 {
            return Err(ConfigError::InvalidParameter(
                "tournament size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The GA keeps nothing beyond the shared fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaSnapshot {
    pub base: BaseSnapshot,
}

impl Snapshot for GaSnapshot {
    fn base(&self) -> &BaseSnapshot {
        &self.base
    }
}

/// Generational GA: tournament selection, single-point crossover and uniform
/// reset mutation. No elitism; the global best is tracked separately.
pub struct GeneticEngine {
    pub config: SolverConfig,
    pub params: GaParams,
    objective: Arc<dyn Objective>,
    state: PopulationState,
    history: History<GaSnapshot>,
}

impl GeneticEngine {
    pub fn new(
        objective: Arc<dyn Objective>,
        config: SolverConfig,
        params: GaParams,
    ) -> ConfigResult<Self> {
        Self::with_rng(objective, config, params, &mut thread_rng())
    }

    pub fn with_rng<R: Rng>(
        objective: Arc<dyn Objective>,
        config: SolverConfig,
        params: GaParams,
        rng: &mut R,
    ) -> ConfigResult<Self> {
        config.validate_for(objective.as_ref())?;
        params.validate()?;

        let population = config.domain.sample(rng, config.population_size);
        let state = PopulationState::new(population, &config.adapter, config.convergence);

        let mut engine = Self {
            config,
            params,
            objective,
            state,
            history: History::new(),
        };
        engine.evaluate();
        engine.record_state();

        info!(
            population_size = engine.config.population_size,
            dimensions = engine.config.dimensions(),
            mode = %engine.config.adapter.mode,
            objective = %engine.objective.describe(),
            "GA initialized"
        );
        Ok(engine)
    }

    fn evaluate(&mut self) -> Array1<f64> {
        let raw = self.objective.evaluate(&self.state.population);
        self.state.update_best(&self.config.adapter, &raw)
    }

    fn record_state(&mut self) {
        self.history.record(GaSnapshot {
            base: self.state.snapshot(),
        });
    }

    /// One tournament per output slot, each over `tournament_size` indices
    /// drawn with replacement.
    pub fn tournament_selection<R: Rng>(&self, scores: &Array1<f64>, rng: &mut R) -> Array2<f64> {
        let population = &self.state.population;
        let n = population.nrows();
        let mut selected = Array2::zeros(population.dim());

        for mut slot in selected.axis_iter_mut(Axis(0)) {
            let candidates: Vec<usize> = (0..self.params.tournament_size)
                .map(|_| rng.gen_range(0..n))
                .collect();
            let candidate_scores: Array1<f64> = candidates.iter().map(|&i| scores[i]).collect();
            let winner = candidates[self.config.adapter.best_index(candidate_scores.view())];
            slot.assign(&population.row(winner));
        }
        selected
    }

    /// Pairs 0&1, 2&3, ...; an odd tail pairs with the first selected member.
    pub fn crossover_population<R: Rng>(&self, selected: &Array2<f64>, rng: &mut R) -> Array2<f64> {
        let (n, dim) = selected.dim();
        let mut children: Vec<Array1<f64>> = Vec::with_capacity(n + 1);

        for i in (0..n).step_by(2) {
            let p1 = selected.row(i);
            let p2 = if i + 1 < n { selected.row(i + 1) } else { selected.row(0) };

            let (c1, c2) = if rng.gen::<f64>() < self.params.crossover_rate {
                let point = if dim > 1 { rng.gen_range(1..dim) } else { 0 };
                single_point_crossover(p1, p2, point)
            } else {
                (p1.to_owned(), p2.to_owned())
            };
            children.push(c1);
            children.push(c2);
        }
        children.truncate(n);

        let mut next = Array2::zeros((n, dim));
        for (mut row, child) in next.axis_iter_mut(Axis(0)).zip(children.iter()) {
            row.assign(child);
        }
        next
    }

    /// Replace each coordinate with a fresh in-bounds draw with probability
    /// `mutation_rate`.
    pub fn mutate<R: Rng>(&mut self, rng: &mut R) {
        let domain = &self.config.domain;
        let rate = self.params.mutation_rate;
        for mut row in self.state.population.axis_iter_mut(Axis(0)) {
            for (j, x) in row.iter_mut().enumerate() {
                if rng.gen::<f64>() < rate {
                    *x = domain.sample_coordinate(rng, j);
                }
            }
        }
    }

    pub fn objective(&self) -> &Arc<dyn Objective> {
        &self.objective
    }
}

impl SteppableOptimizer for GeneticEngine {
    type Snapshot = GaSnapshot;

    fn name(&self) -> &'static str {
        "GA"
    }

    fn step_with<R: Rng>(&mut self, rng: &mut R) {
        self.state.iteration += 1;
        let scores = self.evaluate();

        let selected = self.tournament_selection(&scores, rng);
        self.state.population = self.crossover_population(&selected, rng);
        self.mutate(rng);

        // Catch an improvement made by this generation before it is recorded.
        self.evaluate();
        self.state.observe_convergence();
        self.record_state();

        debug!(
            iteration = self.state.iteration,
            best_score = self.state.best_score,
            "GA step"
        );
    }

    fn state(&self) -> &PopulationState {
        &self.state
    }

    fn history(&self) -> &History<GaSnapshot> {
        &self.history
    }

    fn restore_state(&mut self, snapshot: &GaSnapshot) {
        self.state.restore(&snapshot.base);
    }
}

/// Swap the tails of two parents at `point`. Every child coordinate is copied
/// from one parent, so in-bounds parents give in-bounds children.
pub fn single_point_crossover(
    p1: ArrayView1<f64>,
    p2: ArrayView1<f64>,
    point: usize,
) -> (Array1<f64>, Array1<f64>) {
    let mut c1 = p1.to_owned();
    let mut c2 = p2.to_owned();
    c1.slice_mut(s![point..]).assign(&p2.slice(s![point..]));
    c2.slice_mut(s![point..]).assign(&p1.slice(s![point..]));
    (c1, c2)
}
