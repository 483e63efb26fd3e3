use crate::algorithms::SteppableOptimizer;
use crate::common::{check_rate, ConfigError, ConfigResult, Objective, SolverConfig};
use crate::state::{BaseSnapshot, History, PopulationState, Snapshot};
use ndarray::Array1;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// DE/rand/1/bin needs three donors distinct from the target.
const MIN_POPULATION: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeParams {
    pub f: f64,  // Scaling factor
    pub cr: f64, // Crossover probability
}

impl Default for DeParams {
    fn default() -> Self {
        Self { f: 0.8, cr: 0.9 }
    }
}

impl DeParams {
    pub fn validate(&self) -> ConfigResult<()> {
        check_rate("cr", self.cr)?;
        if !self.f.is_finite() || self.f < 0.0 {
            return Err(ConfigError::InvalidParameter(format!(
                "DE scaling factor must be a non-negative number (got {})",
                self.f
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeSnapshot {
    pub base: BaseSnapshot,
    pub fitness: Array1<f64>,
    pub objective_fitness: Array1<f64>,
}

impl Snapshot for DeSnapshot {
    fn base(&self) -> &BaseSnapshot {
        &self.base
    }
}

pub struct DifferentialEngine {
    pub config: SolverConfig,
    pub params: DeParams,
    objective: Arc<dyn Objective>,
    state: PopulationState,
    /// Raw scores of the current population.
    fitness: Array1<f64>,
    objective_fitness: Array1<f64>,
    history: History<DeSnapshot>,
}

impl DifferentialEngine {
    pub fn new(
        objective: Arc<dyn Objective>,
        config: SolverConfig,
        params: DeParams,
    ) -> ConfigResult<Self> {
        Self::with_rng(objective, config, params, &mut thread_rng())
    }

    pub fn with_rng<R: Rng>(
        objective: Arc<dyn Objective>,
        config: SolverConfig,
        params: DeParams,
        rng: &mut R,
    ) -> ConfigResult<Self> {
        config.validate_for(objective.as_ref())?;
        params.validate()?;
        if config.population_size < MIN_POPULATION {
            return Err(ConfigError::InvalidParameter(format!(
                "differential evolution needs at least {} members (got {})",
                MIN_POPULATION, config.population_size
            )));
        }

        let population = config.domain.sample(rng, config.population_size);
        let state = PopulationState::new(population, &config.adapter, config.convergence);

        let mut engine = Self {
            config,
            params,
            objective,
            state,
            fitness: Array1::zeros(0),
            objective_fitness: Array1::zeros(0),
            history: History::new(),
        };
        engine.evaluate();
        engine.record_state();

        info!(
            population_size = engine.config.population_size,
            dimensions = engine.config.dimensions(),
            mode = %engine.config.adapter.mode,
            "DE initialized"
        );
        Ok(engine)
    }

    fn evaluate(&mut self) {
        let raw = self.objective.evaluate(&self.state.population);
        self.objective_fitness = self.state.update_best(&self.config.adapter, &raw);
        self.fitness = raw;
    }

    fn record_state(&mut self) {
        self.history.record(DeSnapshot {
            base: self.state.snapshot(),
            fitness: self.fitness.clone(),
            objective_fitness: self.objective_fitness.clone(),
        });
    }

    pub fn fitness(&self) -> &Array1<f64> {
        &self.fitness
    }

    fn pick_donors<R: Rng>(rng: &mut R, n: usize, exclude: usize) -> [usize; 3] {
        let mut idxs = [0; 3];
        for k in 0..3 {
            loop {
                let r = rng.gen_range(0..n);
                if r != exclude && !idxs[0..k].contains(&r) {
                    idxs[k] = r;
                    break;
                }
            }
        }
        idxs
    }
}

impl SteppableOptimizer for DifferentialEngine {
    type Snapshot = DeSnapshot;

    fn name(&self) -> &'static str {
        "DE"
    }

    fn step_with<R: Rng>(&mut self, rng: &mut R) {
        self.state.iteration += 1;

        let (n, dim) = self.state.population.dim();
        let population = &self.state.population;
        let domain = &self.config.domain;
        let mut trials = population.clone();

        for i in 0..n {
            let [a, b, c] = Self::pick_donors(rng, n, i);
            let j_rand = rng.gen_range(0..dim); // Ensure at least one parameter changes

            for j in 0..dim {
                if rng.gen::<f64>() < self.params.cr || j == j_rand {
                    let donor = population[[a, j]]
                        + self.params.f * (population[[b, j]] - population[[c, j]]);
                    trials[[i, j]] = domain.clamp(j, donor);
                }
            }
        }

        // Greedy selection; an equal trial replaces the target.
        let adapter = self.config.adapter;
        let trial_objective = adapter.objective_scores(&self.objective.evaluate(&trials));
        for i in 0..n {
            let (trial, current) = (trial_objective[i], self.objective_fitness[i]);
            if adapter.is_better(trial, current) || trial == current {
                self.state.population.row_mut(i).assign(&trials.row(i));
            }
        }

        self.evaluate();
        self.state.observe_convergence();
        self.record_state();

        debug!(
            iteration = self.state.iteration,
            best_score = self.state.best_score,
            "DE step"
        );
    }

    fn state(&self) -> &PopulationState {
        &self.state
    }

    fn history(&self) -> &History<DeSnapshot> {
        &self.history
    }

    fn restore_state(&mut self, snapshot: &DeSnapshot) {
        self.state.restore(&snapshot.base);
        self.fitness = snapshot.fitness.clone();
        self.objective_fitness = snapshot.objective_fitness.clone();
    }
}
