use crate::algorithms::SteppableOptimizer;
use crate::common::{ConfigError, ConfigResult, Objective, SolverConfig};
use crate::state::{BaseSnapshot, History, PopulationState, Snapshot};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PsoParams {
    pub w: f64,  // Inertia weight
    pub c1: f64, // Cognitive weight (pbest)
    pub c2: f64, // Social weight (gbest)
}

impl Default for PsoParams {
    fn default() -> Self {
        Self {
            w: 0.5,
            c1: 1.5,
            c2: 1.5,
        }
    }
}

impl PsoParams {
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [("w", self.w), ("c1", self.c1), ("c2", self.c2)] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter(format!(
                    "PSO coefficient '{}' must be finite (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PsoSnapshot {
    pub base: BaseSnapshot,
    pub velocities: Array2<f64>,
    pub pbest: Array2<f64>,
    pub pbest_scores: Array1<f64>,
}

impl Snapshot for PsoSnapshot {
    fn base(&self) -> &BaseSnapshot {
        &self.base
    }
}

/// Global-best PSO with position clipping at the domain walls.
pub struct SwarmEngine {
    pub config: SolverConfig,
    pub params: PsoParams,
    objective: Arc<dyn Objective>,
    state: PopulationState,
    velocities: Array2<f64>,
    pbest: Array2<f64>,
    pbest_scores: Array1<f64>,
    history: History<PsoSnapshot>,
}

impl SwarmEngine {
    pub fn new(
        objective: Arc<dyn Objective>,
        config: SolverConfig,
        params: PsoParams,
    ) -> ConfigResult<Self> {
        Self::with_rng(objective, config, params, &mut thread_rng())
    }

    pub fn with_rng<R: Rng>(
        objective: Arc<dyn Objective>,
        config: SolverConfig,
        params: PsoParams,
        rng: &mut R,
    ) -> ConfigResult<Self> {
        config.validate_for(objective.as_ref())?;
        params.validate()?;

        let n = config.population_size;
        let population = config.domain.sample(rng, n);
        let velocities = Array2::zeros(population.dim());
        let pbest = population.clone();
        let pbest_scores = Array1::from_elem(n, config.adapter.worst_score());
        let state = PopulationState::new(population, &config.adapter, config.convergence);

        let mut engine = Self {
            config,
            params,
            objective,
            state,
            velocities,
            pbest,
            pbest_scores,
            history: History::new(),
        };
        engine.evaluate();
        engine.record_state();

        info!(
            population_size = n,
            dimensions = engine.config.dimensions(),
            mode = %engine.config.adapter.mode,
            objective = %engine.objective.describe(),
            "PSO initialized"
        );
        Ok(engine)
    }

    /// Evaluate the swarm and update personal and global bests, each only on
    /// strict improvement.
    fn evaluate(&mut self) {
        let raw = self.objective.evaluate(&self.state.population);
        let objective = self.state.update_best(&self.config.adapter, &raw);

        for (i, &score) in objective.iter().enumerate() {
            if self.config.adapter.is_better(score, self.pbest_scores[i]) {
                self.pbest.row_mut(i).assign(&self.state.population.row(i));
                self.pbest_scores[i] = score;
            }
        }
    }

    fn record_state(&mut self) {
        self.history.record(PsoSnapshot {
            base: self.state.snapshot(),
            velocities: self.velocities.clone(),
            pbest: self.pbest.clone(),
            pbest_scores: self.pbest_scores.clone(),
        });
    }

    pub fn velocities(&self) -> &Array2<f64> {
        &self.velocities
    }

    pub fn pbest(&self) -> &Array2<f64> {
        &self.pbest
    }

    pub fn pbest_scores(&self) -> &Array1<f64> {
        &self.pbest_scores
    }

    pub fn objective(&self) -> &Arc<dyn Objective> {
        &self.objective
    }
}

impl SteppableOptimizer for SwarmEngine {
    type Snapshot = PsoSnapshot;

    fn name(&self) -> &'static str {
        "PSO"
    }

    fn step_with<R: Rng>(&mut self, rng: &mut R) {
        self.state.iteration += 1;

        let shape = self.state.population.dim();
        let r1 = Array2::from_shape_fn(shape, |_| rng.gen::<f64>());
        let r2 = Array2::from_shape_fn(shape, |_| rng.gen::<f64>());

        // Without any finite score yet there is no gbest; drop the social term.
        let gbest = self.state.best_solution.clone();
        let PsoParams { w, c1, c2 } = self.params;

        for ((i, j), x) in self.state.population.indexed_iter_mut() {
            let g = gbest.as_ref().map_or(*x, |g| g[j]);
            let v = w * self.velocities[[i, j]]
                + c1 * r1[[i, j]] * (self.pbest[[i, j]] - *x)
                + c2 * r2[[i, j]] * (g - *x);
            self.velocities[[i, j]] = v;
            *x += v;
        }

        // Only positions are clipped; velocities keep their full magnitude.
        self.config.domain.clip(&mut self.state.population);

        self.evaluate();
        self.state.observe_convergence();
        self.record_state();

        debug!(
            iteration = self.state.iteration,
            best_score = self.state.best_score,
            "PSO step"
        );
    }

    fn state(&self) -> &PopulationState {
        &self.state
    }

    fn history(&self) -> &History<PsoSnapshot> {
        &self.history
    }

    fn restore_state(&mut self, snapshot: &PsoSnapshot) {
        self.state.restore(&snapshot.base);
        self.velocities = snapshot.velocities.clone();
        self.pbest = snapshot.pbest.clone();
        self.pbest_scores = snapshot.pbest_scores.clone();
    }
}
