//! Live search state, immutable snapshots and the append-only history that
//! makes seek/continue possible.

use crate::common::ObjectiveAdapter;
use crate::convergence::{ConvergenceConfig, ConvergenceTracker};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Fields every algorithm captures at the end of an iteration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaseSnapshot {
    pub iteration: usize,
    pub population: Array2<f64>,
    pub best_score: f64,
    pub best_objective: f64,
    pub best_solution: Option<Array1<f64>>,
    pub convergence: Option<ConvergenceTracker>,
}

/// Algorithm-specific snapshot built on top of [`BaseSnapshot`].
pub trait Snapshot: Clone {
    fn base(&self) -> &BaseSnapshot;

    fn iteration(&self) -> usize {
        self.base().iteration
    }

    fn best_score(&self) -> f64 {
        self.base().best_score
    }
}

/// Mutable state shared by all engines.
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationState {
    pub population: Array2<f64>,
    /// Completed `step` calls.
    pub iteration: usize,
    pub best_solution: Option<Array1<f64>>,
    pub best_objective: f64,
    pub best_score: f64,
    pub convergence: Option<ConvergenceTracker>,
}

impl PopulationState {
    pub fn new(
        population: Array2<f64>,
        adapter: &ObjectiveAdapter,
        convergence: Option<ConvergenceConfig>,
    ) -> Self {
        Self {
            population,
            iteration: 0,
            best_solution: None,
            best_objective: adapter.worst_score(),
            best_score: adapter.worst_score(),
            convergence: convergence.map(ConvergenceTracker::new),
        }
    }

    pub fn pop_size(&self) -> usize {
        self.population.nrows()
    }

    pub fn dimensions(&self) -> usize {
        self.population.ncols()
    }

    /// Fold freshly evaluated raw scores into the global best and return the
    /// objective scores. Only a strict improvement overwrites, so the earliest
    /// best survives ties.
    pub fn update_best(&mut self, adapter: &ObjectiveAdapter, raw: &Array1<f64>) -> Array1<f64> {
        let objective = adapter.objective_scores(raw);
        if objective.is_empty() {
            return objective;
        }

        let best_idx = adapter.best_index(objective.view());
        if adapter.is_better(objective[best_idx], self.best_objective) {
            self.best_objective = objective[best_idx];
            self.best_score = adapter.display_score(raw[best_idx], objective[best_idx]);
            self.best_solution = Some(self.population.row(best_idx).to_owned());
        }
        objective
    }

    /// Feed the current best score to the convergence tracker, if enabled.
    pub fn observe_convergence(&mut self) -> bool {
        match self.convergence.as_mut() {
            Some(tracker) => tracker.observe(self.best_score),
            None => false,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.convergence
            .as_ref()
            .map_or(false, ConvergenceTracker::is_converged)
    }

    pub fn snapshot(&self) -> BaseSnapshot {
        BaseSnapshot {
            iteration: self.iteration,
            population: self.population.clone(),
            best_score: self.best_score,
            best_objective: self.best_objective,
            best_solution: self.best_solution.clone(),
            convergence: self.convergence.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &BaseSnapshot) {
        self.iteration = snapshot.iteration;
        self.population = snapshot.population.clone();
        self.best_score = snapshot.best_score;
        self.best_objective = snapshot.best_objective;
        self.best_solution = snapshot.best_solution.clone();
        self.convergence = snapshot.convergence.clone();
    }

    pub fn best(&self) -> BestRecord {
        BestRecord {
            iteration: self.iteration,
            best_score: self.best_score,
            best_objective: self.best_objective,
            best_solution: self.best_solution.as_ref().map(|s| s.to_vec()),
        }
    }
}

/// Append-only list of snapshots. Nothing is ever truncated, so restoring an
/// earlier entry keeps the later ones reachable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct History<S> {
    entries: Vec<S>,
}

impl<S> Default for History<S> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<S> History<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, snapshot: S) {
        self.entries.push(snapshot);
    }

    /// `None` when `index` is past the end.
    pub fn get(&self, index: usize) -> Option<&S> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&S> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest seekable index.
    pub fn max_iteration(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.entries.iter()
    }
}

/// Display payload returned after every command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateView {
    pub iteration: usize,
    pub population: Vec<Vec<f64>>,
    pub best_score: f64,
    pub max_iteration: usize,
    pub converged: bool,
}

impl StateView {
    pub fn new(state: &PopulationState, max_iteration: usize) -> Self {
        Self {
            iteration: state.iteration,
            population: state.population.rows().into_iter().map(|r| r.to_vec()).collect(),
            best_score: state.best_score,
            max_iteration,
            converged: state.is_converged(),
        }
    }
}

/// Best-so-far summary of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    pub iteration: usize,
    pub best_score: f64,
    pub best_objective: f64,
    pub best_solution: Option<Vec<f64>>,
}
