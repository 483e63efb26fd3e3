pub mod de;
pub mod ga;
pub mod pso;

pub use de::{DeParams, DeSnapshot, DifferentialEngine};
pub use ga::{single_point_crossover, GaParams, GaSnapshot, GeneticEngine};
pub use pso::{PsoParams, PsoSnapshot, SwarmEngine};

use crate::state::{BestRecord, History, PopulationState, Snapshot, StateView};
use rand::{thread_rng, Rng};
use tracing::debug;

/// An engine that advances one iteration at a time and can be rewound to any
/// iteration it has already computed.
pub trait SteppableOptimizer {
    type Snapshot: Snapshot;

    fn name(&self) -> &'static str;

    /// One iteration using the caller's random source.
    fn step_with<R: Rng>(&mut self, rng: &mut R);

    fn state(&self) -> &PopulationState;

    fn history(&self) -> &History<Self::Snapshot>;

    /// Overwrite all live fields from `snapshot`. History is left untouched.
    fn restore_state(&mut self, snapshot: &Self::Snapshot);

    fn step(&mut self) {
        let mut rng = thread_rng();
        self.step_with(&mut rng);
    }

    fn get_state(&self) -> StateView {
        StateView::new(self.state(), self.history().max_iteration())
    }

    fn get_state_at(&self, index: usize) -> Option<&Self::Snapshot> {
        self.history().get(index)
    }

    /// Restore snapshot `index`. Returns `false`, leaving the live state
    /// alone, when that iteration was never computed.
    fn seek(&mut self, index: usize) -> bool {
        match self.get_state_at(index).cloned() {
            Some(snapshot) => {
                debug!(algorithm = self.name(), index, "seek");
                self.restore_state(&snapshot);
                true
            }
            None => false,
        }
    }

    /// Restore the most recently recorded snapshot.
    fn resume_latest(&mut self) -> bool {
        match self.history().latest().cloned() {
            Some(snapshot) => {
                debug!(algorithm = self.name(), iteration = snapshot.iteration(), "continue");
                self.restore_state(&snapshot);
                true
            }
            None => false,
        }
    }

    fn best(&self) -> BestRecord {
        self.state().best()
    }

    /// Best display score per recorded snapshot, in history order.
    fn score_history(&self) -> Vec<f64> {
        self.history().iter().map(|s| s.best_score()).collect()
    }
}
