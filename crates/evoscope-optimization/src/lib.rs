//! Steppable population-based optimizers with full rewind support.
//!
//! Every engine records a snapshot after construction and after each step, so
//! any computed iteration can be restored exactly and the search resumed.

pub mod algorithms;
pub mod benchmarks;
pub mod common;
pub mod convergence;
pub mod expression;
pub mod state;

/// Re-export common types
pub use algorithms::{
    DeParams, DifferentialEngine, GaParams, GeneticEngine, PsoParams, SteppableOptimizer,
    SwarmEngine,
};
pub use common::*;
pub use convergence::{ConvergenceConfig, ConvergenceTracker};
pub use expression::{compile, CompiledExpression, ValidationError};
pub use state::{BestRecord, History, PopulationState, Snapshot, StateView};
