//! Read-only export of a finished comparison and its summary analysis.

use crate::session::{Session, SessionConfig};
use evoscope_optimization::{BestRecord, OptimizationMode, Snapshot, SteppableOptimizer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final values closer than this count as a tie.
pub const TIE_TOLERANCE: f64 = 1e-4;

/// Everything a report needs, copied out of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub params: SessionConfig,
    pub ag_result: BestRecord,
    pub pso_result: BestRecord,
    /// Best display score of every recorded snapshot, in recording order.
    pub history_ag: Vec<f64>,
    pub history_pso: Vec<f64>,
    pub ag_converged_at: Option<usize>,
    pub pso_converged_at: Option<usize>,
}

fn first_converged<O: SteppableOptimizer>(engine: &O) -> Option<usize> {
    engine
        .history()
        .iter()
        .find(|s| {
            s.base()
                .convergence
                .as_ref()
                .map_or(false, |tracker| tracker.is_converged())
        })
        .map(|s| s.iteration())
}

impl ReportData {
    pub fn from_session(session: &Session) -> Self {
        Self {
            params: session.config().clone(),
            ag_result: session.ga().best(),
            pso_result: session.pso().best(),
            history_ag: session.ga().score_history(),
            history_pso: session.pso().score_history(),
            ag_converged_at: first_converged(session.ga()),
            pso_converged_at: first_converged(session.pso()),
        }
    }

    pub fn analyze(&self) -> Analysis {
        let mut analysis = analyze(&self.history_ag, &self.history_pso, self.params.mode());
        analysis.ag_converged_at = self.ag_converged_at;
        analysis.pso_converged_at = self.pso_converged_at;
        analysis
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    #[serde(rename = "GA")]
    Ga,
    #[serde(rename = "PSO")]
    Pso,
    #[serde(rename = "tie")]
    Tie,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Ga => write!(f, "GA"),
            Winner::Pso => write!(f, "PSO"),
            Winner::Tie => write!(f, "tie"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub ag_final: Option<f64>,
    pub pso_final: Option<f64>,
    /// `|first - last|` of each history.
    pub ag_improvement: Option<f64>,
    pub pso_improvement: Option<f64>,
    pub iterations: usize,
    pub winner: Winner,
    pub ag_converged_at: Option<usize>,
    pub pso_converged_at: Option<usize>,
}

fn finite(value: Option<&f64>) -> Option<f64> {
    value.copied().filter(|v| v.is_finite())
}

fn summarize(history: &[f64]) -> (Option<f64>, Option<f64>) {
    let last = finite(history.last());
    let improvement = match (finite(history.first()), last) {
        (Some(first), Some(last)) if history.len() > 1 => Some((first - last).abs()),
        _ => None,
    };
    (last, improvement)
}

/// Compare two best-score histories. The winner follows `mode`: larger finals
/// win in `Max`, smaller ones otherwise (in `Target` the scores are distances).
/// Non-finite entries are treated as missing.
pub fn analyze(history_ag: &[f64], history_pso: &[f64], mode: OptimizationMode) -> Analysis {
    let (ag_final, ag_improvement) = summarize(history_ag);
    let (pso_final, pso_improvement) = summarize(history_pso);

    let winner = match (ag_final, pso_final) {
        (Some(ag), Some(pso)) if (ag - pso).abs() < TIE_TOLERANCE => Winner::Tie,
        (Some(ag), Some(pso)) => {
            let ag_wins = match mode {
                OptimizationMode::Max => ag > pso,
                _ => ag < pso,
            };
            if ag_wins {
                Winner::Ga
            } else {
                Winner::Pso
            }
        }
        _ => Winner::Tie,
    };

    Analysis {
        ag_final,
        pso_final,
        ag_improvement,
        pso_improvement,
        iterations: history_ag.len().max(history_pso.len()),
        winner,
        ag_converged_at: None,
        pso_converged_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winner_follows_mode() {
        let ga = [10.0, 4.0, 1.0];
        let pso = [9.0, 3.0, 2.0];
        assert_eq!(analyze(&ga, &pso, OptimizationMode::Min).winner, Winner::Ga);
        assert_eq!(analyze(&ga, &pso, OptimizationMode::Target).winner, Winner::Ga);
        assert_eq!(analyze(&ga, &pso, OptimizationMode::Max).winner, Winner::Pso);
    }

    #[test]
    fn test_close_finals_tie() {
        let analysis = analyze(&[1.0, 0.50004], &[2.0, 0.5], OptimizationMode::Min);
        assert_eq!(analysis.winner, Winner::Tie);
        assert_eq!(analysis.winner.to_string(), "tie");
    }

    #[test]
    fn test_improvement_and_iterations() {
        let analysis = analyze(&[5.0, 3.0, 2.5], &[4.0], OptimizationMode::Min);
        assert_eq!(analysis.ag_final, Some(2.5));
        assert_eq!(analysis.ag_improvement, Some(2.5));
        assert_eq!(analysis.pso_final, Some(4.0));
        assert_eq!(analysis.pso_improvement, None);
        assert_eq!(analysis.iterations, 3);
    }

    #[test]
    fn test_empty_or_non_finite_histories() {
        let analysis = analyze(&[], &[f64::INFINITY], OptimizationMode::Min);
        assert_eq!(analysis.ag_final, None);
        assert_eq!(analysis.pso_final, None);
        assert_eq!(analysis.winner, Winner::Tie);
        assert_eq!(analysis.iterations, 1);
    }

    #[test]
    fn test_winner_serializes_as_label() {
        let json = serde_json::to_string(&Winner::Pso).unwrap();
        assert_eq!(json, "\"PSO\"");
    }
}
