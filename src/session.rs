//! Command dispatcher driving one GA and one PSO side by side over a shared
//! domain and objective.

use crate::error::{SessionError, SessionResult};
use evoscope_optimization::{
    compile, ConfigError, ConfigResult, ConvergenceConfig, Domain, GaParams, GeneticEngine,
    Objective, ObjectiveAdapter, OptimizationMode, PsoParams, Rastrigin, SolverConfig, StateView,
    SteppableOptimizer, SwarmEngine, ValidationError,
};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Half-width of the default box on every axis.
pub const DEFAULT_BOUND: f64 = 5.12;

/// Reset parameters. Every field may be omitted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub pop_size: usize,
    pub dimensions: usize,
    /// One `[lo, hi]` pair per dimension; `[-5.12, 5.12]` everywhere when absent.
    pub bounds: Option<Vec<[f64; 2]>>,
    /// Objective formula. Rastrigin when absent or blank.
    pub function_expr: Option<String>,
    /// `min`, `max` or `target`; anything else reads as `min`.
    pub optimization_mode: String,
    pub target_value: f64,
    pub ag_mutation: f64,
    pub ag_crossover: f64,
    pub pso_w: f64,
    pub pso_c1: f64,
    pub pso_c2: f64,
    pub convergence_enabled: bool,
    pub convergence_threshold: f64,
    pub convergence_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let ga = GaParams::default();
        let pso = PsoParams::default();
        let convergence = ConvergenceConfig::default();
        Self {
            pop_size: 50,
            dimensions: 2,
            bounds: None,
            function_expr: None,
            optimization_mode: OptimizationMode::Min.as_str().to_string(),
            target_value: 0.0,
            ag_mutation: ga.mutation_rate,
            ag_crossover: ga.crossover_rate,
            pso_w: pso.w,
            pso_c1: pso.c1,
            pso_c2: pso.c2,
            convergence_enabled: false,
            convergence_threshold: convergence.threshold,
            convergence_window: convergence.window,
        }
    }
}

impl SessionConfig {
    /// Load from a `.json` file, or YAML for any other extension.
    pub fn from_path(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(serde_yaml::from_str(&text)?)
        }
    }

    pub fn mode(&self) -> OptimizationMode {
        OptimizationMode::from_label(&self.optimization_mode)
    }

    pub fn adapter(&self) -> ObjectiveAdapter {
        ObjectiveAdapter::new(self.mode(), self.target_value)
    }

    /// The trimmed formula, if one was given.
    pub fn expression(&self) -> Option<&str> {
        self.function_expr
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    pub fn domain(&self) -> ConfigResult<Domain> {
        match &self.bounds {
            Some(bounds) => {
                if bounds.len() != self.dimensions {
                    return Err(ConfigError::BoundsMismatch {
                        expected: self.dimensions,
                        actual: bounds.len(),
                    });
                }
                Domain::new(bounds)
            }
            None => Domain::uniform(self.dimensions, -DEFAULT_BOUND, DEFAULT_BOUND),
        }
    }

    pub fn solver_config(&self) -> ConfigResult<SolverConfig> {
        let mut config = SolverConfig::new(self.pop_size, self.domain()?, self.adapter());
        if self.convergence_enabled {
            config = config.with_convergence(ConvergenceConfig {
                threshold: self.convergence_threshold,
                window: self.convergence_window,
            });
        }
        config.validate()?;
        Ok(config)
    }

    pub fn ga_params(&self) -> GaParams {
        GaParams {
            crossover_rate: self.ag_crossover,
            mutation_rate: self.ag_mutation,
            ..GaParams::default()
        }
    }

    pub fn pso_params(&self) -> PsoParams {
        PsoParams {
            w: self.pso_w,
            c1: self.pso_c1,
            c2: self.pso_c2,
        }
    }

    /// Everything except the formula, which is checked separately so that a
    /// bad formula can fall back instead of failing the reset.
    pub fn validate(&self) -> ConfigResult<()> {
        self.solver_config()?;
        self.ga_params().validate()?;
        self.pso_params().validate()
    }
}

/// A client message, tagged by its `action` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Command {
    Step,
    Seek { iteration: usize },
    Continue,
    Reset(SessionConfig),
}

impl Command {
    const ACTIONS: [&'static str; 4] = ["step", "seek", "continue", "reset"];

    /// Parse a JSON message. Text that is not JSON is read as a bare action
    /// name, so `step` works as well as `{"action": "step"}`.
    pub fn parse(message: &str) -> SessionResult<Self> {
        let message = message.trim();
        let value: serde_json::Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(_) => return Self::from_bare(message),
        };

        let action = match &value {
            serde_json::Value::String(action) => return Self::from_bare(action),
            serde_json::Value::Object(fields) => match fields.get("action") {
                Some(serde_json::Value::String(action)) => action.clone(),
                Some(other) => return Err(SessionError::UnknownAction(other.to_string())),
                None => return Err(SessionError::MissingAction),
            },
            _ => return Err(SessionError::MissingAction),
        };

        if !Self::ACTIONS.contains(&action.as_str()) {
            return Err(SessionError::UnknownAction(action));
        }
        Ok(serde_json::from_value(value)?)
    }

    fn from_bare(action: &str) -> SessionResult<Self> {
        match action.trim() {
            "step" => Ok(Command::Step),
            "continue" => Ok(Command::Continue),
            "reset" => Ok(Command::Reset(SessionConfig::default())),
            "" => Err(SessionError::MissingAction),
            other => Err(SessionError::UnknownAction(other.to_string())),
        }
    }
}

/// Reply to every command: both states, plus an error message when the
/// command was refused or only partly honored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub ag: StateView,
    pub pso: StateView,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

fn default_objective() -> Arc<dyn Objective> {
    Arc::new(Rastrigin::default())
}

fn build_engines<R: Rng>(
    config: &SessionConfig,
    objective: Arc<dyn Objective>,
    rng: &mut R,
) -> ConfigResult<(GeneticEngine, SwarmEngine)> {
    let solver = config.solver_config()?;
    let ga = GeneticEngine::with_rng(objective.clone(), solver.clone(), config.ga_params(), rng)?;
    let pso = SwarmEngine::with_rng(objective, solver, config.pso_params(), rng)?;
    Ok((ga, pso))
}

/// One GA and one PSO instance, replaced wholesale on reset.
///
/// Commands must be fed one at a time; the session does no locking of its own.
pub struct Session {
    config: SessionConfig,
    objective: Arc<dyn Objective>,
    ga: GeneticEngine,
    pso: SwarmEngine,
}

impl Session {
    /// Build a session. Unlike [`Session::reset`], an invalid formula is an
    /// error here since there is no previous objective to fall back to.
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        Self::with_rng(config, &mut thread_rng())
    }

    pub fn with_rng<R: Rng>(config: SessionConfig, rng: &mut R) -> SessionResult<Self> {
        config.validate()?;
        let objective: Arc<dyn Objective> = match config.expression() {
            Some(expr) => Arc::new(compile(expr, config.dimensions)?),
            None => default_objective(),
        };
        let (ga, pso) = build_engines(&config, objective.clone(), rng)?;

        info!(
            pop_size = config.pop_size,
            dimensions = config.dimensions,
            objective = %objective.describe(),
            "session started"
        );
        Ok(Self {
            config,
            objective,
            ga,
            pso,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn objective(&self) -> &Arc<dyn Objective> {
        &self.objective
    }

    pub fn ga(&self) -> &GeneticEngine {
        &self.ga
    }

    pub fn pso(&self) -> &SwarmEngine {
        &self.pso
    }

    /// Parse and run one message. Never fails: problems are reported in the
    /// response's `error` field alongside the current states.
    pub fn handle(&mut self, message: &str) -> SessionResponse {
        self.handle_with(message, &mut thread_rng())
    }

    pub fn handle_with<R: Rng>(&mut self, message: &str, rng: &mut R) -> SessionResponse {
        match Command::parse(message) {
            Ok(command) => self.execute_with(command, rng),
            Err(e) => {
                warn!(error = %e, "command rejected");
                self.respond(Some(e.to_string()))
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> SessionResponse {
        self.execute_with(command, &mut thread_rng())
    }

    pub fn execute_with<R: Rng>(&mut self, command: Command, rng: &mut R) -> SessionResponse {
        let error = match command {
            Command::Step => {
                self.step_with(rng);
                None
            }
            Command::Seek { iteration } => self.seek(iteration).err().map(|e| e.to_string()),
            Command::Continue => {
                self.resume_latest();
                None
            }
            Command::Reset(config) => match self.reset_with(config, rng) {
                Ok(rejected) => rejected.map(|e| e.to_string()),
                Err(e) => Some(e.to_string()),
            },
        };
        self.respond(error)
    }

    pub fn step(&mut self) {
        self.step_with(&mut thread_rng());
    }

    pub fn step_with<R: Rng>(&mut self, rng: &mut R) {
        self.ga.step_with(rng);
        self.pso.step_with(rng);
        debug!(
            ga_best = self.ga.state().best_score,
            pso_best = self.pso.state().best_score,
            "session step"
        );
    }

    /// Restore both instances to `iteration`, or neither.
    pub fn seek(&mut self, iteration: usize) -> SessionResult<()> {
        if self.ga.get_state_at(iteration).is_none() || self.pso.get_state_at(iteration).is_none()
        {
            return Err(SessionError::IterationNotAvailable(iteration));
        }
        self.ga.seek(iteration);
        self.pso.seek(iteration);
        Ok(())
    }

    /// Jump both instances to their most recently recorded snapshot.
    pub fn resume_latest(&mut self) {
        self.ga.resume_latest();
        self.pso.resume_latest();
    }

    pub fn reset(&mut self, config: SessionConfig) -> SessionResult<Option<ValidationError>> {
        self.reset_with(config, &mut thread_rng())
    }

    /// Replace both instances. Invalid settings leave the session untouched.
    /// A formula that fails validation does not abort the reset: the previous
    /// objective is kept when it still fits the requested dimensions,
    /// Rastrigin otherwise, and the rejection is returned for the caller to
    /// surface.
    pub fn reset_with<R: Rng>(
        &mut self,
        config: SessionConfig,
        rng: &mut R,
    ) -> SessionResult<Option<ValidationError>> {
        config.validate()?;

        let (objective, rejected) = match config.expression() {
            None => (default_objective(), None),
            Some(expr) => match compile(expr, config.dimensions) {
                Ok(compiled) => (Arc::new(compiled) as Arc<dyn Objective>, None),
                Err(e) => {
                    let fallback = if self.objective.required_dimensions() <= config.dimensions {
                        self.objective.clone()
                    } else {
                        default_objective()
                    };
                    warn!(
                        error = %e,
                        fallback = %fallback.describe(),
                        "expression rejected, falling back"
                    );
                    (fallback, Some(e))
                }
            },
        };

        let (ga, pso) = build_engines(&config, objective.clone(), rng)?;
        info!(
            pop_size = config.pop_size,
            dimensions = config.dimensions,
            mode = %config.mode(),
            objective = %objective.describe(),
            "session reset"
        );

        self.config = config;
        self.objective = objective;
        self.ga = ga;
        self.pso = pso;
        Ok(rejected)
    }

    /// Both instances have flagged convergence.
    pub fn converged(&self) -> bool {
        self.ga.state().is_converged() && self.pso.state().is_converged()
    }

    pub fn state(&self) -> SessionResponse {
        self.respond(None)
    }

    fn respond(&self, error: Option<String>) -> SessionResponse {
        SessionResponse {
            ag: self.ga.get_state(),
            pso: self.pso.get_state(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_commands() {
        assert_eq!(Command::parse(r#"{"action": "step"}"#).unwrap(), Command::Step);
        assert_eq!(
            Command::parse(r#"{"action": "seek", "iteration": 7}"#).unwrap(),
            Command::Seek { iteration: 7 }
        );
        assert_eq!(Command::parse(r#"{"action":"continue"}"#).unwrap(), Command::Continue);

        match Command::parse(r#"{"action": "reset", "pop_size": 12, "pso_w": 0.9}"#).unwrap() {
            Command::Reset(config) => {
                assert_eq!(config.pop_size, 12);
                assert_eq!(config.pso_w, 0.9);
                assert_eq!(config.ag_crossover, 0.7);
                assert_eq!(config.dimensions, 2);
            }
            other => panic!("expected reset, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_actions() {
        assert_eq!(Command::parse("step").unwrap(), Command::Step);
        assert_eq!(Command::parse(" continue\n").unwrap(), Command::Continue);
        assert_eq!(
            Command::parse("reset").unwrap(),
            Command::Reset(SessionConfig::default())
        );
        assert_eq!(Command::parse(r#""step""#).unwrap(), Command::Step);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Command::parse("jump"),
            Err(SessionError::UnknownAction(a)) if a == "jump"
        ));
        assert!(matches!(
            Command::parse(r#"{"action": "delete"}"#),
            Err(SessionError::UnknownAction(_))
        ));
        assert!(matches!(
            Command::parse(r#"{"iteration": 3}"#),
            Err(SessionError::MissingAction)
        ));
        assert!(matches!(
            Command::parse(r#"{"action": "seek"}"#),
            Err(SessionError::Json(_))
        ));
    }

    #[test]
    fn test_config_domain() {
        let config = SessionConfig {
            dimensions: 3,
            ..SessionConfig::default()
        };
        assert_eq!(config.domain().unwrap().bounds(), vec![[-5.12, 5.12]; 3]);

        let mismatched = SessionConfig {
            bounds: Some(vec![[-1.0, 1.0]]),
            ..SessionConfig::default()
        };
        assert!(mismatched.validate().is_err());
    }

    #[test]
    fn test_unknown_mode_reads_as_min() {
        let config = SessionConfig {
            optimization_mode: "sideways".to_string(),
            ..SessionConfig::default()
        };
        assert_eq!(config.mode(), OptimizationMode::Min);
    }
}
