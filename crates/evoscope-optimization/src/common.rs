use crate::convergence::ConvergenceConfig;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Invalid construction parameters. Raised before any engine state exists.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Population size must be at least 2 (got {0})")]
    PopulationTooSmall(usize),

    #[error("Dimensions must be at least 2 (got {0})")]
    TooFewDimensions(usize),

    #[error("Expected {expected} bounds, got {actual}")]
    BoundsMismatch { expected: usize, actual: usize },

    #[error("Bound {index} is invalid: [{lower}, {upper}]")]
    InvalidBound { index: usize, lower: f64, upper: f64 },

    #[error("Parameter '{name}' must lie in [0, 1] (got {value})")]
    RateOutOfRange { name: &'static str, value: f64 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub(crate) fn check_rate(name: &'static str, value: f64) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RateOutOfRange { name, value })
    }
}

/// Direction of the search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
    #[default]
    Min,
    Max,
    /// Minimize the distance to a target value.
    Target,
}

impl OptimizationMode {
    /// Lenient parse used for client-supplied labels. Anything unrecognized
    /// (including the empty string) falls back to `Min`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "max" => Self::Max,
            "target" => Self::Target,
            _ => Self::Min,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Target => "target",
        }
    }
}

impl fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode-aware scoring and comparison shared by every engine, so that results
/// of different algorithms run in the same mode are directly comparable.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveAdapter {
    pub mode: OptimizationMode,
    /// Only consulted in `Target` mode.
    pub target_value: f64,
}

impl Default for ObjectiveAdapter {
    fn default() -> Self {
        Self::new(OptimizationMode::Min, 0.0)
    }
}

impl ObjectiveAdapter {
    pub fn new(mode: OptimizationMode, target_value: f64) -> Self {
        Self { mode, target_value }
    }

    pub fn minimize() -> Self {
        Self::new(OptimizationMode::Min, 0.0)
    }

    pub fn maximize() -> Self {
        Self::new(OptimizationMode::Max, 0.0)
    }

    pub fn target(value: f64) -> Self {
        Self::new(OptimizationMode::Target, value)
    }

    /// Raw score after mode transformation.
    pub fn objective_score(&self, raw: f64) -> f64 {
        match self.mode {
            OptimizationMode::Target => (raw - self.target_value).abs(),
            _ => raw,
        }
    }

    pub fn objective_scores(&self, raw: &Array1<f64>) -> Array1<f64> {
        raw.mapv(|r| self.objective_score(r))
    }

    /// Value shown to the user: the distance in target mode, the raw score otherwise.
    pub fn display_score(&self, raw: f64, objective: f64) -> f64 {
        match self.mode {
            OptimizationMode::Target => objective,
            _ => raw,
        }
    }

    /// Strict comparison; ties and NaN are never better.
    pub fn is_better(&self, candidate: f64, current: f64) -> bool {
        match self.mode {
            OptimizationMode::Max => candidate > current,
            _ => candidate < current,
        }
    }

    /// Argmax in `Max` mode, argmin otherwise. The earliest index wins ties;
    /// NaN entries are only chosen when every entry is NaN.
    pub fn best_index(&self, scores: ArrayView1<f64>) -> usize {
        let mut best = 0;
        for (i, &score) in scores.iter().enumerate().skip(1) {
            let current = scores[best];
            if self.is_better(score, current) || (current.is_nan() && !score.is_nan()) {
                best = i;
            }
        }
        best
    }

    /// Sentinel every real score improves on.
    pub fn worst_score(&self) -> f64 {
        match self.mode {
            OptimizationMode::Max => f64::NEG_INFINITY,
            _ => f64::INFINITY,
        }
    }
}

/// Box-bounded search domain: one closed interval per dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl Default for Domain {
    /// The Rastrigin box, `[-5.12, 5.12]` in two dimensions.
    fn default() -> Self {
        Self {
            lower: Array1::from_elem(2, -5.12),
            upper: Array1::from_elem(2, 5.12),
        }
    }
}

impl Domain {
    pub fn new(bounds: &[[f64; 2]]) -> ConfigResult<Self> {
        let domain = Self {
            lower: bounds.iter().map(|b| b[0]).collect(),
            upper: bounds.iter().map(|b| b[1]).collect(),
        };
        domain.validate()?;
        Ok(domain)
    }

    /// Same interval on every axis.
    pub fn uniform(dimensions: usize, lower: f64, upper: f64) -> ConfigResult<Self> {
        Self::new(&vec![[lower, upper]; dimensions])
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.lower.len() != self.upper.len() {
            return Err(ConfigError::BoundsMismatch {
                expected: self.lower.len(),
                actual: self.upper.len(),
            });
        }
        if self.dimensions() < 2 {
            return Err(ConfigError::TooFewDimensions(self.dimensions()));
        }
        for (index, (&lower, &upper)) in self.lower.iter().zip(self.upper.iter()).enumerate() {
            if !lower.is_finite() || !upper.is_finite() || lower >= upper {
                return Err(ConfigError::InvalidBound { index, lower, upper });
            }
        }
        Ok(())
    }

    pub fn dimensions(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    pub fn bounds(&self) -> Vec<[f64; 2]> {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(&lo, &hi)| [lo, hi])
            .collect()
    }

    /// Fresh uniform draw for one coordinate.
    pub fn sample_coordinate<R: Rng>(&self, rng: &mut R, dim: usize) -> f64 {
        rng.gen_range(self.lower[dim]..self.upper[dim])
    }

    /// `count` points drawn uniformly inside the box, one per row.
    pub fn sample<R: Rng>(&self, rng: &mut R, count: usize) -> Array2<f64> {
        let mut population = Array2::zeros((count, self.dimensions()));
        for mut row in population.axis_iter_mut(Axis(0)) {
            for (j, x) in row.iter_mut().enumerate() {
                *x = self.sample_coordinate(rng, j);
            }
        }
        population
    }

    pub fn clamp(&self, dim: usize, value: f64) -> f64 {
        value.clamp(self.lower[dim], self.upper[dim])
    }

    /// Clip every coordinate of every row into its interval.
    pub fn clip(&self, population: &mut Array2<f64>) {
        for mut row in population.axis_iter_mut(Axis(0)) {
            for (j, x) in row.iter_mut().enumerate() {
                *x = self.clamp(j, *x);
            }
        }
    }

    pub fn contains(&self, point: ArrayView1<f64>) -> bool {
        point.len() == self.dimensions()
            && point
                .iter()
                .enumerate()
                .all(|(j, &x)| x >= self.lower[j] && x <= self.upper[j])
    }
}

/// A vectorized objective: one raw score per population row.
pub trait Objective: Send + Sync {
    fn evaluate(&self, population: &Array2<f64>) -> Array1<f64>;

    /// Smallest number of columns `evaluate` can handle.
    fn required_dimensions(&self) -> usize {
        0
    }

    fn describe(&self) -> String {
        "custom objective".to_string()
    }
}

/// An objective defined by a per-point closure.
pub struct FnObjective<F>
where
    F: Fn(ArrayView1<f64>) -> f64 + Send + Sync,
{
    pub func: F,
    pub label: String,
}

impl<F> FnObjective<F>
where
    F: Fn(ArrayView1<f64>) -> f64 + Send + Sync,
{
    pub fn new(label: impl Into<String>, func: F) -> Self {
        Self {
            func,
            label: label.into(),
        }
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(ArrayView1<f64>) -> f64 + Send + Sync,
{
    fn evaluate(&self, population: &Array2<f64>) -> Array1<f64> {
        population.axis_iter(Axis(0)).map(|row| (self.func)(row)).collect()
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Rastrigin function, the default objective when none is supplied.
/// Global minimum 0 at the origin, in any number of dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rastrigin {
    pub a: f64,
}

impl Default for Rastrigin {
    fn default() -> Self {
        Self { a: 10.0 }
    }
}

impl Objective for Rastrigin {
    fn evaluate(&self, population: &Array2<f64>) -> Array1<f64> {
        let n = population.ncols() as f64;
        population
            .axis_iter(Axis(0))
            .map(|row| {
                self.a * n
                    + row
                        .iter()
                        .map(|&x| x * x - self.a * (2.0 * std::f64::consts::PI * x).cos())
                        .sum::<f64>()
            })
            .collect()
    }

    fn describe(&self) -> String {
        "rastrigin".to_string()
    }
}

/// Settings shared by every engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub population_size: usize,
    pub domain: Domain,
    pub adapter: ObjectiveAdapter,
    /// Convergence detection is off when `None`.
    pub convergence: Option<ConvergenceConfig>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            domain: Domain::default(),
            adapter: ObjectiveAdapter::default(),
            convergence: None,
        }
    }
}

impl SolverConfig {
    pub fn new(population_size: usize, domain: Domain, adapter: ObjectiveAdapter) -> Self {
        Self {
            population_size,
            domain,
            adapter,
            convergence: None,
        }
    }

    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.convergence = Some(convergence);
        self
    }

    pub fn dimensions(&self) -> usize {
        self.domain.dimensions()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall(self.population_size));
        }
        self.domain.validate()?;
        if !self.adapter.target_value.is_finite() {
            return Err(ConfigError::InvalidParameter(format!(
                "target value must be finite (got {})",
                self.adapter.target_value
            )));
        }
        if let Some(convergence) = &self.convergence {
            convergence.validate()?;
        }
        Ok(())
    }

    /// Full validation plus a check that `objective` can read every column.
    pub fn validate_for(&self, objective: &dyn Objective) -> ConfigResult<()> {
        self.validate()?;
        let required = objective.required_dimensions();
        if required > self.dimensions() {
            return Err(ConfigError::InvalidParameter(format!(
                "objective '{}' needs {} dimensions, domain has {}",
                objective.describe(),
                required,
                self.dimensions()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_mode_labels() {
        assert_eq!(OptimizationMode::from_label("MAX "), OptimizationMode::Max);
        assert_eq!(OptimizationMode::from_label("target"), OptimizationMode::Target);
        assert_eq!(OptimizationMode::from_label(""), OptimizationMode::Min);
        assert_eq!(OptimizationMode::from_label("maximize"), OptimizationMode::Min);
    }

    #[test]
    fn test_target_scores() {
        let adapter = ObjectiveAdapter::target(3.0);
        assert_eq!(adapter.objective_score(5.0), 2.0);
        assert_eq!(adapter.objective_score(1.0), 2.0);
        assert_eq!(adapter.display_score(5.0, 2.0), 2.0);
        assert!(adapter.is_better(0.5, 2.0));

        let adapter = ObjectiveAdapter::maximize();
        assert_eq!(adapter.objective_score(5.0), 5.0);
        assert_eq!(adapter.display_score(5.0, 5.0), 5.0);
    }

    #[test]
    fn test_best_index_ties_and_nan() {
        let min = ObjectiveAdapter::minimize();
        let max = ObjectiveAdapter::maximize();
        let scores = array![3.0, 1.0, 7.0, 1.0];
        assert_eq!(min.best_index(scores.view()), 1);
        assert_eq!(max.best_index(scores.view()), 2);

        let with_nan = array![f64::NAN, 4.0, 2.0];
        assert_eq!(min.best_index(with_nan.view()), 2);
        assert_eq!(max.best_index(with_nan.view()), 1);
    }

    #[test]
    fn test_worst_score_sentinel() {
        assert_eq!(ObjectiveAdapter::maximize().worst_score(), f64::NEG_INFINITY);
        assert_eq!(ObjectiveAdapter::target(1.0).worst_score(), f64::INFINITY);
        assert!(ObjectiveAdapter::minimize().is_better(1e300, f64::INFINITY));
    }

    #[test]
    fn test_domain_validation() {
        assert!(Domain::new(&[[-1.0, 1.0], [0.0, 2.0]]).is_ok());
        assert_eq!(
            Domain::new(&[[-1.0, 1.0]]),
            Err(ConfigError::TooFewDimensions(1))
        );
        assert!(matches!(
            Domain::new(&[[-1.0, 1.0], [2.0, 2.0]]),
            Err(ConfigError::InvalidBound { index: 1, .. })
        ));
        assert!(Domain::new(&[[f64::NEG_INFINITY, 1.0], [0.0, 1.0]]).is_err());
    }

    #[test]
    fn test_domain_sample_and_clip() {
        let domain = Domain::new(&[[-1.0, 1.0], [10.0, 20.0]]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let population = domain.sample(&mut rng, 100);
        assert_eq!(population.dim(), (100, 2));
        for row in population.rows() {
            assert!(domain.contains(row));
        }

        let mut outside = array![[5.0, 0.0], [-3.0, 25.0]];
        domain.clip(&mut outside);
        assert_eq!(outside, array![[1.0, 10.0], [-1.0, 20.0]]);
    }

    #[test]
    fn test_config_validation() {
        assert!(SolverConfig::default().validate().is_ok());

        let config = SolverConfig {
            population_size: 1,
            ..SolverConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::PopulationTooSmall(1)));
    }

    #[test]
    fn test_rastrigin_origin() {
        let scores = Rastrigin::default().evaluate(&array![[0.0, 0.0], [1.0, 0.0]]);
        assert!(scores[0].abs() < 1e-12);
        assert!((scores[1] - 1.0).abs() < 1e-9);
    }
}
