//! Standard two-dimensional test functions, expressed as formulas so they go
//! through the same compiler as user input.

use crate::common::{ConfigResult, Domain};
use crate::expression::{compile, CompiledExpression, ValidationError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Benchmark {
    pub key: &'static str,
    pub name: &'static str,
    pub expression: &'static str,
    pub dimensions: usize,
    /// Same interval on every axis.
    pub bounds: [f64; 2],
    pub global_min: f64,
    /// One point where `global_min` is attained.
    pub minimizer: [f64; 2],
}

impl Benchmark {
    pub fn compile(&self) -> Result<CompiledExpression, ValidationError> {
        compile(self.expression, self.dimensions)
    }

    pub fn domain(&self) -> ConfigResult<Domain> {
        Domain::uniform(self.dimensions, self.bounds[0], self.bounds[1])
    }
}

pub const BENCHMARKS: [Benchmark; 8] = [
    Benchmark {
        key: "rastrigin",
        name: "Rastrigin",
        expression: "10 * 2 + (x1^2 - 10 * cos(2 * pi * x1)) + (x2^2 - 10 * cos(2 * pi * x2))",
        dimensions: 2,
        bounds: [-5.12, 5.12],
        global_min: 0.0,
        minimizer: [0.0, 0.0],
    },
    Benchmark {
        key: "sphere",
        name: "Sphere",
        expression: "x1^2 + x2^2",
        dimensions: 2,
        bounds: [-10.0, 10.0],
        global_min: 0.0,
        minimizer: [0.0, 0.0],
    },
    Benchmark {
        key: "rosenbrock",
        name: "Rosenbrock (Banana)",
        expression: "100 * (x2 - x1^2)^2 + (1 - x1)^2",
        dimensions: 2,
        bounds: [-5.0, 10.0],
        global_min: 0.0,
        minimizer: [1.0, 1.0],
    },
    Benchmark {
        key: "ackley",
        name: "Ackley",
        expression: "-20 * exp(-0.2 * sqrt(0.5 * (x1^2 + x2^2))) - exp(0.5 * (cos(2 * pi * x1) + cos(2 * pi * x2))) + e + 20",
        dimensions: 2,
        bounds: [-5.0, 5.0],
        global_min: 0.0,
        minimizer: [0.0, 0.0],
    },
    Benchmark {
        key: "himmelblau",
        name: "Himmelblau",
        expression: "(x1^2 + x2 - 11)^2 + (x1 + x2^2 - 7)^2",
        dimensions: 2,
        bounds: [-5.0, 5.0],
        global_min: 0.0,
        minimizer: [3.0, 2.0],
    },
    Benchmark {
        key: "beale",
        name: "Beale",
        expression: "(1.5 - x1 + x1*x2)^2 + (2.25 - x1 + x1*x2^2)^2 + (2.625 - x1 + x1*x2^3)^2",
        dimensions: 2,
        bounds: [-4.5, 4.5],
        global_min: 0.0,
        minimizer: [3.0, 0.5],
    },
    Benchmark {
        key: "booth",
        name: "Booth",
        expression: "(x1 + 2*x2 - 7)^2 + (2*x1 + x2 - 5)^2",
        dimensions: 2,
        bounds: [-10.0, 10.0],
        global_min: 0.0,
        minimizer: [1.0, 3.0],
    },
    Benchmark {
        key: "matyas",
        name: "Matyas",
        expression: "0.26*(x1^2 + x2^2) - 0.48*x1*x2",
        dimensions: 2,
        bounds: [-10.0, 10.0],
        global_min: 0.0,
        minimizer: [0.0, 0.0],
    },
];

/// Case-insensitive lookup by key.
pub fn lookup(key: &str) -> Option<&'static Benchmark> {
    let key = key.trim();
    BENCHMARKS.iter().find(|b| b.key.eq_ignore_ascii_case(key))
}
