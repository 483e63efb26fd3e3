//! Safe compilation of user-typed formulas into objectives.
//!
//! A formula is normalized, every identifier in the normalized text is checked
//! against a closed allowlist, and only then is it parsed into an [`Expr`]
//! tree. The tree holds resolved variable indices, constants and function
//! tags, so evaluation has no way to reach any name outside the table.

pub mod ast;
pub mod normalize;
mod parser;

pub use ast::{BinaryOp, Expr, MathFunction, Symbol, SymbolTable, UnaryOp};
pub use normalize::{extract_identifiers, normalize};

use crate::common::Objective;
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

/// Why a formula was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Expression is empty.")]
    Empty,

    #[error("Dimensions must be at least 2 (got {0}).")]
    Dimensions(usize),

    #[error("Unsupported symbol(s): {}", .0.join(", "))]
    UnsupportedSymbols(Vec<String>),

    #[error("Invalid expression: {0}")]
    Syntax(String),

    #[error("'{name}' {reason}")]
    Misused { name: String, reason: &'static str },
}

/// Compile `expr` over variables `x1..x{dimensions}`.
pub fn compile(expr: &str, dimensions: usize) -> Result<CompiledExpression, ValidationError> {
    if expr.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    if dimensions < 2 {
        return Err(ValidationError::Dimensions(dimensions));
    }

    let normalized = normalize(expr);
    let symbols = SymbolTable::new(dimensions);

    // The allowlist runs over the whole normalized text before parsing.
    let unsupported: Vec<String> = extract_identifiers(&normalized)
        .into_iter()
        .filter(|name| symbols.resolve(name).is_none())
        .collect();
    if !unsupported.is_empty() {
        return Err(ValidationError::UnsupportedSymbols(unsupported));
    }

    let ast = parser::parse_formula(&normalized, &symbols)?;
    debug!(expression = %normalized, dimensions, "expression compiled");

    Ok(CompiledExpression {
        source: expr.to_string(),
        normalized,
        dimensions,
        ast,
    })
}

/// A validated formula, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    normalized: String,
    dimensions: usize,
    ast: Expr,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn evaluate_point(&self, point: ArrayView1<f64>) -> f64 {
        self.ast.eval(point)
    }
}

impl Objective for CompiledExpression {
    /// Rows are evaluated in parallel; column `i` binds to `x{i+1}`.
    fn evaluate(&self, population: &Array2<f64>) -> Array1<f64> {
        let scores: Vec<f64> = (0..population.nrows())
            .into_par_iter()
            .map(|i| self.ast.eval(population.row(i)))
            .collect();
        Array1::from_vec(scores)
    }

    fn required_dimensions(&self) -> usize {
        self.dimensions
    }

    fn describe(&self) -> String {
        self.normalized.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rejects_unknown_symbol() {
        let err = compile("sin(x1) + y1", 2).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedSymbols(vec!["y1".to_string()]));
        assert_eq!(err.to_string(), "Unsupported symbol(s): y1");
    }

    #[test]
    fn test_lists_every_unknown_symbol_sorted() {
        let err = compile("x3 + foo(x1) + bar", 2).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported symbol(s): bar, foo, x3");
    }

    #[test]
    fn test_symbol_glued_to_number_is_named() {
        let err = compile("2y1 + x1", 2).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported symbol(s): y1");

        // Allowed names pass the allowlist and fail in the grammar instead.
        assert!(matches!(compile("2x1", 2), Err(ValidationError::Syntax(_))));
    }

    #[test]
    fn test_sum_of_squares() {
        let f = compile("x1^2 + x2^2", 2).unwrap();
        assert_eq!(f.normalized(), "x1**2 + x2**2");
        assert_eq!(f.evaluate_point(array![3.0, 4.0].view()), 25.0);

        let population = array![[3.0, 4.0], [0.0, 0.0], [1.0, -1.0]];
        assert_eq!(f.evaluate(&population), array![25.0, 0.0, 2.0]);
    }

    #[test]
    fn test_empty_and_dimension_errors() {
        assert_eq!(compile("   ", 2).unwrap_err(), ValidationError::Empty);
        assert_eq!(compile("x1", 1).unwrap_err(), ValidationError::Dimensions(1));
        assert_eq!(
            ValidationError::Dimensions(1).to_string(),
            "Dimensions must be at least 2 (got 1)."
        );
    }

    #[test]
    fn test_host_names_are_unreachable() {
        for hostile in [
            "__import__('os').system('ls')",
            "open('/etc/passwd')",
            "x1.__class__",
            "eval(x1)",
            "std::process::exit(1)",
            "globals()",
        ] {
            assert!(compile(hostile, 2).is_err(), "'{}' must be rejected", hostile);
        }
    }

    #[test]
    fn test_unicode_and_subscripts() {
        let f = compile("x_1 × x_{2} − ln(e)", 2).unwrap();
        assert_eq!(f.evaluate_point(array![2.0, 3.0].view()), 5.0);
        assert_eq!(f.source(), "x_1 × x_{2} − ln(e)");
    }

    #[test]
    fn test_syntax_error_surfaces() {
        assert!(matches!(compile("x1 +* x2", 2), Err(ValidationError::Syntax(_))));
    }

    #[test]
    fn test_parallel_evaluation_keeps_row_order() {
        let f = compile("x1 * 100 + x2", 2).unwrap();
        let population = Array2::from_shape_fn((257, 2), |(i, j)| (i * (1 - j)) as f64);
        let scores = f.evaluate(&population);
        assert_eq!(scores.len(), 257);
        for (i, row) in population.rows().into_iter().enumerate() {
            assert_eq!(scores[i], f.evaluate_point(row));
            assert_eq!(scores[i], (i * 100) as f64);
        }
    }

    #[test]
    fn test_objective_metadata() {
        let f = compile("x1 + x2 + x3", 3).unwrap();
        assert_eq!(f.required_dimensions(), 3);
        assert_eq!(f.describe(), "x1 + x2 + x3");
    }
}
