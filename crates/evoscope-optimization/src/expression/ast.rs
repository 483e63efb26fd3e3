//! Expression tree and the closed symbol table it is resolved against.

use ndarray::ArrayView1;
use std::collections::BTreeSet;

/// Unary functions callable from an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFunction {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Sqrt,
    Abs,
    Exp,
    /// Natural logarithm.
    Log,
    Log10,
}

impl MathFunction {
    pub const ALL: [MathFunction; 14] = [
        Self::Sin,
        Self::Cos,
        Self::Tan,
        Self::Asin,
        Self::Acos,
        Self::Atan,
        Self::Sinh,
        Self::Cosh,
        Self::Tanh,
        Self::Sqrt,
        Self::Abs,
        Self::Exp,
        Self::Log,
        Self::Log10,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Log10 => "log10",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Asin => x.asin(),
            Self::Acos => x.acos(),
            Self::Atan => x.atan(),
            Self::Sinh => x.sinh(),
            Self::Cosh => x.cosh(),
            Self::Tanh => x.tanh(),
            Self::Sqrt => x.sqrt(),
            Self::Abs => x.abs(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Log10 => x.log10(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Compiled expression tree. Every name has already been resolved, so
/// evaluation never looks anything up.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Zero-based column of the point.
    Variable(usize),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Call {
        func: MathFunction,
        arg: Box<Expr>,
    },
}

impl Expr {
    /// Evaluate at one point. A variable beyond the point's length reads as NaN.
    pub fn eval(&self, point: ArrayView1<f64>) -> f64 {
        match self {
            Expr::Number(v) => *v,
            Expr::Variable(i) => point.get(*i).copied().unwrap_or(f64::NAN),
            Expr::Unary { op: UnaryOp::Neg, expr } => -expr.eval(point),
            Expr::Binary { left, op, right } => {
                let l = left.eval(point);
                let r = right.eval(point);
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Pow => l.powf(r),
                }
            }
            Expr::Call { func, arg } => func.apply(arg.eval(point)),
        }
    }

    /// Highest variable index referenced, plus one.
    pub fn arity(&self) -> usize {
        match self {
            Expr::Number(_) => 0,
            Expr::Variable(i) => i + 1,
            Expr::Unary { expr, .. } => expr.arity(),
            Expr::Binary { left, right, .. } => left.arity().max(right.arity()),
            Expr::Call { arg, .. } => arg.arity(),
        }
    }
}

/// What a name in an expression may refer to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Symbol {
    Variable(usize),
    Constant(f64),
    Function(MathFunction),
}

/// The only names an expression can see: `x1..xN`, `pi`, `e` and the
/// functions in [`MathFunction::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTable {
    dimensions: usize,
}

impl SymbolTable {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        match name {
            "pi" => return Some(Symbol::Constant(std::f64::consts::PI)),
            "e" => return Some(Symbol::Constant(std::f64::consts::E)),
            _ => {}
        }
        if let Some(func) = MathFunction::from_name(name) {
            return Some(Symbol::Function(func));
        }

        let index: usize = name.strip_prefix('x')?.parse().ok()?;
        // Reject spellings such as `x01` that parse to an allowed index.
        if (1..=self.dimensions).contains(&index) && name == format!("x{}", index) {
            Some(Symbol::Variable(index - 1))
        } else {
            None
        }
    }

    pub fn allowed_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = (1..=self.dimensions).map(|i| format!("x{}", i)).collect();
        names.insert("pi".to_string());
        names.insert("e".to_string());
        names.extend(MathFunction::ALL.iter().map(|f| f.name().to_string()));
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_symbol_resolution() {
        let table = SymbolTable::new(3);
        assert_eq!(table.resolve("x1"), Some(Symbol::Variable(0)));
        assert_eq!(table.resolve("x3"), Some(Symbol::Variable(2)));
        assert_eq!(table.resolve("x4"), None);
        assert_eq!(table.resolve("x0"), None);
        assert_eq!(table.resolve("x01"), None);
        assert_eq!(table.resolve("x"), None);
        assert_eq!(table.resolve("log10"), Some(Symbol::Function(MathFunction::Log10)));
        assert_eq!(table.resolve("ln"), None);
        assert_eq!(table.resolve("PI"), None);
        assert_eq!(table.resolve("__import__"), None);
    }

    #[test]
    fn test_allowed_names() {
        let names = SymbolTable::new(2).allowed_names();
        assert_eq!(names.len(), 2 + 2 + MathFunction::ALL.len());
        assert!(names.contains("x2"));
        assert!(!names.contains("x3"));
    }

    #[test]
    fn test_eval_tree() {
        // -(x1 ** 2) + sqrt(x2)
        let expr = Expr::Binary {
            left: Box::new(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(Expr::Binary {
                    left: Box::new(Expr::Variable(0)),
                    op: BinaryOp::Pow,
                    right: Box::new(Expr::Number(2.0)),
                }),
            }),
            op: BinaryOp::Add,
            right: Box::new(Expr::Call {
                func: MathFunction::Sqrt,
                arg: Box::new(Expr::Variable(1)),
            }),
        };
        assert_eq!(expr.eval(array![3.0, 16.0].view()), -5.0);
        assert_eq!(expr.arity(), 2);
        assert!(expr.eval(array![3.0].view()).is_nan());
    }
}
