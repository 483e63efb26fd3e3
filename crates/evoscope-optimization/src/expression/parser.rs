//! Formula parser using Pest, with a Pratt parser for operator precedence.

use super::ast::{BinaryOp, Expr, Symbol, SymbolTable, UnaryOp};
use super::ValidationError;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::LazyLock;

#[derive(Parser)]
#[grammar = "expression/expression.pest"]
struct FormulaParser;

// Later entries bind tighter. Unary minus sits below `**`, so `-x1**2` is `-(x1**2)`.
static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::add_op, Assoc::Left) | Op::infix(Rule::sub_op, Assoc::Left))
        .op(Op::infix(Rule::mul_op, Assoc::Left) | Op::infix(Rule::div_op, Assoc::Left))
        .op(Op::prefix(Rule::neg_op) | Op::prefix(Rule::pos_op))
        .op(Op::infix(Rule::pow_op, Assoc::Right))
});

/// Parse a normalized formula, resolving every name through `symbols`.
pub(crate) fn parse_formula(input: &str, symbols: &SymbolTable) -> Result<Expr, ValidationError> {
    let formula = FormulaParser::parse(Rule::formula, input)
        .map_err(|e| ValidationError::Syntax(e.to_string()))?
        .next()
        .ok_or_else(|| ValidationError::Syntax("no formula found".to_string()))?;

    let expr = formula
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| ValidationError::Syntax("no expression found".to_string()))?;

    parse_expr(expr, symbols)
}

fn parse_expr(pair: Pair<Rule>, symbols: &SymbolTable) -> Result<Expr, ValidationError> {
    PRATT_PARSER
        .map_primary(|primary| parse_primary(primary, symbols))
        .map_prefix(|op, operand| {
            let operand = operand?;
            Ok(match op.as_rule() {
                Rule::neg_op => Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(operand),
                },
                _ => operand,
            })
        })
        .map_infix(|left, op, right| {
            let op = match op.as_rule() {
                Rule::add_op => BinaryOp::Add,
                Rule::sub_op => BinaryOp::Sub,
                Rule::mul_op => BinaryOp::Mul,
                Rule::div_op => BinaryOp::Div,
                Rule::pow_op => BinaryOp::Pow,
                rule => {
                    return Err(ValidationError::Syntax(format!(
                        "unexpected operator: {:?}",
                        rule
                    )))
                }
            };
            Ok(Expr::Binary {
                left: Box::new(left?),
                op,
                right: Box::new(right?),
            })
        })
        .parse(pair.into_inner())
}

fn parse_primary(pair: Pair<Rule>, symbols: &SymbolTable) -> Result<Expr, ValidationError> {
    match pair.as_rule() {
        Rule::number => {
            let text = pair.as_str();
            text.parse::<f64>()
                .map(Expr::Number)
                .map_err(|e| ValidationError::Syntax(format!("bad number '{}': {}", text, e)))
        }
        Rule::ident => {
            let name = pair.as_str();
            match symbols.resolve(name) {
                Some(Symbol::Variable(index)) => Ok(Expr::Variable(index)),
                Some(Symbol::Constant(value)) => Ok(Expr::Number(value)),
                Some(Symbol::Function(_)) => Err(ValidationError::Misused {
                    name: name.to_string(),
                    reason: "must be called with an argument",
                }),
                None => Err(ValidationError::UnsupportedSymbols(vec![name.to_string()])),
            }
        }
        Rule::call => {
            let mut inner = pair.into_inner();
            let (name, arg) = match (inner.next(), inner.next()) {
                (Some(name), Some(arg)) => (name, arg),
                _ => return Err(ValidationError::Syntax("malformed call".to_string())),
            };
            match symbols.resolve(name.as_str()) {
                Some(Symbol::Function(func)) => Ok(Expr::Call {
                    func,
                    arg: Box::new(parse_expr(arg, symbols)?),
                }),
                Some(_) => Err(ValidationError::Misused {
                    name: name.as_str().to_string(),
                    reason: "is not a function",
                }),
                None => Err(ValidationError::UnsupportedSymbols(vec![name.as_str().to_string()])),
            }
        }
        Rule::expr => parse_expr(pair, symbols),
        rule => Err(ValidationError::Syntax(format!("unexpected token: {:?}", rule))),
    }
}
