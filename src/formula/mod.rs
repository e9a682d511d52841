//! The calculated-metric formula mini-language.
//!
//! Formulas reference sibling metrics by `{name}` placeholders and combine
//! them with arithmetic, comparisons, function calls, and `CASE` expressions:
//!
//! ```text
//! {revenue} - {refunds}
//! {revenue} / NULLIF({order_count}, 0)
//! CASE WHEN {order_count} > 100 THEN {revenue} ELSE 0 END
//! ```
//!
//! Parsing lives here so the metric resolver's cycle/depth logic stays
//! independent of operator grammar. The parser is a small precedence-climbing
//! recursive descent over a hand-rolled lexer; placeholders are the only
//! novel token kind.

mod lexer;
mod parser;

pub use lexer::{tokenize, Token};
pub use parser::parse_formula;

use thiserror::Error;

/// Errors raised while lexing or parsing a formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("empty placeholder at offset {offset}")]
    EmptyPlaceholder { offset: usize },

    #[error("unterminated placeholder at offset {offset}")]
    UnterminatedPlaceholder { offset: usize },

    #[error(
        "cross-dataset metric reference '{{{reference}}}' is not supported; \
         placeholders resolve within the owning dataset"
    )]
    CrossDatasetPlaceholder { reference: String },

    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("unexpected token {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: String },

    #[error("unexpected end of formula, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("trailing input after expression: {found}")]
    TrailingInput { found: String },
}

pub type FormulaResult<T> = Result<T, FormulaError>;

/// Binary operators, in formula source spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinaryOp {
    /// Source spelling of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
}

/// One `WHEN … THEN …` arm of a `CASE` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub condition: FormulaExpr,
    pub result: FormulaExpr,
}

/// Parsed formula AST.
///
/// Leaves are placeholders and numeric literals; the metric resolver maps
/// each placeholder to the referenced metric's resolved tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    /// `{name}` reference to a sibling metric.
    Placeholder(String),

    /// Numeric literal.
    Number(f64),

    /// Binary operation.
    Binary {
        op: BinaryOp,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },

    /// Unary operation.
    Unary { op: UnaryOp, expr: Box<FormulaExpr> },

    /// Function call, e.g. `NULLIF({order_count}, 0)`.
    Call { name: String, args: Vec<FormulaExpr> },

    /// Searched `CASE WHEN … THEN … [ELSE …] END`.
    Case {
        when_clauses: Vec<WhenClause>,
        else_clause: Option<Box<FormulaExpr>>,
    },
}

impl FormulaExpr {
    /// Collect referenced placeholder names, left to right, duplicates kept.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_placeholders(&mut out);
        out
    }

    fn collect_placeholders<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FormulaExpr::Placeholder(name) => out.push(name),
            FormulaExpr::Number(_) => {}
            FormulaExpr::Binary { left, right, .. } => {
                left.collect_placeholders(out);
                right.collect_placeholders(out);
            }
            FormulaExpr::Unary { expr, .. } => expr.collect_placeholders(out),
            FormulaExpr::Call { args, .. } => {
                for arg in args {
                    arg.collect_placeholders(out);
                }
            }
            FormulaExpr::Case {
                when_clauses,
                else_clause,
            } => {
                for clause in when_clauses {
                    clause.condition.collect_placeholders(out);
                    clause.result.collect_placeholders(out);
                }
                if let Some(expr) = else_clause {
                    expr.collect_placeholders(out);
                }
            }
        }
    }
}
