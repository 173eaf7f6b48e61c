mod agg;
mod program;

use std::fmt;

pub use agg::*;
use ordered_float::OrderedFloat;
pub use program::*;

use crate::types::{DataType, Datum, Row};

/// Comparison, logic and arithmetic operators over scalar expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl BinaryOperator {
    /// `<`, `<=`, `>`, `>=`: the operators an index range lookup can consume.
    pub fn is_range_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Lt | BinaryOperator::LtEq | BinaryOperator::Gt | BinaryOperator::GtEq
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        };
        write!(f, "{}", s)
    }
}

/// A scalar expression over the columns of a single input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarExpr {
    /// Reference to an input column by ordinal.
    InputRef(usize),
    Constant(Datum),
    BinaryOp {
        op: BinaryOperator,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },
    /// Explicit type conversion; the AVG split introduces these so the
    /// recomposed quotient keeps the single-stage output type.
    Cast {
        data_type: DataType,
        expr: Box<ScalarExpr>,
    },
}

impl ScalarExpr {
    pub fn input_ref(ordinal: usize) -> Self {
        ScalarExpr::InputRef(ordinal)
    }

    pub fn constant(datum: impl Into<Datum>) -> Self {
        ScalarExpr::Constant(datum.into())
    }

    pub fn binary(op: BinaryOperator, left: ScalarExpr, right: ScalarExpr) -> Self {
        ScalarExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn cast(data_type: DataType, expr: ScalarExpr) -> Self {
        ScalarExpr::Cast {
            data_type,
            expr: Box::new(expr),
        }
    }

    /// `InputRef(c) op const` (or the mirror image) against a single column;
    /// returns the referenced ordinal and the normalized operator.
    pub fn as_column_comparison(&self) -> Option<(usize, BinaryOperator)> {
        let ScalarExpr::BinaryOp { op, left, right } = self else {
            return None;
        };
        match (left.as_ref(), right.as_ref()) {
            (ScalarExpr::InputRef(col), ScalarExpr::Constant(_)) => Some((*col, *op)),
            (ScalarExpr::Constant(_), ScalarExpr::InputRef(col)) => Some((*col, mirror(*op)?)),
            _ => None,
        }
    }

    /// Rewrite every `InputRef(i)` to the expression `mapping[i]`.
    pub fn substitute(&self, mapping: &[ScalarExpr]) -> ScalarExpr {
        match self {
            ScalarExpr::InputRef(i) => mapping[*i].clone(),
            ScalarExpr::Constant(_) => self.clone(),
            ScalarExpr::BinaryOp { op, left, right } => ScalarExpr::BinaryOp {
                op: *op,
                left: Box::new(left.substitute(mapping)),
                right: Box::new(right.substitute(mapping)),
            },
            ScalarExpr::Cast { data_type, expr } => ScalarExpr::Cast {
                data_type: *data_type,
                expr: Box::new(expr.substitute(mapping)),
            },
        }
    }

    /// Evaluate against one row. Unsupported combinations surface as `Null`,
    /// which is good enough for planner property tests.
    pub fn eval(&self, row: &Row) -> Datum {
        match self {
            ScalarExpr::InputRef(i) => row[*i].clone(),
            ScalarExpr::Constant(d) => d.clone(),
            ScalarExpr::BinaryOp { op, left, right } => {
                let l = left.eval(row);
                let r = right.eval(row);
                eval_binary(*op, l, r)
            }
            ScalarExpr::Cast { data_type, expr } => eval_cast(*data_type, expr.eval(row)),
        }
    }

    pub fn return_type(&self) -> Option<DataType> {
        match self {
            ScalarExpr::InputRef(_) => None,
            ScalarExpr::Constant(d) => d.data_type(),
            ScalarExpr::BinaryOp { op, left, .. } => match op {
                BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
                | BinaryOperator::And
                | BinaryOperator::Or => Some(DataType::Boolean),
                _ => left.return_type(),
            },
            ScalarExpr::Cast { data_type, .. } => Some(*data_type),
        }
    }
}

fn eval_cast(data_type: DataType, value: Datum) -> Datum {
    match (data_type, value) {
        (DataType::Float64, Datum::Int64(v)) => Datum::Float64(OrderedFloat(v as f64)),
        (DataType::Int64, Datum::Float64(v)) => Datum::Int64(v.0 as i64),
        (dt, v) if v.data_type() == Some(dt) => v,
        _ => Datum::Null,
    }
}

fn mirror(op: BinaryOperator) -> Option<BinaryOperator> {
    let m = match op {
        BinaryOperator::Eq => BinaryOperator::Eq,
        BinaryOperator::NotEq => BinaryOperator::NotEq,
        BinaryOperator::Lt => BinaryOperator::Gt,
        BinaryOperator::LtEq => BinaryOperator::GtEq,
        BinaryOperator::Gt => BinaryOperator::Lt,
        BinaryOperator::GtEq => BinaryOperator::LtEq,
        _ => return None,
    };
    Some(m)
}

fn eval_binary(op: BinaryOperator, l: Datum, r: Datum) -> Datum {
    use BinaryOperator::*;
    if matches!(l, Datum::Null) || matches!(r, Datum::Null) {
        return Datum::Null;
    }
    match op {
        Eq => Datum::Boolean(l == r),
        NotEq => Datum::Boolean(l != r),
        Lt => Datum::Boolean(l < r),
        LtEq => Datum::Boolean(l <= r),
        Gt => Datum::Boolean(l > r),
        GtEq => Datum::Boolean(l >= r),
        And => match (l.as_bool(), r.as_bool()) {
            (Some(a), Some(b)) => Datum::Boolean(a && b),
            _ => Datum::Null,
        },
        Or => match (l.as_bool(), r.as_bool()) {
            (Some(a), Some(b)) => Datum::Boolean(a || b),
            _ => Datum::Null,
        },
        Plus | Minus | Multiply | Divide => eval_arithmetic(op, l, r),
    }
}

fn eval_arithmetic(op: BinaryOperator, l: Datum, r: Datum) -> Datum {
    use BinaryOperator::*;
    match (l, r) {
        (Datum::Int64(a), Datum::Int64(b)) => match op {
            Plus => Datum::Int64(a + b),
            Minus => Datum::Int64(a - b),
            Multiply => Datum::Int64(a * b),
            Divide if b != 0 => Datum::Int64(a / b),
            _ => Datum::Null,
        },
        (Datum::Float64(a), Datum::Float64(b)) => match op {
            Plus => Datum::Float64(a + b),
            Minus => Datum::Float64(a - b),
            Multiply => Datum::Float64(a * b),
            Divide if b.0 != 0.0 => Datum::Float64(OrderedFloat(a.0 / b.0)),
            _ => Datum::Null,
        },
        _ => Datum::Null,
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScalarExpr::InputRef(i) => write!(f, "#{}", i),
            ScalarExpr::Constant(d) => write!(f, "{}", d),
            ScalarExpr::BinaryOp { op, left, right } => {
                write!(f, "({} {} {})", left, op, right)
            }
            ScalarExpr::Cast { data_type, expr } => write!(f, "cast({} as {})", expr, data_type),
        }
    }
}

/// Split a predicate into its top-level AND conjuncts.
pub fn split_conjuncts(expr: &ScalarExpr) -> Vec<ScalarExpr> {
    match expr {
        ScalarExpr::BinaryOp {
            op: BinaryOperator::And,
            left,
            right,
        } => {
            let mut out = split_conjuncts(left);
            out.extend(split_conjuncts(right));
            out
        }
        _ => vec![expr.clone()],
    }
}

/// Reduce multiple predicates into one conjunctive predicate by AND.
pub fn reduce_conjuncts(exprs: Vec<ScalarExpr>) -> Option<ScalarExpr> {
    exprs
        .into_iter()
        .reduce(|a, b| ScalarExpr::binary(BinaryOperator::And, a, b))
}
