use std::cmp;
use std::fmt;

use ordered_float::OrderedFloat;

use crate::types::{Datum, Row};

/// Aggregate functions the planner knows how to distribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggKind {
    Sum,
    Count,
    Min,
    Max,
    Avg,
}

impl AggKind {
    /// Declared catalog contract: the function may be evaluated independently
    /// per fragment and the partials combined. An aggregate↔exchange commute
    /// or split is only legal for distributive functions.
    pub fn is_distributive(&self) -> bool {
        match self {
            AggKind::Sum | AggKind::Count | AggKind::Min | AggKind::Max => true,
            // AVG is rewritten to SUM/COUNT before it crosses an exchange.
            AggKind::Avg => false,
        }
    }

    /// The coordinator-stage function merging per-fragment partial results.
    /// COUNT merges by summing fragment counts.
    pub fn merge_kind(&self) -> AggKind {
        match self {
            AggKind::Sum | AggKind::Count => AggKind::Sum,
            AggKind::Min => AggKind::Min,
            AggKind::Max => AggKind::Max,
            AggKind::Avg => AggKind::Avg,
        }
    }
}

impl fmt::Display for AggKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            AggKind::Sum => "sum",
            AggKind::Count => "count",
            AggKind::Min => "min",
            AggKind::Max => "max",
            AggKind::Avg => "avg",
        };
        write!(f, "{}", s)
    }
}

/// One aggregate call: function plus input column. `arg = None` is COUNT(*).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggCall {
    pub kind: AggKind,
    pub arg: Option<usize>,
    pub name: String,
}

impl AggCall {
    pub fn new(kind: AggKind, arg: Option<usize>, name: impl Into<String>) -> Self {
        Self {
            kind,
            arg,
            name: name.into(),
        }
    }

    /// The call the coordinator stage runs over this call's partial results,
    /// reading them at output ordinal `partial_ordinal`.
    pub fn merge_call(&self, partial_ordinal: usize) -> AggCall {
        AggCall {
            kind: self.kind.merge_kind(),
            arg: Some(partial_ordinal),
            name: self.name.clone(),
        }
    }

    /// Evaluate over a slice of rows (one group). Used by property tests to
    /// compare single-stage and two-stage execution.
    pub fn eval(&self, rows: &[Row]) -> Datum {
        let values = || {
            rows.iter()
                .filter_map(|r| self.arg.map(|i| r[i].clone()))
                .filter(|d| !matches!(d, Datum::Null))
        };
        match self.kind {
            AggKind::Count => match self.arg {
                None => Datum::Int64(rows.len() as i64),
                Some(_) => Datum::Int64(values().count() as i64),
            },
            AggKind::Sum => sum(values()),
            AggKind::Min => values().reduce(|a, b| cmp::min(a, b)).unwrap_or(Datum::Null),
            AggKind::Max => values().reduce(|a, b| cmp::max(a, b)).unwrap_or(Datum::Null),
            AggKind::Avg => {
                let count = values().count();
                if count == 0 {
                    return Datum::Null;
                }
                match sum(values()) {
                    Datum::Int64(s) => Datum::Float64(OrderedFloat(s as f64 / count as f64)),
                    Datum::Float64(s) => Datum::Float64(OrderedFloat(s.0 / count as f64)),
                    _ => Datum::Null,
                }
            }
        }
    }
}

fn sum(values: impl Iterator<Item = Datum>) -> Datum {
    values
        .reduce(|a, b| match (a, b) {
            (Datum::Int64(x), Datum::Int64(y)) => Datum::Int64(x + y),
            (Datum::Float64(x), Datum::Float64(y)) => Datum::Float64(x + y),
            _ => Datum::Null,
        })
        .unwrap_or(Datum::Null)
}

impl fmt::Display for AggCall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.arg {
            Some(i) => write!(f, "{}(#{})", self.kind, i),
            None => write!(f, "{}(*)", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    fn rows(values: &[i64]) -> Vec<Row> {
        values.iter().map(|v| vec![Datum::from(*v)]).collect()
    }

    #[test_case(AggKind::Sum, Datum::Int64(10); "sum")]
    #[test_case(AggKind::Count, Datum::Int64(4); "count")]
    #[test_case(AggKind::Min, Datum::Int64(1); "min")]
    #[test_case(AggKind::Max, Datum::Int64(4); "max")]
    fn test_single_stage_eval(kind: AggKind, expect: Datum) {
        let call = AggCall::new(kind, Some(0), "a");
        assert_eq!(call.eval(&rows(&[3, 1, 4, 2])), expect);
    }

    #[test]
    fn test_merge_call_reads_partial_ordinal() {
        let count = AggCall::new(AggKind::Count, None, "cnt");
        let merge = count.merge_call(2);
        assert_eq!(merge.kind, AggKind::Sum);
        assert_eq!(merge.arg, Some(2));
    }

    #[test]
    fn test_distributive_contract() {
        assert!(AggKind::Sum.is_distributive());
        assert!(AggKind::Count.is_distributive());
        assert!(AggKind::Min.is_distributive());
        assert!(AggKind::Max.is_distributive());
        assert!(!AggKind::Avg.is_distributive());
    }
}
