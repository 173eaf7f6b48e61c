use std::fmt;

use itertools::Itertools;

use super::{reduce_conjuncts, split_conjuncts, ScalarExpr};
use crate::error::PlannerError;
use crate::types::{DataType, Datum, Field, Row, RowType};

/// A fused filter + projection: the payload of a Calc node.
///
/// `exprs` produce the output columns (referencing input columns or
/// constants); `condition` filters input rows before projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    exprs: Vec<ScalarExpr>,
    names: Vec<String>,
    condition: Option<ScalarExpr>,
}

impl Program {
    pub fn new(
        exprs: Vec<ScalarExpr>,
        names: Vec<String>,
        condition: Option<ScalarExpr>,
    ) -> Self {
        assert_eq!(exprs.len(), names.len());
        Self {
            exprs,
            names,
            condition,
        }
    }

    /// The identity projection over `input`, optionally filtering.
    pub fn identity(input: &RowType, condition: Option<ScalarExpr>) -> Self {
        Self {
            exprs: (0..input.arity()).map(ScalarExpr::InputRef).collect(),
            names: input.fields.iter().map(|f| f.name.clone()).collect(),
            condition,
        }
    }

    pub fn exprs(&self) -> &[ScalarExpr] {
        &self.exprs
    }

    pub fn condition(&self) -> Option<&ScalarExpr> {
        self.condition.as_ref()
    }

    pub fn with_condition(&self, condition: Option<ScalarExpr>) -> Self {
        Self {
            exprs: self.exprs.clone(),
            names: self.names.clone(),
            condition,
        }
    }

    /// True when the program passes every input column through unchanged and
    /// filters nothing.
    pub fn is_trivial(&self, input_arity: usize) -> bool {
        self.condition.is_none()
            && self.exprs.len() == input_arity
            && self
                .exprs
                .iter()
                .enumerate()
                .all(|(i, e)| matches!(e, ScalarExpr::InputRef(j) if *j == i))
    }

    /// Output row type given the input row type the refs resolve against.
    pub fn output_row_type(&self, input: &RowType) -> RowType {
        RowType::new(
            self.exprs
                .iter()
                .zip(self.names.iter())
                .map(|(e, name)| {
                    // `get` tolerates the dummy placeholders the matching
                    // engine substitutes for opaque children.
                    let data_type = match e {
                        ScalarExpr::InputRef(i) => input
                            .fields
                            .get(*i)
                            .map(|f| f.data_type)
                            .unwrap_or(DataType::Int64),
                        _ => e.return_type().unwrap_or(DataType::Int64),
                    };
                    Field::new(name.clone(), data_type)
                })
                .collect(),
        )
    }

    /// If output ordinal `ordinal` is a plain column reference, its input
    /// ordinal. Used to translate collations backward through a Calc.
    pub fn source_column(&self, ordinal: usize) -> Option<usize> {
        match self.exprs.get(ordinal) {
            Some(ScalarExpr::InputRef(i)) => Some(*i),
            _ => None,
        }
    }

    /// Merge an outer program with the inner program it consumes. The result
    /// evaluates exactly like inner-then-outer and exposes the outer's output
    /// row type; divergence is a planner bug, not a query error.
    pub fn merge(
        outer: &Program,
        inner: &Program,
        input: &RowType,
    ) -> Result<Program, PlannerError> {
        let exprs = outer
            .exprs
            .iter()
            .map(|e| e.substitute(&inner.exprs))
            .collect::<Vec<_>>();

        // Flatten both sides into individual conjuncts before re-reducing so
        // the merged condition is canonical: any grouping of merges over the
        // same chain produces the same program.
        let conditions = inner
            .condition
            .iter()
            .flat_map(split_conjuncts)
            .chain(
                outer
                    .condition
                    .iter()
                    .map(|c| c.substitute(&inner.exprs))
                    .flat_map(|c| split_conjuncts(&c)),
            )
            .collect::<Vec<_>>();
        let merged = Program::new(exprs, outer.names.clone(), reduce_conjuncts(conditions));

        let inner_out = inner.output_row_type(input);
        if merged.output_row_type(input) != outer.output_row_type(&inner_out) {
            return Err(PlannerError::Internal(format!(
                "merged program row type diverges from the outer program's: {:?}",
                merged.output_row_type(input)
            )));
        }
        Ok(merged)
    }

    /// Evaluate against one input row; `None` when the condition rejects it.
    pub fn eval(&self, row: &Row) -> Option<Row> {
        if let Some(cond) = &self.condition {
            if cond.eval(row) != Datum::Boolean(true) {
                return None;
            }
        }
        Some(self.exprs.iter().map(|e| e.eval(row)).collect())
    }

    /// Conjuncts of the filter condition, empty when unconditional.
    pub fn condition_conjuncts(&self) -> Vec<ScalarExpr> {
        self.condition
            .as_ref()
            .map(super::split_conjuncts)
            .unwrap_or_default()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "exprs [{}]", self.exprs.iter().join(", "))?;
        if let Some(cond) = &self.condition {
            write!(f, ", cond {}", cond)?;
        }
        Ok(())
    }
}
