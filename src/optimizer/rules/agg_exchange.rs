//! Move aggregation below the gather exchange, either wholesale (grouping on
//! the partition key keeps every group fragment-local) or by splitting into
//! a fragment stage and a coordinator merge stage.

use lazy_static::lazy_static;

use crate::error::PlannerError;
use crate::expr::{AggCall, AggKind, BinaryOperator, Program, ScalarExpr};
use crate::optimizer::core::{OptExpr, OptExprNode, Pattern, Rule, Substitute};
use crate::plan::{AggStage, Distribution, NodeKind, RelNode};
use crate::types::DataType;

lazy_static! {
    static ref AGG_OVER_UNION: Pattern = Pattern::on_child(
        |p| p.is_physical() && matches!(p.kind(), NodeKind::HashAggregate(_)),
        |p| matches!(p.kind(), NodeKind::UnionExchange(_)),
    );
}

/// How one original call is reconstructed from the coordinator output.
enum Recompose {
    /// The merged call at this fragment-call index is the answer.
    Direct(usize),
    /// AVG was decomposed; divide the summed SUM by the summed COUNT.
    Avg { sum: usize, count: usize },
}

/// PhysicalHashAggregate (single stage) over UnionExchange.
///
/// When the group keys cover the fragment distribution's hash keys, rows of
/// one group never span fragments and the whole aggregate commutes below the
/// exchange. Otherwise it splits two-stage: a fragment aggregate computing
/// partials and a coordinator aggregate merging them, COUNT partials merged
/// by SUM and AVG decomposed into SUM/COUNT with a recomposing Calc on top.
///
/// The stage flag is the cycle guard: fragment and coordinator aggregates
/// never transpose again.
#[derive(Clone, Debug, Default)]
pub struct AggExchangeTransposeRule;

impl Rule for AggExchangeTransposeRule {
    fn pattern(&self) -> &Pattern {
        &AGG_OVER_UNION
    }

    fn apply(&self, opt_expr: OptExpr, result: &mut Substitute) -> Result<(), PlannerError> {
        let agg = opt_expr
            .root
            .plan()
            .as_aggregate()
            .cloned()
            .ok_or_else(|| PlannerError::Internal("AggExchangeTranspose root is not an aggregate".into()))?;
        if agg.stage != AggStage::Single {
            return Ok(());
        }
        let exchange_plan = opt_expr.children[0].root.plan().clone();
        let level = exchange_plan
            .as_exchange()
            .map(|p| p.level)
            .ok_or_else(|| PlannerError::Internal("AggExchangeTranspose child is not an exchange".into()))?;
        let fragment = exchange_plan.input(0);
        let fragment_binding = opt_expr.children[0].children.clone();

        // Commute: fragment-local groups need no merge stage.
        if let Distribution::Hash(keys) = fragment.distribution() {
            if !keys.is_empty() && keys.iter().all(|k| agg.group_by.contains(k)) {
                let local = RelNode::hash_aggregate(
                    agg.group_by,
                    agg.calls,
                    AggStage::Single,
                    fragment,
                );
                let union = RelNode::union_exchange(local.clone(), level);
                result.push(OptExpr::new(
                    OptExprNode::Plan(union),
                    vec![OptExpr::new(OptExprNode::Plan(local), fragment_binding)],
                ));
                return Ok(());
            }
        }

        // Split: every call must be distributive once AVG is decomposed.
        let keys = agg.group_by.len();
        let mut fragment_calls = vec![];
        let mut recompose = vec![];
        for call in &agg.calls {
            match call.kind {
                AggKind::Avg => {
                    recompose.push(Recompose::Avg {
                        sum: fragment_calls.len(),
                        count: fragment_calls.len() + 1,
                    });
                    fragment_calls.push(AggCall::new(
                        AggKind::Sum,
                        call.arg,
                        format!("{}_sum", call.name),
                    ));
                    fragment_calls.push(AggCall::new(
                        AggKind::Count,
                        call.arg,
                        format!("{}_count", call.name),
                    ));
                }
                _ => {
                    if !call.kind.is_distributive() {
                        return Ok(());
                    }
                    recompose.push(Recompose::Direct(fragment_calls.len()));
                    fragment_calls.push(call.clone());
                }
            }
        }

        let fragment_agg = RelNode::hash_aggregate(
            agg.group_by.clone(),
            fragment_calls.clone(),
            AggStage::Fragment,
            fragment,
        );
        let union = RelNode::union_exchange(fragment_agg.clone(), level);
        let coordinator = RelNode::hash_aggregate(
            (0..keys).collect(),
            fragment_calls
                .iter()
                .enumerate()
                .map(|(i, call)| call.merge_call(keys + i))
                .collect(),
            AggStage::Coordinator,
            union.clone(),
        );

        let mut replacement = OptExpr::new(
            OptExprNode::Plan(coordinator.clone()),
            vec![OptExpr::new(
                OptExprNode::Plan(union),
                vec![OptExpr::new(OptExprNode::Plan(fragment_agg), fragment_binding)],
            )],
        );

        if recompose.iter().any(|r| matches!(r, Recompose::Avg { .. })) {
            let mut exprs: Vec<ScalarExpr> = (0..keys).map(ScalarExpr::input_ref).collect();
            let mut names: Vec<String> = coordinator
                .row_type()
                .fields
                .iter()
                .take(keys)
                .map(|f| f.name.clone())
                .collect();
            for (call, r) in agg.calls.iter().zip(&recompose) {
                exprs.push(match *r {
                    Recompose::Direct(i) => ScalarExpr::input_ref(keys + i),
                    Recompose::Avg { sum, count } => ScalarExpr::binary(
                        BinaryOperator::Divide,
                        ScalarExpr::cast(DataType::Float64, ScalarExpr::input_ref(keys + sum)),
                        ScalarExpr::cast(DataType::Float64, ScalarExpr::input_ref(keys + count)),
                    ),
                });
                names.push(call.name.clone());
            }
            let calc = RelNode::physical_calc(Program::new(exprs, names, None), coordinator);
            replacement = OptExpr::new(OptExprNode::Plan(calc), vec![replacement]);
        }

        result.push(replacement);
        Ok(())
    }
}
