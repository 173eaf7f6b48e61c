use std::sync::Arc;

use log::debug;

use crate::error::PlannerError;
use crate::optimizer::cost::{CostModel, OperatorCountCost};
use crate::optimizer::heuristic::{HepBatch, HepBatchStrategy, HepOptimizer};
use crate::optimizer::rules::{
    AggConvertRule, AggExchangeTransposeRule, CalcConvertRule, CalcExchangeTransposeRule,
    CalcMergeRule, HashToSerialAggRule, LimitConvertRule, LimitExchangeTransposeRule,
    ScanConvertRule, ScanToIndexRule, SortConvertRule, SortExchangeTransposeRule, SortRemoveRule,
    SortScanToIndexRule,
};
use crate::plan::{NodeKind, RelNode, RelRef};

/// The finished output of one compilation.
pub struct PhysicalPlan {
    pub root: RelRef,
    /// Total rule applications across all batches; a transparent bound on
    /// the work the rewrite did.
    pub applied_rules: usize,
}

/// Entry point of the rewrite layer: takes a validated logical plan tree and
/// produces a single physical plan whose root runs on the coordinator.
///
/// The planner is stateless across calls; each `plan` builds a fresh search
/// space and discards it. The cost model ranking equivalent alternatives is
/// injected at construction.
pub struct PhysicalPlanner {
    cost_model: Arc<dyn CostModel>,
}

impl Default for PhysicalPlanner {
    fn default() -> Self {
        Self::new(Arc::new(OperatorCountCost))
    }
}

impl PhysicalPlanner {
    pub fn new(cost_model: Arc<dyn CostModel>) -> Self {
        Self { cost_model }
    }

    pub fn plan(&self, root: RelRef) -> Result<PhysicalPlan, PlannerError> {
        let mut lowering = HepOptimizer::new(
            vec![Self::lowering_batch()],
            root,
            self.cost_model.clone(),
        );
        let lowered = lowering.find_best()?;
        let mut applied_rules = lowering.applied_rules();
        ensure_fully_physical(&lowered)?;

        // make the gather to the coordinator explicit before the distributed
        // transforms negotiate what runs on which side of it
        let rooted = if lowered.distribution().is_singleton() {
            lowered
        } else {
            RelNode::singleton_exchange(lowered, true, 0)
        };

        let mut transforms =
            HepOptimizer::new(Self::transform_batches(), rooted, self.cost_model.clone());
        let best = transforms.find_best()?;
        applied_rules += transforms.applied_rules();

        if !best.distribution().is_singleton() {
            return Err(PlannerError::Internal(format!(
                "plan root must be singleton, got {}",
                best.distribution()
            )));
        }
        debug!("planning finished after {} rule applications", applied_rules);
        Ok(PhysicalPlan {
            root: best,
            applied_rules,
        })
    }

    fn lowering_batch() -> HepBatch {
        HepBatch::new(
            "lowering".to_string(),
            HepBatchStrategy::fix_point_bottomup(64),
            vec![
                ScanConvertRule.into(),
                CalcConvertRule.into(),
                AggConvertRule.into(),
                SortConvertRule.into(),
                LimitConvertRule.into(),
            ],
        )
    }

    fn transform_batches() -> Vec<HepBatch> {
        vec![
            HepBatch::new(
                "distributed transforms".to_string(),
                HepBatchStrategy::fix_point_topdown(32),
                vec![
                    AggExchangeTransposeRule.into(),
                    CalcExchangeTransposeRule.into(),
                    SortExchangeTransposeRule.into(),
                    LimitExchangeTransposeRule.into(),
                ],
            ),
            HepBatch::new(
                "local refinement".to_string(),
                HepBatchStrategy::fix_point_topdown(32),
                vec![
                    CalcMergeRule.into(),
                    ScanToIndexRule.into(),
                    SortScanToIndexRule.into(),
                    SortRemoveRule.into(),
                    HashToSerialAggRule.into(),
                ],
            ),
        ]
    }
}

/// Lowering must leave no logical node behind; one surviving is a bug in the
/// conversion rules, not in the query.
fn ensure_fully_physical(plan: &RelRef) -> Result<(), PlannerError> {
    if plan.is_logical() && !matches!(plan.kind(), NodeKind::Dummy) {
        return Err(PlannerError::Internal(format!(
            "lowering left a logical node behind: {}",
            plan.name()
        )));
    }
    for child in plan.children() {
        ensure_fully_physical(&child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::expr::{AggCall, AggKind, BinaryOperator, Program};
    use crate::optimizer::test_util::*;
    use crate::plan::{AggStage, Collation, Distribution, RelNode};

    fn plan(root: RelRef) -> PhysicalPlan {
        init_log();
        PhysicalPlanner::default().plan(root).unwrap()
    }

    fn assert_no_logical_and_singleton_root(result: &PhysicalPlan) {
        assert!(ensure_fully_physical(&result.root).is_ok());
        assert_eq!(*result.root.distribution(), Distribution::Singleton);
    }

    #[test]
    fn test_replicated_query_needs_no_exchange() {
        let scan = RelNode::logical_scan(replicated_table());
        let program = Program::identity(scan.row_type(), Some(col_cmp(0, BinaryOperator::Gt, 3)));
        let root = RelNode::logical_calc(program, scan);

        let result = plan(root);
        assert_no_logical_and_singleton_root(&result);
        let mut node = result.root.clone();
        loop {
            assert!(!node.is_exchange());
            if node.children().is_empty() {
                break;
            }
            node = node.input(0);
        }
    }

    #[test]
    fn test_partitioned_scan_gets_gathered() {
        let table = test_catalog().get_table_by_name("orders").unwrap();
        let result = plan(RelNode::logical_scan(table));
        assert_no_logical_and_singleton_root(&result);

        assert!(matches!(
            result.root.kind(),
            NodeKind::SingletonExchange(_)
        ));
        assert!(result.root.as_exchange().unwrap().top);
        assert!(matches!(
            result.root.input(0).kind(),
            NodeKind::UnionExchange(_)
        ));
    }

    #[test]
    fn test_explain_renders_the_distributed_shape() {
        let result = plan(RelNode::logical_scan(partitioned_table()));
        assert_eq!(
            crate::plan::pretty_plan_tree(&result.root),
            "PhysicalSingletonExchange: child_dist any, level 0, top\n\
             \x20 PhysicalUnionExchange: child_dist hash[0], level 0\n\
             \x20   PhysicalTableScan: table #orders, columns [o_id, o_custkey, o_total, o_qty], dist hash[0]\n"
        );
    }

    #[test]
    fn test_filter_runs_in_the_fragment() {
        let scan = RelNode::logical_scan(partitioned_table());
        let program = Program::identity(scan.row_type(), Some(col_cmp(3, BinaryOperator::Gt, 2)));
        let root = RelNode::logical_calc(program, scan);

        let result = plan(root);
        assert_no_logical_and_singleton_root(&result);

        // SingletonExchange -> UnionExchange -> Calc -> scan
        let union = result.root.input(0);
        assert!(matches!(union.kind(), NodeKind::UnionExchange(_)));
        let fragment = union.input(0);
        assert!(fragment.as_calc().is_some());
        assert_eq!(fragment.split_count(), 4);
    }

    #[test]
    fn test_cross_partition_aggregate_splits_two_stage() {
        // select o_custkey, sum(o_total), count(*) group by o_custkey
        let scan = RelNode::logical_scan(partitioned_table());
        let root = RelNode::logical_aggregate(
            vec![1],
            vec![
                AggCall::new(AggKind::Sum, Some(2), "s"),
                AggCall::new(AggKind::Count, None, "cnt"),
            ],
            scan,
        );

        let result = plan(root.clone());
        assert_no_logical_and_singleton_root(&result);
        assert_eq!(result.root.row_type(), root.row_type());

        let coordinator = result.root.input(0);
        assert_eq!(
            coordinator.as_aggregate().unwrap().stage,
            AggStage::Coordinator
        );
        let fragment = coordinator.input(0).input(0);
        assert_eq!(fragment.as_aggregate().unwrap().stage, AggStage::Fragment);
        assert_eq!(fragment.split_count(), 4);
    }

    #[test]
    fn test_aggregate_over_projected_partition_column_still_merges() {
        // select o_custkey, count(*) from (select o_custkey from orders)
        // group by 1: the projection drops o_id, so grouping is no longer
        // fragment-local and a coordinator merge stage must survive
        let scan = RelNode::logical_scan(partitioned_table());
        let project = RelNode::logical_calc(
            Program::new(
                vec![crate::expr::ScalarExpr::input_ref(1)],
                vec!["o_custkey".into()],
                None,
            ),
            scan,
        );
        let root = RelNode::logical_aggregate(
            vec![0],
            vec![AggCall::new(AggKind::Count, None, "cnt")],
            project,
        );

        let result = plan(root);
        assert_no_logical_and_singleton_root(&result);

        let mut stages = vec![];
        fn collect(node: &RelRef, out: &mut Vec<AggStage>) {
            if let Some(p) = node.as_aggregate() {
                out.push(p.stage);
            }
            for child in node.children() {
                collect(&child, out);
            }
        }
        collect(&result.root, &mut stages);
        assert!(stages.contains(&AggStage::Coordinator));
        assert!(stages.contains(&AggStage::Fragment));
        assert!(!stages.contains(&AggStage::Single));
    }

    #[test]
    fn test_partition_key_aggregate_stays_single_stage() {
        let scan = RelNode::logical_scan(partitioned_table());
        let root = RelNode::logical_aggregate(
            vec![0],
            vec![AggCall::new(AggKind::Sum, Some(2), "s")],
            scan,
        );

        let result = plan(root);
        assert_no_logical_and_singleton_root(&result);
        let local = result.root.input(0).input(0);
        let payload = local.as_aggregate().unwrap();
        assert_eq!(payload.stage, AggStage::Single);
        assert_eq!(local.split_count(), 4);
    }

    #[test]
    fn test_order_by_becomes_fragment_sorts_under_merge() {
        let scan = RelNode::logical_scan(partitioned_table());
        let root = RelNode::logical_sort(Collation::ascending_on([2]), scan);

        let result = plan(root);
        assert_no_logical_and_singleton_root(&result);
        // the top exchange preserves the merged order
        assert_eq!(*result.root.collation(), Collation::ascending_on([2]));

        let merge = result.root.input(0);
        assert!(matches!(merge.kind(), NodeKind::MergeExchange(_)));
        let fragment_sort = merge.input(0);
        assert!(fragment_sort.as_sort().is_some());
        assert_eq!(fragment_sort.split_count(), 4);
    }

    #[test]
    fn test_limit_offset_pushes_a_fragment_cap() {
        let scan = RelNode::logical_scan(partitioned_table());
        let root = RelNode::logical_limit(Some(10), Some(5), scan);

        let result = plan(root);
        assert_no_logical_and_singleton_root(&result);

        let coordinator = result.root.input(0);
        assert_eq!(coordinator.as_limit().unwrap().limit, Some(10));
        assert_eq!(coordinator.as_limit().unwrap().offset, Some(5));
        let fragment_limit = coordinator.input(0).input(0);
        assert_eq!(
            (
                fragment_limit.as_limit().unwrap().limit,
                fragment_limit.as_limit().unwrap().offset
            ),
            (Some(15), None)
        );
    }

    #[test]
    fn test_indexed_filter_resolves_to_access_path() {
        let scan = RelNode::logical_scan(partitioned_table());
        let program = Program::identity(
            scan.row_type(),
            Some(crate::expr::reduce_conjuncts(vec![
                col_cmp(1, BinaryOperator::Eq, 7),
                col_cmp(2, BinaryOperator::Gt, 100),
            ])
            .unwrap()),
        );
        let root = RelNode::logical_calc(program, scan);

        let result = plan(root);
        assert_no_logical_and_singleton_root(&result);

        // the fragment bottoms out in an index scan with no residual filter
        let mut node = result.root.clone();
        while !node.children().is_empty() {
            node = node.input(0);
        }
        let access = &node.as_index_scan().unwrap().access;
        assert_eq!(access.index.name, "idx_orders_cust_total");
        assert!(access.residual.is_empty());
    }

    #[test]
    fn test_planning_is_deterministic() {
        let build = || {
            let scan = RelNode::logical_scan(partitioned_table());
            let agg = RelNode::logical_aggregate(
                vec![1],
                vec![AggCall::new(AggKind::Avg, Some(2), "a")],
                scan,
            );
            RelNode::logical_sort(Collation::ascending_on([0]), agg)
        };
        let first = plan(build());
        let second = plan(build());
        assert_eq!(first.root, second.root);
        assert_eq!(first.applied_rules, second.applied_rules);
    }

    #[test]
    fn test_rule_applications_stay_bounded() {
        let scan = RelNode::logical_scan(partitioned_table());
        let program = Program::identity(scan.row_type(), Some(col_cmp(3, BinaryOperator::Gt, 0)));
        let calc = RelNode::logical_calc(program, scan);
        let agg = RelNode::logical_aggregate(
            vec![1],
            vec![AggCall::new(AggKind::Sum, Some(2), "s")],
            calc,
        );
        let sort = RelNode::logical_sort(Collation::ascending_on([0]), agg);
        let root = RelNode::logical_limit(Some(100), None, sort);

        let result = plan(root);
        assert_no_logical_and_singleton_root(&result);
        // five operators, a handful of transposes; anything near the batch
        // ceilings means a rule is re-firing on its own output
        assert!(
            result.applied_rules < 32,
            "applied {} rules",
            result.applied_rules
        );
    }
}
