use std::fmt;
use std::fmt::Write;
use std::sync::Arc;

use itertools::Itertools;
use strum_macros::IntoStaticStr;

use super::access_path::AccessPath;
use super::traits::{Collation, CollationField, Convention, Distribution, TraitSet};
use crate::catalog::{TableCatalog, TableDistribution};
use crate::expr::{AggCall, AggKind, Program, ScalarExpr};
use crate::types::{DataType, Field, RowType};

/// The type of reference to a plan node.
pub type RelRef = Arc<RelNode>;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanPayload {
    pub table: TableCatalog,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexScanPayload {
    pub table: TableCatalog,
    pub access: AccessPath,
}

/// Which stage of a distributed aggregation a node implements. The stage
/// flag is also the cycle guard for the aggregate↔exchange transpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggStage {
    Single,
    Fragment,
    Coordinator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggPayload {
    /// Input ordinals grouped on, in output order.
    pub group_by: Vec<usize>,
    pub calls: Vec<AggCall>,
    pub stage: AggStage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortPayload {
    pub collation: Collation,
    /// Inline fetch/offset; a sort carrying either is never equivalent to
    /// the unlimited one.
    pub fetch: Option<u64>,
    pub offset: Option<u64>,
}

impl SortPayload {
    pub fn is_unlimited(&self) -> bool {
        self.fetch.is_none() && self.offset.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitPayload {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Exchange trait bundle: the distribution it consumes, the nesting level
/// used to bound rule re-firing, and whether this is the top (coordinator)
/// exchange of the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangePayload {
    pub child_distribution: Distribution,
    pub level: u32,
    pub top: bool,
}

/// The closed operator set. Kind-specific payloads ride on the variants;
/// shared trait fields live on [`RelNode`].
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum NodeKind {
    /// Placeholder child used by the rule-matching engine.
    Dummy,
    TableScan(ScanPayload),
    IndexScan(IndexScanPayload),
    Calc(Program),
    HashAggregate(AggPayload),
    SerialAggregate(AggPayload),
    Sort(SortPayload),
    Limit(LimitPayload),
    SingletonExchange(ExchangePayload),
    UnionExchange(ExchangePayload),
    MergeExchange(ExchangePayload),
}

/// An immutable operator node: kind tag plus payload, physical trait set,
/// output row type, inputs (exclusive ownership; the plan is a tree) and the
/// split count (partitions the containing fragment executes across).
///
/// The only mutation primitive is "copy with new traits/inputs"; a node's
/// declared traits are always derived from its inputs at construction, so a
/// distribution change is impossible without an explicit exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RelNode {
    kind: NodeKind,
    traits: TraitSet,
    row_type: RowType,
    inputs: Vec<RelRef>,
    split_count: usize,
}

impl RelNode {
    fn build(kind: NodeKind, convention: Convention, inputs: Vec<RelRef>) -> RelRef {
        let (row_type, distribution, collation, split_count) =
            derive_node_properties(&kind, convention, &inputs);
        Arc::new(RelNode {
            kind,
            traits: TraitSet {
                convention,
                distribution,
                collation,
            },
            row_type,
            inputs,
            split_count,
        })
    }

    pub fn dummy() -> RelRef {
        Arc::new(RelNode {
            kind: NodeKind::Dummy,
            traits: TraitSet::logical(),
            row_type: RowType::default(),
            inputs: vec![],
            split_count: 1,
        })
    }

    // ------ logical constructors (the validated input tree) ------

    pub fn logical_scan(table: TableCatalog) -> RelRef {
        Self::build(
            NodeKind::TableScan(ScanPayload { table }),
            Convention::Logical,
            vec![],
        )
    }

    pub fn logical_calc(program: Program, input: RelRef) -> RelRef {
        Self::build(NodeKind::Calc(program), Convention::Logical, vec![input])
    }

    pub fn logical_aggregate(group_by: Vec<usize>, calls: Vec<AggCall>, input: RelRef) -> RelRef {
        Self::build(
            NodeKind::HashAggregate(AggPayload {
                group_by,
                calls,
                stage: AggStage::Single,
            }),
            Convention::Logical,
            vec![input],
        )
    }

    pub fn logical_sort(collation: Collation, input: RelRef) -> RelRef {
        Self::build(
            NodeKind::Sort(SortPayload {
                collation,
                fetch: None,
                offset: None,
            }),
            Convention::Logical,
            vec![input],
        )
    }

    pub fn logical_limit(limit: Option<u64>, offset: Option<u64>, input: RelRef) -> RelRef {
        Self::build(
            NodeKind::Limit(LimitPayload { limit, offset }),
            Convention::Logical,
            vec![input],
        )
    }

    // ------ physical constructors (rule outputs) ------

    pub fn physical_scan(table: TableCatalog) -> RelRef {
        Self::build(
            NodeKind::TableScan(ScanPayload { table }),
            Convention::Physical,
            vec![],
        )
    }

    pub fn physical_index_scan(table: TableCatalog, access: AccessPath) -> RelRef {
        Self::build(
            NodeKind::IndexScan(IndexScanPayload { table, access }),
            Convention::Physical,
            vec![],
        )
    }

    pub fn physical_calc(program: Program, input: RelRef) -> RelRef {
        Self::build(NodeKind::Calc(program), Convention::Physical, vec![input])
    }

    pub fn hash_aggregate(
        group_by: Vec<usize>,
        calls: Vec<AggCall>,
        stage: AggStage,
        input: RelRef,
    ) -> RelRef {
        Self::build(
            NodeKind::HashAggregate(AggPayload {
                group_by,
                calls,
                stage,
            }),
            Convention::Physical,
            vec![input],
        )
    }

    pub fn serial_aggregate(
        group_by: Vec<usize>,
        calls: Vec<AggCall>,
        stage: AggStage,
        input: RelRef,
    ) -> RelRef {
        Self::build(
            NodeKind::SerialAggregate(AggPayload {
                group_by,
                calls,
                stage,
            }),
            Convention::Physical,
            vec![input],
        )
    }

    pub fn physical_sort(payload: SortPayload, input: RelRef) -> RelRef {
        Self::build(NodeKind::Sort(payload), Convention::Physical, vec![input])
    }

    pub fn physical_limit(limit: Option<u64>, offset: Option<u64>, input: RelRef) -> RelRef {
        Self::build(
            NodeKind::Limit(LimitPayload { limit, offset }),
            Convention::Physical,
            vec![input],
        )
    }

    pub fn singleton_exchange(input: RelRef, top: bool, level: u32) -> RelRef {
        let child_distribution = input.distribution().clone();
        Self::build(
            NodeKind::SingletonExchange(ExchangePayload {
                child_distribution,
                level,
                top,
            }),
            Convention::Physical,
            vec![input],
        )
    }

    pub fn union_exchange(input: RelRef, level: u32) -> RelRef {
        let child_distribution = input.distribution().clone();
        Self::build(
            NodeKind::UnionExchange(ExchangePayload {
                child_distribution,
                level,
                top: false,
            }),
            Convention::Physical,
            vec![input],
        )
    }

    /// K-way merge of pre-sorted fragment streams; preserves the input's
    /// collation across the gather.
    pub fn merge_exchange(input: RelRef, level: u32) -> RelRef {
        let child_distribution = input.distribution().clone();
        Self::build(
            NodeKind::MergeExchange(ExchangePayload {
                child_distribution,
                level,
                top: false,
            }),
            Convention::Physical,
            vec![input],
        )
    }

    // ------ shared accessors ------

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn traits(&self) -> &TraitSet {
        &self.traits
    }

    pub fn convention(&self) -> Convention {
        self.traits.convention
    }

    pub fn distribution(&self) -> &Distribution {
        &self.traits.distribution
    }

    pub fn collation(&self) -> &Collation {
        &self.traits.collation
    }

    pub fn row_type(&self) -> &RowType {
        &self.row_type
    }

    pub fn split_count(&self) -> usize {
        self.split_count
    }

    pub fn is_logical(&self) -> bool {
        self.traits.convention == Convention::Logical
    }

    pub fn is_physical(&self) -> bool {
        self.traits.convention == Convention::Physical
    }

    pub fn is_exchange(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::SingletonExchange(_)
                | NodeKind::UnionExchange(_)
                | NodeKind::MergeExchange(_)
        )
    }

    pub fn kind_name(&self) -> &'static str {
        (&self.kind).into()
    }

    pub fn name(&self) -> String {
        match self.kind {
            NodeKind::Dummy => "Dummy".to_string(),
            _ => match self.traits.convention {
                Convention::Logical => format!("Logical{}", self.kind_name()),
                Convention::Physical => format!("Physical{}", self.kind_name()),
            },
        }
    }

    pub fn as_calc(&self) -> Option<&Program> {
        match &self.kind {
            NodeKind::Calc(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_table_scan(&self) -> Option<&ScanPayload> {
        match &self.kind {
            NodeKind::TableScan(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_index_scan(&self) -> Option<&IndexScanPayload> {
        match &self.kind {
            NodeKind::IndexScan(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggPayload> {
        match &self.kind {
            NodeKind::HashAggregate(p) | NodeKind::SerialAggregate(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_sort(&self) -> Option<&SortPayload> {
        match &self.kind {
            NodeKind::Sort(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_limit(&self) -> Option<&LimitPayload> {
        match &self.kind {
            NodeKind::Limit(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_exchange(&self) -> Option<&ExchangePayload> {
        match &self.kind {
            NodeKind::SingletonExchange(p)
            | NodeKind::UnionExchange(p)
            | NodeKind::MergeExchange(p) => Some(p),
            _ => None,
        }
    }

    // ------ tree plumbing (the only mutation primitive) ------

    pub fn children(&self) -> Vec<RelRef> {
        self.inputs.clone()
    }

    pub fn input(&self, i: usize) -> RelRef {
        self.inputs[i].clone()
    }

    /// Copy with new children: same kind, same payload, traits re-derived
    /// from the new inputs so they stay provable.
    pub fn clone_with_children(&self, children: Vec<RelRef>) -> RelRef {
        assert_eq!(children.len(), self.inputs.len(), "{}", self.name());
        if matches!(self.kind, NodeKind::Dummy) {
            return RelNode::dummy();
        }
        let mut kind = self.kind.clone();
        // Exchanges re-capture the distribution they consume.
        if let NodeKind::SingletonExchange(p)
        | NodeKind::UnionExchange(p)
        | NodeKind::MergeExchange(p) = &mut kind
        {
            if let Some(child) = children.first() {
                p.child_distribution = child.distribution().clone();
            }
        }
        Self::build(kind, self.traits.convention, children)
    }

    pub fn explain(&self, level: usize, out: &mut dyn Write) -> fmt::Result {
        write!(out, "{}{}", "  ".repeat(level), self)?;
        for child in &self.inputs {
            child.explain(level + 1, out)?;
        }
        Ok(())
    }
}

/// Indented tree rendering, used by plan-shape assertions and trace logging.
pub fn pretty_plan_tree(plan: &RelNode) -> String {
    let mut out = String::new();
    // writing to a String is infallible
    let _ = plan.explain(0, &mut out);
    out
}

/// Row type, distribution, collation and split count a node may claim given
/// its kind and its inputs. Centralizing this is what enforces the trait
/// compatibility contract.
fn derive_node_properties(
    kind: &NodeKind,
    convention: Convention,
    inputs: &[RelRef],
) -> (RowType, Distribution, Collation, usize) {
    let input = inputs.first();
    let input_dist = |d: Distribution| match convention {
        Convention::Logical => Distribution::Any,
        Convention::Physical => d,
    };
    match kind {
        NodeKind::Dummy => (RowType::default(), Distribution::Any, Collation::default(), 1),
        NodeKind::TableScan(p) => (
            p.table.row_type(),
            input_dist(scan_distribution(&p.table)),
            Collation::default(),
            p.table.split_count(),
        ),
        NodeKind::IndexScan(p) => (
            p.table.row_type(),
            scan_distribution(&p.table),
            p.access.provided_collation(),
            p.table.split_count(),
        ),
        NodeKind::Calc(program) => {
            let input = input.expect("calc input");
            let distribution = translate_distribution_forward(input.distribution(), |k| {
                program
                    .exprs()
                    .iter()
                    .position(|e| matches!(e, ScalarExpr::InputRef(i) if *i == k))
            });
            (
                program.output_row_type(input.row_type()),
                input_dist(distribution),
                translate_collation_forward(program, input.collation()),
                input.split_count(),
            )
        }
        NodeKind::HashAggregate(p) => {
            let input = input.expect("aggregate input");
            let distribution = translate_distribution_forward(input.distribution(), |k| {
                p.group_by.iter().position(|&g| g == k)
            });
            (
                aggregate_row_type(p, input.row_type()),
                input_dist(distribution),
                Collation::default(),
                input.split_count(),
            )
        }
        NodeKind::SerialAggregate(p) => {
            let input = input.expect("aggregate input");
            let distribution = translate_distribution_forward(input.distribution(), |k| {
                p.group_by.iter().position(|&g| g == k)
            });
            (
                aggregate_row_type(p, input.row_type()),
                distribution,
                Collation::ascending_on(0..p.group_by.len()),
                input.split_count(),
            )
        }
        NodeKind::Sort(p) => {
            let input = input.expect("sort input");
            (
                input.row_type().clone(),
                input_dist(input.distribution().clone()),
                p.collation.clone(),
                input.split_count(),
            )
        }
        NodeKind::Limit(_) => {
            let input = input.expect("limit input");
            (
                input.row_type().clone(),
                input_dist(input.distribution().clone()),
                input.collation().clone(),
                input.split_count(),
            )
        }
        NodeKind::SingletonExchange(_) => {
            let input = input.expect("exchange input");
            (
                input.row_type().clone(),
                Distribution::Singleton,
                input.collation().clone(),
                1,
            )
        }
        NodeKind::UnionExchange(_) => {
            let input = input.expect("exchange input");
            // Interleaved gather: any input order is lost. Everything above
            // a gather runs on the coordinator, hence split 1.
            (
                input.row_type().clone(),
                Distribution::Any,
                Collation::default(),
                1,
            )
        }
        NodeKind::MergeExchange(_) => {
            let input = input.expect("exchange input");
            (
                input.row_type().clone(),
                Distribution::Any,
                input.collation().clone(),
                1,
            )
        }
    }
}

fn scan_distribution(table: &TableCatalog) -> Distribution {
    match &table.distribution {
        TableDistribution::Replicated => Distribution::Singleton,
        TableDistribution::Partitioned { column, .. } => Distribution::Hash(vec![*column]),
    }
}

fn aggregate_row_type(payload: &AggPayload, input: &RowType) -> RowType {
    // `get` tolerates dummy placeholder inputs during transient matching.
    let mut fields = payload
        .group_by
        .iter()
        .map(|&i| {
            input
                .fields
                .get(i)
                .cloned()
                .unwrap_or_else(|| Field::new(format!("g{}", i), DataType::Int64))
        })
        .collect::<Vec<_>>();
    for call in &payload.calls {
        let data_type = match call.kind {
            AggKind::Count => DataType::Int64,
            AggKind::Avg => DataType::Float64,
            _ => call
                .arg
                .and_then(|i| input.fields.get(i).map(|f| f.data_type))
                .unwrap_or(DataType::Int64),
        };
        fields.push(Field::new(call.name.clone(), data_type));
    }
    RowType::new(fields)
}

/// Map a hash distribution through a projection. `output_of` gives the
/// output ordinal a surviving input column lands on; a node may only keep a
/// `Hash` claim when every key survives as a plain column, otherwise the
/// claim degrades to `Any`.
fn translate_distribution_forward<F>(input: &Distribution, output_of: F) -> Distribution
where
    F: Fn(usize) -> Option<usize>,
{
    match input {
        Distribution::Hash(keys) => keys
            .iter()
            .map(|&k| output_of(k))
            .collect::<Option<Vec<_>>>()
            .map_or(Distribution::Any, Distribution::Hash),
        other => other.clone(),
    }
}

/// Map the input's provided collation through a Calc: keep the longest
/// prefix whose columns survive as plain references in the output.
fn translate_collation_forward(program: &Program, input: &Collation) -> Collation {
    let mut fields = vec![];
    for cf in &input.fields {
        let out = program
            .exprs()
            .iter()
            .position(|e| matches!(e, ScalarExpr::InputRef(i) if *i == cf.ordinal));
        match out {
            Some(ordinal) => fields.push(CollationField {
                ordinal,
                direction: cf.direction,
            }),
            None => break,
        }
    }
    Collation::new(fields)
}

impl fmt::Display for RelNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            NodeKind::Dummy => writeln!(f, "Dummy:"),
            NodeKind::TableScan(p) => writeln!(
                f,
                "{}: table #{}, columns [{}], dist {}",
                self.name(),
                p.table.id,
                p.table.columns.iter().map(|c| &c.name).join(", "),
                self.distribution(),
            ),
            NodeKind::IndexScan(p) => writeln!(
                f,
                "{}: table #{}, access {}, dist {}",
                self.name(),
                p.table.id,
                p.access,
                self.distribution(),
            ),
            NodeKind::Calc(program) => writeln!(f, "{}: {}", self.name(), program),
            NodeKind::HashAggregate(p) | NodeKind::SerialAggregate(p) => writeln!(
                f,
                "{}: group_by [{}], calls [{}], stage {:?}",
                self.name(),
                p.group_by.iter().join(", "),
                p.calls.iter().join(", "),
                p.stage,
            ),
            NodeKind::Sort(p) => {
                write!(f, "{}: collation {}", self.name(), p.collation)?;
                if !p.is_unlimited() {
                    write!(f, ", fetch {:?}, offset {:?}", p.fetch, p.offset)?;
                }
                writeln!(f)
            }
            NodeKind::Limit(p) => writeln!(
                f,
                "{}: limit {:?}, offset {:?}",
                self.name(),
                p.limit,
                p.offset
            ),
            NodeKind::SingletonExchange(p)
            | NodeKind::UnionExchange(p)
            | NodeKind::MergeExchange(p) => writeln!(
                f,
                "{}: child_dist {}, level {}{}",
                self.name(),
                p.child_distribution,
                p.level,
                if p.top { ", top" } else { "" },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::optimizer::test_util::partitioned_table;

    #[test]
    fn test_calc_keeps_hash_claim_only_when_keys_survive() {
        let scan = RelNode::physical_scan(partitioned_table());
        assert_eq!(*scan.distribution(), Distribution::Hash(vec![0]));

        // the partition column survives, relocated to output 1
        let reorder = RelNode::physical_calc(
            Program::new(
                vec![ScalarExpr::input_ref(1), ScalarExpr::input_ref(0)],
                vec!["o_custkey".into(), "o_id".into()],
                None,
            ),
            scan.clone(),
        );
        assert_eq!(*reorder.distribution(), Distribution::Hash(vec![1]));

        // the partition column is projected away: the claim degrades
        let drop_key = RelNode::physical_calc(
            Program::new(
                vec![ScalarExpr::input_ref(1)],
                vec!["o_custkey".into()],
                None,
            ),
            scan,
        );
        assert_eq!(*drop_key.distribution(), Distribution::Any);
    }

    #[test]
    fn test_aggregate_remaps_hash_keys_through_group_by() {
        let scan = RelNode::physical_scan(partitioned_table());

        let kept = RelNode::hash_aggregate(vec![1, 0], vec![], AggStage::Single, scan.clone());
        assert_eq!(*kept.distribution(), Distribution::Hash(vec![1]));

        let dropped = RelNode::hash_aggregate(vec![1], vec![], AggStage::Single, scan);
        assert_eq!(*dropped.distribution(), Distribution::Any);
    }
}
