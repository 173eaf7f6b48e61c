//! Shared builders for optimizer tests: a small catalog and a few canonical
//! logical plan shapes.

use crate::catalog::{ColumnCatalog, IndexCatalog, RootCatalog, TableCatalog};
use crate::expr::{BinaryOperator, Program, ScalarExpr};
use crate::plan::{RelNode, RelRef};
use crate::types::DataType;

/// Call at the top of a test to see the optimizer's debug/trace output with
/// `RUST_LOG=trace cargo test -- --nocapture`.
pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `orders(o_id, o_custkey, o_total, o_qty)` hash partitioned on `o_id`
/// over 4 sites, with an index on `(o_custkey, o_total)`.
pub fn partitioned_table() -> TableCatalog {
    TableCatalog::new(
        "orders",
        vec![
            ColumnCatalog::new("o_id", DataType::Int64),
            ColumnCatalog::new("o_custkey", DataType::Int64),
            ColumnCatalog::new("o_total", DataType::Int64),
            ColumnCatalog::new("o_qty", DataType::Int64),
        ],
    )
    .partitioned_on(0, 4)
    .with_index(IndexCatalog::new("idx_orders_cust_total", vec![1, 2]))
}

/// `region(r_id, r_name)` replicated on every site, indexed on `r_id`.
pub fn replicated_table() -> TableCatalog {
    TableCatalog::new(
        "region",
        vec![
            ColumnCatalog::new("r_id", DataType::Int64),
            ColumnCatalog::new("r_name", DataType::Utf8),
        ],
    )
    .with_index(IndexCatalog::new("idx_region_id", vec![0]).unique())
}

pub fn test_catalog() -> RootCatalog {
    let mut catalog = RootCatalog::new();
    catalog.add_table(partitioned_table());
    catalog.add_table(replicated_table());
    catalog
}

pub fn col_cmp(col: usize, op: BinaryOperator, v: i64) -> ScalarExpr {
    ScalarExpr::binary(op, ScalarExpr::input_ref(col), ScalarExpr::constant(v))
}

/// LogicalLimit(10) over filtering identity Calc over the replicated scan;
/// three nodes, graph ids 0..2 in top-down order.
pub fn build_logical_limit_over_calc_scan() -> RelRef {
    let scan = RelNode::logical_scan(replicated_table());
    let program = Program::identity(
        scan.row_type(),
        Some(col_cmp(0, BinaryOperator::Gt, 0)),
    );
    let calc = RelNode::logical_calc(program, scan);
    RelNode::logical_limit(Some(10), None, calc)
}
