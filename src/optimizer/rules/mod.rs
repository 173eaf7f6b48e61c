mod agg_exchange;
mod calc_exchange;
mod calc_merge;
mod convert;
mod limit_exchange;
mod scan_index;
mod serial_agg;
mod sort_exchange;
mod sort_index_remove;

use enum_dispatch::enum_dispatch;

use crate::error::PlannerError;
use crate::optimizer::core::{OptExpr, Pattern, Rule, Substitute};

pub use self::agg_exchange::AggExchangeTransposeRule;
pub use self::calc_exchange::CalcExchangeTransposeRule;
pub use self::calc_merge::CalcMergeRule;
pub use self::convert::{
    AggConvertRule, CalcConvertRule, LimitConvertRule, ScanConvertRule, SortConvertRule,
};
pub use self::limit_exchange::LimitExchangeTransposeRule;
pub use self::scan_index::ScanToIndexRule;
pub use self::serial_agg::HashToSerialAggRule;
pub use self::sort_exchange::SortExchangeTransposeRule;
pub use self::sort_index_remove::{SortRemoveRule, SortScanToIndexRule};

/// The closed set of rewrite rules the planner schedules into batches.
#[enum_dispatch(Rule)]
#[derive(Clone, Debug)]
pub enum RuleImpl {
    // lowering
    ScanConvertRule,
    CalcConvertRule,
    AggConvertRule,
    SortConvertRule,
    LimitConvertRule,
    // distributed transforms
    AggExchangeTransposeRule,
    CalcExchangeTransposeRule,
    SortExchangeTransposeRule,
    LimitExchangeTransposeRule,
    // local refinement
    CalcMergeRule,
    ScanToIndexRule,
    SortScanToIndexRule,
    SortRemoveRule,
    HashToSerialAggRule,
}
