use std::collections::HashMap;
use std::sync::Arc;

use crate::expr::ScalarExpr;
use crate::types::{DataType, Field, RowType};

pub type RootCatalogRef = Arc<RootCatalog>;

/// Catalog metadata consumed as given; the planner never mutates it.
#[derive(Debug, Clone, Default)]
pub struct RootCatalog {
    pub tables: HashMap<TableId, TableCatalog>,
}

impl RootCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: TableCatalog) {
        self.tables.insert(table.id.clone(), table);
    }

    pub fn get_table_by_name(&self, name: &str) -> Option<TableCatalog> {
        self.tables.get(name).cloned()
    }
}

/// use table name as id for simplicity
pub type TableId = String;

/// How a table's rows are spread across partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDistribution {
    /// Present in full on every node; scans run on a single site.
    Replicated,
    /// Hash partitioned on one column over `partitions` sites.
    Partitioned { column: usize, partitions: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCatalog {
    pub id: TableId,
    pub columns: Vec<ColumnCatalog>,
    pub distribution: TableDistribution,
    pub indexes: Vec<IndexCatalog>,
}

impl TableCatalog {
    pub fn new(id: impl Into<TableId>, columns: Vec<ColumnCatalog>) -> Self {
        Self {
            id: id.into(),
            columns,
            distribution: TableDistribution::Replicated,
            indexes: vec![],
        }
    }

    pub fn partitioned_on(mut self, column: usize, partitions: usize) -> Self {
        self.distribution = TableDistribution::Partitioned { column, partitions };
        self
    }

    pub fn with_index(mut self, index: IndexCatalog) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn row_type(&self) -> RowType {
        RowType::new(
            self.columns
                .iter()
                .map(|c| Field::new(c.name.clone(), c.data_type))
                .collect(),
        )
    }

    pub fn split_count(&self) -> usize {
        match self.distribution {
            TableDistribution::Replicated => 1,
            TableDistribution::Partitioned { partitions, .. } => partitions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCatalog {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnCatalog {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }
}

/// A secondary index over a table. Key columns are ordinals into the table's
/// column list, in index key order.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCatalog {
    pub name: String,
    pub key_columns: Vec<usize>,
    /// Predicate of a partial index, if any.
    pub partial_predicate: Option<ScalarExpr>,
    pub unique: bool,
}

impl IndexCatalog {
    pub fn new(name: impl Into<String>, key_columns: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            key_columns,
            partial_predicate: None,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn partial(mut self, predicate: ScalarExpr) -> Self {
        self.partial_predicate = Some(predicate);
        self
    }

    pub fn is_partial(&self) -> bool {
        self.partial_predicate.is_some()
    }
}
