/*
 * Copyright 2026 StrataDB Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The internal operator algebra and the statements an execution plan can
//! carry. Operator trees are immutable once produced; every composite node
//! owns its children.

use crate::catalog::{Column, Table};
use crate::planner::expression::CompiledExpr;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOp {
    TableScan {
        table_space: String,
        table: Arc<Table>,
    },
    /// A table scan with the predicate pushed into the scan itself.
    FilteredTableScan {
        table_space: String,
        table: Arc<Table>,
        predicate: CompiledExpr,
    },
    Filter {
        input: Box<PlanOp>,
        condition: CompiledExpr,
    },
    Project {
        input: Box<PlanOp>,
        field_names: Vec<String>,
        columns: Vec<Column>,
        exprs: Vec<CompiledExpr>,
    },
    Sort {
        input: Box<PlanOp>,
        /// true = ascending, parallel to `fields`.
        directions: Vec<bool>,
        fields: Vec<usize>,
    },
    Limit {
        input: Box<PlanOp>,
        fetch: Option<CompiledExpr>,
        offset: Option<CompiledExpr>,
    },
    Aggregate {
        input: Box<PlanOp>,
        field_names: Vec<String>,
        columns: Vec<Column>,
        /// Aggregation functions by name ("count", "sum", ...), parallel to
        /// `arg_lists`.
        functions: Vec<String>,
        arg_lists: Vec<Vec<usize>>,
        group_fields: Vec<usize>,
    },
    Values {
        node_id: String,
        field_names: Vec<String>,
        columns: Vec<Column>,
        rows: Vec<Vec<CompiledExpr>>,
    },
    Insert {
        table_space: String,
        table: Arc<Table>,
        input: Box<PlanOp>,
        return_values: bool,
    },
    Update {
        table_space: String,
        table: Arc<Table>,
        /// (column name, source expression) pairs in assignment order; the
        /// expressions read the current row of the target table.
        assignments: Vec<(String, CompiledExpr)>,
        predicate: Option<CompiledExpr>,
        return_values: bool,
    },
    Delete {
        table_space: String,
        table: Arc<Table>,
        predicate: Option<CompiledExpr>,
        return_values: bool,
    },
}

impl PlanOp {
    /// Whether this operator produces a stream of rows.
    pub fn is_scan(&self) -> bool {
        !matches!(
            self,
            PlanOp::Insert { .. } | PlanOp::Update { .. } | PlanOp::Delete { .. }
        )
    }

    /// Declared output schema. For every composite node this equals the
    /// schema its parent consumes at the corresponding input position.
    pub fn output_schema(&self) -> Vec<Column> {
        match self {
            PlanOp::TableScan { table, .. } | PlanOp::FilteredTableScan { table, .. } => {
                table.columns.clone()
            }
            PlanOp::Filter { input, .. }
            | PlanOp::Sort { input, .. }
            | PlanOp::Limit { input, .. } => input.output_schema(),
            PlanOp::Project { columns, .. }
            | PlanOp::Aggregate { columns, .. }
            | PlanOp::Values { columns, .. } => columns.clone(),
            PlanOp::Insert { .. } | PlanOp::Update { .. } | PlanOp::Delete { .. } => Vec::new(),
        }
    }

    /// The (table space, table) this operator ultimately targets, if any.
    pub fn table_ref(&self) -> Option<(&str, &str)> {
        match self {
            PlanOp::TableScan { table_space, table }
            | PlanOp::FilteredTableScan {
                table_space, table, ..
            }
            | PlanOp::Insert {
                table_space, table, ..
            }
            | PlanOp::Update {
                table_space, table, ..
            }
            | PlanOp::Delete {
                table_space, table, ..
            } => Some((table_space, &table.name)),
            PlanOp::Filter { input, .. }
            | PlanOp::Project { input, .. }
            | PlanOp::Sort { input, .. }
            | PlanOp::Limit { input, .. }
            | PlanOp::Aggregate { input, .. } => input.table_ref(),
            PlanOp::Values { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PlanOp::TableScan { .. } => "TableScan",
            PlanOp::FilteredTableScan { .. } => "FilteredTableScan",
            PlanOp::Filter { .. } => "Filter",
            PlanOp::Project { .. } => "Project",
            PlanOp::Sort { .. } => "Sort",
            PlanOp::Limit { .. } => "Limit",
            PlanOp::Aggregate { .. } => "Aggregate",
            PlanOp::Values { .. } => "Values",
            PlanOp::Insert { .. } => "Insert",
            PlanOp::Update { .. } => "Update",
            PlanOp::Delete { .. } => "Delete",
        }
    }
}

/// Primary-key point lookup, detected by the translator on the non-scan
/// path so single-row reads avoid cursor machinery.
#[derive(Debug, Clone, PartialEq)]
pub struct GetStatement {
    pub table_space: String,
    pub table: Arc<Table>,
    pub key: CompiledExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TxStatement {
    Begin {
        table_space: String,
    },
    Commit {
        table_space: String,
        /// Falls back to the transaction context when absent.
        tx_id: Option<u64>,
    },
    Rollback {
        table_space: String,
        tx_id: Option<u64>,
    },
}

impl TxStatement {
    pub fn table_space(&self) -> &str {
        match self {
            TxStatement::Begin { table_space }
            | TxStatement::Commit { table_space, .. }
            | TxStatement::Rollback { table_space, .. } => table_space,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DdlStatement {
    CreateTable {
        table: Table,
    },
    DropTable {
        table_space: String,
        name: String,
    },
    AlterTableAddColumn {
        table_space: String,
        name: String,
        column: Column,
    },
    AlterTableDropColumn {
        table_space: String,
        name: String,
        column: String,
    },
    Truncate {
        table_space: String,
        name: String,
    },
}

impl DdlStatement {
    pub fn table_space(&self) -> &str {
        match self {
            DdlStatement::CreateTable { table } => &table.table_space,
            DdlStatement::DropTable { table_space, .. }
            | DdlStatement::AlterTableAddColumn { table_space, .. }
            | DdlStatement::AlterTableDropColumn { table_space, .. }
            | DdlStatement::Truncate { table_space, .. } => table_space,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Planned(PlanOp),
    Get(GetStatement),
    Ddl(DdlStatement),
    Tx(TxStatement),
}

impl Statement {
    pub fn is_scan(&self) -> bool {
        matches!(self, Statement::Planned(op) if op.is_scan())
    }

    /// The (table space, table) a DML statement targets, used by the session
    /// to decode primary keys out of DML results.
    pub fn table_ref(&self) -> Option<(&str, &str)> {
        match self {
            Statement::Planned(op) => op.table_ref(),
            Statement::Get(get) => Some((&get.table_space, &get.table.name)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub main: Statement,
}

impl ExecutionPlan {
    pub fn simple(main: Statement) -> Self {
        Self { main }
    }
}
