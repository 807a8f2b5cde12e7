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

//! Lowering of bound statements into the operator algebra. DML conversion
//! pattern-matches the shape of its input tree and rejects anything it
//! cannot express, naming the offending shape.

use crate::catalog::{Column, Table};
use crate::error::{Result, StrataError};
use crate::planner::binder::{BoundProjection, BoundStatement};
use crate::planner::expression::CompiledExpr;
use crate::planner::plan::PlanOp;
use crate::planner::type_map::{column_type_to_sql_type, sql_type_to_column_type};
use std::sync::Arc;

pub(crate) fn lower(
    bound: BoundStatement,
    node_id: &str,
    return_values: bool,
) -> Result<PlanOp> {
    match bound {
        BoundStatement::Select(select) => {
            let mut op = PlanOp::TableScan {
                table_space: select.table_space.clone(),
                table: Arc::clone(&select.table),
            };
            if let Some(condition) = select.filter {
                op = PlanOp::Filter {
                    input: Box::new(op),
                    condition,
                };
            }
            op = lower_projection(op, select.projection, &select.table)?;
            if !select.order_by.is_empty() {
                let (fields, directions) = select.order_by.into_iter().unzip();
                op = PlanOp::Sort {
                    input: Box::new(op),
                    directions,
                    fields,
                };
            }
            if select.fetch.is_some() || select.offset.is_some() {
                op = PlanOp::Limit {
                    input: Box::new(op),
                    fetch: select.fetch,
                    offset: select.offset,
                };
            }
            Ok(op)
        }
        BoundStatement::Insert(insert) => {
            let mut columns = Vec::with_capacity(insert.field_names.len());
            for name in &insert.field_names {
                let column = insert.table.column(name).ok_or_else(|| {
                    StrataError::StatementExecution(format!(
                        "no such column '{}' in table '{}'",
                        name, insert.table.name
                    ))
                })?;
                columns.push(column.clone());
            }
            let values = PlanOp::Values {
                node_id: node_id.to_string(),
                field_names: insert.field_names,
                columns,
                rows: insert.rows,
            };
            Ok(PlanOp::Insert {
                table_space: insert.table_space,
                table: insert.table,
                input: Box::new(values),
                return_values,
            })
        }
        BoundStatement::Update(update) => {
            let input = scan_with_filter(&update.table_space, &update.table, update.filter);
            plan_update(
                update.table_space,
                update.table,
                update.assignments,
                input,
                return_values,
            )
        }
        BoundStatement::Delete(delete) => {
            let input = scan_with_filter(&delete.table_space, &delete.table, delete.filter);
            plan_delete(delete.table_space, delete.table, input, return_values)
        }
    }
}

fn scan_with_filter(
    table_space: &str,
    table: &Arc<Table>,
    filter: Option<CompiledExpr>,
) -> PlanOp {
    let scan = PlanOp::TableScan {
        table_space: table_space.to_string(),
        table: Arc::clone(table),
    };
    match filter {
        Some(condition) => PlanOp::Filter {
            input: Box::new(scan),
            condition,
        },
        None => scan,
    }
}

fn lower_projection(
    input: PlanOp,
    projection: BoundProjection,
    table: &Table,
) -> Result<PlanOp> {
    match projection {
        BoundProjection::Wildcard => Ok(input),
        BoundProjection::Exprs {
            names,
            exprs,
            types,
        } => {
            let columns = names
                .iter()
                .zip(&types)
                .map(|(name, t)| Column::new(name.clone(), *t))
                .collect();
            Ok(PlanOp::Project {
                input: Box::new(input),
                field_names: names,
                columns,
                exprs,
            })
        }
        BoundProjection::Aggregate { group, aggs } => {
            let mut field_names = Vec::with_capacity(group.len() + aggs.len());
            let mut columns = Vec::with_capacity(group.len() + aggs.len());
            let mut group_fields = Vec::with_capacity(group.len());
            for (idx, name) in &group {
                let source = &table.columns[*idx];
                let ctype = sql_type_to_column_type(column_type_to_sql_type(source.ctype))?;
                field_names.push(name.clone());
                columns.push(Column::new(name.clone(), ctype));
                group_fields.push(*idx);
            }
            let mut functions = Vec::with_capacity(aggs.len());
            let mut arg_lists = Vec::with_capacity(aggs.len());
            for agg in aggs {
                field_names.push(agg.alias.clone());
                columns.push(Column::new(agg.alias, agg.ctype));
                functions.push(agg.function);
                arg_lists.push(agg.args);
            }
            Ok(PlanOp::Aggregate {
                input: Box::new(input),
                field_names,
                columns,
                functions,
                arg_lists,
                group_fields,
            })
        }
    }
}

/// DELETE accepts a bare scan or a single filter over a scan.
pub(crate) fn plan_delete(
    table_space: String,
    table: Arc<Table>,
    input: PlanOp,
    return_values: bool,
) -> Result<PlanOp> {
    let predicate = match input {
        PlanOp::TableScan { .. } => None,
        PlanOp::Filter { input, condition } if matches!(*input, PlanOp::TableScan { .. }) => {
            Some(condition)
        }
        other => {
            return Err(StrataError::UnsupportedPlan(format!(
                "unsupported input for DELETE: {}",
                other.kind()
            )))
        }
    };
    Ok(PlanOp::Delete {
        table_space,
        table,
        predicate,
        return_values,
    })
}

/// UPDATE additionally accepts a projection over the scan shapes, which is
/// what a planner emits for `SET col = expr` source expressions.
pub(crate) fn plan_update(
    table_space: String,
    table: Arc<Table>,
    assignments: Vec<(String, CompiledExpr)>,
    input: PlanOp,
    return_values: bool,
) -> Result<PlanOp> {
    let predicate = match input {
        PlanOp::TableScan { .. } => None,
        PlanOp::Filter { input, condition } if matches!(*input, PlanOp::TableScan { .. }) => {
            Some(condition)
        }
        PlanOp::Project { input, .. } => match *input {
            PlanOp::TableScan { .. } => None,
            PlanOp::Filter { input, condition }
                if matches!(*input, PlanOp::TableScan { .. }) =>
            {
                Some(condition)
            }
            PlanOp::FilteredTableScan { predicate, .. } => Some(predicate),
            other => {
                return Err(StrataError::UnsupportedPlan(format!(
                    "unsupported input for UPDATE: Project({})",
                    other.kind()
                )))
            }
        },
        other => {
            return Err(StrataError::UnsupportedPlan(format!(
                "unsupported input for UPDATE: {}",
                other.kind()
            )))
        }
    };
    Ok(PlanOp::Update {
        table_space,
        table,
        assignments,
        predicate,
        return_values,
    })
}
