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

//! In-memory reference engine. It executes the planner's operator trees
//! directly over per-table row maps keyed by encoded primary key, with an
//! undo log per transaction. It is the engine the server binary boots and
//! the one every integration test runs against; durability and replication
//! are out of scope.

use crate::catalog::{encode_lookup_key, encode_primary_key, Column, Table};
use crate::engine::scan::TupleScanner;
use crate::engine::{record_from_row, Engine, StatementResult, TransactionContext, TxOutcome};
use crate::error::{Result, StrataError};
use crate::planner::plan::{DdlStatement, ExecutionPlan, GetStatement, PlanOp, Statement, TxStatement};
use crate::planner::{EvaluationContext, PlannerMetadata};
use crate::proto::{Channel, Reply};
use crate::types::{ColumnType, Value};
use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
struct TableData {
    table: Arc<RwLock<Arc<Table>>>,
    rows: Arc<RwLock<BTreeMap<Vec<u8>, Vec<Value>>>>,
}

impl TableData {
    fn new(table: Table) -> Self {
        Self {
            table: Arc::new(RwLock::new(Arc::new(table))),
            rows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    fn schema(&self) -> Arc<Table> {
        Arc::clone(&self.table.read())
    }
}

enum UndoOp {
    Insert {
        table_space: String,
        table: String,
        key: Vec<u8>,
    },
    Update {
        table_space: String,
        table: String,
        old_key: Vec<u8>,
        new_key: Vec<u8>,
        old_row: Vec<Value>,
    },
    Delete {
        table_space: String,
        table: String,
        key: Vec<u8>,
        old_row: Vec<Value>,
    },
}

struct TxData {
    table_space: String,
    undo: Mutex<Vec<UndoOp>>,
}

pub struct MemoryEngine {
    node_id: String,
    spaces: DashMap<String, DashMap<String, TableData>>,
    transactions: DashMap<u64, TxData>,
    next_tx: AtomicU64,
    not_leader: DashSet<String>,
}

impl MemoryEngine {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            spaces: DashMap::new(),
            transactions: DashMap::new(),
            next_tx: AtomicU64::new(0),
            not_leader: DashSet::new(),
        }
    }

    pub fn create_table_space(&self, name: &str) {
        self.spaces.entry(name.to_lowercase()).or_default();
    }

    pub fn define_table(&self, table: Table) -> Result<()> {
        let space = self
            .spaces
            .get(&table.table_space.to_lowercase())
            .ok_or_else(|| {
                StrataError::StatementExecution(format!(
                    "no such table space '{}'",
                    table.table_space
                ))
            })?;
        let name = table.name.to_lowercase();
        if space.contains_key(&name) {
            return Err(StrataError::StatementExecution(format!(
                "table '{}' already exists",
                table.name
            )));
        }
        space.insert(name, TableData::new(table));
        Ok(())
    }

    /// Test hook: mark a table space as led by another node so executions
    /// against it surface the not-leader signal.
    pub fn set_leader(&self, table_space: &str, leader: bool) {
        let key = table_space.to_lowercase();
        if leader {
            self.not_leader.remove(&key);
        } else {
            self.not_leader.insert(key);
        }
    }

    pub fn open_transaction_count(&self) -> usize {
        self.transactions.len()
    }

    fn check_leader(&self, table_space: &str) -> Result<()> {
        if self.not_leader.contains(&table_space.to_lowercase()) {
            return Err(StrataError::NotLeader {
                table_space: table_space.to_string(),
            });
        }
        Ok(())
    }

    fn table_data(&self, table_space: &str, table: &str) -> Result<TableData> {
        let space = self.spaces.get(&table_space.to_lowercase()).ok_or_else(|| {
            StrataError::StatementExecution(format!("no such table space '{table_space}'"))
        })?;
        let data = space.get(&table.to_lowercase()).ok_or_else(|| {
            StrataError::StatementExecution(format!(
                "no such table '{table}' in table space '{table_space}'"
            ))
        })?;
        Ok(data.clone())
    }

    fn push_undo(&self, tx: TransactionContext, op: UndoOp) {
        if !tx.in_transaction() {
            return;
        }
        if let Some(data) = self.transactions.get(&tx.tx_id) {
            data.undo.lock().push(op);
        }
    }

    fn execute_main(
        &self,
        main: &Statement,
        ctx: &EvaluationContext,
        tx: TransactionContext,
    ) -> Result<StatementResult> {
        match main {
            Statement::Tx(stmt) => {
                self.check_leader(stmt.table_space())?;
                self.execute_tx(stmt, tx)
            }
            Statement::Ddl(stmt) => {
                self.check_leader(stmt.table_space())?;
                self.execute_ddl(stmt)
            }
            Statement::Get(stmt) => {
                self.check_leader(&stmt.table_space)?;
                self.execute_get(stmt, ctx)
            }
            Statement::Planned(op) => {
                if let Some((table_space, _)) = op.table_ref() {
                    self.check_leader(table_space)?;
                }
                if op.is_scan() {
                    let (columns, rows) = self.execute_scan(op, ctx)?;
                    return Ok(StatementResult::Scan(Box::new(TupleScanner::new(
                        columns, rows,
                    ))));
                }
                self.execute_dml(op, ctx, tx)
            }
        }
    }

    fn execute_tx(&self, stmt: &TxStatement, tx: TransactionContext) -> Result<StatementResult> {
        match stmt {
            TxStatement::Begin { table_space } => {
                if !self.spaces.contains_key(&table_space.to_lowercase()) {
                    return Err(StrataError::StatementExecution(format!(
                        "no such table space '{table_space}'"
                    )));
                }
                let tx_id = self.next_tx.fetch_add(1, Ordering::Relaxed) + 1;
                self.transactions.insert(
                    tx_id,
                    TxData {
                        table_space: table_space.clone(),
                        undo: Mutex::new(Vec::new()),
                    },
                );
                Ok(StatementResult::Transaction {
                    outcome: TxOutcome::Begin,
                    tx_id,
                })
            }
            TxStatement::Commit { tx_id, .. } => {
                let tx_id = resolve_tx_id(*tx_id, tx)?;
                self.transactions.remove(&tx_id).ok_or_else(|| {
                    StrataError::StatementExecution(format!("no such transaction {tx_id}"))
                })?;
                Ok(StatementResult::Transaction {
                    outcome: TxOutcome::Commit,
                    tx_id,
                })
            }
            TxStatement::Rollback { tx_id, .. } => {
                let tx_id = resolve_tx_id(*tx_id, tx)?;
                let (_, data) = self.transactions.remove(&tx_id).ok_or_else(|| {
                    StrataError::StatementExecution(format!("no such transaction {tx_id}"))
                })?;
                self.apply_undo(data);
                Ok(StatementResult::Transaction {
                    outcome: TxOutcome::Rollback,
                    tx_id,
                })
            }
        }
    }

    fn apply_undo(&self, data: TxData) {
        let mut undo = data.undo.into_inner();
        debug!(
            table_space = %data.table_space,
            operations = undo.len(),
            "rolling back transaction"
        );
        while let Some(op) = undo.pop() {
            match op {
                UndoOp::Insert {
                    table_space,
                    table,
                    key,
                } => {
                    if let Ok(data) = self.table_data(&table_space, &table) {
                        data.rows.write().remove(&key);
                    }
                }
                UndoOp::Update {
                    table_space,
                    table,
                    old_key,
                    new_key,
                    old_row,
                } => {
                    if let Ok(data) = self.table_data(&table_space, &table) {
                        let mut rows = data.rows.write();
                        rows.remove(&new_key);
                        rows.insert(old_key, old_row);
                    }
                }
                UndoOp::Delete {
                    table_space,
                    table,
                    key,
                    old_row,
                } => {
                    if let Ok(data) = self.table_data(&table_space, &table) {
                        data.rows.write().insert(key, old_row);
                    }
                }
            }
        }
    }

    fn execute_ddl(&self, stmt: &DdlStatement) -> Result<StatementResult> {
        match stmt {
            DdlStatement::CreateTable { table } => {
                self.define_table(table.clone())?;
            }
            DdlStatement::DropTable { table_space, name } => {
                let space = self.spaces.get(&table_space.to_lowercase()).ok_or_else(|| {
                    StrataError::StatementExecution(format!(
                        "no such table space '{table_space}'"
                    ))
                })?;
                if space.remove(&name.to_lowercase()).is_none() {
                    return Err(StrataError::StatementExecution(format!(
                        "no such table '{name}'"
                    )));
                }
            }
            DdlStatement::AlterTableAddColumn {
                table_space,
                name,
                column,
            } => {
                let data = self.table_data(table_space, name)?;
                let mut guard = data.table.write();
                let mut table = (**guard).clone();
                if table.column_index(&column.name).is_some() {
                    return Err(StrataError::StatementExecution(format!(
                        "column '{}' already exists",
                        column.name
                    )));
                }
                table.columns.push(column.clone());
                *guard = Arc::new(table);
                for row in data.rows.write().values_mut() {
                    row.push(Value::Null);
                }
            }
            DdlStatement::AlterTableDropColumn {
                table_space,
                name,
                column,
            } => {
                let data = self.table_data(table_space, name)?;
                let mut guard = data.table.write();
                let mut table = (**guard).clone();
                let idx = table.column_index(column).ok_or_else(|| {
                    StrataError::StatementExecution(format!("no such column '{column}'"))
                })?;
                if table.primary_key.contains(&idx) {
                    return Err(StrataError::StatementExecution(format!(
                        "cannot drop primary key column '{column}'"
                    )));
                }
                table.columns.remove(idx);
                for pk in table.primary_key.iter_mut() {
                    if *pk > idx {
                        *pk -= 1;
                    }
                }
                *guard = Arc::new(table);
                for row in data.rows.write().values_mut() {
                    row.remove(idx);
                }
            }
            DdlStatement::Truncate { table_space, name } => {
                let data = self.table_data(table_space, name)?;
                data.rows.write().clear();
            }
        }
        Ok(StatementResult::Ddl)
    }

    fn execute_get(&self, stmt: &GetStatement, ctx: &EvaluationContext) -> Result<StatementResult> {
        let data = self.table_data(&stmt.table_space, &stmt.table.name)?;
        let table = data.schema();
        let key_value = stmt.key.eval_constant(ctx)?;
        let key = encode_lookup_key(&table, &key_value)?;
        let record = data
            .rows
            .read()
            .get(&key)
            .map(|row| record_from_row(&table.columns, row));
        Ok(StatementResult::Get { record })
    }

    fn execute_dml(
        &self,
        op: &PlanOp,
        ctx: &EvaluationContext,
        tx: TransactionContext,
    ) -> Result<StatementResult> {
        match op {
            PlanOp::Insert {
                table_space,
                table,
                input,
                return_values,
            } => {
                let data = self.table_data(table_space, &table.name)?;
                let table = data.schema();
                let (input_columns, input_rows) = self.execute_scan(input, ctx)?;

                // Map input fields onto the table schema by name.
                let mut mapping = Vec::with_capacity(input_columns.len());
                for column in &input_columns {
                    let idx = table.column_index(&column.name).ok_or_else(|| {
                        StrataError::StatementExecution(format!(
                            "no such column '{}' in table '{}'",
                            column.name, table.name
                        ))
                    })?;
                    mapping.push(idx);
                }

                let mut update_count = 0u64;
                let mut last_key = None;
                for input_row in input_rows {
                    let mut row = vec![Value::Null; table.columns.len()];
                    for (value, idx) in input_row.into_iter().zip(&mapping) {
                        row[*idx] = value.cast_to(table.columns[*idx].ctype)?;
                    }
                    let key = encode_primary_key(&table, &row)?;
                    let mut rows = data.rows.write();
                    if rows.contains_key(&key) {
                        return Err(StrataError::StatementExecution(format!(
                            "duplicate primary key in table '{}'",
                            table.name
                        )));
                    }
                    rows.insert(key.clone(), row);
                    drop(rows);
                    self.push_undo(
                        tx,
                        UndoOp::Insert {
                            table_space: table_space.clone(),
                            table: table.name.clone(),
                            key: key.clone(),
                        },
                    );
                    last_key = Some(key);
                    update_count += 1;
                }
                let key = if *return_values && update_count == 1 {
                    last_key
                } else {
                    None
                };
                Ok(StatementResult::Dml { update_count, key })
            }
            PlanOp::Update {
                table_space,
                table,
                assignments,
                predicate,
                ..
            } => {
                let data = self.table_data(table_space, &table.name)?;
                let table = data.schema();
                let mut resolved = Vec::with_capacity(assignments.len());
                for (name, expr) in assignments {
                    let idx = table.column_index(name).ok_or_else(|| {
                        StrataError::StatementExecution(format!(
                            "no such column '{}' in table '{}'",
                            name, table.name
                        ))
                    })?;
                    resolved.push((idx, expr));
                }

                let mut rows = data.rows.write();
                let matching: Vec<Vec<u8>> = rows
                    .iter()
                    .filter_map(|(key, row)| match predicate {
                        Some(p) => match p.eval_predicate(row, ctx) {
                            Ok(true) => Some(Ok(key.clone())),
                            Ok(false) => None,
                            Err(e) => Some(Err(e)),
                        },
                        None => Some(Ok(key.clone())),
                    })
                    .collect::<Result<_>>()?;

                let mut update_count = 0u64;
                for key in matching {
                    let Some(old_row) = rows.get(&key).cloned() else {
                        continue;
                    };
                    let mut new_row = old_row.clone();
                    for (idx, expr) in &resolved {
                        let value = expr.eval(&old_row, ctx)?;
                        new_row[*idx] = value.cast_to(table.columns[*idx].ctype)?;
                    }
                    let new_key = encode_primary_key(&table, &new_row)?;
                    if new_key != key && rows.contains_key(&new_key) {
                        return Err(StrataError::StatementExecution(format!(
                            "duplicate primary key in table '{}'",
                            table.name
                        )));
                    }
                    rows.remove(&key);
                    rows.insert(new_key.clone(), new_row);
                    self.push_undo(
                        tx,
                        UndoOp::Update {
                            table_space: table_space.clone(),
                            table: table.name.clone(),
                            old_key: key,
                            new_key,
                            old_row,
                        },
                    );
                    update_count += 1;
                }
                Ok(StatementResult::Dml {
                    update_count,
                    key: None,
                })
            }
            PlanOp::Delete {
                table_space,
                table,
                predicate,
                ..
            } => {
                let data = self.table_data(table_space, &table.name)?;
                let mut rows = data.rows.write();
                let matching: Vec<Vec<u8>> = rows
                    .iter()
                    .filter_map(|(key, row)| match predicate {
                        Some(p) => match p.eval_predicate(row, ctx) {
                            Ok(true) => Some(Ok(key.clone())),
                            Ok(false) => None,
                            Err(e) => Some(Err(e)),
                        },
                        None => Some(Ok(key.clone())),
                    })
                    .collect::<Result<_>>()?;

                let mut update_count = 0u64;
                for key in matching {
                    if let Some(old_row) = rows.remove(&key) {
                        self.push_undo(
                            tx,
                            UndoOp::Delete {
                                table_space: table_space.clone(),
                                table: table.name.clone(),
                                key,
                                old_row,
                            },
                        );
                        update_count += 1;
                    }
                }
                Ok(StatementResult::Dml {
                    update_count,
                    key: None,
                })
            }
            other => Err(StrataError::UnsupportedPlan(format!(
                "not a DML operator: {}",
                other.kind()
            ))),
        }
    }

    fn execute_scan(
        &self,
        op: &PlanOp,
        ctx: &EvaluationContext,
    ) -> Result<(Vec<Column>, Vec<Vec<Value>>)> {
        match op {
            PlanOp::TableScan { table_space, table } => {
                let data = self.table_data(table_space, &table.name)?;
                let schema = data.schema();
                let rows = data.rows.read().values().cloned().collect();
                Ok((schema.columns.clone(), rows))
            }
            PlanOp::FilteredTableScan {
                table_space,
                table,
                predicate,
            } => {
                let data = self.table_data(table_space, &table.name)?;
                let schema = data.schema();
                let mut out = Vec::new();
                for row in data.rows.read().values() {
                    if predicate.eval_predicate(row, ctx)? {
                        out.push(row.clone());
                    }
                }
                Ok((schema.columns.clone(), out))
            }
            PlanOp::Filter { input, condition } => {
                let (columns, rows) = self.execute_scan(input, ctx)?;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    if condition.eval_predicate(&row, ctx)? {
                        out.push(row);
                    }
                }
                Ok((columns, out))
            }
            PlanOp::Project {
                input,
                columns,
                exprs,
                ..
            } => {
                let (_, rows) = self.execute_scan(input, ctx)?;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut projected = Vec::with_capacity(exprs.len());
                    for expr in exprs {
                        projected.push(expr.eval(&row, ctx)?);
                    }
                    out.push(projected);
                }
                Ok((columns.clone(), out))
            }
            PlanOp::Sort {
                input,
                directions,
                fields,
            } => {
                let (columns, mut rows) = self.execute_scan(input, ctx)?;
                rows.sort_by(|a, b| {
                    for (field, asc) in fields.iter().zip(directions) {
                        let ord = a[*field]
                            .compare(&b[*field])
                            .unwrap_or(std::cmp::Ordering::Equal);
                        let ord = if *asc { ord } else { ord.reverse() };
                        if ord != std::cmp::Ordering::Equal {
                            return ord;
                        }
                    }
                    std::cmp::Ordering::Equal
                });
                Ok((columns, rows))
            }
            PlanOp::Limit {
                input,
                fetch,
                offset,
            } => {
                let (columns, rows) = self.execute_scan(input, ctx)?;
                let offset = eval_limit_value(offset.as_ref(), ctx)?.unwrap_or(0);
                let fetch = eval_limit_value(fetch.as_ref(), ctx)?;
                let iter = rows.into_iter().skip(offset);
                let rows = match fetch {
                    Some(n) => iter.take(n).collect(),
                    None => iter.collect(),
                };
                Ok((columns, rows))
            }
            PlanOp::Aggregate {
                input,
                columns,
                functions,
                arg_lists,
                group_fields,
                ..
            } => {
                let (_, rows) = self.execute_scan(input, ctx)?;
                aggregate_rows(columns, functions, arg_lists, group_fields, rows)
            }
            PlanOp::Values { columns, rows, .. } => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut values = Vec::with_capacity(row.len());
                    for expr in row {
                        values.push(expr.eval_constant(ctx)?);
                    }
                    out.push(values);
                }
                Ok((columns.clone(), out))
            }
            other => Err(StrataError::UnsupportedPlan(format!(
                "not a scan operator: {}",
                other.kind()
            ))),
        }
    }
}

fn resolve_tx_id(stmt_tx: Option<u64>, ctx_tx: TransactionContext) -> Result<u64> {
    stmt_tx
        .or(ctx_tx.in_transaction().then_some(ctx_tx.tx_id))
        .ok_or_else(|| {
            StrataError::StatementExecution(
                "transaction statement without a transaction id".to_string(),
            )
        })
}

fn eval_limit_value(
    expr: Option<&crate::planner::expression::CompiledExpr>,
    ctx: &EvaluationContext,
) -> Result<Option<usize>> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    match expr.eval_constant(ctx)? {
        Value::Integer(v) if v >= 0 => Ok(Some(v as usize)),
        Value::Long(v) if v >= 0 => Ok(Some(v as usize)),
        other => Err(StrataError::StatementExecution(format!(
            "invalid LIMIT/OFFSET value {other:?}"
        ))),
    }
}

enum AggAcc {
    Count(u64),
    Sum(Option<i64>),
    Min(Option<Value>),
    Max(Option<Value>),
    Avg { sum: i64, n: u64 },
}

impl AggAcc {
    fn new(function: &str) -> Result<Self> {
        match function {
            "count" => Ok(AggAcc::Count(0)),
            "sum" => Ok(AggAcc::Sum(None)),
            "min" => Ok(AggAcc::Min(None)),
            "max" => Ok(AggAcc::Max(None)),
            "avg" => Ok(AggAcc::Avg { sum: 0, n: 0 }),
            other => Err(StrataError::StatementExecution(format!(
                "unknown aggregation function '{other}'"
            ))),
        }
    }

    fn update(&mut self, row: &[Value], args: &[usize]) -> Result<()> {
        let arg = args.first().map(|idx| &row[*idx]);
        match self {
            AggAcc::Count(n) => {
                if arg.map(|v| !v.is_null()).unwrap_or(true) {
                    *n += 1;
                }
            }
            AggAcc::Sum(acc) => {
                if let Some(value) = arg.filter(|v| !v.is_null()) {
                    let current = Value::Long(acc.unwrap_or(0));
                    let Value::Long(next) = current.add(value)?.cast_to(ColumnType::Long)? else {
                        unreachable!("sum of longs is a long");
                    };
                    *acc = Some(next);
                }
            }
            AggAcc::Min(acc) => {
                if let Some(value) = arg.filter(|v| !v.is_null()) {
                    let replace = match acc {
                        Some(current) => {
                            value.compare(current) == Some(std::cmp::Ordering::Less)
                        }
                        None => true,
                    };
                    if replace {
                        *acc = Some(value.clone());
                    }
                }
            }
            AggAcc::Max(acc) => {
                if let Some(value) = arg.filter(|v| !v.is_null()) {
                    let replace = match acc {
                        Some(current) => {
                            value.compare(current) == Some(std::cmp::Ordering::Greater)
                        }
                        None => true,
                    };
                    if replace {
                        *acc = Some(value.clone());
                    }
                }
            }
            AggAcc::Avg { sum, n } => {
                if let Some(value) = arg.filter(|v| !v.is_null()) {
                    let Value::Long(v) = value.cast_to(ColumnType::Long)? else {
                        unreachable!("cast to long yields long");
                    };
                    *sum += v;
                    *n += 1;
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            AggAcc::Count(n) => Value::Long(n as i64),
            AggAcc::Sum(acc) => acc.map(Value::Long).unwrap_or(Value::Null),
            AggAcc::Min(acc) | AggAcc::Max(acc) => acc.unwrap_or(Value::Null),
            AggAcc::Avg { sum, n } => {
                if n == 0 {
                    Value::Null
                } else {
                    Value::Long(sum / n as i64)
                }
            }
        }
    }
}

fn aggregate_rows(
    columns: &[Column],
    functions: &[String],
    arg_lists: &[Vec<usize>],
    group_fields: &[usize],
    rows: Vec<Vec<Value>>,
) -> Result<(Vec<Column>, Vec<Vec<Value>>)> {
    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut groups: HashMap<Vec<Value>, Vec<AggAcc>> = HashMap::new();

    if group_fields.is_empty() {
        // A global aggregate produces exactly one row, even over no input.
        let accs = functions
            .iter()
            .map(|f| AggAcc::new(f))
            .collect::<Result<Vec<_>>>()?;
        order.push(Vec::new());
        groups.insert(Vec::new(), accs);
    }

    for row in &rows {
        let key: Vec<Value> = group_fields.iter().map(|idx| row[*idx].clone()).collect();
        if !groups.contains_key(&key) {
            let accs = functions
                .iter()
                .map(|f| AggAcc::new(f))
                .collect::<Result<Vec<_>>>()?;
            order.push(key.clone());
            groups.insert(key.clone(), accs);
        }
        let accs = groups.get_mut(&key).expect("group present");
        for (acc, args) in accs.iter_mut().zip(arg_lists) {
            acc.update(row, args)?;
        }
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let accs = groups.remove(&key).expect("group present");
        let mut row = key;
        row.extend(accs.into_iter().map(AggAcc::finish));
        out.push(row);
    }
    Ok((columns.to_vec(), out))
}

impl PlannerMetadata for MemoryEngine {
    fn local_table_spaces(&self) -> Vec<String> {
        self.spaces.iter().map(|e| e.key().clone()).collect()
    }

    fn tables_for_planner(&self, table_space: &str) -> Result<Vec<Arc<Table>>> {
        let space = self.spaces.get(&table_space.to_lowercase()).ok_or_else(|| {
            StrataError::StatementExecution(format!("no such table space '{table_space}'"))
        })?;
        Ok(space.iter().map(|e| e.value().schema()).collect())
    }

    fn node_id(&self) -> String {
        self.node_id.clone()
    }
}

impl Engine for MemoryEngine {
    fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        ctx: &EvaluationContext,
        tx: TransactionContext,
    ) -> Result<StatementResult> {
        self.execute_main(&plan.main, ctx, tx)
    }

    fn execute_statement(
        &self,
        statement: &Statement,
        ctx: &EvaluationContext,
        tx: TransactionContext,
    ) -> Result<StatementResult> {
        self.execute_main(statement, ctx, tx)
    }

    fn table_metadata(&self, table_space: &str, table: &str) -> Result<Arc<Table>> {
        Ok(self.table_data(table_space, table)?.schema())
    }

    fn dump_table_space(
        &self,
        table_space: &str,
        dump_id: &str,
        fetch_size: usize,
        request_id: u64,
        channel: &dyn Channel,
    ) -> Result<()> {
        self.check_leader(table_space)?;
        let space = self.spaces.get(&table_space.to_lowercase()).ok_or_else(|| {
            StrataError::StatementExecution(format!("no such table space '{table_space}'"))
        })?;

        let tables: Vec<TableData> = space.iter().map(|e| e.value().clone()).collect();
        drop(space);

        let fetch_size = fetch_size.max(1);
        let mut chunks = Vec::new();
        for data in tables {
            let table = data.schema();
            let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
            let rows: Vec<Vec<Value>> = data.rows.read().values().cloned().collect();
            if rows.is_empty() {
                chunks.push((columns, Vec::new()));
                continue;
            }
            for chunk in rows.chunks(fetch_size) {
                let records = chunk
                    .iter()
                    .map(|row| record_from_row(&table.columns, row))
                    .collect();
                chunks.push((columns.clone(), records));
            }
        }
        if chunks.is_empty() {
            chunks.push((Vec::new(), Vec::new()));
        }

        let total = chunks.len();
        for (i, (columns, records)) in chunks.into_iter().enumerate() {
            channel.send_reply(
                request_id,
                Reply::ResultSetChunk {
                    scanner_id: dump_id.to_string(),
                    columns,
                    rows: records,
                    last: i + 1 == total,
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryEngine;
    use crate::catalog::{Column, Table};
    use crate::engine::{Engine, StatementResult, TransactionContext, TxOutcome};
    use crate::planner::{EvaluationContext, Translator};
    use crate::types::{ColumnType, Value};
    use std::sync::Arc;

    fn engine() -> Arc<MemoryEngine> {
        let engine = Arc::new(MemoryEngine::new("node-a"));
        engine.create_table_space("ts1");
        engine
            .define_table(Table {
                table_space: "ts1".to_string(),
                name: "t".to_string(),
                columns: vec![
                    Column::new("a", ColumnType::Integer),
                    Column::new("b", ColumnType::String),
                ],
                primary_key: vec![0],
            })
            .expect("table");
        engine
    }

    fn run(
        engine: &Arc<MemoryEngine>,
        translator: &Translator,
        query: &str,
        params: Vec<Value>,
        tx: TransactionContext,
    ) -> StatementResult {
        let translated = translator
            .translate("ts1", query, params, false, true, true, 0)
            .expect("translate");
        engine
            .execute_plan(&translated.plan, &translated.context, tx)
            .expect("execute")
    }

    #[test]
    fn insert_returns_update_count_and_decodable_key() {
        let engine = engine();
        let translator = Translator::new(engine.clone());
        let result = run(
            &engine,
            &translator,
            "INSERT INTO t(a,b) VALUES(1,'x')",
            vec![],
            TransactionContext::NO_TRANSACTION,
        );
        match result {
            StatementResult::Dml { update_count, key } => {
                assert_eq!(update_count, 1);
                assert_eq!(key.expect("key"), 1i32.to_be_bytes().to_vec());
            }
            other => panic!("unexpected result {}", other.kind()),
        }
    }

    #[test]
    fn point_lookup_answers_as_get() {
        let engine = engine();
        let translator = Translator::new(engine.clone());
        run(
            &engine,
            &translator,
            "INSERT INTO t(a,b) VALUES(2,'y')",
            vec![],
            TransactionContext::NO_TRANSACTION,
        );
        let result = run(
            &engine,
            &translator,
            "SELECT * FROM t WHERE a = 2",
            vec![],
            TransactionContext::NO_TRANSACTION,
        );
        match result {
            StatementResult::Get { record } => {
                let record = record.expect("found");
                assert_eq!(record.get("b"), Some(&Value::String("y".to_string())));
            }
            other => panic!("unexpected result {}", other.kind()),
        }
        let missing = run(
            &engine,
            &translator,
            "SELECT * FROM t WHERE a = 99",
            vec![],
            TransactionContext::NO_TRANSACTION,
        );
        match missing {
            StatementResult::Get { record } => assert!(record.is_none()),
            other => panic!("unexpected result {}", other.kind()),
        }
    }

    #[test]
    fn rollback_undoes_transactional_writes() {
        let engine = engine();
        let translator = Translator::new(engine.clone());
        let begin = run(
            &engine,
            &translator,
            "BEGIN",
            vec![],
            TransactionContext::NO_TRANSACTION,
        );
        let StatementResult::Transaction {
            outcome: TxOutcome::Begin,
            tx_id,
        } = begin
        else {
            panic!("expected begin result");
        };
        run(
            &engine,
            &translator,
            "INSERT INTO t(a,b) VALUES(5,'tx')",
            vec![],
            TransactionContext::with_transaction(tx_id),
        );
        run(
            &engine,
            &translator,
            "ROLLBACK",
            vec![],
            TransactionContext::with_transaction(tx_id),
        );
        let result = run(
            &engine,
            &translator,
            "SELECT * FROM t WHERE a = 5",
            vec![],
            TransactionContext::NO_TRANSACTION,
        );
        match result {
            StatementResult::Get { record } => assert!(record.is_none()),
            other => panic!("unexpected result {}", other.kind()),
        }
        assert_eq!(engine.open_transaction_count(), 0);
    }

    #[test]
    fn not_leader_table_space_surfaces_the_signal() {
        let engine = engine();
        let translator = Translator::new(engine.clone());
        engine.set_leader("ts1", false);
        let translated = translator
            .translate(
                "ts1",
                "INSERT INTO t(a,b) VALUES(1,'x')",
                vec![],
                false,
                true,
                true,
                0,
            )
            .expect("translate");
        let err = engine
            .execute_plan(
                &translated.plan,
                &translated.context,
                TransactionContext::NO_TRANSACTION,
            )
            .expect_err("must fail");
        assert!(err.is_not_leader());
    }

    #[test]
    fn aggregate_query_groups_and_counts() {
        let engine = engine();
        let translator = Translator::new(engine.clone());
        for (a, b) in [(1, "x"), (2, "x"), (3, "y")] {
            run(
                &engine,
                &translator,
                &format!("INSERT INTO t(a,b) VALUES({a},'{b}')"),
                vec![],
                TransactionContext::NO_TRANSACTION,
            );
        }
        let translated = translator
            .translate(
                "ts1",
                "SELECT b, count(*) AS n FROM t GROUP BY b ORDER BY b",
                vec![],
                true,
                true,
                true,
                0,
            )
            .expect("translate");
        let result = engine
            .execute_plan(
                &translated.plan,
                &translated.context,
                TransactionContext::NO_TRANSACTION,
            )
            .expect("execute");
        let StatementResult::Scan(mut scanner) = result else {
            panic!("expected scan");
        };
        let rows = scanner.consume(10).expect("consume");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Value::String("x".to_string()), Value::Long(2)]);
        assert_eq!(rows[1], vec![Value::String("y".to_string()), Value::Long(1)]);
    }

    #[test]
    fn update_and_delete_report_affected_rows() {
        let engine = engine();
        let translator = Translator::new(engine.clone());
        for a in 1..=4 {
            run(
                &engine,
                &translator,
                &format!("INSERT INTO t(a,b) VALUES({a},'v')"),
                vec![],
                TransactionContext::NO_TRANSACTION,
            );
        }
        let updated = run(
            &engine,
            &translator,
            "UPDATE t SET b = 'w' WHERE a > 2",
            vec![],
            TransactionContext::NO_TRANSACTION,
        );
        match updated {
            StatementResult::Dml { update_count, .. } => assert_eq!(update_count, 2),
            other => panic!("unexpected result {}", other.kind()),
        }
        let deleted = run(
            &engine,
            &translator,
            "DELETE FROM t WHERE b = 'w'",
            vec![],
            TransactionContext::NO_TRANSACTION,
        );
        match deleted {
            StatementResult::Dml { update_count, .. } => assert_eq!(update_count, 2),
            other => panic!("unexpected result {}", other.kind()),
        }
    }

    #[test]
    fn default_evaluation_context_supports_internal_rollback() {
        let engine = engine();
        let translator = Translator::new(engine.clone());
        let begin = run(
            &engine,
            &translator,
            "BEGIN",
            vec![],
            TransactionContext::NO_TRANSACTION,
        );
        let StatementResult::Transaction { tx_id, .. } = begin else {
            panic!("expected transaction result");
        };
        let rollback = crate::planner::plan::Statement::Tx(
            crate::planner::plan::TxStatement::Rollback {
                table_space: "ts1".to_string(),
                tx_id: Some(tx_id),
            },
        );
        let result = engine
            .execute_statement(
                &rollback,
                &EvaluationContext::default_context(),
                TransactionContext::NO_TRANSACTION,
            )
            .expect("rollback");
        assert!(matches!(
            result,
            StatementResult::Transaction {
                outcome: TxOutcome::Rollback,
                ..
            }
        ));
    }
}
