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

//! The engine contract consumed by the session peer and the planner, plus
//! the in-memory reference engine.

pub mod memory;
pub mod scan;

use crate::catalog::Table;
use crate::error::Result;
use crate::planner::plan::{ExecutionPlan, Statement};
use crate::planner::{EvaluationContext, PlannerMetadata};
use crate::proto::{Channel, Record};
use crate::types::Value;
use scan::DataScanner;
use std::sync::Arc;

/// Transaction context of a single execution. Id 0 means no transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionContext {
    pub tx_id: u64,
}

impl TransactionContext {
    pub const NO_TRANSACTION: TransactionContext = TransactionContext { tx_id: 0 };

    pub fn with_transaction(tx_id: u64) -> Self {
        Self { tx_id }
    }

    pub fn in_transaction(&self) -> bool {
        self.tx_id != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Begin,
    Commit,
    Rollback,
}

/// Tagged execution result; the session shapes its reply by matching on the
/// variant.
pub enum StatementResult {
    Dml {
        update_count: u64,
        /// Encoded primary key of a single-row insert when the statement
        /// asked for returned values.
        key: Option<Vec<u8>>,
    },
    Get {
        record: Option<Record>,
    },
    Transaction {
        outcome: TxOutcome,
        tx_id: u64,
    },
    Ddl,
    Scan(Box<dyn DataScanner>),
}

impl std::fmt::Debug for StatementResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementResult::Dml { update_count, key } => f
                .debug_struct("Dml")
                .field("update_count", update_count)
                .field("key", key)
                .finish(),
            StatementResult::Get { record } => {
                f.debug_struct("Get").field("record", record).finish()
            }
            StatementResult::Transaction { outcome, tx_id } => f
                .debug_struct("Transaction")
                .field("outcome", outcome)
                .field("tx_id", tx_id)
                .finish(),
            StatementResult::Ddl => write!(f, "Ddl"),
            StatementResult::Scan(_) => f.debug_tuple("Scan").field(&"..").finish(),
        }
    }
}

impl StatementResult {
    pub fn kind(&self) -> &'static str {
        match self {
            StatementResult::Dml { .. } => "DML",
            StatementResult::Get { .. } => "Get",
            StatementResult::Transaction { .. } => "Transaction",
            StatementResult::Ddl => "DDL",
            StatementResult::Scan(_) => "Scan",
        }
    }
}

/// Storage engine contract. Implementations must be safe under concurrent
/// access from many sessions.
pub trait Engine: PlannerMetadata {
    fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        ctx: &EvaluationContext,
        tx: TransactionContext,
    ) -> Result<StatementResult>;

    /// Direct statement execution, used by session teardown for rollbacks.
    fn execute_statement(
        &self,
        statement: &Statement,
        ctx: &EvaluationContext,
        tx: TransactionContext,
    ) -> Result<StatementResult>;

    /// Schema lookup for primary-key decoding.
    fn table_metadata(&self, table_space: &str, table: &str) -> Result<Arc<Table>>;

    /// Stream a full table-space dump as result-set chunks directly over the
    /// given channel. The session does not own the dump state.
    fn dump_table_space(
        &self,
        table_space: &str,
        dump_id: &str,
        fetch_size: usize,
        request_id: u64,
        channel: &dyn Channel,
    ) -> Result<()>;
}

/// Build a record map from a schema and a row, preserving the engine's
/// column naming.
pub fn record_from_row(columns: &[crate::catalog::Column], row: &[Value]) -> Record {
    columns
        .iter()
        .zip(row.iter())
        .map(|(c, v)| (c.name.clone(), v.clone()))
        .collect()
}
