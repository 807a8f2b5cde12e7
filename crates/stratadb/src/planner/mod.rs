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

//! SQL planner front-end.
//!
//! `Translator::translate` is the single public entry point: DDL,
//! transaction control and EXECUTE commands take the fast path into the
//! fallback planner; everything else is parsed, validated against the
//! engine's table-space metadata, and lowered to the operator algebra.

pub mod binder;
pub mod expression;
pub mod fallback;
pub mod lowering;
pub mod optimizer;
pub mod plan;
pub mod type_map;

use crate::error::{Result, StrataError};
use crate::planner::binder::{Binder, SchemaView};
use crate::planner::expression::{BinaryOp, CompiledExpr};
use crate::planner::fallback::FallbackPlanner;
use crate::planner::plan::{ExecutionPlan, GetStatement, PlanOp, Statement};
use crate::types::Value;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::sync::Arc;

/// Engine metadata the planner builds its root schema from.
pub trait PlannerMetadata: Send + Sync {
    fn local_table_spaces(&self) -> Vec<String>;
    fn tables_for_planner(&self, table_space: &str) -> Result<Vec<Arc<crate::catalog::Table>>>;
    fn node_id(&self) -> String;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    pub query: String,
    pub params: Vec<Value>,
}

impl EvaluationContext {
    pub fn new(query: String, params: Vec<Value>) -> Self {
        Self { query, params }
    }

    /// Context for internally issued statements (session teardown).
    pub fn default_context() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct TranslatedQuery {
    pub plan: ExecutionPlan,
    pub context: EvaluationContext,
}

/// Prefixes routed to the fallback planner. The check follows the incoming
/// convention: uppercase, case-sensitive, no leading-whitespace trim.
const FAST_PATH_PREFIXES: [&str; 8] = [
    "CREATE", "DROP", "EXECUTE", "ALTER", "BEGIN", "COMMIT", "ROLLBACK", "TRUNCATE",
];

pub struct Translator {
    metadata: Arc<dyn PlannerMetadata>,
    fallback: FallbackPlanner,
}

impl Translator {
    pub fn new(metadata: Arc<dyn PlannerMetadata>) -> Self {
        Self {
            metadata,
            fallback: FallbackPlanner::default(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn translate(
        &self,
        default_table_space: &str,
        query: &str,
        params: Vec<Value>,
        wants_scan: bool,
        allow_cache: bool,
        return_values: bool,
        max_rows: usize,
    ) -> Result<TranslatedQuery> {
        if FAST_PATH_PREFIXES.iter().any(|p| query.starts_with(p)) {
            return self
                .fallback
                .translate(default_table_space, query, params, allow_cache, return_values);
        }

        let schema = SchemaView::build(&*self.metadata)?;
        let statements = Parser::parse_sql(&MySqlDialect {}, query)
            .map_err(|e| StrataError::StatementExecution(format!("parse error: {e}")))?;
        let [stmt] = statements.as_slice() else {
            return Err(StrataError::StatementExecution(
                "expected exactly one statement".to_string(),
            ));
        };

        let binder = Binder::new(&schema, default_table_space);
        let bound = binder.bind(stmt)?;
        let node_id = self.metadata.node_id();
        let mut op = optimizer::optimize(lowering::lower(bound, &node_id, return_values)?);
        if max_rows > 0 && op.is_scan() {
            op = PlanOp::Limit {
                input: Box::new(op),
                fetch: Some(CompiledExpr::Literal(Value::Long(max_rows as i64))),
                offset: None,
            };
        }

        let main = if wants_scan {
            Statement::Planned(op)
        } else {
            detect_point_lookup(op)
        };

        Ok(TranslatedQuery {
            plan: ExecutionPlan::simple(main),
            context: EvaluationContext::new(query.to_string(), params),
        })
    }

    /// Cache statistics are the fallback planner's: the relational pipeline
    /// itself does not cache plans.
    pub fn cache_hits(&self) -> u64 {
        self.fallback.cache_hits()
    }

    pub fn cache_misses(&self) -> u64 {
        self.fallback.cache_misses()
    }

    pub fn clear_cache(&self) {
        self.fallback.clear_cache();
    }
}

/// A full-width scan filtered on primary-key equality against a constant is
/// answered as a point lookup on the non-scan path.
fn detect_point_lookup(op: PlanOp) -> Statement {
    match op {
        PlanOp::FilteredTableScan {
            table_space,
            table,
            predicate,
        } => {
            let key = if table.primary_key.len() == 1 {
                let pk = table.primary_key[0];
                match &predicate {
                    CompiledExpr::Binary {
                        op: BinaryOp::Eq,
                        left,
                        right,
                    } => match (left.as_ref(), right.as_ref()) {
                        (CompiledExpr::Column(idx), key) if *idx == pk && is_constant(key) => {
                            Some(key.clone())
                        }
                        (key, CompiledExpr::Column(idx)) if *idx == pk && is_constant(key) => {
                            Some(key.clone())
                        }
                        _ => None,
                    },
                    _ => None,
                }
            } else {
                None
            };
            match key {
                Some(key) => Statement::Get(GetStatement {
                    table_space,
                    table,
                    key,
                }),
                None => Statement::Planned(PlanOp::FilteredTableScan {
                    table_space,
                    table,
                    predicate,
                }),
            }
        }
        other => Statement::Planned(other),
    }
}

fn is_constant(expr: &CompiledExpr) -> bool {
    matches!(
        expr,
        CompiledExpr::Literal(_) | CompiledExpr::Parameter(_)
    )
}
