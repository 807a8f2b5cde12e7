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

//! Lightweight planner for DDL, transaction control and the EXECUTE command
//! family. Statements routed here never touch the relational pipeline; the
//! parsed form is cached by query text.

use crate::catalog::{Column, Table};
use crate::error::{Result, StrataError};
use crate::planner::plan::{DdlStatement, ExecutionPlan, Statement, TxStatement};
use crate::planner::type_map::ast_type_to_column_type;
use crate::planner::{EvaluationContext, TranslatedQuery};
use crate::types::Value;
use lru::LruCache;
use parking_lot::Mutex;
use sqlparser::ast::{self, ColumnOption, ObjectType, TableConstraint};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Hash, PartialEq, Eq)]
struct CacheKey {
    table_space: String,
    query: String,
    return_values: bool,
}

pub struct FallbackPlanner {
    cache: Mutex<LruCache<CacheKey, Statement>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for FallbackPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl FallbackPlanner {
    pub fn new(cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).expect("non-zero capacity");
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn translate(
        &self,
        default_table_space: &str,
        query: &str,
        params: Vec<Value>,
        allow_cache: bool,
        return_values: bool,
    ) -> Result<TranslatedQuery> {
        let context = EvaluationContext::new(query.to_string(), params);

        // EXECUTE arguments may reference positional parameters, so those
        // statements are planned fresh each time.
        if query
            .trim_start()
            .get(..7)
            .is_some_and(|p| p.eq_ignore_ascii_case("execute"))
        {
            let main = plan_execute_command(default_table_space, query, &context.params)?;
            return Ok(TranslatedQuery {
                plan: ExecutionPlan::simple(main),
                context,
            });
        }

        if allow_cache {
            let key = CacheKey {
                table_space: default_table_space.to_string(),
                query: query.to_string(),
                return_values,
            };
            if let Some(main) = self.cache.lock().get(&key).cloned() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(TranslatedQuery {
                    plan: ExecutionPlan::simple(main),
                    context,
                });
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        let main = plan_statement(default_table_space, query)?;
        if allow_cache {
            let key = CacheKey {
                table_space: default_table_space.to_string(),
                query: query.to_string(),
                return_values,
            };
            self.cache.lock().put(key, main.clone());
        }
        Ok(TranslatedQuery {
            plan: ExecutionPlan::simple(main),
            context,
        })
    }

    pub fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn cache_size(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

fn plan_statement(default_table_space: &str, query: &str) -> Result<Statement> {
    let statements = Parser::parse_sql(&MySqlDialect {}, query)
        .map_err(|e| StrataError::StatementExecution(format!("parse error: {e}")))?;
    let [stmt] = statements.as_slice() else {
        return Err(StrataError::StatementExecution(
            "expected exactly one statement".to_string(),
        ));
    };

    match stmt {
        ast::Statement::StartTransaction { .. } => Ok(Statement::Tx(TxStatement::Begin {
            table_space: default_table_space.to_lowercase(),
        })),
        ast::Statement::Commit { .. } => Ok(Statement::Tx(TxStatement::Commit {
            table_space: default_table_space.to_lowercase(),
            tx_id: None,
        })),
        ast::Statement::Rollback { .. } => Ok(Statement::Tx(TxStatement::Rollback {
            table_space: default_table_space.to_lowercase(),
            tx_id: None,
        })),
        ast::Statement::CreateTable(create) => {
            let (table_space, name) = split_table_name(default_table_space, &create.name)?;
            let mut columns = Vec::with_capacity(create.columns.len());
            let mut primary_key = Vec::new();
            for (idx, def) in create.columns.iter().enumerate() {
                columns.push(Column::new(
                    def.name.value.to_lowercase(),
                    ast_type_to_column_type(&def.data_type)?,
                ));
                for option in &def.options {
                    if let ColumnOption::Unique {
                        is_primary: true, ..
                    } = option.option
                    {
                        primary_key.push(idx);
                    }
                }
            }
            for constraint in &create.constraints {
                if let TableConstraint::PrimaryKey { columns: pk, .. } = constraint {
                    for ident in pk {
                        let name = ident.value.to_lowercase();
                        let idx = columns
                            .iter()
                            .position(|c| c.name == name)
                            .ok_or_else(|| {
                                StrataError::StatementExecution(format!(
                                    "unknown primary key column '{name}'"
                                ))
                            })?;
                        primary_key.push(idx);
                    }
                }
            }
            if primary_key.is_empty() {
                // Tables without a declared key fall back to the first
                // column, which keeps DML key decoding well defined.
                primary_key.push(0);
            }
            if columns.is_empty() {
                return Err(StrataError::StatementExecution(
                    "CREATE TABLE requires at least one column".to_string(),
                ));
            }
            Ok(Statement::Ddl(DdlStatement::CreateTable {
                table: Table {
                    table_space,
                    name,
                    columns,
                    primary_key,
                },
            }))
        }
        ast::Statement::Drop {
            object_type,
            names,
            ..
        } => {
            if *object_type != ObjectType::Table {
                return Err(StrataError::StatementExecution(
                    "only DROP TABLE is supported".to_string(),
                ));
            }
            let [name] = names.as_slice() else {
                return Err(StrataError::StatementExecution(
                    "only single-table DROP is supported".to_string(),
                ));
            };
            let (table_space, name) = split_table_name(default_table_space, name)?;
            Ok(Statement::Ddl(DdlStatement::DropTable { table_space, name }))
        }
        ast::Statement::AlterTable {
            name, operations, ..
        } => {
            let (table_space, table_name) = split_table_name(default_table_space, name)?;
            let [operation] = operations.as_slice() else {
                return Err(StrataError::StatementExecution(
                    "only single-operation ALTER TABLE is supported".to_string(),
                ));
            };
            match operation {
                ast::AlterTableOperation::AddColumn { column_def, .. } => {
                    Ok(Statement::Ddl(DdlStatement::AlterTableAddColumn {
                        table_space,
                        name: table_name,
                        column: Column::new(
                            column_def.name.value.to_lowercase(),
                            ast_type_to_column_type(&column_def.data_type)?,
                        ),
                    }))
                }
                ast::AlterTableOperation::DropColumn { column_name, .. } => {
                    Ok(Statement::Ddl(DdlStatement::AlterTableDropColumn {
                        table_space,
                        name: table_name,
                        column: column_name.value.to_lowercase(),
                    }))
                }
                _ => Err(StrataError::StatementExecution(
                    "ALTER TABLE operation not supported".to_string(),
                )),
            }
        }
        ast::Statement::Truncate { table_names, .. } => {
            let [target] = table_names.as_slice() else {
                return Err(StrataError::StatementExecution(
                    "only single-table TRUNCATE is supported".to_string(),
                ));
            };
            let (table_space, name) = split_table_name(default_table_space, &target.name)?;
            Ok(Statement::Ddl(DdlStatement::Truncate { table_space, name }))
        }
        _ => Err(StrataError::StatementExecution(format!(
            "statement not supported by the fallback planner: {query}"
        ))),
    }
}

/// `EXECUTE BEGINTRANSACTION 'ts'`, `EXECUTE COMMITTRANSACTION 'ts',<tx>`,
/// `EXECUTE ROLLBACKTRANSACTION 'ts',<tx>`. Arguments are quoted strings,
/// numbers, or positional `?` parameters.
fn plan_execute_command(
    default_table_space: &str,
    query: &str,
    params: &[Value],
) -> Result<Statement> {
    let rest = query.trim_start()[7..].trim();
    let (command, args_text) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    };
    let args = parse_execute_args(args_text, params)?;

    let table_space = |args: &[Value]| -> String {
        match args.first() {
            Some(Value::String(s)) => s.to_lowercase(),
            _ => default_table_space.to_lowercase(),
        }
    };
    let tx_arg = |args: &[Value], pos: usize| -> Result<Option<u64>> {
        match args.get(pos) {
            None => Ok(None),
            Some(Value::Integer(v)) if *v >= 0 => Ok(Some(*v as u64)),
            Some(Value::Long(v)) if *v >= 0 => Ok(Some(*v as u64)),
            Some(other) => Err(StrataError::StatementExecution(format!(
                "invalid transaction id argument {other:?}"
            ))),
        }
    };

    match command.to_ascii_uppercase().as_str() {
        "BEGINTRANSACTION" => Ok(Statement::Tx(TxStatement::Begin {
            table_space: table_space(&args),
        })),
        "COMMITTRANSACTION" => Ok(Statement::Tx(TxStatement::Commit {
            table_space: table_space(&args),
            tx_id: tx_arg(&args, 1)?,
        })),
        "ROLLBACKTRANSACTION" => Ok(Statement::Tx(TxStatement::Rollback {
            table_space: table_space(&args),
            tx_id: tx_arg(&args, 1)?,
        })),
        other => Err(StrataError::StatementExecution(format!(
            "unknown EXECUTE command '{other}'"
        ))),
    }
}

fn split_table_name(
    default_table_space: &str,
    name: &ast::ObjectName,
) -> Result<(String, String)> {
    let parts: Vec<String> = name
        .0
        .iter()
        .map(|p| {
            p.as_ident()
                .map(|i| i.value.to_lowercase())
                .unwrap_or_else(|| p.to_string().to_lowercase())
        })
        .collect();
    match parts.as_slice() {
        [table] => Ok((default_table_space.to_lowercase(), table.clone())),
        [space, table] => Ok((space.clone(), table.clone())),
        _ => Err(StrataError::StatementExecution(format!(
            "invalid table reference '{name}'"
        ))),
    }
}

fn parse_execute_args(text: &str, params: &[Value]) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    let mut next_param = 0usize;
    for raw in text.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }
        if token == "?" {
            let value = params.get(next_param).cloned().ok_or_else(|| {
                StrataError::StatementExecution(format!(
                    "missing positional parameter #{}",
                    next_param + 1
                ))
            })?;
            next_param += 1;
            out.push(value);
        } else if let Some(inner) = token
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
        {
            out.push(Value::String(inner.to_string()));
        } else if let Ok(number) = token.parse::<i64>() {
            out.push(Value::Long(number));
        } else {
            return Err(StrataError::StatementExecution(format!(
                "invalid EXECUTE argument '{token}'"
            )));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::FallbackPlanner;
    use crate::planner::plan::{DdlStatement, Statement, TxStatement};
    use crate::types::{ColumnType, Value};

    fn planner() -> FallbackPlanner {
        FallbackPlanner::new(16)
    }

    #[test]
    fn begin_commit_rollback_map_to_transaction_statements() {
        let p = planner();
        let begin = p
            .translate("ts1", "BEGIN", vec![], true, true)
            .expect("begin");
        assert!(matches!(
            begin.plan.main,
            Statement::Tx(TxStatement::Begin { .. })
        ));
        let commit = p
            .translate("ts1", "COMMIT", vec![], true, true)
            .expect("commit");
        assert!(matches!(
            commit.plan.main,
            Statement::Tx(TxStatement::Commit { tx_id: None, .. })
        ));
    }

    #[test]
    fn execute_committransaction_carries_table_space_and_tx_id() {
        let p = planner();
        let out = p
            .translate(
                "other",
                "EXECUTE COMMITTRANSACTION 'ts1',9",
                vec![],
                true,
                true,
            )
            .expect("execute");
        match out.plan.main {
            Statement::Tx(TxStatement::Commit {
                table_space,
                tx_id,
            }) => {
                assert_eq!(table_space, "ts1");
                assert_eq!(tx_id, Some(9));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn execute_arguments_resolve_positional_parameters() {
        let p = planner();
        let out = p
            .translate(
                "ts1",
                "EXECUTE ROLLBACKTRANSACTION ?,?",
                vec![Value::String("ts2".to_string()), Value::Long(4)],
                true,
                true,
            )
            .expect("execute");
        match out.plan.main {
            Statement::Tx(TxStatement::Rollback {
                table_space,
                tx_id,
            }) => {
                assert_eq!(table_space, "ts2");
                assert_eq!(tx_id, Some(4));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn create_table_parses_primary_key_column_option() {
        let p = planner();
        let out = p
            .translate(
                "ts1",
                "CREATE TABLE t (a INT PRIMARY KEY, b VARCHAR(32))",
                vec![],
                true,
                true,
            )
            .expect("create");
        match out.plan.main {
            Statement::Ddl(DdlStatement::CreateTable { table }) => {
                assert_eq!(table.table_space, "ts1");
                assert_eq!(table.name, "t");
                assert_eq!(table.primary_key, vec![0]);
                assert_eq!(table.columns[0].ctype, ColumnType::Integer);
                assert_eq!(table.columns[1].ctype, ColumnType::String);
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn repeated_queries_hit_the_statement_cache() {
        let p = planner();
        let _ = p
            .translate("ts1", "BEGIN", vec![], true, true)
            .expect("first");
        let _ = p
            .translate("ts1", "BEGIN", vec![], true, true)
            .expect("second");
        assert_eq!(p.cache_hits(), 1);
        assert_eq!(p.cache_misses(), 1);
        assert_eq!(p.cache_size(), 1);
    }

    #[test]
    fn cache_can_be_bypassed() {
        let p = planner();
        let _ = p
            .translate("ts1", "BEGIN", vec![], false, true)
            .expect("uncached");
        assert_eq!(p.cache_hits(), 0);
        assert_eq!(p.cache_misses(), 0);
        assert_eq!(p.cache_size(), 0);
    }
}
