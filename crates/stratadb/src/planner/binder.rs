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

//! Name resolution and validation over the parsed AST. The binder works
//! against the root schema built from the engine's table-space metadata and
//! produces compiled expressions directly; the lowering step arranges them
//! into the operator algebra.

use crate::catalog::Table;
use crate::error::{Result, StrataError};
use crate::planner::expression::{BinaryOp, CompiledExpr};
use crate::planner::type_map::{column_type_to_sql_type, sql_type_to_column_type};
use crate::planner::PlannerMetadata;
use crate::types::{ColumnType, Value};
use sqlparser::ast::{
    BinaryOperator, Expr, GroupByExpr, Ident, ObjectName, OrderByKind, Query, Select, SelectItem,
    SetExpr, Statement, TableFactor, TableObject, TableWithJoins, UnaryOperator,
};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

/// Root schema snapshot: table-space -> table name -> metadata, all keys
/// folded to lowercase.
pub(crate) struct SchemaView {
    spaces: HashMap<String, HashMap<String, Arc<Table>>>,
}

impl SchemaView {
    pub(crate) fn build(metadata: &dyn PlannerMetadata) -> Result<Self> {
        let mut spaces = HashMap::new();
        for table_space in metadata.local_table_spaces() {
            let mut tables = HashMap::new();
            for table in metadata.tables_for_planner(&table_space)? {
                // Exposure direction of the type mapping; unknown codes
                // would surface as ANY here.
                for column in &table.columns {
                    let _ = column_type_to_sql_type(column.ctype);
                }
                tables.insert(table.name.to_lowercase(), table);
            }
            spaces.insert(table_space.to_lowercase(), tables);
        }
        Ok(Self { spaces })
    }

    fn resolve(&self, default_table_space: &str, name: &ObjectName) -> Result<(String, Arc<Table>)> {
        let parts = object_name_parts(name);
        let (table_space, table_name) = match parts.as_slice() {
            [table] => (default_table_space.to_lowercase(), table.clone()),
            [space, table] => (space.clone(), table.clone()),
            _ => {
                return Err(StrataError::StatementExecution(format!(
                    "invalid table reference '{name}'"
                )))
            }
        };
        let table = self
            .spaces
            .get(&table_space)
            .and_then(|tables| tables.get(&table_name))
            .cloned()
            .ok_or_else(|| {
                StrataError::StatementExecution(format!(
                    "no such table '{table_name}' in table space '{table_space}'"
                ))
            })?;
        Ok((table_space, table))
    }
}

#[derive(Clone)]
struct ScopeColumn {
    alias: String,
    name: String,
    idx: usize,
    ctype: ColumnType,
}

pub(crate) struct BoundSelect {
    pub table_space: String,
    pub table: Arc<Table>,
    pub filter: Option<CompiledExpr>,
    pub projection: BoundProjection,
    /// (index into output schema, ascending) pairs.
    pub order_by: Vec<(usize, bool)>,
    pub fetch: Option<CompiledExpr>,
    pub offset: Option<CompiledExpr>,
}

pub(crate) enum BoundProjection {
    Wildcard,
    Exprs {
        names: Vec<String>,
        exprs: Vec<CompiledExpr>,
        types: Vec<ColumnType>,
    },
    Aggregate {
        /// (source column index, output name) for each grouping column.
        group: Vec<(usize, String)>,
        aggs: Vec<BoundAggregate>,
    },
}

pub(crate) struct BoundAggregate {
    pub function: String,
    pub args: Vec<usize>,
    pub alias: String,
    pub ctype: ColumnType,
}

pub(crate) struct BoundInsert {
    pub table_space: String,
    pub table: Arc<Table>,
    pub field_names: Vec<String>,
    pub rows: Vec<Vec<CompiledExpr>>,
}

pub(crate) struct BoundUpdate {
    pub table_space: String,
    pub table: Arc<Table>,
    pub assignments: Vec<(String, CompiledExpr)>,
    pub filter: Option<CompiledExpr>,
}

pub(crate) struct BoundDelete {
    pub table_space: String,
    pub table: Arc<Table>,
    pub filter: Option<CompiledExpr>,
}

pub(crate) enum BoundStatement {
    Select(BoundSelect),
    Insert(BoundInsert),
    Update(BoundUpdate),
    Delete(BoundDelete),
}

pub(crate) struct Binder<'a> {
    schema: &'a SchemaView,
    default_table_space: &'a str,
    next_param: Cell<usize>,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(schema: &'a SchemaView, default_table_space: &'a str) -> Self {
        Self {
            schema,
            default_table_space,
            next_param: Cell::new(0),
        }
    }

    pub(crate) fn bind(&self, stmt: &Statement) -> Result<BoundStatement> {
        match stmt {
            Statement::Query(query) => self.bind_query(query).map(BoundStatement::Select),
            Statement::Insert(insert) => {
                let name = match &insert.table {
                    TableObject::TableName(name) => name,
                    TableObject::TableFunction(_) => {
                        return Err(StrataError::StatementExecution(
                            "INSERT into table function is not supported".to_string(),
                        ))
                    }
                };
                let (table_space, table) = self.schema.resolve(self.default_table_space, name)?;

                let field_names = if insert.columns.is_empty() {
                    table.columns.iter().map(|c| c.name.clone()).collect()
                } else {
                    let mut names = Vec::with_capacity(insert.columns.len());
                    for ident in &insert.columns {
                        let name = ident.value.to_lowercase();
                        if table.column_index(&name).is_none() {
                            return Err(StrataError::StatementExecution(format!(
                                "no such column '{}' in table '{}'",
                                name, table.name
                            )));
                        }
                        names.push(name);
                    }
                    names
                };

                let source = insert.source.as_ref().ok_or_else(|| {
                    StrataError::StatementExecution("INSERT without VALUES".to_string())
                })?;
                let SetExpr::Values(values) = &*source.body else {
                    return Err(StrataError::StatementExecution(
                        "only INSERT ... VALUES is supported".to_string(),
                    ));
                };

                let mut rows = Vec::with_capacity(values.rows.len());
                for row in &values.rows {
                    if row.len() != field_names.len() {
                        return Err(StrataError::StatementExecution(format!(
                            "INSERT row has {} values, expected {}",
                            row.len(),
                            field_names.len()
                        )));
                    }
                    let mut bound = Vec::with_capacity(row.len());
                    for expr in row {
                        // No scope: VALUES rows are literals and parameters.
                        bound.push(self.bind_expr(expr, &[])?);
                    }
                    rows.push(bound);
                }

                Ok(BoundStatement::Insert(BoundInsert {
                    table_space,
                    table,
                    field_names,
                    rows,
                }))
            }
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                returning,
                or,
            } => {
                if or.is_some() || from.is_some() || returning.is_some() {
                    return Err(StrataError::StatementExecution(
                        "UPDATE clause not supported".to_string(),
                    ));
                }
                let (table_space, table) =
                    self.resolve_single_relation(table)?;
                let scope = table_scope(&table, &table.name.clone());

                let mut bound_assignments = Vec::with_capacity(assignments.len());
                for assignment in assignments {
                    let column = assignment_target_column(assignment)?;
                    if table.column_index(&column).is_none() {
                        return Err(StrataError::StatementExecution(format!(
                            "no such column '{}' in table '{}'",
                            column, table.name
                        )));
                    }
                    let expr = self.bind_expr(&assignment.value, &scope)?;
                    bound_assignments.push((column, expr));
                }

                let filter = match selection {
                    Some(expr) => Some(self.bind_expr(expr, &scope)?),
                    None => None,
                };

                Ok(BoundStatement::Update(BoundUpdate {
                    table_space,
                    table,
                    assignments: bound_assignments,
                    filter,
                }))
            }
            Statement::Delete(delete) => {
                let tables = match &delete.from {
                    sqlparser::ast::FromTable::WithFromKeyword(tables)
                    | sqlparser::ast::FromTable::WithoutKeyword(tables) => tables,
                };
                if tables.len() != 1 {
                    return Err(StrataError::StatementExecution(
                        "DELETE targets exactly one table".to_string(),
                    ));
                }
                let (table_space, table) = self.resolve_single_relation(&tables[0])?;
                let scope = table_scope(&table, &table.name.clone());
                let filter = match &delete.selection {
                    Some(expr) => Some(self.bind_expr(expr, &scope)?),
                    None => None,
                };
                Ok(BoundStatement::Delete(BoundDelete {
                    table_space,
                    table,
                    filter,
                }))
            }
            other => Err(StrataError::StatementExecution(format!(
                "statement not supported by the relational planner: {}",
                statement_kind(other)
            ))),
        }
    }

    fn bind_query(&self, query: &Query) -> Result<BoundSelect> {
        if query.with.is_some() {
            return Err(StrataError::StatementExecution(
                "WITH is not supported".to_string(),
            ));
        }
        let SetExpr::Select(select) = &*query.body else {
            return Err(StrataError::StatementExecution(
                "only plain SELECT queries are supported".to_string(),
            ));
        };
        let (table_space, table, alias) = self.bind_from(select)?;
        let scope = table_scope(&table, &alias);

        let projection = self.bind_projection(&select.projection, &select.group_by, &scope)?;

        let filter = match &select.selection {
            Some(expr) => Some(self.bind_expr(expr, &scope)?),
            None => None,
        };

        let output = output_names(&projection, &table);
        let order_by = bind_order_by(query.order_by.as_ref(), &output)?;

        let fetch = self.bind_limit_expr(query.limit.as_ref())?;
        let offset = match &query.offset {
            Some(offset) => self.bind_limit_expr(Some(&offset.value))?,
            None => None,
        };

        Ok(BoundSelect {
            table_space,
            table,
            filter,
            projection,
            order_by,
            fetch,
            offset,
        })
    }

    fn bind_from(&self, select: &Select) -> Result<(String, Arc<Table>, String)> {
        if select.from.len() != 1 {
            return Err(StrataError::StatementExecution(
                "exactly one FROM relation is supported".to_string(),
            ));
        }
        if !select.from[0].joins.is_empty() {
            return Err(StrataError::StatementExecution(
                "JOIN is not supported".to_string(),
            ));
        }
        let TableFactor::Table { name, alias, .. } = &select.from[0].relation else {
            return Err(StrataError::StatementExecution(
                "only base table relations are supported".to_string(),
            ));
        };
        let (table_space, table) = self.schema.resolve(self.default_table_space, name)?;
        let alias = alias
            .as_ref()
            .map(|a| a.name.value.to_lowercase())
            .unwrap_or_else(|| table.name.to_lowercase());
        Ok((table_space, table, alias))
    }

    fn resolve_single_relation(&self, t: &TableWithJoins) -> Result<(String, Arc<Table>)> {
        if !t.joins.is_empty() {
            return Err(StrataError::StatementExecution(
                "target relation cannot contain joins".to_string(),
            ));
        }
        let TableFactor::Table { name, .. } = &t.relation else {
            return Err(StrataError::StatementExecution(
                "only base table relations are supported".to_string(),
            ));
        };
        self.schema.resolve(self.default_table_space, name)
    }

    fn bind_projection(
        &self,
        items: &[SelectItem],
        group_by: &GroupByExpr,
        scope: &[ScopeColumn],
    ) -> Result<BoundProjection> {
        let group_exprs = match group_by {
            GroupByExpr::Expressions(exprs, _) => exprs.as_slice(),
            GroupByExpr::All(_) => {
                return Err(StrataError::StatementExecution(
                    "GROUP BY ALL is not supported".to_string(),
                ))
            }
        };

        if items.len() == 1 && matches!(items[0], SelectItem::Wildcard(_)) {
            if !group_exprs.is_empty() {
                return Err(StrataError::StatementExecution(
                    "GROUP BY requires an explicit select list".to_string(),
                ));
            }
            return Ok(BoundProjection::Wildcard);
        }

        if let Some(aggregate) = self.try_bind_aggregate(items, group_exprs, scope)? {
            return Ok(aggregate);
        }
        if !group_exprs.is_empty() {
            return Err(StrataError::StatementExecution(
                "GROUP BY requires aggregate functions in the select list".to_string(),
            ));
        }

        let mut names = Vec::with_capacity(items.len());
        let mut exprs = Vec::with_capacity(items.len());
        let mut types = Vec::with_capacity(items.len());
        for item in items {
            let (expr, alias) = match item {
                SelectItem::UnnamedExpr(expr) => (expr, None),
                SelectItem::ExprWithAlias { expr, alias } => {
                    (expr, Some(alias.value.to_lowercase()))
                }
                _ => {
                    return Err(StrataError::StatementExecution(
                        "projection item not supported".to_string(),
                    ))
                }
            };
            let bound = self.bind_expr(expr, scope)?;
            types.push(self.infer_type(&bound, scope)?);
            names.push(alias.unwrap_or_else(|| projection_name(expr)));
            exprs.push(bound);
        }
        Ok(BoundProjection::Exprs {
            names,
            exprs,
            types,
        })
    }

    /// Aggregate projections are grouping columns followed by aggregate
    /// calls; anything else is handled as a plain expression projection.
    fn try_bind_aggregate(
        &self,
        items: &[SelectItem],
        group_exprs: &[Expr],
        scope: &[ScopeColumn],
    ) -> Result<Option<BoundProjection>> {
        let mut group = Vec::new();
        let mut aggs = Vec::new();
        for item in items {
            let (expr, alias) = match item {
                SelectItem::UnnamedExpr(expr) => (expr, None),
                SelectItem::ExprWithAlias { expr, alias } => {
                    (expr, Some(alias.value.to_lowercase()))
                }
                _ => return Ok(None),
            };
            if let Expr::Function(func) = expr {
                let agg = self.bind_aggregate_call(func, alias, scope)?;
                aggs.push(agg);
                continue;
            }
            if !aggs.is_empty() {
                return Err(StrataError::StatementExecution(
                    "grouping columns must precede aggregate calls".to_string(),
                ));
            }
            let Ok(idx) = resolve_column(expr, scope) else {
                return Ok(None);
            };
            group.push((idx, alias.unwrap_or_else(|| projection_name(expr))));
        }
        if aggs.is_empty() {
            return Ok(None);
        }

        if group_exprs.len() != group.len() {
            return Err(StrataError::StatementExecution(
                "GROUP BY must list exactly the projected grouping columns".to_string(),
            ));
        }
        for (expr, (idx, _)) in group_exprs.iter().zip(&group) {
            let resolved = resolve_column(expr, scope)?;
            if resolved != *idx {
                return Err(StrataError::StatementExecution(
                    "GROUP BY column must match the projected grouping column".to_string(),
                ));
            }
        }

        Ok(Some(BoundProjection::Aggregate { group, aggs }))
    }

    fn bind_aggregate_call(
        &self,
        func: &sqlparser::ast::Function,
        alias: Option<String>,
        scope: &[ScopeColumn],
    ) -> Result<BoundAggregate> {
        use sqlparser::ast::{FunctionArg, FunctionArgExpr, FunctionArguments};

        let name = func.name.to_string().to_lowercase();
        if !matches!(name.as_str(), "count" | "sum" | "min" | "max" | "avg") {
            return Err(StrataError::StatementExecution(format!(
                "unsupported aggregation function '{name}'"
            )));
        }
        let FunctionArguments::List(list) = &func.args else {
            return Err(StrataError::StatementExecution(format!(
                "aggregation function '{name}' requires an argument list"
            )));
        };
        if list.args.len() != 1 {
            return Err(StrataError::StatementExecution(format!(
                "aggregation function '{name}' takes exactly one argument"
            )));
        }

        let (args, ctype) = match &list.args[0] {
            FunctionArg::Unnamed(FunctionArgExpr::Wildcard) if name == "count" => {
                (Vec::new(), ColumnType::Long)
            }
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => {
                let idx = resolve_column(expr, scope)?;
                let ctype = match name.as_str() {
                    "count" | "sum" | "avg" => ColumnType::Long,
                    _ => scope[idx].ctype,
                };
                (vec![idx], ctype)
            }
            _ => {
                return Err(StrataError::StatementExecution(format!(
                    "unsupported argument for aggregation function '{name}'"
                )))
            }
        };

        Ok(BoundAggregate {
            alias: alias.unwrap_or_else(|| name.clone()),
            function: name,
            args,
            ctype,
        })
    }

    fn bind_limit_expr(&self, expr: Option<&Expr>) -> Result<Option<CompiledExpr>> {
        match expr {
            None => Ok(None),
            Some(Expr::Value(v)) => match &v.value {
                sqlparser::ast::Value::Number(n, _) => {
                    let parsed = n.parse::<i64>().map_err(|_| {
                        StrataError::StatementExecution(format!("invalid LIMIT/OFFSET '{n}'"))
                    })?;
                    Ok(Some(CompiledExpr::Literal(Value::Long(parsed))))
                }
                sqlparser::ast::Value::Placeholder(_) => {
                    Ok(Some(CompiledExpr::Parameter(self.take_param())))
                }
                _ => Err(StrataError::StatementExecution(
                    "LIMIT/OFFSET must be numeric".to_string(),
                )),
            },
            Some(_) => Err(StrataError::StatementExecution(
                "LIMIT/OFFSET expression unsupported".to_string(),
            )),
        }
    }

    fn bind_expr(&self, expr: &Expr, scope: &[ScopeColumn]) -> Result<CompiledExpr> {
        match expr {
            Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                resolve_column(expr, scope).map(CompiledExpr::Column)
            }
            Expr::Value(v) => match &v.value {
                sqlparser::ast::Value::Placeholder(_) => {
                    Ok(CompiledExpr::Parameter(self.take_param()))
                }
                _ => bind_literal_value(&v.value).map(CompiledExpr::Literal),
            },
            Expr::BinaryOp { left, op, right } => {
                let op = match op {
                    BinaryOperator::Eq => BinaryOp::Eq,
                    BinaryOperator::NotEq => BinaryOp::Neq,
                    BinaryOperator::Gt => BinaryOp::Gt,
                    BinaryOperator::Lt => BinaryOp::Lt,
                    BinaryOperator::GtEq => BinaryOp::Gte,
                    BinaryOperator::LtEq => BinaryOp::Lte,
                    BinaryOperator::Plus => BinaryOp::Add,
                    BinaryOperator::Minus => BinaryOp::Sub,
                    BinaryOperator::Multiply => BinaryOp::Mul,
                    BinaryOperator::Divide => BinaryOp::Div,
                    BinaryOperator::And => BinaryOp::And,
                    BinaryOperator::Or => BinaryOp::Or,
                    other => {
                        return Err(StrataError::StatementExecution(format!(
                            "unsupported binary operator '{other}'"
                        )))
                    }
                };
                Ok(CompiledExpr::Binary {
                    op,
                    left: Box::new(self.bind_expr(left, scope)?),
                    right: Box::new(self.bind_expr(right, scope)?),
                })
            }
            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Plus => self.bind_expr(expr, scope),
                UnaryOperator::Minus => Ok(CompiledExpr::Binary {
                    op: BinaryOp::Sub,
                    left: Box::new(CompiledExpr::Literal(Value::Integer(0))),
                    right: Box::new(self.bind_expr(expr, scope)?),
                }),
                UnaryOperator::Not => Ok(CompiledExpr::Not(Box::new(
                    self.bind_expr(expr, scope)?,
                ))),
                other => Err(StrataError::StatementExecution(format!(
                    "unsupported unary operator '{other}'"
                ))),
            },
            Expr::Nested(inner) => self.bind_expr(inner, scope),
            other => Err(StrataError::StatementExecution(format!(
                "unsupported expression '{other}'"
            ))),
        }
    }

    fn infer_type(&self, expr: &CompiledExpr, scope: &[ScopeColumn]) -> Result<ColumnType> {
        match expr {
            CompiledExpr::Column(idx) => {
                let ctype = scope
                    .get(*idx)
                    .map(|c| c.ctype)
                    .unwrap_or(ColumnType::Any);
                // SQL-facing expression types go through the planner's type
                // mapping, which rejects types outside the enumerated set.
                sql_type_to_column_type(column_type_to_sql_type(ctype))
            }
            CompiledExpr::Literal(v) => Ok(v.column_type()),
            CompiledExpr::Parameter(_) => Ok(ColumnType::Any),
            CompiledExpr::Binary { op, left, .. } => match op {
                BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Gt
                | BinaryOp::Lt
                | BinaryOp::Gte
                | BinaryOp::Lte
                | BinaryOp::And
                | BinaryOp::Or => Ok(ColumnType::Boolean),
                _ => self.infer_type(left, scope),
            },
            CompiledExpr::Not(_) => Ok(ColumnType::Boolean),
        }
    }

    fn take_param(&self) -> usize {
        let idx = self.next_param.get();
        self.next_param.set(idx + 1);
        idx
    }
}

fn table_scope(table: &Table, alias: &str) -> Vec<ScopeColumn> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, c)| ScopeColumn {
            alias: alias.to_lowercase(),
            name: c.name.to_lowercase(),
            idx,
            ctype: c.ctype,
        })
        .collect()
}

fn resolve_column(expr: &Expr, scope: &[ScopeColumn]) -> Result<usize> {
    match expr {
        Expr::Identifier(Ident { value, .. }) => {
            let name = value.to_lowercase();
            let mut matches = scope.iter().filter(|c| c.name == name);
            let first = matches
                .next()
                .ok_or_else(|| {
                    StrataError::StatementExecution(format!("no such column '{name}'"))
                })?;
            if matches.next().is_some() {
                return Err(StrataError::StatementExecution(format!(
                    "column '{name}' is ambiguous"
                )));
            }
            Ok(first.idx)
        }
        Expr::CompoundIdentifier(parts) if parts.len() == 2 => {
            let alias = parts[0].value.to_lowercase();
            let name = parts[1].value.to_lowercase();
            scope
                .iter()
                .find(|c| c.alias == alias && c.name == name)
                .map(|c| c.idx)
                .ok_or_else(|| {
                    StrataError::StatementExecution(format!(
                        "no such column '{alias}.{name}'"
                    ))
                })
        }
        _ => Err(StrataError::StatementExecution(
            "expected a column reference".to_string(),
        )),
    }
}

fn projection_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(i) => i.value.to_lowercase(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|i| i.value.to_lowercase())
            .unwrap_or_else(|| "expr".to_string()),
        _ => "expr".to_string(),
    }
}

fn output_names(projection: &BoundProjection, table: &Table) -> Vec<String> {
    match projection {
        BoundProjection::Wildcard => table
            .columns
            .iter()
            .map(|c| c.name.to_lowercase())
            .collect(),
        BoundProjection::Exprs { names, .. } => names.clone(),
        BoundProjection::Aggregate { group, aggs } => group
            .iter()
            .map(|(_, name)| name.clone())
            .chain(aggs.iter().map(|a| a.alias.clone()))
            .collect(),
    }
}

fn bind_order_by(
    order_by: Option<&sqlparser::ast::OrderBy>,
    output: &[String],
) -> Result<Vec<(usize, bool)>> {
    let Some(order_by) = order_by else {
        return Ok(Vec::new());
    };
    let exprs = match &order_by.kind {
        OrderByKind::Expressions(exprs) => exprs,
        OrderByKind::All(_) => {
            return Err(StrataError::StatementExecution(
                "ORDER BY ALL is not supported".to_string(),
            ))
        }
    };
    let mut out = Vec::with_capacity(exprs.len());
    for ob in exprs {
        let name = projection_name(&ob.expr);
        let idx = output.iter().position(|n| *n == name).ok_or_else(|| {
            StrataError::StatementExecution(format!(
                "ORDER BY column '{name}' is not in the select list"
            ))
        })?;
        out.push((idx, ob.options.asc.unwrap_or(true)));
    }
    Ok(out)
}

fn bind_literal_value(value: &sqlparser::ast::Value) -> Result<Value> {
    use sqlparser::ast::Value as V;
    match value {
        V::Boolean(b) => Ok(Value::Boolean(*b)),
        V::Number(n, _) => {
            if let Ok(v) = n.parse::<i32>() {
                Ok(Value::Integer(v))
            } else if let Ok(v) = n.parse::<i64>() {
                Ok(Value::Long(v))
            } else {
                Err(StrataError::StatementExecution(format!(
                    "invalid numeric literal '{n}'"
                )))
            }
        }
        V::SingleQuotedString(s) | V::DoubleQuotedString(s) => Ok(Value::String(s.clone())),
        V::HexStringLiteral(s) => {
            let mut bytes = Vec::with_capacity(s.len() / 2);
            let chars: Vec<char> = s.chars().collect();
            for pair in chars.chunks(2) {
                let hex: String = pair.iter().collect();
                bytes.push(u8::from_str_radix(&hex, 16).map_err(|_| {
                    StrataError::StatementExecution(format!("invalid hex literal '{s}'"))
                })?);
            }
            Ok(Value::Bytes(bytes))
        }
        V::Null => Ok(Value::Null),
        other => Err(StrataError::StatementExecution(format!(
            "unsupported literal {other}"
        ))),
    }
}

fn assignment_target_column(assignment: &sqlparser::ast::Assignment) -> Result<String> {
    use sqlparser::ast::AssignmentTarget;
    match &assignment.target {
        AssignmentTarget::ColumnName(obj) => {
            let parts = object_name_parts(obj);
            match parts.as_slice() {
                [name] => Ok(name.clone()),
                _ => Err(StrataError::StatementExecution(
                    "qualified UPDATE assignment targets are not supported".to_string(),
                )),
            }
        }
        AssignmentTarget::Tuple(_) => Err(StrataError::StatementExecution(
            "tuple assignments are not supported".to_string(),
        )),
    }
}

fn object_name_parts(name: &ObjectName) -> Vec<String> {
    name.0
        .iter()
        .map(|p| {
            p.as_ident()
                .map(|i| i.value.to_lowercase())
                .unwrap_or_else(|| p.to_string().to_lowercase())
        })
        .collect()
}

fn statement_kind(stmt: &Statement) -> &'static str {
    match stmt {
        Statement::Query(_) => "SELECT",
        Statement::Insert(_) => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete(_) => "DELETE",
        Statement::CreateTable(_) => "CREATE TABLE",
        Statement::Drop { .. } => "DROP",
        Statement::Truncate { .. } => "TRUNCATE",
        _ => "statement",
    }
}
