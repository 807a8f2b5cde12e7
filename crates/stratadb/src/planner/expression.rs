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

use crate::error::{Result, StrataError};
use crate::planner::EvaluationContext;
use crate::types::Value;
use std::cmp::Ordering;

/// A compiled, immutable expression evaluable against a row and the
/// statement's positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledExpr {
    Column(usize),
    Literal(Value),
    /// Positional `?` parameter, zero-based.
    Parameter(usize),
    Binary {
        op: BinaryOp,
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
    },
    Not(Box<CompiledExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
}

impl CompiledExpr {
    pub fn eval(&self, row: &[Value], ctx: &EvaluationContext) -> Result<Value> {
        match self {
            CompiledExpr::Column(idx) => row.get(*idx).cloned().ok_or_else(|| {
                StrataError::StatementExecution(format!("column index out of bounds: {idx}"))
            }),
            CompiledExpr::Literal(v) => Ok(v.clone()),
            CompiledExpr::Parameter(idx) => ctx.params.get(*idx).cloned().ok_or_else(|| {
                StrataError::StatementExecution(format!(
                    "missing positional parameter #{}",
                    idx + 1
                ))
            }),
            CompiledExpr::Binary { op, left, right } => {
                let l = left.eval(row, ctx)?;
                let r = right.eval(row, ctx)?;
                match op {
                    BinaryOp::Eq => Ok(Value::Boolean(l.sql_eq(&r)?)),
                    BinaryOp::Neq => {
                        if l.is_null() || r.is_null() {
                            return Ok(Value::Boolean(false));
                        }
                        Ok(Value::Boolean(!l.sql_eq(&r)?))
                    }
                    BinaryOp::Gt => Ok(Value::Boolean(cmp(&l, &r)? == Ordering::Greater)),
                    BinaryOp::Lt => Ok(Value::Boolean(cmp(&l, &r)? == Ordering::Less)),
                    BinaryOp::Gte => Ok(Value::Boolean(cmp(&l, &r)? != Ordering::Less)),
                    BinaryOp::Lte => Ok(Value::Boolean(cmp(&l, &r)? != Ordering::Greater)),
                    BinaryOp::Add => l.add(&r),
                    BinaryOp::Sub => l.sub(&r),
                    BinaryOp::Mul => l.mul(&r),
                    BinaryOp::Div => l.div(&r),
                    BinaryOp::And => Ok(Value::Boolean(l.as_bool()? && r.as_bool()?)),
                    BinaryOp::Or => Ok(Value::Boolean(l.as_bool()? || r.as_bool()?)),
                }
            }
            CompiledExpr::Not(inner) => {
                let v = inner.eval(row, ctx)?;
                Ok(Value::Boolean(!v.as_bool()?))
            }
        }
    }

    pub fn eval_predicate(&self, row: &[Value], ctx: &EvaluationContext) -> Result<bool> {
        self.eval(row, ctx)?.as_bool()
    }

    /// Constant expressions (literals and parameters) evaluate without a row.
    pub fn eval_constant(&self, ctx: &EvaluationContext) -> Result<Value> {
        self.eval(&[], ctx)
    }
}

fn cmp(l: &Value, r: &Value) -> Result<Ordering> {
    if l.is_null() || r.is_null() {
        // NULL never orders before or after anything; comparisons are false.
        return Ok(Ordering::Equal);
    }
    l.sql_cmp(r)
}
