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
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Engine column type codes. These are the codes the planner's type mapping
/// is defined over; `Timestamp` is exposed to SQL but never produced by the
/// SQL-to-engine direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Boolean,
    Integer,
    Long,
    Bytearray,
    Timestamp,
    Null,
    Any,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Long => "long",
            ColumnType::Bytearray => "bytearray",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Null => "null",
            ColumnType::Any => "any",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(i64),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Null => ColumnType::Null,
            Self::Boolean(_) => ColumnType::Boolean,
            Self::Integer(_) => ColumnType::Integer,
            Self::Long(_) => ColumnType::Long,
            Self::String(_) => ColumnType::String,
            Self::Bytes(_) => ColumnType::Bytearray,
            Self::Timestamp(_) => ColumnType::Timestamp,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            Self::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Total comparison within a type family; numeric variants compare
    /// through i64 promotion. `None` for incompatible or NULL operands.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
            return Some(a.cmp(&b));
        }
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn sql_eq(&self, other: &Value) -> Result<bool> {
        if self.is_null() || other.is_null() {
            return Ok(false);
        }
        self.compare(other)
            .map(|o| o == Ordering::Equal)
            .ok_or_else(|| {
                StrataError::StatementExecution(format!(
                    "cannot compare {} with {}",
                    self.column_type().name(),
                    other.column_type().name()
                ))
            })
    }

    pub fn sql_cmp(&self, other: &Value) -> Result<Ordering> {
        self.compare(other).ok_or_else(|| {
            StrataError::StatementExecution(format!(
                "cannot compare {} with {}",
                self.column_type().name(),
                other.column_type().name()
            ))
        })
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(v) => Ok(*v),
            Self::Null => Ok(false),
            other => Err(StrataError::StatementExecution(format!(
                "expected boolean, got {}",
                other.column_type().name()
            ))),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value> {
        numeric_op(self, other, "+", i64::checked_add)
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        numeric_op(self, other, "-", i64::checked_sub)
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        numeric_op(self, other, "*", i64::checked_mul)
    }

    pub fn div(&self, other: &Value) -> Result<Value> {
        if other.as_i64() == Some(0) {
            return Err(StrataError::StatementExecution(
                "division by zero".to_string(),
            ));
        }
        numeric_op(self, other, "/", i64::checked_div)
    }

    /// Lossless cast toward a column type, used when binding literals and
    /// parameters against a table schema.
    pub fn cast_to(&self, target: ColumnType) -> Result<Value> {
        match (self, target) {
            (Self::Null, _) => Ok(Self::Null),
            (v, ColumnType::Any) => Ok(v.clone()),
            (Self::Boolean(v), ColumnType::Boolean) => Ok(Self::Boolean(*v)),
            (Self::Integer(v), ColumnType::Integer) => Ok(Self::Integer(*v)),
            (Self::Integer(v), ColumnType::Long) => Ok(Self::Long(i64::from(*v))),
            (Self::Long(v), ColumnType::Long) => Ok(Self::Long(*v)),
            (Self::Long(v), ColumnType::Integer) => i32::try_from(*v)
                .map(Self::Integer)
                .map_err(|_| StrataError::StatementExecution(format!("integer overflow: {v}"))),
            (Self::Long(v), ColumnType::Timestamp) => Ok(Self::Timestamp(*v)),
            (Self::Integer(v), ColumnType::Timestamp) => Ok(Self::Timestamp(i64::from(*v))),
            (Self::Timestamp(v), ColumnType::Timestamp) => Ok(Self::Timestamp(*v)),
            (Self::String(v), ColumnType::String) => Ok(Self::String(v.clone())),
            (Self::Bytes(v), ColumnType::Bytearray) => Ok(Self::Bytes(v.clone())),
            (v, t) => Err(StrataError::StatementExecution(format!(
                "cannot cast {} to {}",
                v.column_type().name(),
                t.name()
            ))),
        }
    }
}

fn numeric_op(
    left: &Value,
    right: &Value,
    op: &str,
    f: fn(i64, i64) -> Option<i64>,
) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) else {
        return Err(StrataError::StatementExecution(format!(
            "operator '{op}' requires numeric operands, got {} and {}",
            left.column_type().name(),
            right.column_type().name()
        )));
    };
    let out = f(a, b)
        .ok_or_else(|| StrataError::StatementExecution(format!("numeric overflow in '{op}'")))?;
    // Preserve INTEGER when both sides fit; widen to LONG otherwise.
    match (left, right) {
        (Value::Integer(_), Value::Integer(_)) => i32::try_from(out)
            .map(Value::Integer)
            .or(Ok(Value::Long(out))),
        _ => Ok(Value::Long(out)),
    }
}
