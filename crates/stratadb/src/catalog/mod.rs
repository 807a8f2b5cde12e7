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
use crate::types::{ColumnType, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ctype: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ctype: ColumnType) -> Self {
        Self {
            name: name.into(),
            ctype,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub table_space: String,
    pub name: String,
    pub columns: Vec<Column>,
    /// Indices into `columns`, in key order.
    pub primary_key: Vec<usize>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.primary_key.iter().map(|i| &self.columns[*i])
    }
}

/// Encode the primary key of `row` (a full-width table row) into the opaque
/// key blob the engine stores and DML results carry.
pub fn encode_primary_key(table: &Table, row: &[Value]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let single = table.primary_key.len() == 1;
    for idx in &table.primary_key {
        let value = row.get(*idx).ok_or_else(|| {
            StrataError::StatementExecution(format!(
                "row too short for primary key of table '{}'",
                table.name
            ))
        })?;
        let component = encode_key_value(value, &table.columns[*idx])?;
        if single {
            out = component;
        } else {
            let len = u16::try_from(component.len()).map_err(|_| {
                StrataError::StatementExecution("primary key component too large".to_string())
            })?;
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(&component);
        }
    }
    Ok(out)
}

/// Decode a key blob against the table schema. Single-column keys decode to
/// the typed column value; composite keys stay opaque bytes.
pub fn decode_primary_key(table: &Table, data: &[u8]) -> Result<Value> {
    if table.primary_key.len() != 1 {
        return Ok(Value::Bytes(data.to_vec()));
    }
    let column = &table.columns[table.primary_key[0]];
    decode_key_value(data, column)
}

/// Encode a lookup key for a single-column primary key, casting the value
/// toward the key column's type first.
pub fn encode_lookup_key(table: &Table, value: &Value) -> Result<Vec<u8>> {
    let [pk] = table.primary_key.as_slice() else {
        return Err(StrataError::StatementExecution(format!(
            "table '{}' does not have a single-column primary key",
            table.name
        )));
    };
    let column = &table.columns[*pk];
    let casted = value.cast_to(column.ctype)?;
    encode_key_value(&casted, column)
}

fn encode_key_value(value: &Value, column: &Column) -> Result<Vec<u8>> {
    match (value, column.ctype) {
        (Value::Integer(v), ColumnType::Integer) => Ok(v.to_be_bytes().to_vec()),
        (Value::Long(v), ColumnType::Long) => Ok(v.to_be_bytes().to_vec()),
        (Value::Timestamp(v), ColumnType::Timestamp) => Ok(v.to_be_bytes().to_vec()),
        (Value::Boolean(v), ColumnType::Boolean) => Ok(vec![u8::from(*v)]),
        (Value::String(v), ColumnType::String) => Ok(v.as_bytes().to_vec()),
        (Value::Bytes(v), ColumnType::Bytearray) => Ok(v.clone()),
        (Value::Null, _) => Err(StrataError::StatementExecution(format!(
            "primary key column '{}' cannot be NULL",
            column.name
        ))),
        (v, t) => Err(StrataError::StatementExecution(format!(
            "primary key column '{}' of type {} cannot hold {}",
            column.name,
            t.name(),
            v.column_type().name()
        ))),
    }
}

fn decode_key_value(data: &[u8], column: &Column) -> Result<Value> {
    let bad = || {
        StrataError::StatementExecution(format!(
            "malformed primary key for column '{}'",
            column.name
        ))
    };
    match column.ctype {
        ColumnType::Integer => {
            let bytes: [u8; 4] = data.try_into().map_err(|_| bad())?;
            Ok(Value::Integer(i32::from_be_bytes(bytes)))
        }
        ColumnType::Long => {
            let bytes: [u8; 8] = data.try_into().map_err(|_| bad())?;
            Ok(Value::Long(i64::from_be_bytes(bytes)))
        }
        ColumnType::Timestamp => {
            let bytes: [u8; 8] = data.try_into().map_err(|_| bad())?;
            Ok(Value::Timestamp(i64::from_be_bytes(bytes)))
        }
        ColumnType::Boolean => match data {
            [0] => Ok(Value::Boolean(false)),
            [1] => Ok(Value::Boolean(true)),
            _ => Err(bad()),
        },
        ColumnType::String => String::from_utf8(data.to_vec())
            .map(Value::String)
            .map_err(|_| bad()),
        ColumnType::Bytearray => Ok(Value::Bytes(data.to_vec())),
        ColumnType::Null | ColumnType::Any => Err(bad()),
    }
}
