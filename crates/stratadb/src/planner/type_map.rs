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
use crate::types::ColumnType;

/// Logical SQL types the planner reasons in. TIMESTAMP appears only on the
/// exposure direction (engine code -> SQL type); it is not accepted back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Varchar,
    Boolean,
    Integer,
    Bigint,
    Varbinary,
    Timestamp,
    Null,
    Any,
}

pub fn sql_type_to_column_type(t: SqlType) -> Result<ColumnType> {
    match t {
        SqlType::Varchar => Ok(ColumnType::String),
        SqlType::Boolean => Ok(ColumnType::Boolean),
        SqlType::Integer => Ok(ColumnType::Integer),
        SqlType::Bigint => Ok(ColumnType::Long),
        SqlType::Varbinary => Ok(ColumnType::Bytearray),
        SqlType::Null => Ok(ColumnType::Null),
        SqlType::Any => Ok(ColumnType::Any),
        other => Err(StrataError::StatementExecution(format!(
            "unsupported expression type {other:?}"
        ))),
    }
}

/// Exposure direction used when building the planner's root schema from the
/// engine's table metadata. Unknown engine codes surface as ANY.
pub fn column_type_to_sql_type(t: ColumnType) -> SqlType {
    match t {
        ColumnType::String => SqlType::Varchar,
        ColumnType::Boolean => SqlType::Boolean,
        ColumnType::Integer => SqlType::Integer,
        ColumnType::Long => SqlType::Bigint,
        ColumnType::Bytearray => SqlType::Varbinary,
        ColumnType::Timestamp => SqlType::Timestamp,
        ColumnType::Null => SqlType::Null,
        ColumnType::Any => SqlType::Any,
    }
}

/// Map a SQL DDL column type onto an engine code; used by the fallback
/// planner when binding CREATE TABLE / ALTER TABLE column definitions.
pub fn ast_type_to_column_type(dt: &sqlparser::ast::DataType) -> Result<ColumnType> {
    use sqlparser::ast::DataType as D;
    match dt {
        D::Varchar(_) | D::Char(_) | D::Text | D::String(_) => Ok(ColumnType::String),
        D::Boolean => Ok(ColumnType::Boolean),
        D::Int(_) | D::Integer(_) => Ok(ColumnType::Integer),
        D::BigInt(_) => Ok(ColumnType::Long),
        D::Varbinary(_) | D::Blob(_) | D::Bytea => Ok(ColumnType::Bytearray),
        D::Timestamp(_, _) => Ok(ColumnType::Timestamp),
        other => Err(StrataError::StatementExecution(format!(
            "unsupported column type {other}"
        ))),
    }
}
