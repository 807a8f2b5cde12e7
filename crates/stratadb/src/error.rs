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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrataError {
    #[error("authentication required")]
    AuthRequired,

    /// Fixed message: authentication protocol failures must not leak
    /// mechanism detail to the client.
    #[error("authentication failed")]
    AuthFailed,

    #[error("statement execution failed: {0}")]
    StatementExecution(String),

    #[error("unsupported plan shape: {0}")]
    UnsupportedPlan(String),

    #[error("no such scanner '{0}'")]
    UnknownCursor(String),

    #[error("scan failed: {0}")]
    Scan(String),

    #[error("unsupported message type")]
    UnknownMessageType,

    #[error("not leader for table space '{table_space}'")]
    NotLeader { table_space: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrataError {
    pub fn is_not_leader(&self) -> bool {
        matches!(self, StrataError::NotLeader { .. })
    }
}

pub type Result<T> = std::result::Result<T, StrataError>;
