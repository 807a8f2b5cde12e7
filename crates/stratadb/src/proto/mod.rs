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

//! Framed message types exchanged between a client and a session peer.
//!
//! The wire codec below this layer (length framing, payload encoding) lives
//! in the server crate; everything here is transport-agnostic.

pub mod framebuf;

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One inbound request frame: a correlation id plus the typed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub request: Request,
}

/// One outbound reply frame, correlated to the request that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub id: u64,
    pub reply: Reply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    SaslTokenRequest {
        mech: String,
    },
    SaslTokenStep {
        token: Vec<u8>,
    },
    ExecuteStatement {
        /// 0 means no transaction.
        tx: u64,
        query: String,
        table_space: String,
        params: Vec<Value>,
    },
    RequestTableSpaceDump {
        dump_id: String,
        table_space: String,
        fetch_size: Option<usize>,
    },
    OpenScanner {
        table_space: String,
        tx: u64,
        query: String,
        scanner_id: String,
        fetch_size: Option<usize>,
        /// 0 means unlimited.
        max_rows: usize,
        params: Vec<Value>,
    },
    FetchScannerData {
        scanner_id: String,
        fetch_size: usize,
    },
    CloseScanner {
        scanner_id: String,
    },
}

pub type Record = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    SaslResponse {
        token: Vec<u8>,
    },
    ExecuteStatementResult {
        update_count: u64,
        other_data: Option<Record>,
    },
    ResultSetChunk {
        scanner_id: String,
        columns: Vec<String>,
        rows: Vec<Record>,
        last: bool,
    },
    Ack {
        scanner_id: Option<String>,
    },
    Error {
        message: String,
        not_leader: bool,
        scanner_id: Option<String>,
    },
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
            not_leader: false,
            scanner_id: None,
        }
    }
}

/// Send side of a client channel. Implementations must not block: a closed
/// channel drops the reply silently rather than surfacing an error into the
/// caller.
pub trait Channel: Send + Sync {
    fn send_reply(&self, request_id: u64, reply: Reply);

    fn remote_address(&self) -> String {
        "unknown".to_string()
    }
}
