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

//! Per-connection session peer.
//!
//! One `SessionPeer` owns one client channel. It drives the SASL handshake,
//! dispatches authenticated requests into the planner and the engine, owns
//! every open cursor, and tracks the transactions a client has opened so
//! teardown can roll them back.

use crate::auth::{CredentialSource, SaslServer};
use crate::catalog::decode_primary_key;
use crate::engine::scan::{DataScanner, LimitedScanner};
use crate::engine::{Engine, StatementResult, TransactionContext, TxOutcome};
use crate::error::StrataError;
use crate::planner::plan::{Statement, TxStatement};
use crate::planner::{EvaluationContext, Translator};
use crate::proto::{Channel, Record, Reply, Request};
use crate::types::Value;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

static ID_GENERATOR: AtomicU64 = AtomicU64::new(0);

const DEFAULT_FETCH_SIZE: usize = 10;

/// An open cursor: the session owns the scanner; the client-chosen id is a
/// lookup key only.
struct ScannerPeer {
    scanner: Box<dyn DataScanner>,
}

impl ScannerPeer {
    fn client_close(&mut self) {
        self.scanner.client_close();
    }
}

pub struct SessionPeer {
    id: u64,
    address: String,
    connection_ts: u64,
    engine: Arc<dyn Engine>,
    translator: Arc<Translator>,
    credentials: Arc<dyn CredentialSource>,
    channel: Arc<dyn Channel>,
    authenticated: AtomicBool,
    username: RwLock<String>,
    sasl: Mutex<Option<SaslServer>>,
    /// Open scanners, keyed by the client-chosen id.
    scanners: DashMap<String, ScannerPeer>,
    /// Transactions observed as BEGIN-returned and not yet closed, per
    /// table space.
    open_transactions: DashMap<String, BTreeSet<u64>>,
    closed: AtomicBool,
}

impl SessionPeer {
    pub fn new(
        engine: Arc<dyn Engine>,
        translator: Arc<Translator>,
        credentials: Arc<dyn CredentialSource>,
        channel: Arc<dyn Channel>,
    ) -> Self {
        let connection_ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            id: ID_GENERATOR.fetch_add(1, Ordering::Relaxed) + 1,
            address: channel.remote_address(),
            connection_ts,
            engine,
            translator,
            credentials,
            channel,
            authenticated: AtomicBool::new(false),
            username: RwLock::new(String::new()),
            sasl: Mutex::new(None),
            scanners: DashMap::new(),
            open_transactions: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn remote_address(&self) -> &str {
        &self.address
    }

    pub fn connected_at_millis(&self) -> u64 {
        self.connection_ts
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn username(&self) -> String {
        self.username.read().clone()
    }

    pub fn has_scanner(&self, scanner_id: &str) -> bool {
        self.scanners.contains_key(scanner_id)
    }

    pub fn tracked_transactions(&self, table_space: &str) -> Vec<u64> {
        self.open_transactions
            .get(table_space)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// React to one inbound message. Handling is sequential in message
    /// arrival order; the reply is sent on the session's channel, correlated
    /// by `request_id`.
    pub fn handle_request(&self, request_id: u64, request: Request) {
        if self.closed.load(Ordering::Acquire) {
            debug!(session = self.id, "dropping message on closed session");
            return;
        }
        debug!(session = self.id, request = ?request, "message received");
        match request {
            Request::SaslTokenRequest { mech } => self.on_sasl_token_request(request_id, &mech),
            Request::SaslTokenStep { token } => self.on_sasl_token_step(request_id, &token),
            Request::ExecuteStatement {
                tx,
                query,
                table_space,
                params,
            } => self.on_execute_statement(request_id, tx, &query, &table_space, params),
            Request::RequestTableSpaceDump {
                dump_id,
                table_space,
                fetch_size,
            } => self.on_tablespace_dump(request_id, &dump_id, &table_space, fetch_size),
            Request::OpenScanner {
                table_space,
                tx,
                query,
                scanner_id,
                fetch_size,
                max_rows,
                params,
            } => self.on_open_scanner(
                request_id,
                &table_space,
                tx,
                &query,
                &scanner_id,
                fetch_size.unwrap_or(DEFAULT_FETCH_SIZE),
                max_rows,
                params,
            ),
            Request::FetchScannerData {
                scanner_id,
                fetch_size,
            } => self.on_fetch_scanner_data(request_id, &scanner_id, fetch_size),
            Request::CloseScanner { scanner_id } => self.on_close_scanner(request_id, &scanner_id),
        }
    }

    fn require_authentication(&self, request_id: u64) -> bool {
        if self.is_authenticated() {
            return true;
        }
        self.channel
            .send_reply(request_id, Reply::error(StrataError::AuthRequired.to_string()));
        false
    }

    fn on_sasl_token_request(&self, request_id: u64, mech: &str) {
        let mut guard = self.sasl.lock();
        let result = (|| {
            if guard.is_none() {
                *guard = Some(SaslServer::new(Arc::clone(&self.credentials), mech)?);
            }
            guard.as_mut().expect("authenticator present").response(&[])
        })();
        match result {
            Ok(token) => {
                self.channel
                    .send_reply(request_id, Reply::SaslResponse { token });
            }
            Err(err) => {
                warn!(session = self.id, error = %err, "SASL negotiation failed");
                *guard = None;
                self.channel
                    .send_reply(request_id, Reply::error(err.to_string()));
            }
        }
    }

    fn on_sasl_token_step(&self, request_id: u64, token: &[u8]) {
        let mut guard = self.sasl.lock();
        let Some(sasl) = guard.as_mut() else {
            self.channel.send_reply(
                request_id,
                Reply::error(StrataError::AuthFailed.to_string()),
            );
            return;
        };
        match sasl.response(token) {
            Ok(server_token) => {
                if sasl.is_complete() {
                    let username = sasl.username().unwrap_or_default().to_string();
                    *self.username.write() = username.clone();
                    self.authenticated.store(true, Ordering::Release);
                    *guard = None;
                    info!(
                        session = self.id,
                        address = %self.address,
                        %username,
                        "client completed SASL authentication"
                    );
                }
                self.channel
                    .send_reply(request_id, Reply::SaslResponse { token: server_token });
            }
            Err(err) => {
                warn!(session = self.id, error = %err, "SASL authentication failed");
                *guard = None;
                self.channel.send_reply(
                    request_id,
                    Reply::error(StrataError::AuthFailed.to_string()),
                );
            }
        }
    }

    fn on_execute_statement(
        &self,
        request_id: u64,
        tx: u64,
        query: &str,
        table_space: &str,
        params: Vec<Value>,
    ) {
        if !self.require_authentication(request_id) {
            return;
        }
        let tx_context = TransactionContext { tx_id: tx };
        let outcome = self
            .translator
            .translate(table_space, query, params, false, true, true, 0)
            .and_then(|translated| {
                let result =
                    self.engine
                        .execute_plan(&translated.plan, &translated.context, tx_context)?;
                self.shape_execute_reply(&translated.plan.main, result)
            });
        match outcome {
            Ok(reply) => self.channel.send_reply(request_id, reply),
            Err(err) => self.send_error(request_id, &err, None),
        }
    }

    fn shape_execute_reply(
        &self,
        main: &Statement,
        result: StatementResult,
    ) -> Result<Reply, StrataError> {
        match result {
            StatementResult::Dml { update_count, key } => {
                let other_data = match key {
                    Some(raw) => {
                        let (table_space, table_name) = main.table_ref().ok_or_else(|| {
                            StrataError::StatementExecution(
                                "DML result without a target table".to_string(),
                            )
                        })?;
                        let table = self.engine.table_metadata(table_space, table_name)?;
                        let key_value = decode_primary_key(&table, &raw)?;
                        let mut data = Record::new();
                        data.insert("key".to_string(), key_value);
                        Some(data)
                    }
                    None => None,
                };
                Ok(Reply::ExecuteStatementResult {
                    update_count,
                    other_data,
                })
            }
            StatementResult::Get { record } => match record {
                Some(record) => Ok(Reply::ExecuteStatementResult {
                    update_count: 1,
                    other_data: Some(record),
                }),
                None => Ok(Reply::ExecuteStatementResult {
                    update_count: 0,
                    other_data: None,
                }),
            },
            StatementResult::Transaction { outcome, tx_id } => {
                if let Statement::Tx(tx_stmt) = main {
                    self.track_transaction(tx_stmt, outcome, tx_id);
                }
                let mut data = Record::new();
                data.insert("tx".to_string(), Value::Long(tx_id as i64));
                Ok(Reply::ExecuteStatementResult {
                    update_count: 1,
                    other_data: Some(data),
                })
            }
            StatementResult::Ddl => Ok(Reply::ExecuteStatementResult {
                update_count: 1,
                other_data: None,
            }),
            other => Err(StrataError::StatementExecution(format!(
                "unknown result type {}",
                other.kind()
            ))),
        }
    }

    fn track_transaction(&self, stmt: &TxStatement, outcome: TxOutcome, tx_id: u64) {
        let table_space = stmt.table_space().to_string();
        match outcome {
            TxOutcome::Begin => {
                self.open_transactions
                    .entry(table_space)
                    .or_default()
                    .insert(tx_id);
            }
            TxOutcome::Commit | TxOutcome::Rollback => {
                if let Some(mut set) = self.open_transactions.get_mut(&table_space) {
                    set.remove(&tx_id);
                }
            }
        }
    }

    fn on_tablespace_dump(
        &self,
        request_id: u64,
        dump_id: &str,
        table_space: &str,
        fetch_size: Option<usize>,
    ) {
        if !self.require_authentication(request_id) {
            return;
        }
        let fetch_size = fetch_size.unwrap_or(DEFAULT_FETCH_SIZE);
        // The engine owns the dump and streams frames on the channel itself.
        if let Err(err) = self.engine.dump_table_space(
            table_space,
            dump_id,
            fetch_size,
            request_id,
            &*self.channel,
        ) {
            self.send_error(request_id, &err, None);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_open_scanner(
        &self,
        request_id: u64,
        table_space: &str,
        tx: u64,
        query: &str,
        scanner_id: &str,
        fetch_size: usize,
        max_rows: usize,
        params: Vec<Value>,
    ) {
        if !self.require_authentication(request_id) {
            return;
        }
        let tx_context = TransactionContext { tx_id: tx };
        let outcome = (|| {
            let translated =
                self.translator
                    .translate(table_space, query, params, true, true, false, 0)?;
            if !translated.plan.main.is_scan() {
                return Err(StrataError::StatementExecution(format!(
                    "unsupported query type for scan {query}"
                )));
            }
            let result =
                self.engine
                    .execute_plan(&translated.plan, &translated.context, tx_context)?;
            let StatementResult::Scan(scanner) = result else {
                return Err(StrataError::StatementExecution(format!(
                    "unknown result type {} for scan",
                    result.kind()
                )));
            };
            let mut scanner: Box<dyn DataScanner> = if max_rows > 0 {
                Box::new(LimitedScanner::new(scanner, max_rows))
            } else {
                scanner
            };

            let rows = scanner
                .consume(fetch_size)
                .map_err(|e| StrataError::Scan(e.to_string()))?;
            let columns: Vec<String> =
                scanner.schema().iter().map(|c| c.name.clone()).collect();
            let records = to_records(&columns, rows);
            let last = scanner.is_finished();
            debug!(
                session = self.id,
                scanner = scanner_id,
                rows = records.len(),
                last,
                "sending first chunk"
            );
            if !last {
                // A re-used id replaces the previous cursor cleanly.
                if let Some(mut old) = self.scanners.insert(
                    scanner_id.to_string(),
                    ScannerPeer { scanner },
                ) {
                    old.client_close();
                }
            }
            Ok(Reply::ResultSetChunk {
                scanner_id: scanner_id.to_string(),
                columns,
                rows: records,
                last,
            })
        })();
        match outcome {
            Ok(reply) => self.channel.send_reply(request_id, reply),
            Err(err) => {
                warn!(
                    session = self.id,
                    scanner = scanner_id,
                    error = %err,
                    "error on scanner open"
                );
                self.scanners.remove(scanner_id);
                self.send_error(request_id, &err, None);
            }
        }
    }

    fn on_fetch_scanner_data(&self, request_id: u64, scanner_id: &str, fetch_size: usize) {
        if !self.require_authentication(request_id) {
            return;
        }
        let Some(mut entry) = self.scanners.get_mut(scanner_id) else {
            let known: Vec<String> = self.scanners.iter().map(|e| e.key().clone()).collect();
            let err = StrataError::UnknownCursor(scanner_id.to_string());
            self.channel.send_reply(
                request_id,
                Reply::Error {
                    message: format!("{err}, only {known:?}"),
                    not_leader: false,
                    scanner_id: Some(scanner_id.to_string()),
                },
            );
            return;
        };
        match entry.scanner.consume(fetch_size) {
            Ok(rows) => {
                let columns: Vec<String> = entry
                    .scanner
                    .schema()
                    .iter()
                    .map(|c| c.name.clone())
                    .collect();
                let last = entry.scanner.is_finished();
                drop(entry);
                if last {
                    debug!(
                        session = self.id,
                        scanner = scanner_id,
                        "unregistering scanner, resultset is finished"
                    );
                    self.scanners.remove(scanner_id);
                }
                let records = to_records(&columns, rows);
                self.channel.send_reply(
                    request_id,
                    Reply::ResultSetChunk {
                        scanner_id: scanner_id.to_string(),
                        columns,
                        rows: records,
                        last,
                    },
                );
            }
            Err(err) => {
                drop(entry);
                // The cursor is unregistered before the error reply.
                self.scanners.remove(scanner_id);
                let err = StrataError::Scan(err.to_string());
                self.send_error(request_id, &err, Some(scanner_id.to_string()));
            }
        }
    }

    fn on_close_scanner(&self, request_id: u64, scanner_id: &str) {
        if !self.require_authentication(request_id) {
            return;
        }
        debug!(session = self.id, scanner = scanner_id, "closing scanner as requested by client");
        match self.scanners.remove(scanner_id) {
            Some((_, mut peer)) => {
                peer.client_close();
                self.channel.send_reply(
                    request_id,
                    Reply::Ack {
                        scanner_id: Some(scanner_id.to_string()),
                    },
                );
            }
            None => {
                let err = StrataError::UnknownCursor(scanner_id.to_string());
                self.send_error(request_id, &err, Some(scanner_id.to_string()));
            }
        }
    }

    /// Fatal: the client channel is gone. Every tracked transaction is
    /// rolled back (errors logged and swallowed), every cursor closed, and
    /// no further messages are processed on behalf of this session.
    pub fn channel_closed(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(session = self.id, address = %self.address, "channel closed");
        for entry in self.open_transactions.iter() {
            let table_space = entry.key().clone();
            for tx in entry.value().iter() {
                info!(
                    session = self.id,
                    %table_space,
                    tx,
                    "rolling back transaction on session teardown"
                );
                let statement = Statement::Tx(TxStatement::Rollback {
                    table_space: table_space.clone(),
                    tx_id: Some(*tx),
                });
                if let Err(err) = self.engine.execute_statement(
                    &statement,
                    &EvaluationContext::default_context(),
                    TransactionContext::NO_TRANSACTION,
                ) {
                    warn!(
                        session = self.id,
                        %table_space,
                        tx,
                        error = %err,
                        "rollback failed during session teardown"
                    );
                }
            }
        }
        self.open_transactions.clear();

        let ids: Vec<String> = self.scanners.iter().map(|e| e.key().clone()).collect();
        debug!(session = self.id, scanners = ?ids, "closing scanners");
        for id in ids {
            if let Some((_, mut peer)) = self.scanners.remove(&id) {
                peer.client_close();
            }
        }
        self.scanners.clear();
    }

    fn send_error(&self, request_id: u64, err: &StrataError, scanner_id: Option<String>) {
        self.channel.send_reply(
            request_id,
            Reply::Error {
                message: err.to_string(),
                not_leader: err.is_not_leader(),
                scanner_id,
            },
        );
    }
}

fn to_records(columns: &[String], rows: Vec<Vec<Value>>) -> Vec<Record> {
    rows.into_iter()
        .map(|row| {
            columns
                .iter()
                .cloned()
                .zip(row)
                .collect()
        })
        .collect()
}
