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

use parking_lot::Mutex;
use std::sync::Arc;
use stratadb::auth::{plain_token, StaticCredentials};
use stratadb::catalog::{Column, Table};
use stratadb::engine::memory::MemoryEngine;
use stratadb::planner::Translator;
use stratadb::proto::{Channel, Reply, Request};
use stratadb::session::SessionPeer;
use stratadb::types::{ColumnType, Value};

#[derive(Default)]
struct RecordingChannel {
    replies: Mutex<Vec<(u64, Reply)>>,
}

impl RecordingChannel {
    fn take(&self) -> Vec<(u64, Reply)> {
        std::mem::take(&mut *self.replies.lock())
    }

    fn last(&self) -> (u64, Reply) {
        self.replies
            .lock()
            .last()
            .cloned()
            .expect("at least one reply")
    }

    fn count(&self) -> usize {
        self.replies.lock().len()
    }
}

impl Channel for RecordingChannel {
    fn send_reply(&self, request_id: u64, reply: Reply) {
        self.replies.lock().push((request_id, reply));
    }

    fn remote_address(&self) -> String {
        "test:0".to_string()
    }
}

struct Fixture {
    engine: Arc<MemoryEngine>,
    session: SessionPeer,
    channel: Arc<RecordingChannel>,
    next_request: std::cell::Cell<u64>,
}

impl Fixture {
    fn new() -> Self {
        let engine = Arc::new(MemoryEngine::new("node-a"));
        engine.create_table_space("ts1");
        engine
            .define_table(Table {
                table_space: "ts1".to_string(),
                name: "t".to_string(),
                columns: vec![Column::new("a", ColumnType::Integer)],
                primary_key: vec![0],
            })
            .expect("define table");

        let translator = Arc::new(Translator::new(engine.clone()));
        let credentials = Arc::new(StaticCredentials {
            username: "alice".to_string(),
            password: "secret".to_string(),
        });
        let channel = Arc::new(RecordingChannel::default());
        let session = SessionPeer::new(
            engine.clone(),
            translator,
            credentials,
            channel.clone(),
        );
        Self {
            engine,
            session,
            channel,
            next_request: std::cell::Cell::new(0),
        }
    }

    fn send(&self, request: Request) -> (u64, Reply) {
        let id = self.next_request.get() + 1;
        self.next_request.set(id);
        self.session.handle_request(id, request);
        let (reply_id, reply) = self.channel.last();
        assert_eq!(reply_id, id, "reply must correlate to its request");
        (id, reply)
    }

    fn authenticate(&self) {
        let (_, challenge) = self.send(Request::SaslTokenRequest {
            mech: "PLAIN".to_string(),
        });
        let Reply::SaslResponse { token } = challenge else {
            panic!("expected challenge, got {challenge:?}");
        };
        assert!(!token.is_empty(), "initial challenge must be non-empty");
        let (_, fin) = self.send(Request::SaslTokenStep {
            token: plain_token("alice", "secret"),
        });
        let Reply::SaslResponse { token } = fin else {
            panic!("expected final challenge, got {fin:?}");
        };
        assert!(token.is_empty(), "final challenge must be empty");
        assert!(self.session.is_authenticated());
        assert_eq!(self.session.username(), "alice");
    }

    fn execute(&self, tx: u64, query: &str, params: Vec<Value>) -> Reply {
        self.send(Request::ExecuteStatement {
            tx,
            query: query.to_string(),
            table_space: "ts1".to_string(),
            params,
        })
        .1
    }

    fn insert_rows(&self, n: i32) {
        for a in 1..=n {
            let reply = self.execute(0, &format!("INSERT INTO t(a) VALUES({a})"), vec![]);
            let Reply::ExecuteStatementResult { update_count, .. } = reply else {
                panic!("insert failed: {reply:?}");
            };
            assert_eq!(update_count, 1);
        }
    }
}

#[test]
fn scenario_sasl_plain_handshake() {
    let fx = Fixture::new();
    fx.authenticate();
}

#[test]
fn unauthenticated_requests_fail_without_side_effects() {
    let fx = Fixture::new();
    for request in [
        Request::ExecuteStatement {
            tx: 0,
            query: "INSERT INTO t(a) VALUES(1)".to_string(),
            table_space: "ts1".to_string(),
            params: vec![],
        },
        Request::OpenScanner {
            table_space: "ts1".to_string(),
            tx: 0,
            query: "SELECT a FROM t".to_string(),
            scanner_id: "c1".to_string(),
            fetch_size: None,
            max_rows: 0,
            params: vec![],
        },
        Request::FetchScannerData {
            scanner_id: "c1".to_string(),
            fetch_size: 10,
        },
        Request::CloseScanner {
            scanner_id: "c1".to_string(),
        },
        Request::RequestTableSpaceDump {
            dump_id: "d1".to_string(),
            table_space: "ts1".to_string(),
            fetch_size: None,
        },
    ] {
        let (_, reply) = fx.send(request);
        let Reply::Error { message, .. } = reply else {
            panic!("expected auth error, got {reply:?}");
        };
        assert!(message.contains("authentication required"), "{message}");
    }
    assert!(!fx.session.is_authenticated());
    assert!(!fx.session.has_scanner("c1"));

    // Authenticate and confirm nothing was inserted by the rejected calls.
    fx.authenticate();
    let reply = fx.execute(0, "SELECT * FROM t WHERE a = 1", vec![]);
    let Reply::ExecuteStatementResult { update_count, .. } = reply else {
        panic!("expected result, got {reply:?}");
    };
    assert_eq!(update_count, 0);
}

#[test]
fn wrong_password_gets_the_fixed_authentication_failed_reply() {
    let fx = Fixture::new();
    let _ = fx.send(Request::SaslTokenRequest {
        mech: "PLAIN".to_string(),
    });
    let (_, reply) = fx.send(Request::SaslTokenStep {
        token: plain_token("alice", "nope"),
    });
    let Reply::Error { message, .. } = reply else {
        panic!("expected error, got {reply:?}");
    };
    assert_eq!(message, "authentication failed");
    assert!(!fx.session.is_authenticated());
}

#[test]
fn scenario_transaction_lifecycle_with_key_decoding() {
    let fx = Fixture::new();
    fx.authenticate();

    let reply = fx.execute(0, "BEGIN", vec![]);
    let Reply::ExecuteStatementResult {
        update_count,
        other_data,
    } = reply
    else {
        panic!("expected result, got {reply:?}");
    };
    assert_eq!(update_count, 1);
    let Some(Value::Long(tx)) = other_data.and_then(|d| d.get("tx").cloned()) else {
        panic!("expected tx id");
    };
    let tx = tx as u64;
    assert_eq!(fx.session.tracked_transactions("ts1"), vec![tx]);

    let reply = fx.execute(tx, "INSERT INTO t(a) VALUES(1)", vec![]);
    let Reply::ExecuteStatementResult {
        update_count,
        other_data,
    } = reply
    else {
        panic!("expected result, got {reply:?}");
    };
    assert_eq!(update_count, 1);
    let key = other_data
        .and_then(|d| d.get("key").cloned())
        .expect("insert returns the key");
    assert_eq!(key, Value::Integer(1));

    let reply = fx.execute(tx, "COMMIT", vec![]);
    let Reply::ExecuteStatementResult { update_count, .. } = reply else {
        panic!("expected result, got {reply:?}");
    };
    assert_eq!(update_count, 1);
    assert!(fx.session.tracked_transactions("ts1").is_empty());
}

#[test]
fn scenario_scan_fetch_loop_over_five_rows() {
    let fx = Fixture::new();
    fx.authenticate();
    fx.insert_rows(5);

    let (_, reply) = fx.send(Request::OpenScanner {
        table_space: "ts1".to_string(),
        tx: 0,
        query: "SELECT a FROM t".to_string(),
        scanner_id: "c1".to_string(),
        fetch_size: Some(2),
        max_rows: 0,
        params: vec![],
    });
    let Reply::ResultSetChunk {
        scanner_id,
        columns,
        rows,
        last,
    } = reply
    else {
        panic!("expected chunk, got {reply:?}");
    };
    assert_eq!(scanner_id, "c1");
    assert_eq!(columns, vec!["a".to_string()]);
    assert_eq!(rows.len(), 2);
    assert!(!last);
    assert!(fx.session.has_scanner("c1"));

    let (_, reply) = fx.send(Request::FetchScannerData {
        scanner_id: "c1".to_string(),
        fetch_size: 2,
    });
    let Reply::ResultSetChunk { rows, last, .. } = reply else {
        panic!("expected chunk, got {reply:?}");
    };
    assert_eq!(rows.len(), 2);
    assert!(!last);

    let (_, reply) = fx.send(Request::FetchScannerData {
        scanner_id: "c1".to_string(),
        fetch_size: 2,
    });
    let Reply::ResultSetChunk { rows, last, .. } = reply else {
        panic!("expected chunk, got {reply:?}");
    };
    assert_eq!(rows.len(), 1);
    assert!(last, "short read drains the cursor");
    assert!(!fx.session.has_scanner("c1"), "cursor removed on last");

    // A further fetch references an unknown cursor and the reply carries
    // the scanner id marker.
    let (_, reply) = fx.send(Request::FetchScannerData {
        scanner_id: "c1".to_string(),
        fetch_size: 2,
    });
    let Reply::Error {
        message,
        scanner_id,
        ..
    } = reply
    else {
        panic!("expected error, got {reply:?}");
    };
    assert!(message.contains("no such scanner"), "{message}");
    assert_eq!(scanner_id.as_deref(), Some("c1"));
}

#[test]
fn scenario_empty_table_scan_never_registers_a_cursor() {
    let fx = Fixture::new();
    fx.authenticate();

    let (_, reply) = fx.send(Request::OpenScanner {
        table_space: "ts1".to_string(),
        tx: 0,
        query: "SELECT a FROM t".to_string(),
        scanner_id: "c-empty".to_string(),
        fetch_size: Some(10),
        max_rows: 0,
        params: vec![],
    });
    let Reply::ResultSetChunk { rows, last, .. } = reply else {
        panic!("expected chunk, got {reply:?}");
    };
    assert!(rows.is_empty());
    assert!(last);
    assert!(!fx.session.has_scanner("c-empty"));
}

#[test]
fn scenario_open_scanner_rejects_non_scan_statements() {
    let fx = Fixture::new();
    fx.authenticate();

    let (_, reply) = fx.send(Request::OpenScanner {
        table_space: "ts1".to_string(),
        tx: 0,
        query: "INSERT INTO t(a) VALUES(7)".to_string(),
        scanner_id: "c2".to_string(),
        fetch_size: Some(10),
        max_rows: 0,
        params: vec![],
    });
    let Reply::Error { message, .. } = reply else {
        panic!("expected error, got {reply:?}");
    };
    assert!(message.contains("unsupported query type for scan"), "{message}");
    assert!(!fx.session.has_scanner("c2"));

    // No row must have been inserted by the rejected open.
    let reply = fx.execute(0, "SELECT * FROM t WHERE a = 7", vec![]);
    let Reply::ExecuteStatementResult { update_count, .. } = reply else {
        panic!("expected result, got {reply:?}");
    };
    assert_eq!(update_count, 0);
}

#[test]
fn scenario_channel_close_rolls_back_and_releases_everything() {
    let fx = Fixture::new();
    fx.authenticate();
    fx.insert_rows(3);

    let reply = fx.execute(0, "BEGIN", vec![]);
    let Reply::ExecuteStatementResult { other_data, .. } = reply else {
        panic!("expected result, got {reply:?}");
    };
    let Some(Value::Long(tx)) = other_data.and_then(|d| d.get("tx").cloned()) else {
        panic!("expected tx id");
    };
    let tx = tx as u64;
    fx.execute(tx, "INSERT INTO t(a) VALUES(100)", vec![]);

    let (_, reply) = fx.send(Request::OpenScanner {
        table_space: "ts1".to_string(),
        tx: 0,
        query: "SELECT a FROM t".to_string(),
        scanner_id: "c1".to_string(),
        fetch_size: Some(1),
        max_rows: 0,
        params: vec![],
    });
    assert!(matches!(reply, Reply::ResultSetChunk { last: false, .. }));
    assert!(fx.session.has_scanner("c1"));

    fx.session.channel_closed();

    assert_eq!(fx.engine.open_transaction_count(), 0, "tx rolled back");
    assert!(!fx.session.has_scanner("c1"));
    assert!(fx.session.tracked_transactions("ts1").is_empty());

    // The transactional insert is gone.
    let probe = Fixture::probe_row(&fx, 100);
    assert!(!probe, "rolled-back row must not be visible");

    // No further messages are processed on behalf of this session.
    let before = fx.channel.count();
    fx.session.handle_request(
        999,
        Request::ExecuteStatement {
            tx: 0,
            query: "SELECT a FROM t WHERE a = 1".to_string(),
            table_space: "ts1".to_string(),
            params: vec![],
        },
    );
    assert_eq!(fx.channel.count(), before);
}

impl Fixture {
    fn probe_row(fx: &Fixture, a: i32) -> bool {
        use stratadb::engine::{Engine, StatementResult, TransactionContext};
        use stratadb::planner::EvaluationContext;

        let translator = Translator::new(fx.engine.clone());
        let translated = translator
            .translate(
                "ts1",
                "SELECT * FROM t WHERE a = ?",
                vec![Value::Integer(a)],
                false,
                true,
                true,
                0,
            )
            .expect("translate");
        match fx
            .engine
            .execute_plan(
                &translated.plan,
                &EvaluationContext::new(translated.context.query.clone(), translated.context.params.clone()),
                TransactionContext::NO_TRANSACTION,
            )
            .expect("execute")
        {
            StatementResult::Get { record } => record.is_some(),
            _ => panic!("expected point lookup"),
        }
    }
}

#[test]
fn not_leader_failures_carry_the_redirect_marker() {
    let fx = Fixture::new();
    fx.authenticate();
    fx.engine.set_leader("ts1", false);

    let reply = fx.execute(0, "INSERT INTO t(a) VALUES(1)", vec![]);
    let Reply::Error {
        not_leader,
        message,
        ..
    } = reply
    else {
        panic!("expected error, got {reply:?}");
    };
    assert!(not_leader, "{message}");

    let (_, reply) = fx.send(Request::OpenScanner {
        table_space: "ts1".to_string(),
        tx: 0,
        query: "SELECT a FROM t".to_string(),
        scanner_id: "c1".to_string(),
        fetch_size: Some(10),
        max_rows: 0,
        params: vec![],
    });
    let Reply::Error { not_leader, .. } = reply else {
        panic!("expected error, got {reply:?}");
    };
    assert!(not_leader);
    assert!(!fx.session.has_scanner("c1"));
}

#[test]
fn max_rows_bounds_an_open_scanner() {
    let fx = Fixture::new();
    fx.authenticate();
    fx.insert_rows(10);

    let (_, reply) = fx.send(Request::OpenScanner {
        table_space: "ts1".to_string(),
        tx: 0,
        query: "SELECT a FROM t".to_string(),
        scanner_id: "c1".to_string(),
        fetch_size: Some(2),
        max_rows: 3,
        params: vec![],
    });
    let Reply::ResultSetChunk { rows, last, .. } = reply else {
        panic!("expected chunk, got {reply:?}");
    };
    assert_eq!(rows.len(), 2);
    assert!(!last);

    let (_, reply) = fx.send(Request::FetchScannerData {
        scanner_id: "c1".to_string(),
        fetch_size: 10,
    });
    let Reply::ResultSetChunk { rows, last, .. } = reply else {
        panic!("expected chunk, got {reply:?}");
    };
    assert_eq!(rows.len(), 1, "limit adapter caps the total at 3");
    assert!(last);
    assert!(!fx.session.has_scanner("c1"));
}

#[test]
fn reopening_a_scanner_id_replaces_the_cursor_cleanly() {
    let fx = Fixture::new();
    fx.authenticate();
    fx.insert_rows(6);

    for _ in 0..2 {
        let (_, reply) = fx.send(Request::OpenScanner {
            table_space: "ts1".to_string(),
            tx: 0,
            query: "SELECT a FROM t".to_string(),
            scanner_id: "dup".to_string(),
            fetch_size: Some(2),
            max_rows: 0,
            params: vec![],
        });
        assert!(matches!(reply, Reply::ResultSetChunk { last: false, .. }));
    }
    // The replacement cursor starts from the beginning again.
    let (_, reply) = fx.send(Request::FetchScannerData {
        scanner_id: "dup".to_string(),
        fetch_size: 10,
    });
    let Reply::ResultSetChunk { rows, last, .. } = reply else {
        panic!("expected chunk, got {reply:?}");
    };
    assert_eq!(rows.len(), 4);
    assert!(last);
}

#[test]
fn close_scanner_acknowledges_and_rejects_unknown_ids() {
    let fx = Fixture::new();
    fx.authenticate();
    fx.insert_rows(5);

    let (_, reply) = fx.send(Request::OpenScanner {
        table_space: "ts1".to_string(),
        tx: 0,
        query: "SELECT a FROM t".to_string(),
        scanner_id: "c1".to_string(),
        fetch_size: Some(2),
        max_rows: 0,
        params: vec![],
    });
    assert!(matches!(reply, Reply::ResultSetChunk { last: false, .. }));

    let (_, reply) = fx.send(Request::CloseScanner {
        scanner_id: "c1".to_string(),
    });
    let Reply::Ack { scanner_id } = reply else {
        panic!("expected ack, got {reply:?}");
    };
    assert_eq!(scanner_id.as_deref(), Some("c1"));
    assert!(!fx.session.has_scanner("c1"));

    let (_, reply) = fx.send(Request::CloseScanner {
        scanner_id: "c1".to_string(),
    });
    let Reply::Error { scanner_id, .. } = reply else {
        panic!("expected error, got {reply:?}");
    };
    assert_eq!(scanner_id.as_deref(), Some("c1"));
}

#[test]
fn tablespace_dump_streams_chunks_on_the_channel() {
    let fx = Fixture::new();
    fx.authenticate();
    fx.insert_rows(5);
    fx.channel.take();

    let (request_id, _) = fx.send(Request::RequestTableSpaceDump {
        dump_id: "d1".to_string(),
        table_space: "ts1".to_string(),
        fetch_size: Some(2),
    });
    let replies = fx.channel.take();
    assert_eq!(replies.len(), 3, "five rows in chunks of two");
    for (i, (id, reply)) in replies.iter().enumerate() {
        assert_eq!(*id, request_id);
        let Reply::ResultSetChunk {
            scanner_id, last, ..
        } = reply
        else {
            panic!("expected chunk, got {reply:?}");
        };
        assert_eq!(scanner_id, "d1");
        assert_eq!(*last, i == replies.len() - 1);
    }
}

#[test]
fn parameterized_execution_round_trips() {
    let fx = Fixture::new();
    fx.authenticate();
    fx.insert_rows(3);

    let reply = fx.execute(
        0,
        "SELECT * FROM t WHERE a = ?",
        vec![Value::Integer(2)],
    );
    let Reply::ExecuteStatementResult {
        update_count,
        other_data,
    } = reply
    else {
        panic!("expected result, got {reply:?}");
    };
    assert_eq!(update_count, 1);
    assert_eq!(
        other_data.and_then(|d| d.get("a").cloned()),
        Some(Value::Integer(2))
    );
}
