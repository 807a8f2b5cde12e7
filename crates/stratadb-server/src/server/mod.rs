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

pub mod codec;
pub mod metrics;

use crate::server::codec::{decode_request_frame, encode_reply_frame};
use crate::server::metrics::ServerMetrics;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use stratadb::auth::StaticCredentials;
use stratadb::engine::memory::MemoryEngine;
use stratadb::error::{Result, StrataError};
use stratadb::planner::Translator;
use stratadb::proto::framebuf::FrameBufferPool;
use stratadb::proto::{Channel, Reply, ReplyFrame};
use stratadb::session::SessionPeer;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub auth_user: String,
    pub auth_password: String,
    pub node_id: String,
    pub table_spaces: Vec<String>,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(StrataError::StatementExecution(
                "host cannot be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(StrataError::StatementExecution(
                "port must be > 0".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(StrataError::StatementExecution(
                "max_connections must be > 0".to_string(),
            ));
        }
        if self.auth_user.trim().is_empty() {
            return Err(StrataError::StatementExecution(
                "auth_user cannot be empty".to_string(),
            ));
        }
        if self.auth_password.is_empty() {
            return Err(StrataError::StatementExecution(
                "auth_password cannot be empty".to_string(),
            ));
        }
        if self.node_id.trim().is_empty() {
            return Err(StrataError::StatementExecution(
                "node_id cannot be empty".to_string(),
            ));
        }
        if self.table_spaces.is_empty() {
            return Err(StrataError::StatementExecution(
                "at least one table space is required".to_string(),
            ));
        }
        Ok(())
    }
}

struct TcpChannel {
    tx: mpsc::UnboundedSender<ReplyFrame>,
    peer: String,
}

impl Channel for TcpChannel {
    fn send_reply(&self, request_id: u64, reply: Reply) {
        // A closed connection drops the reply silently.
        let _ = self.tx.send(ReplyFrame {
            id: request_id,
            reply,
        });
    }

    fn remote_address(&self) -> String {
        self.peer.clone()
    }
}

pub async fn run(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let engine = Arc::new(MemoryEngine::new(config.node_id.clone()));
    for table_space in &config.table_spaces {
        engine.create_table_space(table_space);
    }
    let listener = TcpListener::bind(config.listen_addr()).await?;
    serve(listener, Arc::new(config), engine, None).await
}

pub async fn serve(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    engine: Arc<MemoryEngine>,
    mut shutdown: Option<oneshot::Receiver<()>>,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, node = %config.node_id, "stratadb server listening");
    let conn_limit = Arc::new(Semaphore::new(config.max_connections));
    let metrics = Arc::new(ServerMetrics::default());
    let translator = Arc::new(Translator::new(engine.clone()));
    let credentials = Arc::new(StaticCredentials {
        username: config.auth_user.clone(),
        password: config.auth_password.clone(),
    });
    let pool = FrameBufferPool::new();

    loop {
        tokio::select! {
            _ = async {
                if let Some(rx) = &mut shutdown {
                    let _ = rx.await;
                }
            }, if shutdown.is_some() => {
                info!(%addr, metrics = ?metrics.snapshot(), "shutdown signal received");
                break;
            }
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                let permit = match Arc::clone(&conn_limit).try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => {
                        metrics.on_connection_refused();
                        info!(%peer, "connection refused due to max_connections limit");
                        continue;
                    }
                };
                metrics.on_connection_accepted();
                info!(%peer, "accepted connection");
                let engine = Arc::clone(&engine);
                let translator = Arc::clone(&translator);
                let credentials = Arc::clone(&credentials);
                let pool = Arc::clone(&pool);
                let metrics_for_conn = Arc::clone(&metrics);
                tokio::spawn(async move {
                    let _permit: OwnedSemaphorePermit = permit;
                    process_connection(socket, peer.to_string(), engine, translator, credentials, pool)
                        .await;
                    metrics_for_conn.on_connection_closed();
                });
            }
        }
    }

    Ok(())
}

async fn process_connection(
    socket: TcpStream,
    peer: String,
    engine: Arc<MemoryEngine>,
    translator: Arc<Translator>,
    credentials: Arc<StaticCredentials>,
    pool: Arc<FrameBufferPool>,
) {
    let framed = Framed::new(socket, LengthDelimitedCodec::new());
    let (mut sink, mut stream) = framed.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ReplyFrame>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match encode_reply_frame(&pool, &frame) {
                Ok(bytes) => {
                    if sink.send(bytes).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "failed to serialize reply frame");
                    break;
                }
            }
        }
    });

    let channel = Arc::new(TcpChannel {
        tx,
        peer: peer.clone(),
    });
    let session = SessionPeer::new(engine, translator, credentials, channel.clone());

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(payload) => match decode_request_frame(&payload) {
                Ok(request) => session.handle_request(request.id, request.request),
                Err(err) => match err.request_id {
                    Some(id) => channel
                        .send_reply(id, Reply::error(StrataError::UnknownMessageType.to_string())),
                    None => {
                        warn!(%peer, error = %err.message, "dropping undecodable frame");
                    }
                },
            },
            Err(err) => {
                warn!(%peer, error = %err, "connection read error");
                break;
            }
        }
    }

    session.channel_closed();
    drop(session);
    drop(channel);
    let _ = writer.await;
}
