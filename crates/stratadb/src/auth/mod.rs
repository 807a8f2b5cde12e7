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

//! Server-side SASL authenticator.
//!
//! The session creates one `SaslServer` per handshake and drops it once
//! authentication completes. `AuthError` is deliberately distinct from the
//! crate-wide error type so the session can map protocol failures to the
//! fixed "authentication failed" reply without leaking detail.

use std::sync::Arc;
use thiserror::Error;

pub const MECH_PLAIN: &str = "PLAIN";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unsupported mechanism '{0}'")]
    UnsupportedMechanism(String),

    #[error("malformed client token")]
    MalformedToken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication exchange already complete")]
    AlreadyComplete,
}

pub trait CredentialSource: Send + Sync {
    fn password_for(&self, username: &str) -> Option<String>;
}

/// Single-user credential source, enough for server bootstrap and tests.
pub struct StaticCredentials {
    pub username: String,
    pub password: String,
}

impl CredentialSource for StaticCredentials {
    fn password_for(&self, username: &str) -> Option<String> {
        (username == self.username).then(|| self.password.clone())
    }
}

#[derive(Debug)]
enum SaslState {
    /// Waiting for the initial (empty) client token.
    Initial,
    /// Challenge sent, waiting for the PLAIN response.
    AwaitingResponse,
    Complete { username: String },
}

pub struct SaslServer {
    source: Arc<dyn CredentialSource>,
    state: SaslState,
}

impl std::fmt::Debug for SaslServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslServer")
            .field("state", &self.state)
            .finish()
    }
}

impl SaslServer {
    pub fn new(source: Arc<dyn CredentialSource>, mech: &str) -> Result<Self, AuthError> {
        if mech != MECH_PLAIN {
            return Err(AuthError::UnsupportedMechanism(mech.to_string()));
        }
        Ok(Self {
            source,
            state: SaslState::Initial,
        })
    }

    /// Advance the exchange with the given client token and produce the next
    /// server token. The initial call returns a non-empty nonce challenge;
    /// the final call returns an empty token.
    pub fn response(&mut self, client_token: &[u8]) -> Result<Vec<u8>, AuthError> {
        match &self.state {
            SaslState::Initial => {
                let nonce: [u8; 16] = rand::random();
                self.state = SaslState::AwaitingResponse;
                let _ = client_token;
                Ok(nonce.to_vec())
            }
            SaslState::AwaitingResponse => {
                let (username, password) = parse_plain_token(client_token)?;
                let expected = self
                    .source
                    .password_for(&username)
                    .ok_or(AuthError::InvalidCredentials)?;
                if expected != password {
                    return Err(AuthError::InvalidCredentials);
                }
                self.state = SaslState::Complete { username };
                Ok(Vec::new())
            }
            SaslState::Complete { .. } => Err(AuthError::AlreadyComplete),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, SaslState::Complete { .. })
    }

    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SaslState::Complete { username } => Some(username),
            _ => None,
        }
    }
}

/// PLAIN message: `[authzid] NUL authcid NUL passwd` (RFC 4616). The
/// authorization identity is accepted but ignored.
fn parse_plain_token(token: &[u8]) -> Result<(String, String), AuthError> {
    let mut parts = token.split(|b| *b == 0);
    let _authzid = parts.next().ok_or(AuthError::MalformedToken)?;
    let authcid = parts.next().ok_or(AuthError::MalformedToken)?;
    let passwd = parts.next().ok_or(AuthError::MalformedToken)?;
    if parts.next().is_some() || authcid.is_empty() {
        return Err(AuthError::MalformedToken);
    }
    let username = String::from_utf8(authcid.to_vec()).map_err(|_| AuthError::MalformedToken)?;
    let password = String::from_utf8(passwd.to_vec()).map_err(|_| AuthError::MalformedToken)?;
    Ok((username, password))
}

pub fn plain_token(username: &str, password: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(username.len() + password.len() + 2);
    out.push(0);
    out.extend_from_slice(username.as_bytes());
    out.push(0);
    out.extend_from_slice(password.as_bytes());
    out
}
