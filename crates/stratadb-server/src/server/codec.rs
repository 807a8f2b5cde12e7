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

//! Frame payload codec. Frames are length-delimited on the wire; each
//! payload is a JSON-encoded request or reply frame. Reply frames are
//! serialized through the pooled frame builder.

use bytes::Bytes;
use std::sync::Arc;
use stratadb::proto::framebuf::{FrameBufferPool, FrameBuilder};
use stratadb::proto::{ReplyFrame, RequestFrame};

/// Decode failure that still recovered the correlation id when the payload
/// was well-formed JSON with an unrecognized message body.
#[derive(Debug)]
pub struct DecodeError {
    pub request_id: Option<u64>,
    pub message: String,
}

pub fn decode_request_frame(payload: &[u8]) -> Result<RequestFrame, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| DecodeError {
            request_id: None,
            message: format!("malformed frame: {e}"),
        })?;
    let request_id = value.get("id").and_then(|v| v.as_u64());
    serde_json::from_value(value).map_err(|e| DecodeError {
        request_id,
        message: format!("unsupported message: {e}"),
    })
}

pub fn encode_reply_frame(
    pool: &Arc<FrameBufferPool>,
    frame: &ReplyFrame,
) -> serde_json::Result<Bytes> {
    let mut builder = FrameBuilder::new(Arc::clone(pool));
    serde_json::to_writer(&mut builder, frame)?;
    Ok(builder.finish())
}
