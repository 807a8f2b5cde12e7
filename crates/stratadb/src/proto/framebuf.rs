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

//! Pooled output buffers for reply frames.
//!
//! A `FrameBuilder` leases its backing buffer from a shared pool. When the
//! frame outgrows the buffer, the builder leases a larger one, copies, and
//! returns the superseded buffer to the pool at that moment. `finish()`
//! transfers the remaining buffer to the caller; the builder's lease table
//! must be empty afterwards, and a non-empty table or a double release is a
//! programmer error that panics.

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const INITIAL_FRAME_CAPACITY: usize = 1024;

#[derive(Default)]
pub struct FrameBufferPool {
    free: Mutex<Vec<BytesMut>>,
    leased: AtomicUsize,
    released: AtomicUsize,
}

impl FrameBufferPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lease(&self, min_capacity: usize) -> BytesMut {
        self.leased.fetch_add(1, Ordering::Relaxed);
        let mut free = self.free.lock();
        if let Some(pos) = free.iter().position(|b| b.capacity() >= min_capacity) {
            return free.swap_remove(pos);
        }
        drop(free);
        BytesMut::with_capacity(min_capacity)
    }

    fn put_back(&self, mut buf: BytesMut) {
        self.released.fetch_add(1, Ordering::Relaxed);
        buf.clear();
        self.free.lock().push(buf);
    }

    pub fn lease_count(&self) -> usize {
        self.leased.load(Ordering::Relaxed)
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }

    pub fn idle_buffers(&self) -> usize {
        self.free.lock().len()
    }
}

pub struct FrameBuilder {
    pool: Arc<FrameBufferPool>,
    buf: BytesMut,
    current_lease: u64,
    next_lease: u64,
    /// Lease id -> capacity for every pool buffer this builder still owns.
    leases: HashMap<u64, usize>,
}

impl FrameBuilder {
    pub fn new(pool: Arc<FrameBufferPool>) -> Self {
        let buf = pool.lease(INITIAL_FRAME_CAPACITY);
        let mut leases = HashMap::new();
        leases.insert(0, buf.capacity());
        Self {
            pool,
            buf,
            current_lease: 0,
            next_lease: 1,
            leases,
        }
    }

    pub fn put_slice(&mut self, data: &[u8]) {
        self.ensure_capacity(data.len());
        self.buf.put_slice(data);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn ensure_capacity(&mut self, additional: usize) {
        let needed = self.buf.len() + additional;
        if needed <= self.buf.capacity() {
            return;
        }
        let new_capacity = needed.max(self.buf.capacity() * 2);
        let mut bigger = self.pool.lease(new_capacity);
        let lease = self.next_lease;
        self.next_lease += 1;
        self.leases.insert(lease, bigger.capacity());

        bigger.put_slice(&self.buf);
        let old = std::mem::replace(&mut self.buf, bigger);
        let old_lease = std::mem::replace(&mut self.current_lease, lease);
        self.release(old_lease, old);
    }

    fn release(&mut self, lease: u64, buf: BytesMut) {
        if self.leases.remove(&lease).is_none() {
            panic!("frame buffer lease {lease} released twice");
        }
        self.pool.put_back(buf);
    }

    /// Transfer the finished frame to the caller. The builder must own
    /// exactly its current buffer at this point.
    pub fn finish(mut self) -> Bytes {
        if self.leases.remove(&self.current_lease).is_none() {
            panic!("frame buffer lease {} released twice", self.current_lease);
        }
        if !self.leases.is_empty() {
            panic!(
                "frame builder leaked {} pooled buffer(s) on finish",
                self.leases.len()
            );
        }
        self.buf.split().freeze()
    }
}

impl std::io::Write for FrameBuilder {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.put_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
