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

use crate::catalog::Column;
use crate::error::Result;
use crate::types::Value;
use std::collections::VecDeque;

/// A resumable stream of rows with a declared schema. `is_finished` must be
/// accurate immediately after a `consume`: a cursor that has handed out its
/// last row reports finished without needing another poll.
pub trait DataScanner: Send {
    fn schema(&self) -> &[Column];

    fn next(&mut self) -> Result<Option<Vec<Value>>>;

    fn is_finished(&self) -> bool;

    /// Drain up to `fetch_size` rows.
    fn consume(&mut self, fetch_size: usize) -> Result<Vec<Vec<Value>>> {
        let mut out = Vec::with_capacity(fetch_size.min(64));
        while out.len() < fetch_size {
            match self.next()? {
                Some(row) => out.push(row),
                None => break,
            }
        }
        Ok(out)
    }

    /// Hook invoked when the client explicitly closes the cursor.
    fn client_close(&mut self) {}
}

/// Fully materialized scanner over an executed plan's rows.
pub struct TupleScanner {
    schema: Vec<Column>,
    rows: VecDeque<Vec<Value>>,
}

impl TupleScanner {
    pub fn new(schema: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            schema,
            rows: rows.into(),
        }
    }
}

impl DataScanner for TupleScanner {
    fn schema(&self) -> &[Column] {
        &self.schema
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }

    fn is_finished(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Bounded adapter capping the total number of rows a scanner hands out,
/// used when a client opens a scanner with a max-rows limit.
pub struct LimitedScanner {
    inner: Box<dyn DataScanner>,
    remaining: usize,
}

impl LimitedScanner {
    pub fn new(inner: Box<dyn DataScanner>, max_rows: usize) -> Self {
        Self {
            inner,
            remaining: max_rows,
        }
    }
}

impl DataScanner for LimitedScanner {
    fn schema(&self) -> &[Column] {
        self.inner.schema()
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        match self.inner.next()? {
            Some(row) => {
                self.remaining -= 1;
                Ok(Some(row))
            }
            None => {
                self.remaining = 0;
                Ok(None)
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.remaining == 0 || self.inner.is_finished()
    }

    fn client_close(&mut self) {
        self.inner.client_close();
    }
}
