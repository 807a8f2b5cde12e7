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

//! StrataDB core: the server-side session peer, the SQL planner front-end,
//! and the engine contract that binds them, together with the in-memory
//! reference engine.

pub mod auth;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod planner;
pub mod proto;
pub mod session;
pub mod types;

pub use error::{Result, StrataError};
pub use types::{ColumnType, Value};
