// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A log sink that appends entries to a file, rotates it by size, and prunes old archives.
//!
//! # Overview
//!
//! A [`FileSink`](append::FileSink) renders each record on the calling thread and hands the
//! resulting line to a single background worker. The worker owns the file: before every append it
//! checks the file size, and once the file has grown beyond the configured limit it renames it to
//! `<name>.<YYYYMMDDHHMMSS>.bak` and starts a fresh one. Archives older than the retention period
//! are deleted after each rotation.
//!
//! Failures that cannot be returned to the caller are handed to a [`Trap`], which by default
//! prints them to standard error.
//!
//! # Examples
//!
//! ```no_run
//! use filesink::Level;
//! use filesink::append::FileSink;
//!
//! let sink = FileSink::builder("logs/app.log")
//!     .retention_days(7)
//!     .build()
//!     .unwrap();
//!
//! sink.log(Level::Warning, "disk", None, |what, _| {
//!     Ok::<_, anyhow::Error>(format!("{what} almost full"))
//! })
//! .unwrap();
//! ```
//!
//! Forwarding records of the `log` crate, with the `bridge-log` feature:
//!
//! ```ignore
//! use filesink::append::Composite;
//! use filesink::append::FileSink;
//! use filesink::append::Stderr;
//! use filesink::bridge::LogBridge;
//!
//! let sink = FileSink::builder("logs/app.log").build().unwrap();
//! filesink::bridge::setup_log_crate(LogBridge::new(
//!     Composite::default().with_append(sink).with_append(Stderr::default()),
//! ));
//!
//! log::info!("started");
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod append;
pub mod bridge;
pub mod layout;
pub mod non_blocking;
pub mod record;
pub mod trap;

mod config;
mod error;

pub use self::append::Append;
pub use self::config::FileSinkConfig;
pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::layout::Layout;
pub use self::record::Level;
pub use self::record::Record;
pub use self::trap::Trap;
