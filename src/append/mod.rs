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

//! Destinations for log records.

use std::fmt;

use crate::Error;
use crate::record::Level;
use crate::record::Record;

mod composite;
pub mod file;
mod stderr;

pub use self::composite::Composite;
pub use self::file::FileSink;
pub use self::file::FileSinkBuilder;
pub use self::stderr::Stderr;

/// A destination that accepts log records.
pub trait Append: fmt::Debug + Send + Sync + 'static {
    /// Whether records of the given level would be accepted.
    ///
    /// Default to accepting every level.
    fn enabled(&self, level: Level) -> bool {
        let _ = level;
        true
    }

    /// Dispatch a log record to the append target.
    fn append(&self, record: &Record) -> Result<(), Error>;

    /// Flush any buffered records.
    ///
    /// Default to a no-op.
    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

impl<T: Append> From<T> for Box<dyn Append> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
