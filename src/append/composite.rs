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

use crate::Error;
use crate::ErrorKind;
use crate::append::Append;
use crate::record::Level;
use crate::record::Record;

/// An ordered group of appenders that receive every record.
///
/// A level is enabled only if every member enables it. Records are still delivered to every
/// member, and each member applies its own gate.
///
/// # Examples
///
/// ```
/// use filesink::append::Composite;
/// use filesink::append::Stderr;
/// use filesink::Level;
///
/// let composite = Composite::default()
///     .with_append(Stderr::default())
///     .with_append(Stderr::default().min_level(Level::Warning));
/// ```
#[derive(Debug, Default)]
pub struct Composite {
    appends: Vec<Box<dyn Append>>,
}

impl Composite {
    /// Add an appender to the end of this group.
    pub fn with_append(mut self, append: impl Into<Box<dyn Append>>) -> Self {
        self.appends.push(append.into());
        self
    }

    /// The number of members.
    pub fn len(&self) -> usize {
        self.appends.len()
    }

    /// Whether this group has no members.
    pub fn is_empty(&self) -> bool {
        self.appends.is_empty()
    }
}

impl Append for Composite {
    fn enabled(&self, level: Level) -> bool {
        self.appends.iter().all(|append| append.enabled(level))
    }

    fn append(&self, record: &Record) -> Result<(), Error> {
        let mut failed = vec![];
        for append in self.appends.iter() {
            if let Err(err) = append.append(record) {
                failed.push(err);
            }
        }
        collect_errors("failed to append record", failed)
    }

    fn flush(&self) -> Result<(), Error> {
        let mut failed = vec![];
        for append in self.appends.iter() {
            if let Err(err) = append.flush() {
                failed.push(err);
            }
        }
        collect_errors("failed to flush", failed)
    }
}

fn collect_errors(message: &str, failed: Vec<Error>) -> Result<(), Error> {
    if failed.is_empty() {
        return Ok(());
    }

    let mut err = Error::new(ErrorKind::Unexpected, message).with_context("failed", failed.len());
    for source in failed {
        err = err.with_source(source);
    }
    Err(err)
}
