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

use std::any::Any;
use std::num::NonZeroU64;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use jiff::tz::TimeZone;

use crate::Error;
use crate::ErrorKind;
use crate::Trap;
use crate::append::Append;
use crate::append::file::retention::Retention;
use crate::append::file::writer::RollingFileWriter;
use crate::layout::Layout;
use crate::layout::TextLayout;
use crate::non_blocking::NonBlocking;
use crate::non_blocking::NonBlockingBuilder;
use crate::non_blocking::Overflow;
use crate::record::ErrorDetail;
use crate::record::Level;
use crate::record::Record;
use crate::trap::DefaultTrap;

/// Default size threshold above which the active file is rotated: 5 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

const DEFAULT_THREAD_NAME: &str = "filesink-worker";

/// A log sink that appends rendered entries to a size-rotated file.
///
/// Records are rendered on the calling thread and handed to a single background worker, which
/// owns the file and performs the check, rotate and append steps for one record at a time. Entries
/// therefore land in the file in submission order and are never interleaved.
///
/// Dropping the sink closes it.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    min_level: Level,
    layout: Box<dyn Layout>,
    trap: Arc<dyn Trap>,
    rotations: Arc<AtomicU64>,
    dispatch: NonBlocking,
}

impl FileSink {
    /// Create a builder for a sink writing to `path`.
    pub fn builder(path: impl Into<PathBuf>) -> FileSinkBuilder {
        FileSinkBuilder::new(path)
    }

    /// Log an entry whose message is rendered lazily from `state` and `error`.
    ///
    /// Nothing is rendered when `level` is below the minimum level. When `formatter` fails or
    /// panics, the failure is reported to the trap and the entry is dropped; the call still
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Return an error of kind [`ErrorKind::Closed`] once the sink is closed.
    pub fn log<S, E, F>(
        &self,
        level: Level,
        state: &S,
        error: Option<&ErrorDetail>,
        formatter: F,
    ) -> Result<(), Error>
    where
        S: ?Sized,
        E: Into<anyhow::Error>,
        F: FnOnce(&S, Option<&ErrorDetail>) -> Result<String, E>,
    {
        if self.dispatch.is_closed() {
            return Err(Error::closed());
        }
        if !self.enabled(level) {
            return Ok(());
        }

        let message = match panic::catch_unwind(AssertUnwindSafe(|| formatter(state, error))) {
            Ok(Ok(message)) => message,
            Ok(Err(err)) => {
                let err = Error::new(ErrorKind::Render, "failed to render log entry")
                    .with_context("level", level)
                    .with_source(err);
                self.trap.trap(&err);
                return Ok(());
            }
            Err(payload) => {
                let err = Error::new(ErrorKind::Render, "formatter panicked")
                    .with_context("level", level)
                    .with_context("panic", panic_message(payload.as_ref()));
                self.trap.trap(&err);
                return Ok(());
            }
        };

        let record = Record::builder()
            .level(level)
            .message(message)
            .error(error.cloned())
            .build();
        self.log_record(&record)
    }

    /// Log a prebuilt record.
    ///
    /// # Errors
    ///
    /// Return an error of kind [`ErrorKind::Closed`] once the sink is closed.
    pub fn log_record(&self, record: &Record) -> Result<(), Error> {
        if self.dispatch.is_closed() {
            return Err(Error::closed());
        }
        if !self.enabled(record.level()) {
            return Ok(());
        }

        let mut bytes = match self.layout.format(record) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.trap.trap(&err);
                return Ok(());
            }
        };
        bytes.push(b'\n');
        self.dispatch.send(bytes)
    }

    /// Log `message` at [`Level::Information`].
    ///
    /// # Errors
    ///
    /// Return an error of kind [`ErrorKind::Closed`] once the sink is closed.
    pub fn info(&self, message: impl Into<String>) -> Result<(), Error> {
        self.log_message(Level::Information, message.into(), None)
    }

    /// Log `message` at [`Level::Warning`].
    ///
    /// # Errors
    ///
    /// Return an error of kind [`ErrorKind::Closed`] once the sink is closed.
    pub fn warn(&self, message: impl Into<String>) -> Result<(), Error> {
        self.log_message(Level::Warning, message.into(), None)
    }

    /// Log `message` at [`Level::Error`] with `err` attached. Each source of `err` becomes one
    /// line of the stack trace.
    ///
    /// # Errors
    ///
    /// Return an error of kind [`ErrorKind::Closed`] once the sink is closed.
    pub fn error(
        &self,
        message: impl Into<String>,
        err: &(dyn std::error::Error + 'static),
    ) -> Result<(), Error> {
        let detail = ErrorDetail::from_error(err);
        self.log_message(Level::Error, message.into(), Some(detail))
    }

    fn log_message(
        &self,
        level: Level,
        message: String,
        error: Option<ErrorDetail>,
    ) -> Result<(), Error> {
        let record = Record::builder()
            .level(level)
            .message(message)
            .error(error)
            .build();
        self.log_record(&record)
    }

    /// Whether entries at `level` pass the minimum level gate.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    /// Wait until every entry submitted so far is written and flushed.
    pub fn flush(&self) -> Result<(), Error> {
        self.dispatch.flush()
    }

    /// Drain pending entries, bounded by the shutdown timeout, and stop the worker.
    ///
    /// Closing twice is a no-op. Any later call to [`FileSink::log`] is rejected.
    pub fn close(&self) {
        self.dispatch.close();
    }

    /// Whether [`FileSink::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.dispatch.is_closed()
    }

    /// Number of entries dropped because the queue was full or the shutdown timeout passed.
    pub fn dropped(&self) -> u64 {
        self.dispatch.dropped()
    }

    /// Number of rotations performed so far.
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Append for FileSink {
    fn enabled(&self, level: Level) -> bool {
        FileSink::enabled(self, level)
    }

    fn append(&self, record: &Record) -> Result<(), Error> {
        self.log_record(record)
    }

    fn flush(&self) -> Result<(), Error> {
        FileSink::flush(self)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A builder to configure and create a [`FileSink`].
#[must_use = "call `build` to construct the sink"]
#[derive(Debug)]
pub struct FileSinkBuilder {
    path: PathBuf,
    max_file_size: u64,
    min_level: Level,
    retention: Retention,
    layout: Box<dyn Layout>,
    timezone: Option<TimeZone>,
    trap: Arc<dyn Trap>,
    thread_name: String,
    buffered_lines_limit: Option<usize>,
    overflow: Overflow,
    shutdown_timeout: Option<Duration>,
}

impl FileSinkBuilder {
    /// Create a new builder for a sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            min_level: Level::Information,
            retention: Retention::disabled(),
            layout: Box::new(TextLayout::default()),
            timezone: None,
            trap: Arc::new(DefaultTrap::default()),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            buffered_lines_limit: None,
            overflow: Overflow::Block,
            shutdown_timeout: None,
        }
    }

    /// Set the size in bytes above which the active file is rotated. Zero disables rotation.
    ///
    /// Default to 5 MiB.
    pub fn max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Set the minimum level of entries to write.
    ///
    /// Default to [`Level::Information`].
    pub fn min_level(mut self, min_level: Level) -> Self {
        self.min_level = min_level;
        self
    }

    /// Delete archives older than `days` days. Zero disables pruning.
    ///
    /// Default to keeping every archive.
    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention = Retention::days(days);
        self
    }

    /// Set the layout that renders records.
    ///
    /// Default to [`TextLayout`].
    pub fn layout(mut self, layout: impl Into<Box<dyn Layout>>) -> Self {
        self.layout = layout.into();
        self
    }

    /// Set the time zone used for archive names and retention.
    ///
    /// Default to the system time zone. This does not change the time zone of the layout.
    pub fn timezone(mut self, timezone: TimeZone) -> Self {
        self.timezone = Some(timezone);
        self
    }

    /// Set the trap that receives errors which cannot be returned to the caller.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = Arc::from(trap.into());
        self
    }

    /// Set the name of the worker thread.
    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Bound the number of pending entries. `None` means unbounded.
    ///
    /// Default to unbounded.
    pub fn buffered_lines_limit(mut self, buffered_lines_limit: Option<usize>) -> Self {
        self.buffered_lines_limit = buffered_lines_limit;
        self
    }

    /// Block callers while the bounded queue is full. This is the default.
    pub fn overflow_block(mut self) -> Self {
        self.overflow = Overflow::Block;
        self
    }

    /// Drop new entries while the bounded queue is full.
    pub fn overflow_drop_incoming(mut self) -> Self {
        self.overflow = Overflow::DropIncoming;
        self
    }

    /// Set how long [`FileSink::close`] waits for pending entries.
    ///
    /// Default to one second.
    pub fn shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = Some(shutdown_timeout);
        self
    }

    /// Open the active file and start the worker.
    ///
    /// Expired archives are pruned once before this returns.
    ///
    /// # Errors
    ///
    /// Return an error of kind [`ErrorKind::Config`] if the path is empty, has no file name, is a
    /// directory, or cannot be opened for appending.
    pub fn build(self) -> Result<FileSink, Error> {
        let FileSinkBuilder {
            path,
            max_file_size,
            min_level,
            retention,
            layout,
            timezone,
            trap,
            thread_name,
            buffered_lines_limit,
            overflow,
            shutdown_timeout,
        } = self;

        if path.as_os_str().is_empty() {
            return Err(Error::new(ErrorKind::Config, "log path must not be empty"));
        }
        if path.is_dir() {
            return Err(Error::new(ErrorKind::Config, "log path is a directory")
                .with_context("path", path.display()));
        }

        let rotations = Arc::new(AtomicU64::new(0));
        let writer = RollingFileWriter::open(
            path.clone(),
            NonZeroU64::new(max_file_size),
            retention,
            timezone.unwrap_or_else(TimeZone::system),
            rotations.clone(),
            trap.clone(),
        )?;

        let mut builder = NonBlockingBuilder::new(thread_name)
            .buffered_lines_limit(buffered_lines_limit)
            .overflow(overflow)
            .shared_trap(trap.clone());
        if let Some(shutdown_timeout) = shutdown_timeout {
            builder = builder.shutdown_timeout(shutdown_timeout);
        }
        let dispatch = builder.build(writer)?;

        Ok(FileSink {
            path,
            min_level,
            layout,
            trap,
            rotations,
            dispatch,
        })
    }
}
