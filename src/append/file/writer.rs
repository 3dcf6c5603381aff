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

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::num::NonZeroU64;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::Error;
use crate::ErrorKind;
use crate::Trap;
use crate::append::file::clock::Clock;
use crate::append::file::retention::Retention;
use crate::append::file::rotation;
use crate::non_blocking::Writer;

/// A writer for one active log file that rotates by size.
///
/// Every [`write_record`](Writer::write_record) call checks the size of the active file, rotates
/// it if it has grown beyond the limit, and then appends the whole record. The check happens
/// before the append, so a single record may push the file over the limit, and the next record
/// rotates it first.
#[derive(Debug)]
pub struct RollingFileWriter {
    state: State,
    writer: File,
}

impl Drop for RollingFileWriter {
    fn drop(&mut self) {
        if let Err(err) = self.writer.flush() {
            let err = Error::new(ErrorKind::Append, "failed to flush file writer on dropped")
                .with_source(err);
            self.state.trap.trap(&err);
        }
    }
}

impl Writer for RollingFileWriter {
    fn write_record(&mut self, record: &[u8]) -> Result<(), Error> {
        let now = self.state.clock.now();

        match fs::metadata(&self.state.path) {
            Ok(metadata) => {
                if rotation::should_rotate(metadata.len(), self.state.max_size) {
                    self.rotate(now);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // the active file is gone, e.g. removed by hand; start a fresh one
                match self.state.create_active() {
                    Ok(file) => self.writer = file,
                    Err(err) => self.state.trap.trap(&err),
                }
            }
            Err(err) => {
                let err = Error::new(ErrorKind::Rotate, "failed to read size of active log")
                    .with_context("path", self.state.path.display())
                    .with_source(err);
                self.state.trap.trap(&err);
            }
        }

        self.writer.write_all(record).map_err(|err| {
            Error::new(ErrorKind::Append, "failed to append log entry")
                .with_context("path", self.state.path.display())
                .with_source(err)
        })
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush().map_err(Error::from_io_error)
    }
}

impl RollingFileWriter {
    pub(crate) fn open(
        path: PathBuf,
        max_size: Option<NonZeroU64>,
        retention: Retention,
        timezone: TimeZone,
        rotations: Arc<AtomicU64>,
        trap: Arc<dyn Trap>,
    ) -> Result<Self, Error> {
        Self::open_with_clock(
            path,
            max_size,
            retention,
            timezone,
            Clock::default(),
            rotations,
            trap,
        )
    }

    fn open_with_clock(
        path: PathBuf,
        max_size: Option<NonZeroU64>,
        retention: Retention,
        timezone: TimeZone,
        clock: Clock,
        rotations: Arc<AtomicU64>,
        trap: Arc<dyn Trap>,
    ) -> Result<Self, Error> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::new(ErrorKind::Config, "log path must end with a UTF-8 file name")
                    .with_context("path", path.display())
            })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|err| {
            Error::new(ErrorKind::Config, "failed to create log directory")
                .with_context("dir", dir.display())
                .with_source(err)
        })?;

        let state = State {
            path,
            dir,
            filename,
            max_size,
            retention,
            timezone,
            clock,
            rotations,
            trap,
            #[cfg(test)]
            rename_fault: None,
        };
        let writer = state.create_active().map_err(|err| {
            Error::new(ErrorKind::Config, "failed to open log file")
                .with_context("path", state.path.display())
                .with_source(err)
        })?;

        let now = state.clock.now();
        state.prune(now);

        Ok(RollingFileWriter { state, writer })
    }

    /// The path of the active file.
    pub fn path(&self) -> &Path {
        &self.state.path
    }

    fn rotate(&mut self, now: Timestamp) {
        let stamp = rotation::format_stamp(now, &self.state.timezone);
        let archive = rotation::next_archive_path(&self.state.dir, &self.state.filename, &stamp);

        if let Err(err) = self.writer.flush() {
            let err = Error::new(ErrorKind::Rotate, "failed to flush previous writer")
                .with_source(err);
            self.state.trap.trap(&err);
        }

        if let Err(err) = self.state.archive_active(&archive) {
            // keep appending to the oversized file; the next record tries again
            let err = Error::new(ErrorKind::Rotate, "failed to archive log")
                .with_context("path", self.state.path.display())
                .with_context("archive", archive.display())
                .with_source(err);
            self.state.trap.trap(&err);
            return;
        }
        self.state.rotations.fetch_add(1, Ordering::Relaxed);

        match self.state.create_active() {
            Ok(file) => self.writer = file,
            Err(err) => {
                // the old handle now points at the archive, so the entry still lands on disk
                let err = Error::new(ErrorKind::Rotate, "failed to create log after rotation")
                    .with_source(err);
                self.state.trap.trap(&err);
                return;
            }
        }

        self.state.prune(now);
    }
}

#[derive(Debug)]
struct State {
    path: PathBuf,
    dir: PathBuf,
    filename: String,
    max_size: Option<NonZeroU64>,
    retention: Retention,
    timezone: TimeZone,
    clock: Clock,
    rotations: Arc<AtomicU64>,
    trap: Arc<dyn Trap>,
    #[cfg(test)]
    rename_fault: Option<io::ErrorKind>,
}

impl State {
    fn archive_active(&self, archive: &Path) -> io::Result<()> {
        #[cfg(test)]
        if let Some(kind) = self.rename_fault {
            return Err(io::Error::from(kind));
        }
        fs::rename(&self.path, archive)
    }

    fn create_active(&self) -> Result<File, Error> {
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| {
                Error::new(ErrorKind::Rotate, "failed to create log file")
                    .with_context("path", self.path.display())
                    .with_source(err)
            })
    }

    fn prune(&self, now: Timestamp) {
        self.retention.prune(
            &self.dir,
            &self.filename,
            &self.timezone,
            now,
            self.trap.as_ref(),
        );
    }
}
