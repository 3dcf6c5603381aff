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

//! Age-based pruning of archived log files.

use std::fs;
use std::io;
use std::num::NonZeroU32;
use std::path::Path;
use std::path::PathBuf;

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::Error;
use crate::ErrorKind;
use crate::Trap;
use crate::append::file::rotation::list_archives;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// How long archives are kept.
///
/// An archive is deleted once the timestamp embedded in its name is more than the given number of
/// days in the past. Zero days, or [`Retention::disabled`], keeps every archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Retention {
    days: Option<NonZeroU32>,
}

impl Retention {
    /// Keep archives for `days` days. Zero disables pruning.
    pub fn days(days: u32) -> Self {
        Self {
            days: NonZeroU32::new(days),
        }
    }

    /// Keep every archive.
    pub fn disabled() -> Self {
        Self { days: None }
    }

    /// Whether pruning is enabled.
    pub fn is_enabled(&self) -> bool {
        self.days.is_some()
    }

    /// Delete the expired archives of `active_name` in `dir`.
    ///
    /// Only files that follow the archive naming convention are candidates; the active file and
    /// any other file are never touched. A file that cannot be deleted is reported to `trap` and
    /// the scan continues. Return the paths that were deleted.
    pub fn prune(
        &self,
        dir: &Path,
        active_name: &str,
        timezone: &TimeZone,
        now: Timestamp,
        trap: &dyn Trap,
    ) -> Vec<PathBuf> {
        self.prune_with(dir, active_name, timezone, now, trap, |path| {
            fs::remove_file(path)
        })
    }

    fn prune_with(
        &self,
        dir: &Path,
        active_name: &str,
        timezone: &TimeZone,
        now: Timestamp,
        trap: &dyn Trap,
        mut remove: impl FnMut(&Path) -> io::Result<()>,
    ) -> Vec<PathBuf> {
        let Some(days) = self.days else {
            return vec![];
        };
        let horizon = i64::from(days.get()) * SECONDS_PER_DAY;

        let archives = match list_archives(dir, active_name) {
            Ok(archives) => archives,
            Err(err) => {
                trap.trap(&err);
                return vec![];
            }
        };

        let mut deleted = vec![];
        for archive in archives {
            let Ok(rotated_at) = archive.datetime().to_zoned(timezone.clone()) else {
                continue;
            };
            let age = now.as_second() - rotated_at.timestamp().as_second();
            if age <= horizon {
                continue;
            }

            let path = archive.path();
            match remove(path) {
                Ok(()) => deleted.push(path.to_path_buf()),
                Err(err) => {
                    let err = Error::new(ErrorKind::Retention, "failed to remove expired log")
                        .with_context("path", path.display())
                        .with_source(err);
                    trap.trap(&err);
                }
            }
        }
        deleted
    }
}
