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

//! Size-triggered rotation: when to rotate, and how archives are named.
//!
//! An archive is named `<active-name>.<YYYYMMDDHHMMSS>.bak`. When that name is already taken,
//! because two rotations happened within the same second, a counter is inserted:
//! `<active-name>.<YYYYMMDDHHMMSS>.<n>.bak` with the smallest free `n >= 1`.

use std::cmp::Ordering;
use std::fs;
use std::num::NonZeroU64;
use std::path::Path;
use std::path::PathBuf;

use jiff::Timestamp;
use jiff::civil::DateTime;
use jiff::tz::TimeZone;

use crate::Error;
use crate::ErrorKind;

const ARCHIVE_EXTENSION: &str = "bak";
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const STAMP_LEN: usize = 14;

/// A rotated log file.
///
/// Archives order by the timestamp embedded in their name, then by the collision counter. File
/// system metadata is never consulted since modification times may lag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    path: PathBuf,
    datetime: DateTime,
    counter: usize,
}

impl ArchivedFile {
    /// The path of the archive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The rotation time embedded in the name, in the sink's time zone.
    pub fn datetime(&self) -> DateTime {
        self.datetime
    }

    /// The collision counter, `0` when the name has none.
    pub fn counter(&self) -> usize {
        self.counter
    }
}

impl Ord for ArchivedFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.datetime
            .cmp(&other.datetime)
            .then(self.counter.cmp(&other.counter))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for ArchivedFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether a file of `current_len` bytes must be rotated before the next append.
///
/// `None` disables rotation.
pub(crate) fn should_rotate(current_len: u64, max_size: Option<NonZeroU64>) -> bool {
    max_size.is_some_and(|max| current_len > max.get())
}

pub(crate) fn format_stamp(now: Timestamp, tz: &TimeZone) -> String {
    now.to_zoned(tz.clone()).strftime(STAMP_FORMAT).to_string()
}

fn archive_name(active_name: &str, stamp: &str, counter: usize) -> String {
    if counter == 0 {
        format!("{active_name}.{stamp}.{ARCHIVE_EXTENSION}")
    } else {
        format!("{active_name}.{stamp}.{counter}.{ARCHIVE_EXTENSION}")
    }
}

/// The first archive path for `stamp` that does not exist yet.
pub(crate) fn next_archive_path(dir: &Path, active_name: &str, stamp: &str) -> PathBuf {
    let mut counter = 0;
    loop {
        let path = dir.join(archive_name(active_name, stamp, counter));
        if !matches!(fs::exists(&path), Ok(true)) {
            return path;
        }
        counter += 1;
    }
}

fn parse_stamp(stamp: &str) -> Option<DateTime> {
    if stamp.len() != STAMP_LEN || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year = stamp[0..4].parse::<i16>().ok()?;
    let month = stamp[4..6].parse::<i8>().ok()?;
    let day = stamp[6..8].parse::<i8>().ok()?;
    let hour = stamp[8..10].parse::<i8>().ok()?;
    let minute = stamp[10..12].parse::<i8>().ok()?;
    let second = stamp[12..14].parse::<i8>().ok()?;
    DateTime::new(year, month, day, hour, minute, second, 0).ok()
}

/// Parse `filename` as an archive of `active_name`, returning its timestamp and counter.
pub(crate) fn parse_archive_name(filename: &str, active_name: &str) -> Option<(DateTime, usize)> {
    let rest = filename
        .strip_prefix(active_name)?
        .strip_prefix('.')?
        .strip_suffix(ARCHIVE_EXTENSION)?
        .strip_suffix('.')?;

    let (stamp, counter) = match rest.split_once('.') {
        None => (rest, 0),
        Some((stamp, counter)) => {
            if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (stamp, counter.parse::<usize>().ok()?)
        }
    };

    Some((parse_stamp(stamp)?, counter))
}

/// List the archives of the active file `active_name` in `dir`, oldest first.
///
/// Files that do not follow the archive naming convention are ignored.
pub fn list_archives(dir: &Path, active_name: &str) -> Result<Vec<ArchivedFile>, Error> {
    let read_dir = fs::read_dir(dir).map_err(|err| {
        Error::new(ErrorKind::Retention, "failed to read log dir")
            .with_context("dir", dir.display())
            .with_source(err)
    })?;

    let mut files = read_dir
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let metadata = entry.metadata().ok()?;
            // rotation only creates files, never directories or symlinks
            if !metadata.is_file() {
                return None;
            }

            let filename = entry.file_name();
            // if the filename is not a UTF-8 string, skip it.
            let filename = filename.to_str()?;
            let (datetime, counter) = parse_archive_name(filename, active_name)?;
            Some(ArchivedFile {
                path: entry.path(),
                datetime,
                counter,
            })
        })
        .collect::<Vec<_>>();

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use jiff::civil::date;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_should_rotate() {
        let max = NonZeroU64::new(100);
        assert!(!should_rotate(0, max));
        assert!(!should_rotate(100, max));
        assert!(should_rotate(101, max));
        assert!(!should_rotate(u64::MAX, None));
    }

    #[test]
    fn test_format_stamp() {
        let ts = Timestamp::from_str("2024-08-10T17:12:52Z").unwrap();
        assert_eq!(format_stamp(ts, &TimeZone::UTC), "20240810171252");
        let tz = TimeZone::fixed(jiff::tz::offset(8));
        assert_eq!(format_stamp(ts, &tz), "20240811011252");
    }

    #[test]
    fn test_parse_archive_name() {
        let at = date(2024, 8, 10).at(17, 12, 52, 0);
        assert_eq!(
            parse_archive_name("app.log.20240810171252.bak", "app.log"),
            Some((at, 0))
        );
        assert_eq!(
            parse_archive_name("app.log.20240810171252.3.bak", "app.log"),
            Some((at, 3))
        );

        for name in [
            "app.log",
            "app.log.bak",
            "app.log.20240810171252",
            "app.log.20240810171252.log",
            "app.log.2024081017125.bak",
            "app.log.2024081017125x.bak",
            "app.log.20241310171252.bak",
            "app.log.20240810171252..bak",
            "app.log.20240810171252.x.bak",
            "other.log.20240810171252.bak",
            "app.logx.20240810171252.bak",
        ] {
            assert_eq!(parse_archive_name(name, "app.log"), None, "{name}");
        }
    }

    #[test]
    fn test_next_archive_path_appends_counter_on_collision() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let first = next_archive_path(dir, "app.log", "20240810171252");
        assert_eq!(first, dir.join("app.log.20240810171252.bak"));
        fs::write(&first, "first").unwrap();

        let second = next_archive_path(dir, "app.log", "20240810171252");
        assert_eq!(second, dir.join("app.log.20240810171252.1.bak"));
        fs::write(&second, "second").unwrap();

        let third = next_archive_path(dir, "app.log", "20240810171252");
        assert_eq!(third, dir.join("app.log.20240810171252.2.bak"));
    }

    #[test]
    fn test_list_archives_orders_by_embedded_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        // created newest first, so creation order disagrees with the embedded order
        for name in [
            "app.log.20240812000000.bak",
            "app.log.20240810171252.1.bak",
            "app.log.20240810171252.bak",
            "app.log.20240809235959.bak",
            "app.log",
            "notes.txt",
        ] {
            fs::write(dir.join(name), name).unwrap();
        }
        fs::create_dir(dir.join("app.log.20240801000000.bak")).unwrap();

        let files = list_archives(dir, "app.log").unwrap();
        let names = files
            .iter()
            .map(|f| f.path().file_name().unwrap().to_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "app.log.20240809235959.bak",
                "app.log.20240810171252.bak",
                "app.log.20240810171252.1.bak",
                "app.log.20240812000000.bak",
            ]
        );
        assert_eq!(files[2].counter(), 1);
    }
}
