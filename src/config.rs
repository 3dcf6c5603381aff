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

//! Plain configuration values for a [`FileSink`](crate::append::FileSink).

use std::path::PathBuf;

use crate::append::file::DEFAULT_MAX_FILE_SIZE;
use crate::append::file::FileSinkBuilder;
use crate::record::Level;

/// Configuration of a file sink, as it would appear in an application settings file.
///
/// With the `serde` feature enabled this type can be deserialized; missing fields take their
/// default values.
///
/// # Examples
///
/// ```
/// use filesink::FileSinkConfig;
///
/// let config = FileSinkConfig {
///     path: "logs/service.log".into(),
///     retention_days: Some(14),
///     ..FileSinkConfig::default()
/// };
/// let builder = config.into_builder();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FileSinkConfig {
    /// Path of the active log file. Default to `logs/app.log`.
    pub path: PathBuf,
    /// Size in bytes above which the file is rotated. Zero or a negative value disables rotation.
    /// Default to 5 MiB.
    pub max_file_size_bytes: i64,
    /// Entries below this level are not written. Default to [`Level::Information`].
    pub min_level: Level,
    /// Archives older than this many days are deleted. `None` or zero keeps every archive.
    pub retention_days: Option<u32>,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/app.log"),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE as i64,
            min_level: Level::Information,
            retention_days: None,
        }
    }
}

impl FileSinkConfig {
    /// Turn this configuration into a [`FileSinkBuilder`] for further customization.
    pub fn into_builder(self) -> FileSinkBuilder {
        let max_file_size = u64::try_from(self.max_file_size_bytes).unwrap_or(0);
        FileSinkBuilder::new(self.path)
            .max_file_size(max_file_size)
            .min_level(self.min_level)
            .retention_days(self.retention_days.unwrap_or(0))
    }
}
