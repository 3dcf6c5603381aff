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

//! Appender that writes entries to a size-rotated file.
//!
//! # Example
//!
//! ```no_run
//! use filesink::Level;
//! use filesink::append::file::FileSinkBuilder;
//!
//! let sink = FileSinkBuilder::new("logs/app.log")
//!     .max_file_size(10 * 1024 * 1024)
//!     .retention_days(7)
//!     .min_level(Level::Debug)
//!     .build()
//!     .unwrap();
//!
//! sink.log(Level::Information, "world", None, |who, _| {
//!     Ok::<_, anyhow::Error>(format!("hello {who}"))
//! })
//! .unwrap();
//! sink.close();
//! ```

mod clock;
mod retention;
mod rotation;
mod sink;
mod writer;

pub use self::retention::Retention;
pub use self::rotation::ArchivedFile;
pub use self::rotation::list_archives;
pub use self::sink::DEFAULT_MAX_FILE_SIZE;
pub use self::sink::FileSink;
pub use self::sink::FileSinkBuilder;
