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

use std::io::Write;

use crate::Error;
use crate::append::Append;
use crate::layout::Layout;
use crate::layout::TextLayout;
use crate::record::Level;
use crate::record::Record;

/// An appender that mirrors records to the standard error stream.
#[derive(Debug)]
pub struct Stderr {
    layout: Box<dyn Layout>,
    min_level: Level,
}

impl Default for Stderr {
    fn default() -> Self {
        Self {
            layout: Box::new(TextLayout::default()),
            min_level: Level::Information,
        }
    }
}

impl Stderr {
    /// Set the layout for the [`Stderr`] appender.
    ///
    /// Default to [`TextLayout`].
    pub fn with_layout(mut self, layout: impl Into<Box<dyn Layout>>) -> Self {
        self.layout = layout.into();
        self
    }

    /// Set the minimum level of records to write.
    ///
    /// Default to [`Level::Information`].
    pub fn min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

impl Append for Stderr {
    fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    fn append(&self, record: &Record) -> Result<(), Error> {
        if !self.enabled(record.level()) {
            return Ok(());
        }

        let mut bytes = self.layout.format(record)?;
        bytes.push(b'\n');
        std::io::stderr()
            .write_all(&bytes)
            .map_err(Error::from_io_error)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        std::io::stderr().flush().map_err(Error::from_io_error)?;
        Ok(())
    }
}
