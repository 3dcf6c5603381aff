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

use std::fmt::Write;

use jiff::tz::TimeZone;

use crate::Error;
use crate::layout::Layout;
use crate::record::Record;

const CONTINUATION_INDENT: &str = "    ";
const STACK_TRACE_INDENT: &str = "        ";

/// A layout that renders records as human-readable text.
///
/// Output format:
///
/// ```text
/// 2024-08-10 17:12:52 [Error] failed to submit order
///     error: connection refused
///         caused by: os error 111 source: orders.rs.submit line 42
/// ```
///
/// The first line of an entry starts with a timestamp with second resolution. Every following
/// line of the same entry (message continuation lines, the error block) starts with whitespace,
/// so entries stay visually grouped and can be split apart again when the file is read back.
///
/// The call site, when present, is appended to the end of the entry.
#[derive(Debug, Clone)]
pub struct TextLayout {
    timezone: TimeZone,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            timezone: TimeZone::system(),
        }
    }
}

impl TextLayout {
    /// Set the timezone for timestamps.
    ///
    /// Defaults to the system timezone if not set.
    ///
    /// # Examples
    ///
    /// ```
    /// use filesink::layout::TextLayout;
    /// use jiff::tz::TimeZone;
    ///
    /// let layout = TextLayout::default().timezone(TimeZone::UTC);
    /// ```
    pub fn timezone(mut self, tz: TimeZone) -> Self {
        self.timezone = tz;
        self
    }
}

fn write_indented(text: &mut String, s: &str, indent: &str) {
    for (i, line) in s.split('\n').enumerate() {
        if i > 0 {
            text.push('\n');
            text.push_str(indent);
        }
        text.push_str(line.strip_suffix('\r').unwrap_or(line));
    }
}

impl Layout for TextLayout {
    fn format(&self, record: &Record) -> Result<Vec<u8>, Error> {
        let time = record
            .timestamp()
            .to_zoned(self.timezone.clone())
            .strftime("%Y-%m-%d %H:%M:%S");
        let level = record.level();

        let mut text = String::new();
        // SAFETY: write to a string always succeeds
        write!(&mut text, "{time} [{level}] ").unwrap();
        write_indented(&mut text, record.message(), CONTINUATION_INDENT);

        if let Some(err) = record.error() {
            text.push('\n');
            text.push_str(CONTINUATION_INDENT);
            text.push_str("error: ");
            write_indented(&mut text, err.message(), CONTINUATION_INDENT);
            if let Some(trace) = err.stack_trace() {
                text.push('\n');
                text.push_str(STACK_TRACE_INDENT);
                write_indented(&mut text, trace, STACK_TRACE_INDENT);
            }
        }

        if let Some(site) = record.call_site() {
            write!(&mut text, " source: {site}").unwrap();
        }

        Ok(text.into_bytes())
    }
}
