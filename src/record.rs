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

//! Log records and their building blocks.

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;

/// The severity of a log record.
///
/// Levels are ordered from the most verbose to the most severe, so a record passes a minimum-level
/// gate when `record.level() >= min_level`.
#[repr(usize)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum Level {
    /// The most detailed messages, possibly containing sensitive data.
    Trace = 0,
    /// Messages useful while developing and debugging.
    Debug = 1,
    /// The general flow of the application.
    Information = 2,
    /// Abnormal or unexpected events that do not stop the application.
    Warning = 3,
    /// Failures of the current operation.
    Error = 4,
    /// Unrecoverable failures that require immediate attention.
    Critical = 5,
}

impl Level {
    /// Return the string representation of the `Level`.
    ///
    /// This returns the same string as the `fmt::Display` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "Trace",
            Level::Debug => "Debug",
            Level::Information => "Information",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Critical => "Critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The error returned when parsing a [`Level`] fails.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ParseLevelError {}

impl fmt::Display for ParseLevelError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str("malformed log level")
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;
    fn from_str(s: &str) -> Result<Level, Self::Err> {
        for (name, level) in [
            ("trace", Level::Trace),
            ("debug", Level::Debug),
            ("information", Level::Information),
            ("info", Level::Information),
            ("warning", Level::Warning),
            ("warn", Level::Warning),
            ("error", Level::Error),
            ("critical", Level::Critical),
            ("crit", Level::Critical),
        ] {
            if s.eq_ignore_ascii_case(name) {
                return Ok(level);
            }
        }

        Err(ParseLevelError {})
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Level {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Level::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// The error attached to a log record: a message and an optional stack trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorDetail {
    message: String,
    stack_trace: Option<String>,
}

impl ErrorDetail {
    /// Create an error detail with the given message and no stack trace.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Attach a stack trace. Empty traces are ignored.
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        let stack_trace = stack_trace.into();
        self.stack_trace = if stack_trace.is_empty() {
            None
        } else {
            Some(stack_trace)
        };
        self
    }

    /// Capture an error and its chain of sources.
    ///
    /// The message is the error's `Display` output. Each source becomes one `caused by:` line of
    /// the stack trace.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = vec![];
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        ErrorDetail::new(err.to_string()).with_stack_trace(trace.join("\n"))
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The stack trace, if any.
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }
}

impl From<&anyhow::Error> for ErrorDetail {
    fn from(err: &anyhow::Error) -> Self {
        let trace = err
            .chain()
            .skip(1)
            .map(|cause| format!("caused by: {cause}"))
            .collect::<Vec<_>>();
        ErrorDetail::new(err.to_string()).with_stack_trace(trace.join("\n"))
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Where a log call was made.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallSite {
    file: String,
    member: String,
    line: u32,
}

impl CallSite {
    /// Create a new call site.
    pub fn new(file: impl Into<String>, member: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            member: member.into(),
            line,
        }
    }

    /// The source file.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The enclosing function, method or module.
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The line number.
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} line {}", self.file, self.member, self.line)
    }
}

/// A log record. Created once per log call and never mutated.
#[derive(Clone, Debug)]
pub struct Record {
    // the observed time
    timestamp: Timestamp,

    level: Level,
    message: String,
    error: Option<ErrorDetail>,
    call_site: Option<CallSite>,
}

impl Record {
    /// Create a new [`RecordBuilder`].
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// The observed time.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The severity of the record.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The rendered message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The attached error, if any.
    pub fn error(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    /// The call site, if the caller provided it.
    pub fn call_site(&self) -> Option<&CallSite> {
        self.call_site.as_ref()
    }
}

/// Builder for [`Record`].
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        RecordBuilder {
            record: Record {
                timestamp: Timestamp::now(),
                level: Level::Information,
                message: String::new(),
                error: None,
                call_site: None,
            },
        }
    }
}

impl RecordBuilder {
    /// Set [`timestamp`](Record::timestamp).
    ///
    /// Default to the time the builder was created.
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    /// Set [`level`](Record::level).
    pub fn level(mut self, level: Level) -> Self {
        self.record.level = level;
        self
    }

    /// Set [`message`](Record::message).
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.record.message = message.into();
        self
    }

    /// Set [`error`](Record::error).
    pub fn error(mut self, error: Option<ErrorDetail>) -> Self {
        self.record.error = error;
        self
    }

    /// Set [`call_site`](Record::call_site).
    pub fn call_site(mut self, call_site: Option<CallSite>) -> Self {
        self.record.call_site = call_site;
        self
    }

    /// Invoke the builder and return a `Record`
    pub fn build(self) -> Record {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_level_order() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Information);
        assert!(Level::Information < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Critical);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("Information".parse::<Level>(), Ok(Level::Information));
        assert_eq!("INFO".parse::<Level>(), Ok(Level::Information));
        assert_eq!("warn".parse::<Level>(), Ok(Level::Warning));
        assert_eq!("critical".parse::<Level>(), Ok(Level::Critical));
        assert!("verbose".parse::<Level>().is_err());
    }

    #[derive(Debug)]
    struct Wrapped(io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("failed to load settings")
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_detail_from_error_chain() {
        let err = Wrapped(io::Error::new(io::ErrorKind::NotFound, "appsettings.json"));
        let detail = ErrorDetail::from_error(&err);
        assert_eq!(detail.message(), "failed to load settings");
        assert_eq!(detail.stack_trace(), Some("caused by: appsettings.json"));

        let detail = ErrorDetail::from_error(&io::Error::other("disk full"));
        assert_eq!(detail.message(), "disk full");
        assert_eq!(detail.stack_trace(), None);
    }

    #[test]
    fn test_error_detail_from_anyhow() {
        let err = anyhow::anyhow!("connection refused").context("failed to reach database");
        let detail = ErrorDetail::from(&err);
        assert_eq!(detail.message(), "failed to reach database");
        assert_eq!(detail.stack_trace(), Some("caused by: connection refused"));
    }

    #[test]
    fn test_call_site_display() {
        let site = CallSite::new("orders.rs", "submit", 42);
        assert_eq!(site.to_string(), "orders.rs.submit line 42");
    }
}
