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

use std::sync::Arc;

use crate::Error;
use crate::ErrorKind;
use crate::Trap;
use crate::append::Append;
use crate::record::CallSite;
use crate::record::Level;
use crate::record::Record;
use crate::trap::DefaultTrap;

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warning,
            log::Level::Info => Level::Information,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

/// Forwards records of the `log` crate to an appender.
///
/// The rendered `format_args!` becomes the message, and the source file, module path and line of
/// the macro call become the call site. Errors returned by the appender, including a closed sink,
/// go to the trap since [`log::Log::log`] cannot return them.
#[derive(Debug)]
pub struct LogBridge {
    append: Box<dyn Append>,
    trap: Arc<dyn Trap>,
}

impl LogBridge {
    /// Create a bridge forwarding to `append`.
    pub fn new(append: impl Into<Box<dyn Append>>) -> Self {
        Self {
            append: append.into(),
            trap: Arc::new(DefaultTrap::default()),
        }
    }

    /// Set the trap for errors returned by the appender.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = Arc::from(trap.into());
        self
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.append.enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        let level = Level::from(record.level());
        if !self.append.enabled(level) {
            return;
        }

        let call_site = match (record.file(), record.module_path(), record.line()) {
            (Some(file), Some(member), Some(line)) => Some(CallSite::new(file, member, line)),
            _ => None,
        };
        let record = Record::builder()
            .level(level)
            .message(record.args().to_string())
            .call_site(call_site)
            .build();

        if let Err(err) = self.append.append(&record) {
            self.trap.trap(&err);
        }
    }

    fn flush(&self) {
        if let Err(err) = self.append.flush() {
            let err = Error::new(ErrorKind::Append, "failed to flush appender").with_source(err);
            self.trap.trap(&err);
        }
    }
}

/// Set up the log crate global logger.
///
/// This function calls [`log::set_boxed_logger`] and forwards every record of the log crate to
/// `bridge`. The global maximum level is set to `Trace`; the appender applies its own gate. To
/// override this, call [`log::set_max_level`] after this function.
///
/// # Errors
///
/// Return an error if the log crate global logger has already been set.
pub fn try_setup_log_crate(bridge: LogBridge) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(bridge))?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

/// Set up the log crate global logger.
///
/// See [`try_setup_log_crate`] for details.
///
/// # Panics
///
/// Panic if the log crate global logger has already been set.
pub fn setup_log_crate(bridge: LogBridge) {
    try_setup_log_crate(bridge).expect(
        "filesink::bridge::setup_log_crate must be called before the log crate global logger initialized",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(Level::from(log::Level::Error), Level::Error);
        assert_eq!(Level::from(log::Level::Warn), Level::Warning);
        assert_eq!(Level::from(log::Level::Info), Level::Information);
        assert_eq!(Level::from(log::Level::Debug), Level::Debug);
        assert_eq!(Level::from(log::Level::Trace), Level::Trace);
    }
}
