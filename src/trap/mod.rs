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

//! Traps for errors that cannot be returned to the caller.
//!
//! A sink must never crash or block the application because its log file misbehaves. Failures to
//! render, rotate, append or prune are handed to a [`Trap`] instead, which by default prints them
//! to standard error. They are never written to the log file under maintenance.

use std::fmt;

use crate::Error;

mod default;

pub use self::default::DefaultTrap;

/// A trap receives internal errors of a sink.
pub trait Trap: fmt::Debug + Send + Sync + 'static {
    /// Handle an error that cannot be propagated to the caller.
    fn trap(&self, err: &Error);
}

impl<T: Trap> From<T> for Box<dyn Trap> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
