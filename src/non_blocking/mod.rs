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

//! Non-blocking dispatch of rendered entries to a single background worker.
//!
//! Every [`NonBlocking`] owns exactly one worker thread, and the worker exclusively owns the
//! [`Writer`]. Entries are written in the order they were enqueued, so an entry submitted before
//! another (by any caller) appears before it in the output. The worker is also the only place
//! where the writer is touched, which makes it the exclusion primitive for everything the writer
//! does per entry.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::OnceLock;
use std::time::Instant;

use crossbeam_channel::Sender;

use crate::Error;

mod non_blocking;
mod worker;

pub use self::non_blocking::NonBlocking;
pub use self::non_blocking::NonBlockingBuilder;
pub use self::non_blocking::Overflow;

/// The destination of a [`NonBlocking`] worker.
pub trait Writer: Send + 'static {
    /// Write one complete entry. The entry must not be split across destinations.
    fn write_record(&mut self, record: &[u8]) -> Result<(), Error>;

    /// Flush any buffered entries.
    fn flush(&mut self) -> Result<(), Error>;
}

#[derive(Debug)]
enum Message {
    Record(Vec<u8>),
    Flush(Sender<()>),
    Shutdown,
}

#[derive(Debug, Default)]
struct Shared {
    dropped: AtomicU64,
    deadline: OnceLock<Instant>,
}

impl Shared {
    fn expired(&self) -> bool {
        self.deadline
            .get()
            .is_some_and(|deadline| Instant::now() >= *deadline)
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}
