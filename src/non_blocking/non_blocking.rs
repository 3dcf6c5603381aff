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
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::SendTimeoutError;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;
use crossbeam_channel::bounded;
use crossbeam_channel::select;
use crossbeam_channel::unbounded;

use super::Message;
use super::Shared;
use super::Writer;
use super::worker::Worker;
use crate::Error;
use crate::ErrorKind;
use crate::Trap;
use crate::trap::DefaultTrap;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// What to do when a bounded queue is full.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[non_exhaustive]
pub enum Overflow {
    /// Block the caller until the worker makes room, or until the queue is closed.
    #[default]
    Block,
    /// Drop the incoming entry and count it in [`NonBlocking::dropped`].
    DropIncoming,
}

/// A handle that hands rendered entries to a background worker.
#[derive(Debug)]
pub struct NonBlocking {
    sender: Sender<Message>,
    overflow: Overflow,
    shutdown_timeout: Duration,
    shared: Arc<Shared>,
    trap: Arc<dyn Trap>,
    closed: AtomicBool,
    // taken and dropped by `close`, which disconnects `close_signal` and wakes blocked callers
    close_notifier: Mutex<Option<Sender<()>>>,
    close_signal: Receiver<()>,
    worker_gone_reported: AtomicBool,
    worker: Mutex<Option<(JoinHandle<()>, Receiver<()>)>>,
}

impl NonBlocking {
    fn create<T: Writer>(
        writer: T,
        thread_name: String,
        buffered_lines_limit: Option<usize>,
        overflow: Overflow,
        shutdown_timeout: Duration,
        trap: Arc<dyn Trap>,
    ) -> Result<Self, Error> {
        let (sender, receiver) = match buffered_lines_limit {
            Some(cap) => bounded(cap),
            None => unbounded(),
        };
        let (done_sender, done_receiver) = bounded(0);
        let (close_notifier, close_signal) = bounded(0);

        let shared = Arc::new(Shared::default());
        let worker = Worker::new(
            writer,
            receiver,
            shared.clone(),
            trap.clone(),
            done_sender,
        );
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || worker.run())
            .map_err(|err| {
                Error::new(ErrorKind::Unexpected, "failed to spawn logging worker").with_source(err)
            })?;

        Ok(Self {
            sender,
            overflow,
            shutdown_timeout,
            shared,
            trap,
            closed: AtomicBool::new(false),
            close_notifier: Mutex::new(Some(close_notifier)),
            close_signal,
            worker_gone_reported: AtomicBool::new(false),
            worker: Mutex::new(Some((handle, done_receiver))),
        })
    }

    /// Enqueue one rendered entry.
    ///
    /// Never waits for I/O. With a bounded queue and [`Overflow::Block`] this may wait for room in
    /// the queue, but never beyond [`close`](Self::close).
    ///
    /// If the worker has stopped unexpectedly, the entry is counted as dropped and the failure is
    /// reported to the trap once.
    ///
    /// # Errors
    ///
    /// Return an [`ErrorKind::Closed`] error once [`close`](Self::close) has been called.
    pub fn send(&self, record: Vec<u8>) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::closed());
        }

        let message = Message::Record(record);
        let delivered = match self.overflow {
            Overflow::Block => select! {
                send(self.sender, message) -> res => res.is_ok(),
                recv(self.close_signal) -> _ => return Err(Error::closed()),
            },
            Overflow::DropIncoming => match self.sender.try_send(message) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.shared.record_dropped();
                    return Ok(());
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
        };

        if delivered {
            return Ok(());
        }
        if self.is_closed() {
            return Err(Error::closed());
        }
        self.shared.record_dropped();
        self.report_worker_gone();
        Ok(())
    }

    /// Wait until every entry enqueued before this call has been handed to the writer and the
    /// writer has been flushed.
    ///
    /// # Errors
    ///
    /// Return an [`ErrorKind::Closed`] error if the queue is closed before the flush completes.
    pub fn flush(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::closed());
        }

        let (ack_sender, ack_receiver) = bounded(1);
        let enqueued = select! {
            send(self.sender, Message::Flush(ack_sender)) -> res => res.is_ok(),
            recv(self.close_signal) -> _ => return Err(Error::closed()),
        };
        if !enqueued {
            self.report_worker_gone();
            return Ok(());
        }

        select! {
            recv(ack_receiver) -> res => {
                if res.is_err() {
                    self.report_worker_gone();
                }
                Ok(())
            }
            recv(self.close_signal) -> _ => Err(Error::closed()),
        }
    }

    /// The number of entries dropped so far, either because the queue was full under
    /// [`Overflow::DropIncoming`], because the worker had stopped, or because they were still
    /// queued when the shutdown timeout elapsed.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting entries, drain the queue and stop the worker.
    ///
    /// Waits at most the shutdown timeout, even when the worker is stuck. Entries still queued
    /// when it elapses are dropped and reported to the trap. Callers blocked on a full queue are
    /// released with an [`ErrorKind::Closed`] error. Calling `close` more than once is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(
            self.close_notifier
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some((handle, done)) = worker else {
            return;
        };

        let overflowed = self.dropped();
        if overflowed > 0 {
            let err = Error::new(ErrorKind::Append, "dropped log entries because the queue was full")
                .with_context("count", overflowed);
            self.trap.trap(&err);
        }

        let deadline = Instant::now() + self.shutdown_timeout;
        let _ = self.shared.deadline.set(deadline);

        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.sender.send_timeout(Message::Shutdown, remaining) {
            Ok(()) | Err(SendTimeoutError::Disconnected(_)) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                let err = Error::new(
                    ErrorKind::Unexpected,
                    "failed to send shutdown signal to logging worker",
                );
                self.trap.trap(&err);
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    let err = Error::new(ErrorKind::Unexpected, "logging worker panicked");
                    self.trap.trap(&err);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let err = Error::new(
                    ErrorKind::Unexpected,
                    "logging worker did not drain within the shutdown timeout",
                )
                .with_context("timeout", format!("{:?}", self.shutdown_timeout));
                self.trap.trap(&err);
            }
        }
    }

    fn report_worker_gone(&self) {
        if !self.worker_gone_reported.swap(true, Ordering::Relaxed) {
            let err = Error::new(ErrorKind::Unexpected, "logging worker has stopped");
            self.trap.trap(&err);
        }
    }
}

impl Drop for NonBlocking {
    fn drop(&mut self) {
        self.close();
    }
}

/// A builder for configuring [`NonBlocking`].
#[derive(Debug)]
pub struct NonBlockingBuilder {
    thread_name: String,
    buffered_lines_limit: Option<usize>,
    overflow: Overflow,
    shutdown_timeout: Option<Duration>,
    trap: Arc<dyn Trap>,
}

impl NonBlockingBuilder {
    /// Creates a new [`NonBlockingBuilder`] whose worker thread has the given name.
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
            buffered_lines_limit: None,
            overflow: Overflow::Block,
            shutdown_timeout: None,
            trap: Arc::new(DefaultTrap::default()),
        }
    }

    /// Sets the buffer size of pending entries. `None` means unbounded.
    pub fn buffered_lines_limit(mut self, buffered_lines_limit: Option<usize>) -> Self {
        self.buffered_lines_limit = buffered_lines_limit;
        self
    }

    /// Sets the policy applied when a bounded buffer is full.
    ///
    /// Default to [`Overflow::Block`].
    pub fn overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = overflow;
        self
    }

    /// Sets how long [`NonBlocking::close`] waits for the queue to drain.
    ///
    /// Default to one second.
    pub fn shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = Some(shutdown_timeout);
        self
    }

    /// Sets the trap that receives errors of the worker.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = Arc::from(trap.into());
        self
    }

    pub(crate) fn shared_trap(mut self, trap: Arc<dyn Trap>) -> Self {
        self.trap = trap;
        self
    }

    /// Spawns the worker and returns the configured [`NonBlocking`].
    ///
    /// # Errors
    ///
    /// Return an error if the worker thread cannot be spawned.
    pub fn build<T: Writer>(self, writer: T) -> Result<NonBlocking, Error> {
        NonBlocking::create(
            writer,
            self.thread_name,
            self.buffered_lines_limit,
            self.overflow,
            self.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
            self.trap,
        )
    }
}
