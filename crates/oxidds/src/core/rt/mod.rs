// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime resources owned by the participant.
//!
//! `EventResource` is the single timer thread driving periodic work
//! (discovery announcements, lease checks). `ResourceSemaphore` is the
//! counting semaphore discovery phases use to wait for a countable number of
//! subordinate tasks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

/// Identifies a registered periodic event.
pub type EventId = u32;

type EventCallback = Box<dyn FnMut() + Send>;

enum EventCommand {
    Register {
        id: EventId,
        period: Duration,
        callback: EventCallback,
    },
    Cancel(EventId),
    /// Restart the period from now (next firing is one full period away).
    Reset(EventId),
    Shutdown,
}

struct PeriodicEvent {
    id: EventId,
    period: Duration,
    next_due: Instant,
    callback: EventCallback,
}

/// Timer thread for periodic events.
///
/// One logical task per registration; callbacks run on the event thread in
/// due order. A panicking callback is isolated and logged, it does not take
/// the thread down.
pub struct EventResource {
    tx: Sender<EventCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU32,
}

impl EventResource {
    /// Spawn the event thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn new() -> std::io::Result<Self> {
        let (tx, rx) = unbounded::<EventCommand>();
        let handle = std::thread::Builder::new()
            .name("oxidds-event".to_string())
            .spawn(move || {
                let mut events: Vec<PeriodicEvent> = Vec::new();
                log::debug!("[EVENT] thread started");
                loop {
                    // Sleep until the nearest deadline, or idle-poll for
                    // commands when nothing is registered.
                    let timeout = events
                        .iter()
                        .map(|e| e.next_due.saturating_duration_since(Instant::now()))
                        .min()
                        .unwrap_or(Duration::from_secs(1));
                    match rx.recv_timeout(timeout) {
                        Ok(EventCommand::Register {
                            id,
                            period,
                            callback,
                        }) => {
                            events.push(PeriodicEvent {
                                id,
                                period,
                                next_due: Instant::now() + period,
                                callback,
                            });
                            log::debug!("[EVENT] registered id={} period={:?}", id, period);
                        }
                        Ok(EventCommand::Cancel(id)) => {
                            events.retain(|e| e.id != id);
                            log::debug!("[EVENT] cancelled id={}", id);
                        }
                        Ok(EventCommand::Reset(id)) => {
                            for event in events.iter_mut().filter(|e| e.id == id) {
                                event.next_due = Instant::now() + event.period;
                            }
                        }
                        Ok(EventCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    let now = Instant::now();
                    for event in events.iter_mut().filter(|e| e.next_due <= now) {
                        event.next_due = now + event.period;
                        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
                            &mut event.callback,
                        ));
                        if outcome.is_err() {
                            log::error!("[EVENT] callback panicked, id={}", event.id);
                        }
                    }
                }
                log::debug!("[EVENT] thread exiting");
            })?;

        Ok(Self {
            tx,
            handle: Mutex::new(Some(handle)),
            next_id: AtomicU32::new(1),
        })
    }

    /// Register a periodic callback. The first firing is one period from now.
    pub fn register_periodic<F>(&self, period: Duration, callback: F) -> EventId
    where
        F: FnMut() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(EventCommand::Register {
            id,
            period,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a periodic event. Idempotent.
    pub fn cancel(&self, id: EventId) {
        let _ = self.tx.send(EventCommand::Cancel(id));
    }

    /// Restart an event's period from now.
    pub fn reset(&self, id: EventId) {
        let _ = self.tx.send(EventCommand::Reset(id));
    }

    /// Stop the thread and wait for it to exit. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(EventCommand::Shutdown);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                // Shutdown requested from a callback on the event thread
                // itself; the loop exits on the queued command.
                return;
            }
            let _ = handle.join();
        }
    }
}

impl Drop for EventResource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Counting semaphore with `post`/`wait` semantics.
pub struct ResourceSemaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl ResourceSemaphore {
    #[must_use]
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    /// Increment the count and wake one waiter.
    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.available.notify_one();
    }

    /// Block until the count is positive, then decrement it.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }
}
