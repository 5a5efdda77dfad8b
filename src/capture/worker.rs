// SPDX-License-Identifier: GPL-3.0-only

//! Dedicated capture work queue
//!
//! All hardware start/stop, device open/close, and format configuration run
//! on one owned worker thread, in FIFO order. Public controller entry points
//! dispatch closures here instead of touching the capability provider from
//! the caller's thread, so no caller ever blocks on in-flight capture work
//! (except via an explicit [`CaptureQueue::run_sync`]/[`CaptureQueue::flush`]).

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, warn};

enum Job {
    Run(Box<dyn FnOnce() + Send>),
    Shutdown,
}

/// A named worker thread executing dispatched closures in order
pub struct CaptureQueue {
    tx: Sender<Job>,
    thread_handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    name: String,
}

impl CaptureQueue {
    /// Spawn the worker thread
    pub fn new(name: &str) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let thread_name = name.to_string();

        debug!(name = %name, "Starting capture queue");

        let thread_handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    match job {
                        Job::Run(f) => f(),
                        Job::Shutdown => break,
                    }
                }
                debug!(name = %thread_name, "Capture queue thread exiting");
            })
            .expect("failed to spawn capture queue thread");

        let thread_id = thread_handle.thread().id();

        Self {
            tx,
            thread_handle: Some(thread_handle),
            thread_id,
            name: name.to_string(),
        }
    }

    /// Dispatch a closure to run on the worker thread without waiting
    pub fn dispatch<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Job::Run(Box::new(f))).is_err() {
            warn!(name = %self.name, "Capture queue is gone, dropping work");
        }
    }

    /// Run a closure on the worker thread and wait for its result
    pub fn run_sync<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::channel();
        self.dispatch(move || {
            // Receiver outlives the queue by construction
            let _ = done_tx.send(f());
        });
        done_rx
            .recv()
            .expect("capture queue thread terminated while work was pending")
    }

    /// Block until all previously dispatched work has run
    pub fn flush(&self) {
        self.run_sync(|| {});
    }

    /// True when the calling thread is the worker thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for CaptureQueue {
    fn drop(&mut self) {
        let _ = self.tx.send(Job::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!(name = %self.name, "Capture queue thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn runs_dispatched_work_in_order() {
        let queue = CaptureQueue::new("test-queue");
        let value = Arc::new(AtomicU32::new(0));

        for i in 1..=10 {
            let value = Arc::clone(&value);
            queue.dispatch(move || {
                value.store(i, Ordering::SeqCst);
            });
        }
        queue.flush();

        assert_eq!(value.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn run_sync_returns_value() {
        let queue = CaptureQueue::new("test-sync");
        let result = queue.run_sync(|| 21 * 2);
        assert_eq!(result, 42);
    }

    #[test]
    fn is_current_distinguishes_threads() {
        let queue = CaptureQueue::new("test-current");
        assert!(!queue.is_current());

        let on_worker = queue.run_sync({
            let id = queue.thread_id;
            move || thread::current().id() == id
        });
        assert!(on_worker);
    }

    #[test]
    fn drop_joins_worker() {
        let queue = CaptureQueue::new("test-drop");
        let value = Arc::new(AtomicU32::new(0));
        let value_clone = Arc::clone(&value);
        queue.dispatch(move || {
            value_clone.store(7, Ordering::SeqCst);
        });
        drop(queue);
        assert_eq!(value.load(Ordering::SeqCst), 7);
    }
}
