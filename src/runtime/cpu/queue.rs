//! In-order execution queue for asynchronous submission
//!
//! A [`Queue`] owns one worker thread that runs submitted jobs in order.
//! The first failing job poisons the queue: later jobs are dropped without
//! running until [`Queue::synchronize`] reports the failure.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{Sender, channel};
use std::thread::JoinHandle;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

#[derive(Debug, Default)]
struct QueueState {
    pending: usize,
    error: Option<Error>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<QueueState>,
    idle: Condvar,
}

/// In-order asynchronous execution queue
#[derive(Debug)]
pub struct Queue {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl Queue {
    /// Start a queue with its own worker thread
    pub fn new() -> Result<Self> {
        let (sender, receiver) = channel::<Job>();
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);

        let worker = std::thread::Builder::new()
            .name("blocktri-queue".to_string())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    run_job(&worker_shared, job);
                }
                debug!("queue worker exiting");
            })
            .map_err(|e| Error::Internal(format!("failed to start queue worker: {}", e)))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            shared,
        })
    }

    /// Enqueue a job behind every previously submitted one
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(Error::QueueClosed)?;
        self.shared.state.lock().pending += 1;
        if sender.send(Box::new(job)).is_err() {
            self.finish_one();
            return Err(Error::QueueClosed);
        }
        Ok(())
    }

    /// Wait until every submitted job has finished
    ///
    /// Returns the first error raised since the previous synchronization and
    /// clears it, so the queue accepts work again.
    pub fn synchronize(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        while state.pending > 0 {
            self.shared.idle.wait(&mut state);
        }
        match state.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Number of jobs submitted but not finished
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending
    }

    fn finish_one(&self) {
        let mut state = self.shared.state.lock();
        state.pending -= 1;
        if state.pending == 0 {
            self.shared.idle.notify_all();
        }
    }
}

fn run_job(shared: &Shared, job: Job) {
    let poisoned = shared.state.lock().error.is_some();
    let outcome = if poisoned {
        debug!("skipping job after earlier failure");
        Ok(())
    } else {
        catch_unwind(AssertUnwindSafe(job))
            .unwrap_or_else(|payload| Err(Error::Internal(panic_message(payload))))
    };

    let mut state = shared.state.lock();
    if let Err(err) = outcome {
        error!(error = %err, "queued job failed");
        if state.error.is_none() {
            state.error = Some(err);
        }
    }
    state.pending -= 1;
    if state.pending == 0 {
        shared.idle.notify_all();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("queued job panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("queued job panicked: {}", s)
    } else {
        "queued job panicked".to_string()
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("queue worker terminated abnormally");
            }
        }
    }
}
