//! The dataset's single dedicated writer thread.
//!
//! Every write — `putImage`, `overwritePixels`, `finishedWriting` — is
//! funneled through one thread so that container files and the index never
//! see concurrent mutation. Backpressure comes from a bounded
//! `std::sync::mpsc::sync_channel`: once 50 jobs are queued, callers block
//! on `submit` until the writer thread drains one.
//!
//! The async/sync boundary here is the same shape as using
//! `tokio::sync::{Mutex, RwLock, Notify}` to bridge async callers to
//! blocking work, roles reversed: instead of an async caller waiting on a
//! `Notify` for a blocking disk read to finish, callers here get back a
//! `tokio::sync::oneshot` future for a blocking disk write running on its
//! own thread.

use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::sync::oneshot;

use crate::error::StorageError;

/// Bounded queue depth: once this many jobs are in flight, `submit` blocks.
const QUEUE_CAPACITY: usize = 50;

type Task<S> = Box<dyn FnOnce(&mut S) -> Result<(), StorageError> + Send>;

struct WriteJob<S> {
    task: Task<S>,
    responder: oneshot::Sender<Result<(), StorageError>>,
}

/// Owns the writer thread and the state it serializes access to.
///
/// `S` is whatever mutable state a write touches — for this engine, the
/// dataset's collection of [`crate::level::ResolutionLevel`]s.
pub struct WriteQueue<S> {
    sender: Option<SyncSender<WriteJob<S>>>,
    shared_error: Arc<Mutex<Option<StorageError>>>,
    handle: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> WriteQueue<S> {
    /// Spawn the writer thread, taking ownership of `state`.
    pub fn spawn(mut state: S) -> Self {
        let (tx, rx) = sync_channel::<WriteJob<S>>(QUEUE_CAPACITY);
        let shared_error = Arc::new(Mutex::new(None));
        let shared_error_thread = shared_error.clone();

        let handle = std::thread::spawn(move || {
            for job in rx {
                let already_poisoned = shared_error_thread.lock().unwrap().clone();
                if let Some(prior) = already_poisoned {
                    let _ = job
                        .responder
                        .send(Err(StorageError::PoisonedByPriorError(prior.to_string())));
                    continue;
                }

                let result = (job.task)(&mut state);
                if let Err(e) = &result {
                    if e.is_fatal_for_writer() {
                        *shared_error_thread.lock().unwrap() = Some(e.clone());
                    }
                }
                let _ = job.responder.send(result);
            }
        });

        Self {
            sender: Some(tx),
            shared_error,
            handle: Some(handle),
        }
    }

    /// Enqueue a job to run on the writer thread, returning a future that
    /// resolves once it completes. Blocks the calling thread if the queue
    /// is already full — the engine's sole point of write backpressure.
    pub fn submit<F>(&self, task: F) -> Result<oneshot::Receiver<Result<(), StorageError>>, StorageError>
    where
        F: FnOnce(&mut S) -> Result<(), StorageError> + Send + 'static,
    {
        self.check_for_writing_exception()?;
        let (responder, receiver) = oneshot::channel();
        let job = WriteJob {
            task: Box::new(task),
            responder,
        };
        self.sender
            .as_ref()
            .ok_or(StorageError::WriterGone)?
            .send(job)
            .map_err(|_| StorageError::WriterGone)?;
        Ok(receiver)
    }

    /// Fail fast if a previous write already poisoned the dataset, rather
    /// than queueing a job that is guaranteed to fail.
    pub fn check_for_writing_exception(&self) -> Result<(), StorageError> {
        match self.shared_error.lock().unwrap().clone() {
            Some(e) => Err(StorageError::PoisonedByPriorError(e.to_string())),
            None => Ok(()),
        }
    }
}

impl<S> Drop for WriteQueue<S> {
    fn drop(&mut self) {
        // Dropping the sender first is what lets the thread's `for job in
        // rx` loop see the channel close and exit; otherwise `join` would
        // block forever waiting on a thread that's still waiting on us.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
