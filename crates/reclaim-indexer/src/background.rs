//! Worker-thread tasks polled from the owner thread
//!
//! Cache loads and saves run on their own thread and hand their result back
//! over a channel. The owner checks the channel once per tick and never blocks
//! on it, except through [`BackgroundTask::wait`] at shutdown.

use std::sync::mpsc::{self, Receiver, TryRecvError};

/// Result of polling a [`BackgroundTask`].
#[derive(Debug)]
pub enum TaskStatus<T> {
    /// Still running.
    Pending,
    /// Finished with a value.
    Ready(T),
    /// The worker went away without sending (it panicked).
    Lost,
}

/// A job running on a dedicated worker thread.
#[derive(Debug)]
pub struct BackgroundTask<T> {
    name: &'static str,
    receiver: Receiver<T>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Start `job` on a named worker thread.
    pub fn spawn<F>(name: &'static str, job: F) -> std::io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                tracing::debug!("Worker {} started", name);
                // The owner may have cancelled and dropped the receiver
                let _ = sender.send(job());
            })?;

        Ok(Self { name, receiver })
    }

    /// Check for a result without blocking.
    pub fn poll(&mut self) -> TaskStatus<T> {
        match self.receiver.try_recv() {
            Ok(value) => TaskStatus::Ready(value),
            Err(TryRecvError::Empty) => TaskStatus::Pending,
            Err(TryRecvError::Disconnected) => TaskStatus::Lost,
        }
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> Option<T> {
        self.receiver.recv().ok()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
