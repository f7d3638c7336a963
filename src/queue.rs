use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::error::TrySubmitError;
use crate::job::Job;
use crate::{PoolError, Result};

/// A job waiting in the queue.
pub type BoxedJob<L> = Box<dyn Job<L>>;

/// Bounded, ordered hand-off of jobs from submitters to workers.
///
/// Backed by a multi-producer, multi-consumer channel. Jobs are delivered
/// FIFO to whichever worker asks next. Once closed for submission, workers
/// keep receiving until the queue is empty, then see a disconnect.
pub(crate) struct JobQueue<L> {
    tx: Option<Sender<BoxedJob<L>>>,
    rx: Receiver<BoxedJob<L>>,
    capacity: usize,
}

impl<L: 'static> JobQueue<L> {
    /// Creates a queue holding at most `capacity` pending jobs.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidCapacity`] if `capacity` is zero.
    pub fn bounded(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }
        let (tx, rx) = channel::bounded(capacity);
        Ok(Self {
            tx: Some(tx),
            rx,
            capacity,
        })
    }

    /// Enqueues a job, blocking while the queue is full.
    ///
    /// # Panics
    ///
    /// Panics if the queue has been closed for submission.
    pub fn submit<J: Job<L>>(&self, job: J) {
        self.submit_boxed(Box::new(job));
    }

    /// Enqueues an already boxed job, blocking while the queue is full.
    ///
    /// # Panics
    ///
    /// Panics if the queue has been closed for submission.
    pub fn submit_boxed(&self, job: BoxedJob<L>) {
        self.sender()
            .send(job)
            .expect("job queue has no receivers");
    }

    /// Enqueues a job without blocking.
    ///
    /// # Errors
    ///
    /// Hands the job back if the queue is full or closed.
    pub fn try_submit<J: Job<L>>(
        &self,
        job: J,
    ) -> std::result::Result<(), TrySubmitError<BoxedJob<L>>> {
        let job: BoxedJob<L> = Box::new(job);
        let Some(tx) = self.tx.as_ref() else {
            return Err(TrySubmitError::Closed(job));
        };
        tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) => TrySubmitError::Full(job),
            TrySendError::Disconnected(job) => TrySubmitError::Closed(job),
        })
    }

    /// Signals that no further jobs will be submitted.
    ///
    /// Jobs already queued are still delivered.
    ///
    /// # Panics
    ///
    /// Panics if the queue was already closed.
    pub fn close_for_submission(&mut self) {
        assert!(self.tx.take().is_some(), "job queue closed twice");
    }

    /// Returns `true` once the queue has been closed for submission.
    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Maximum number of pending jobs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs waiting to be picked up.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns `true` if no job is waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// A consumer handle for a worker.
    pub(crate) fn receiver(&self) -> Receiver<BoxedJob<L>> {
        self.rx.clone()
    }

    fn sender(&self) -> &Sender<BoxedJob<L>> {
        self.tx
            .as_ref()
            .expect("job submitted after the queue was closed")
    }
}
