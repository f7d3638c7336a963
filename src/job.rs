use std::error::Error;
use std::fmt;

/// Reason a job failed.
pub type JobError = Box<dyn Error + Send + Sync + 'static>;

/// A unit of work run by a [`WorkerPool`](crate::WorkerPool).
///
/// Each job is executed exactly once, by exactly one worker. It receives the
/// 0-based id of the worker running it and a reference to the pool's shared
/// lock.
///
/// Closures of the form `FnOnce(usize, &L) -> Result<(), JobError>` are jobs.
pub trait Job<L: ?Sized>: Send + 'static {
    /// Runs the job on worker `worker_id`.
    fn execute(self: Box<Self>, worker_id: usize, lock: &L) -> Result<(), JobError>;
}

impl<L, F> Job<L> for F
where
    L: ?Sized,
    F: FnOnce(usize, &L) -> Result<(), JobError> + Send + 'static,
{
    fn execute(self: Box<Self>, worker_id: usize, lock: &L) -> Result<(), JobError> {
        (*self)(worker_id, lock)
    }
}

/// A job failure recorded by the pool.
#[derive(Debug)]
pub struct JobFailure {
    worker_id: usize,
    error: JobError,
}

impl JobFailure {
    pub(crate) fn new(worker_id: usize, error: JobError) -> Self {
        Self { worker_id, error }
    }

    /// Id of the worker that ran the failed job.
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// The error the job reported.
    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.error
    }

    /// Consumes the failure, returning the job's error.
    pub fn into_error(self) -> JobError {
        self.error
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {}: {}", self.worker_id, self.error)
    }
}

impl Error for JobFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.error)
    }
}
