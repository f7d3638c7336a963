use crossbeam::channel::{self, Receiver, Sender};

use crate::job::{JobError, JobFailure};

/// Pool-private collection of job failures.
///
/// Workers push through their own [`FailureRecorder`]; the pool drains the
/// collection once every worker has exited. This is deliberately separate
/// from the lock handed to jobs.
pub(crate) struct FailureLog {
    tx: Sender<JobFailure>,
    rx: Receiver<JobFailure>,
}

/// A worker's handle for reporting failures.
#[derive(Clone)]
pub(crate) struct FailureRecorder {
    tx: Sender<JobFailure>,
}

impl FailureLog {
    pub(crate) fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    pub(crate) fn recorder(&self) -> FailureRecorder {
        FailureRecorder {
            tx: self.tx.clone(),
        }
    }

    /// Takes every failure recorded so far.
    pub(crate) fn drain(&self) -> Vec<JobFailure> {
        self.rx.try_iter().collect()
    }
}

impl FailureRecorder {
    pub(crate) fn record(&self, worker_id: usize, error: JobError) {
        // The log outlives every worker, so the receiver is always there.
        let _ = self.tx.send(JobFailure::new(worker_id, error));
    }
}
