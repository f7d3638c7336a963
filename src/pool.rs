use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam::channel::Receiver;
use crossbeam::sync::WaitGroup;
use log::{debug, error, warn};

use crate::error::{JobPanicked, TrySubmitError};
use crate::failures::{FailureLog, FailureRecorder};
use crate::job::{Job, JobError, JobFailure};
use crate::lock::Locker;
use crate::queue::{BoxedJob, JobQueue};
use crate::{PoolError, Result};

const DEFAULT_THREAD_NAME: &str = "thdpool-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Running,
    Closed,
}

/// A fixed-size pool of worker threads sharing one job queue and one lock.
///
/// The pool goes through a single lifecycle: build it, [`run`](Self::run) it,
/// [`submit`](Self::submit) jobs, then [`close`](Self::close) it. `close`
/// blocks until every submitted job has finished and hands back the failures.
///
/// Every job receives the id of the worker running it (`0..worker_count`) and
/// a reference to the shared lock `L`. The pool never acquires that lock
/// itself.
pub struct WorkerPool<L: Locker = Mutex<()>> {
    worker_count: usize,
    thread_name: String,
    queue: JobQueue<L>,
    lock: Arc<L>,
    tracker: Option<WaitGroup>,
    failures: FailureLog,
    state: State,
}

impl WorkerPool {
    /// Creates a pool of `worker_count` workers with a fresh exclusive lock.
    ///
    /// The queue holds one pending job per worker.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidWorkerCount`] if `worker_count` is zero.
    pub fn new(worker_count: usize) -> Result<Self> {
        Self::builder().workers(worker_count).build()
    }

    /// Starts configuring a pool.
    ///
    /// Defaults to one worker per CPU, a queue capacity equal to the worker
    /// count and a fresh `Mutex<()>` as the shared lock.
    pub fn builder() -> Builder<Mutex<()>> {
        Builder {
            workers: num_cpus::get(),
            queue_capacity: None,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            lock: Arc::new(Mutex::new(())),
        }
    }
}

impl<L: Locker> WorkerPool<L> {
    /// Creates a pool that hands `lock` to every job.
    ///
    /// The caller may keep its own clone of `lock` to coordinate with code
    /// outside the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidWorkerCount`] if `worker_count` is zero.
    pub fn with_lock(worker_count: usize, lock: Arc<L>) -> Result<Self> {
        WorkerPool::builder()
            .workers(worker_count)
            .lock(lock)
            .build()
    }

    /// Number of workers started by [`run`](Self::run).
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Maximum number of jobs waiting for a worker.
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of jobs waiting for a worker right now.
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// The lock shared with every job.
    pub fn lock(&self) -> &Arc<L> {
        &self.lock
    }

    /// Starts the workers and returns without waiting for any job.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Io`] if a worker thread cannot be spawned. The
    /// workers already started are drained and joined first, and the pool
    /// accepts no further jobs.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn run(&mut self) -> Result<()> {
        assert_eq!(
            self.state,
            State::Created,
            "WorkerPool::run called more than once"
        );
        self.state = State::Running;

        let tracker = WaitGroup::new();
        for id in 0..self.worker_count {
            let worker = Worker {
                id,
                jobs: self.queue.receiver(),
                lock: Arc::clone(&self.lock),
                failures: self.failures.recorder(),
                _done: tracker.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("{}-{id}", self.thread_name))
                .spawn(move || worker.run());

            if let Err(e) = spawned {
                error!("Failed to spawn worker {id}: {e}");
                self.tracker = Some(tracker);
                let failures = self.shutdown();
                if !failures.is_empty() {
                    warn!(
                        "Discarding {} job failures after aborted start",
                        failures.len()
                    );
                }
                return Err(PoolError::Io(e));
            }
        }
        self.tracker = Some(tracker);
        debug!("Started {} workers", self.worker_count);

        Ok(())
    }

    /// Submits a job, blocking while the queue is full.
    ///
    /// Jobs submitted before [`run`](Self::run) wait in the queue; once the
    /// queue is full this blocks until the pool is running.
    ///
    /// # Panics
    ///
    /// Panics if the pool failed to start and closed its queue.
    pub fn submit<J: Job<L>>(&self, job: J) {
        self.queue.submit(job);
    }

    /// Submits a closure as a job, blocking while the queue is full.
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce(usize, &L) -> std::result::Result<(), JobError> + Send + 'static,
    {
        self.queue.submit(f);
    }

    /// Submits a boxed job, such as one handed back by
    /// [`try_submit`](Self::try_submit).
    pub fn submit_boxed(&self, job: BoxedJob<L>) {
        self.queue.submit_boxed(job);
    }

    /// Submits every job from `jobs` in order.
    pub fn submit_all<I>(&self, jobs: I)
    where
        I: IntoIterator,
        I::Item: Job<L>,
    {
        for job in jobs {
            self.queue.submit(job);
        }
    }

    /// Submits a job without blocking.
    ///
    /// # Errors
    ///
    /// Hands the job back if the queue is full or closed.
    pub fn try_submit<J: Job<L>>(
        &self,
        job: J,
    ) -> std::result::Result<(), TrySubmitError<BoxedJob<L>>> {
        self.queue.try_submit(job)
    }

    /// Closes the queue and waits for every worker to drain it and exit.
    ///
    /// Returns one [`JobFailure`] per job that returned an error or panicked,
    /// in no particular order.
    ///
    /// # Panics
    ///
    /// Panics if the pool was never [`run`](Self::run).
    pub fn close(mut self) -> Vec<JobFailure> {
        match self.state {
            State::Created => panic!("WorkerPool::close called before run"),
            State::Running => self.shutdown(),
            State::Closed => self.failures.drain(),
        }
    }

    fn shutdown(&mut self) -> Vec<JobFailure> {
        self.queue.close_for_submission();
        if let Some(tracker) = self.tracker.take() {
            tracker.wait();
        }
        self.state = State::Closed;
        debug!("All workers exited");
        self.failures.drain()
    }
}

impl<L: Locker> Drop for WorkerPool<L> {
    fn drop(&mut self) {
        match self.state {
            State::Running => {
                for failure in self.shutdown() {
                    warn!("Dropped pool discarded job failure: {failure}");
                }
            }
            State::Created if !self.queue.is_empty() => {
                warn!(
                    "Pool dropped before run, {} queued jobs never executed",
                    self.queue.len()
                );
            }
            _ => {}
        }
    }
}

impl<L: Locker> fmt::Debug for WorkerPool<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("queue_capacity", &self.queue.capacity())
            .field("thread_name", &self.thread_name)
            .field("state", &self.state)
            .field("accepting_jobs", &!self.queue.is_closed())
            .finish()
    }
}

/// Configures and builds a [`WorkerPool`].
pub struct Builder<L> {
    workers: usize,
    queue_capacity: Option<usize>,
    thread_name: String,
    lock: Arc<L>,
}

impl<L: Locker> Builder<L> {
    /// Sets the number of workers.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets how many jobs may wait in the queue. Defaults to the worker count.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Sets the worker thread name prefix. Workers are named `<prefix>-<id>`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Replaces the shared lock, possibly with a different lock type.
    pub fn lock<M: Locker>(self, lock: Arc<M>) -> Builder<M> {
        Builder {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            thread_name: self.thread_name,
            lock,
        }
    }

    /// Builds the pool. Workers are not started until [`WorkerPool::run`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidWorkerCount`] for zero workers,
    /// [`PoolError::InvalidCapacity`] for a zero queue capacity and
    /// [`PoolError::InvalidThreadName`] for a prefix containing a NUL byte.
    pub fn build(self) -> Result<WorkerPool<L>> {
        if self.workers == 0 {
            return Err(PoolError::InvalidWorkerCount(self.workers));
        }
        // `thread::Builder::spawn` panics on these instead of returning an error.
        if self.thread_name.contains('\0') {
            return Err(PoolError::InvalidThreadName(self.thread_name));
        }
        let queue = JobQueue::bounded(self.queue_capacity.unwrap_or(self.workers))?;

        Ok(WorkerPool {
            worker_count: self.workers,
            thread_name: self.thread_name,
            queue,
            lock: self.lock,
            tracker: None,
            failures: FailureLog::new(),
            state: State::Created,
        })
    }
}

/// One worker thread's share of the pool.
struct Worker<L> {
    id: usize,
    jobs: Receiver<BoxedJob<L>>,
    lock: Arc<L>,
    failures: FailureRecorder,
    // Dropped when the worker exits, releasing `close`.
    _done: WaitGroup,
}

impl<L: Locker> Worker<L> {
    fn run(self) {
        let id = self.id;
        let lock = &*self.lock;

        // Ends once the queue is closed and empty.
        for job in self.jobs.iter() {
            debug!("Worker {id} executing job");
            match panic::catch_unwind(AssertUnwindSafe(move || job.execute(id, lock))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("Worker {id} job failed: {e}");
                    self.failures.record(id, e);
                }
                Err(payload) => {
                    let message = panic_message(&*payload);
                    error!("Worker {id} job panicked: {message}");
                    self.failures.record(id, Box::new(JobPanicked(message)));
                }
            }
        }

        debug!("Worker {id}: queue closed, shutting down");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
