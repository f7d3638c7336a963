#![deny(missing_docs)]

//! A fixed-size worker pool.
//!
//! Jobs are pushed through a bounded queue to a fixed number of worker
//! threads. Every job is handed the id of the worker running it and a lock
//! shared by the whole pool. Closing the pool waits for every submitted job
//! and returns the failures the jobs reported.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use thdpool::{Locker, WorkerPool};
//!
//! let counter = Arc::new(Mutex::new(0u32));
//! let mut pool = WorkerPool::with_lock(3, Arc::clone(&counter)).unwrap();
//! pool.run().unwrap();
//!
//! for _ in 0..10 {
//!     pool.spawn(|_worker_id, counter: &Mutex<u32>| {
//!         *Locker::lock(counter) += 1;
//!         Ok(())
//!     });
//! }
//!
//! let failures = pool.close();
//! assert!(failures.is_empty());
//! assert_eq!(*Locker::lock(&*counter), 10);
//! ```

mod error;
mod failures;
mod job;
mod lock;
mod pool;
mod queue;

pub use error::{JobPanicked, PoolError, Result, TrySubmitError};
pub use job::{Job, JobError, JobFailure};
pub use lock::{Locker, SharedLocker};
pub use pool::{Builder, WorkerPool};
pub use queue::BoxedJob;
