use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::thread::scope;
use thdpool::{JobError, JobPanicked, Locker, SharedLocker, WorkerPool};

fn counting_job(
    counter: &Arc<AtomicUsize>,
) -> impl FnOnce(usize, &Mutex<()>) -> Result<(), JobError> + Send + 'static {
    let counter = Arc::clone(counter);
    move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn every_job_runs_exactly_once() {
    for workers in [1, 2, 4, 8] {
        for jobs in [0, 1, 7, 100] {
            let counter = Arc::new(AtomicUsize::new(0));
            let mut pool = WorkerPool::new(workers).unwrap();
            pool.run().unwrap();
            for _ in 0..jobs {
                pool.spawn(counting_job(&counter));
            }
            assert!(pool.close().is_empty());
            assert_eq!(
                counter.load(Ordering::SeqCst),
                jobs,
                "{workers} workers, {jobs} jobs"
            );
        }
    }
}

#[test]
fn no_job_is_skipped_or_repeated() {
    let seen = Arc::new(Mutex::new(HashSet::new()));
    let mut pool = WorkerPool::with_lock(4, Arc::clone(&seen)).unwrap();
    pool.run().unwrap();

    for id in 0..500usize {
        pool.spawn(move |_, seen: &Mutex<HashSet<usize>>| {
            if Locker::lock(seen).insert(id) {
                Ok(())
            } else {
                Err(format!("job {id} ran twice").into())
            }
        });
    }
    assert!(pool.close().is_empty());

    let seen = Locker::lock(&*seen);
    assert_eq!(*seen, (0..500).collect::<HashSet<_>>());
}

#[test]
fn close_waits_for_the_last_job() {
    let done = Arc::new(AtomicBool::new(false));
    let delay = Duration::from_millis(200);

    let mut pool = WorkerPool::new(2).unwrap();
    pool.run().unwrap();
    let start = Instant::now();
    let flag = Arc::clone(&done);
    pool.spawn(move |_, _| {
        thread::sleep(delay);
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });
    assert!(pool.close().is_empty());

    assert!(start.elapsed() >= delay);
    assert!(done.load(Ordering::SeqCst));
}

#[test]
fn failures_are_collected_once_each() {
    let workers = 3;
    let mut pool = WorkerPool::new(workers).unwrap();
    pool.run().unwrap();
    for n in 0..50usize {
        pool.spawn(move |_, _| {
            if n % 5 == 0 {
                Err(format!("job {n} failed").into())
            } else {
                Ok(())
            }
        });
    }
    let failures = pool.close();

    assert_eq!(failures.len(), 10);
    assert!(failures.iter().all(|f| f.worker_id() < workers));
    let messages: HashSet<String> = failures
        .iter()
        .map(|f| f.error().to_string())
        .collect();
    assert_eq!(messages.len(), 10);
    assert!(messages.contains("job 45 failed"));
}

#[test]
fn never_more_than_n_jobs_in_flight() {
    let workers = 4;
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut pool = WorkerPool::new(workers).unwrap();
    pool.run().unwrap();
    for _ in 0..40 {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        pool.spawn(move |_, _| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });
    }
    assert!(pool.close().is_empty());

    let peak = peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= workers, "peak was {peak}");
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[test]
fn shared_lock_serializes_read_modify_write() {
    let counter = Arc::new(AtomicU64::new(0));
    let mut pool = WorkerPool::new(8).unwrap();
    pool.run().unwrap();

    for _ in 0..1000 {
        let counter = Arc::clone(&counter);
        pool.spawn(move |_, lock: &Mutex<()>| {
            let _guard = Locker::lock(lock);
            let value = counter.load(Ordering::Relaxed);
            thread::yield_now();
            counter.store(value + 1, Ordering::Relaxed);
            Ok(())
        });
    }
    assert!(pool.close().is_empty());
    assert_eq!(counter.load(Ordering::SeqCst), 1000);
}

#[test]
fn three_workers_ten_increments() {
    let counter = Arc::new(Mutex::new(0u32));
    let mut pool = WorkerPool::with_lock(3, Arc::clone(&counter)).unwrap();
    pool.run().unwrap();
    for _ in 0..10 {
        pool.spawn(|_, counter: &Mutex<u32>| {
            *Locker::lock(counter) += 1;
            Ok(())
        });
    }
    assert!(pool.close().is_empty());
    assert_eq!(*Locker::lock(&*counter), 10);
}

#[test]
fn single_worker_runs_slow_then_fast_job() {
    let order: Arc<Mutex<Vec<&str>>> = Arc::new(Mutex::new(Vec::new()));
    let mut pool = WorkerPool::with_lock(1, Arc::clone(&order)).unwrap();
    let start = Instant::now();
    pool.run().unwrap();

    pool.spawn(|worker_id, order| {
        assert_eq!(worker_id, 0);
        thread::sleep(Duration::from_millis(100));
        Locker::lock(order).push("a");
        Ok(())
    });
    pool.spawn(|_, order| {
        Locker::lock(order).push("b");
        Ok(())
    });
    assert!(pool.close().is_empty());

    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(*Locker::lock(&*order), ["a", "b"]);
}

#[test]
fn panicking_job_does_not_stop_the_pool() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut pool = WorkerPool::new(2).unwrap();
    pool.run().unwrap();

    pool.spawn(|_, _| panic!("boom"));
    for _ in 0..10 {
        pool.spawn(counting_job(&counter));
    }
    let failures = pool.close();

    assert_eq!(counter.load(Ordering::SeqCst), 10);
    assert_eq!(failures.len(), 1);
    let panicked = failures
        .into_iter()
        .next()
        .unwrap()
        .into_error()
        .downcast::<JobPanicked>()
        .unwrap();
    assert_eq!(*panicked, JobPanicked("boom".to_owned()));
}

#[test]
fn each_worker_has_a_distinct_id() {
    let workers = 5;
    let ids = Arc::new(Mutex::new(HashSet::new()));
    // Every job holds its worker until all of them are running.
    let barrier = Arc::new(Barrier::new(workers));
    let mut pool = WorkerPool::with_lock(workers, Arc::clone(&ids)).unwrap();
    pool.run().unwrap();
    for _ in 0..workers {
        let barrier = Arc::clone(&barrier);
        pool.spawn(move |worker_id, ids: &Mutex<HashSet<usize>>| {
            Locker::lock(ids).insert(worker_id);
            barrier.wait();
            Ok(())
        });
    }
    assert!(pool.close().is_empty());
    assert_eq!(*Locker::lock(&*ids), (0..workers).collect::<HashSet<_>>());
}

#[test]
fn submit_blocks_while_the_queue_is_full() {
    let counter = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicBool::new(false));
    let release = Arc::new(Barrier::new(2));
    let mut pool = WorkerPool::builder()
        .workers(1)
        .queue_capacity(1)
        .build()
        .unwrap();
    pool.run().unwrap();

    {
        let counter = Arc::clone(&counter);
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        pool.spawn(move |_, _: &Mutex<()>| {
            started.store(true, Ordering::SeqCst);
            release.wait();
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    while !started.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
    // The only worker is parked, so this job takes the single slot.
    pool.spawn(counting_job(&counter));
    assert_eq!(pool.pending_jobs(), 1);

    let returned = AtomicBool::new(false);
    let returned_while_parked = scope(|s| {
        let pool = &pool;
        let counter = &counter;
        let returned = &returned;
        s.spawn(move |_| {
            pool.spawn(counting_job(counter));
            returned.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(100));
        let returned_while_parked = returned.load(Ordering::SeqCst);
        release.wait();
        returned_while_parked
    })
    .unwrap();

    assert!(!returned_while_parked);
    assert!(returned.load(Ordering::SeqCst));
    assert!(pool.close().is_empty());
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn rwlock_readers_share_the_lock() {
    let lock = Arc::new(RwLock::new(42u32));
    let barrier = Arc::new(Barrier::new(2));
    let mut pool = WorkerPool::with_lock(2, lock).unwrap();
    pool.run().unwrap();

    for _ in 0..2 {
        let barrier = Arc::clone(&barrier);
        pool.spawn(move |_, lock: &RwLock<u32>| {
            let value = SharedLocker::read(lock);
            // Both readers must hold the lock at the same time to pass.
            barrier.wait();
            if *value == 42 {
                Ok(())
            } else {
                Err("unexpected value".into())
            }
        });
    }
    assert!(pool.close().is_empty());
}

#[test]
fn many_producers_submit_concurrently() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut pool = WorkerPool::new(3).unwrap();
    pool.run().unwrap();

    scope(|s| {
        for _ in 0..4 {
            let pool = &pool;
            let counter = &counter;
            s.spawn(move |_| {
                for _ in 0..250 {
                    pool.spawn(counting_job(counter));
                }
            });
        }
    })
    .unwrap();

    assert!(pool.close().is_empty());
    assert_eq!(counter.load(Ordering::SeqCst), 1000);
}

#[test]
fn try_submit_hands_back_the_job_when_full() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut pool = WorkerPool::builder()
        .workers(1)
        .queue_capacity(1)
        .build()
        .unwrap();

    assert!(pool.try_submit(counting_job(&counter)).is_ok());
    let rejected = pool.try_submit(counting_job(&counter)).unwrap_err();
    assert!(rejected.is_full());
    assert_eq!(pool.pending_jobs(), 1);

    pool.run().unwrap();
    pool.submit_boxed(rejected.into_inner());
    assert!(pool.close().is_empty());
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn close_without_jobs_returns_immediately() {
    let mut pool = WorkerPool::new(4).unwrap();
    pool.run().unwrap();
    assert!(pool.close().is_empty());
}
