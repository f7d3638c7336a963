use std::fmt;
use std::process::exit;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info};
use rand::Rng;

use thdpool::{Job, JobError, JobFailure, Locker, Result, WorkerPool};

const DEFAULT_WORKS: usize = 100;
const DEFAULT_MAX_SLEEP_MS: u64 = 1000;

#[derive(Parser)]
#[command(
    name = "thdpool-sleep",
    version,
    about = "Run a batch of sleeping jobs on a worker pool"
)]
struct Cli {
    /// Number of worker threads [default: number of CPUs]
    #[arg(short = 't', long, value_name = "N")]
    threads: Option<usize>,

    /// Number of jobs to submit
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKS, value_name = "M")]
    works: usize,

    /// Upper bound of each job's random sleep, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_SLEEP_MS, value_name = "MS")]
    max_sleep_ms: u64,

    /// Make every K-th job fail (0 disables failures)
    #[arg(long, default_value_t = 0, value_name = "K")]
    fail_every: usize,

    /// Share a read-write lock instead of a mutex
    #[arg(long)]
    rwlock: bool,
}

/// A job that sleeps for a while and optionally fails.
#[derive(Debug)]
struct SleepWork {
    work_id: usize,
    duration: Duration,
    fail: bool,
}

#[derive(Debug)]
struct WorkFailed(usize);

impl fmt::Display for WorkFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "work {} failed on purpose", self.0)
    }
}

impl std::error::Error for WorkFailed {}

impl<L: Locker> Job<L> for SleepWork {
    fn execute(
        self: Box<Self>,
        worker_id: usize,
        _lock: &L,
    ) -> std::result::Result<(), JobError> {
        info!("worker {worker_id} start work {:?}", self);
        thread::sleep(self.duration);
        info!("worker {worker_id} done work {}", self.work_id);

        if self.fail {
            return Err(Box::new(WorkFailed(self.work_id)));
        }
        Ok(())
    }
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(failures) if failures.is_empty() => {}
        Ok(failures) => {
            for failure in &failures {
                error!("{}", failure);
            }
            error!("{} works failed", failures.len());
            exit(1);
        }
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<Vec<JobFailure>> {
    let threads = cli.threads.unwrap_or_else(num_cpus::get);

    info!("thdpool-sleep {}", env!("CARGO_PKG_VERSION"));
    info!(
        "{} works on {} workers ({})",
        cli.works,
        threads,
        if cli.rwlock { "rwlock" } else { "mutex" }
    );

    let works = make_works(&cli);
    let started = Instant::now();
    let failures = if cli.rwlock {
        let lock = Arc::new(RwLock::new(()));
        run_works(WorkerPool::with_lock(threads, lock)?, works)?
    } else {
        run_works(WorkerPool::new(threads)?, works)?
    };
    info!("finished in {:?}", started.elapsed());

    Ok(failures)
}

fn make_works(cli: &Cli) -> Vec<SleepWork> {
    let mut rng = rand::thread_rng();
    (0..cli.works)
        .map(|work_id| SleepWork {
            work_id,
            duration: Duration::from_millis(rng.gen_range(0..=cli.max_sleep_ms)),
            fail: cli.fail_every > 0 && (work_id + 1) % cli.fail_every == 0,
        })
        .collect()
}

fn run_works<L: Locker>(
    mut pool: WorkerPool<L>,
    works: Vec<SleepWork>,
) -> Result<Vec<JobFailure>> {
    pool.run()?;
    pool.submit_all(works);
    Ok(pool.close())
}
