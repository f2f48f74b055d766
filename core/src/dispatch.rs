//! Work queues for `Session::perform_async`.
//!
//! A queue only has to run a boxed job somewhere other than the caller's
//! stack. The completion callback runs on whichever thread the queue picked.

use tracing::warn;

/// A unit of work submitted to a queue.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A concurrent executor that runs blocking jobs.
///
/// Every submitted job must run exactly once, even if the executor is
/// shutting down; `perform_async` relies on it to deliver its completion.
pub trait WorkQueue {
    fn submit(&self, job: Job);
}

/// A job that falls back to a dedicated thread if dropped before running.
struct BlockingJob(Option<Job>);

impl BlockingJob {
    fn run(mut self) {
        if let Some(job) = self.0.take() {
            job();
        }
    }
}

impl Drop for BlockingJob {
    fn drop(&mut self) {
        if let Some(job) = self.0.take() {
            warn!("runtime dropped a blocking job; running it on a dedicated thread");
            std::thread::spawn(job);
        }
    }
}

/// Runs jobs on tokio's blocking thread pool.
///
/// A runtime that has shut down drops new blocking tasks without running
/// them; such jobs run on a fresh OS thread instead.
impl WorkQueue for tokio::runtime::Handle {
    fn submit(&self, job: Job) {
        let job = BlockingJob(Some(job));
        drop(self.spawn_blocking(move || job.run()));
    }
}

/// Runs every job on a fresh, detached OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadQueue;

impl WorkQueue for ThreadQueue {
    fn submit(&self, job: Job) {
        std::thread::spawn(job);
    }
}
