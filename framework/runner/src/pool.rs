use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use parking_lot::Mutex;

use crate::executor::Executor;

pub(crate) type Job = Box<dyn FnOnce(&Executor) + Send + 'static>;

/// A fixed number of named worker threads taking jobs from a shared queue.
///
/// Workers never share memory with the scheduler other than through the queue and whatever
/// channels the jobs carry. A stuck worker therefore cannot block the scheduler, it can only be
/// left behind.
pub(crate) struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    done: Receiver<usize>,
    executor: Executor,
}

/// Tells the pool that a worker has exited, however it exits.
struct DoneSignal {
    index: usize,
    sender: Sender<usize>,
}

impl Drop for DoneSignal {
    fn drop(&mut self) {
        let _ = self.sender.send(self.index);
    }
}

impl WorkerPool {
    pub(crate) fn new(size: usize, executor: Executor) -> anyhow::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let (done_sender, done) = mpsc::channel();

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(size),
            done,
            executor,
        };

        for index in 0..size {
            let receiver = receiver.clone();
            let executor = pool.executor.clone();
            let signal = DoneSignal {
                index,
                sender: done_sender.clone(),
            };

            // If this fails the pool is dropped, which stops the workers started so far.
            let handle = std::thread::Builder::new()
                .name(format!("cloudstorm-worker-{index}"))
                .spawn(move || {
                    let _signal = signal;
                    worker_loop(index, &receiver, &executor);
                })
                .context("Failed to spawn worker thread")?;
            pool.workers.push(handle);
        }

        log::trace!("Started worker pool with {size} workers");
        Ok(pool)
    }

    pub(crate) fn executor(&self) -> &Executor {
        &self.executor
    }

    pub(crate) fn submit(&self, job: Job) -> anyhow::Result<()> {
        self.sender
            .as_ref()
            .context("Worker pool is closed")?
            .send(job)
            .map_err(|_| anyhow::anyhow!("Every worker in the pool has exited"))
    }

    /// Stop accepting jobs and wait for the workers to finish.
    ///
    /// Workers get `grace` to drain the queue. The pool is then cancelled and cooperative workers
    /// get `grace` again. Any worker still running after that is detached.
    pub(crate) fn close_and_join(mut self, grace: Duration) {
        drop(self.sender.take());

        let mut running = self.workers.len();
        running -= self.wait_for_exits(running, grace);

        if running > 0 {
            log::debug!("{running} worker(s) still busy after {grace:?}, cancelling the pool");
            self.executor.cancel();
            running -= self.wait_for_exits(running, grace);
        }

        if running > 0 {
            log::warn!("Detaching {running} worker(s) that did not stop after being cancelled");
        }

        self.join_finished();
    }

    /// Cancel the pool and give in-flight jobs up to `grace` to return before detaching them.
    pub(crate) fn cancel_and_join(mut self, grace: Duration) {
        drop(self.sender.take());
        self.executor.cancel();

        let running = self.workers.len();
        let left = running - self.wait_for_exits(running, grace);
        if left > 0 {
            log::warn!("Detaching {left} worker(s) that did not stop after being cancelled");
        }

        self.join_finished();
    }

    /// Cancel the pool and detach the workers without waiting for them.
    ///
    /// Queued jobs are dropped and in-flight jobs see the cancellation through their executor.
    pub(crate) fn terminate(self) {
        log::trace!("Terminating worker pool");
        // Drop does the work.
    }

    /// Wait until `expected` workers have exited or `grace` has passed. Returns how many exited.
    ///
    /// A `grace` too long to be represented as a deadline means waiting without a limit.
    fn wait_for_exits(&self, expected: usize, grace: Duration) -> usize {
        let deadline = Instant::now().checked_add(grace);
        let mut exited = 0;
        while exited < expected {
            let received = match deadline {
                Some(deadline) => self
                    .done
                    .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    .ok(),
                None => self.done.recv().ok(),
            };
            let Some(index) = received else {
                break;
            };
            log::trace!("Worker {index} exited");
            exited += 1;
        }
        exited
    }

    fn join_finished(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    log::error!("Worker thread panicked: {e:?}");
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            self.executor.cancel();
            drop(sender);
        }
    }
}

fn worker_loop(index: usize, receiver: &Mutex<Receiver<Job>>, executor: &Executor) {
    loop {
        if executor.is_cancelled() {
            log::trace!("Worker {index} stopping, pool cancelled");
            break;
        }

        let job = receiver.lock().recv();
        let Ok(job) = job else {
            log::trace!("Worker {index} stopping, queue closed");
            break;
        };

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| job(executor))) {
            log::error!(
                "Job on worker {index} panicked: {}",
                cloudstorm_core::prelude::IterationError::panic(&*payload).message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudstorm_core::prelude::CancelHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool(size: usize) -> (tokio::runtime::Runtime, WorkerPool) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let executor = Executor::new(runtime.handle().clone(), CancelHandle::new());
        let pool = WorkerPool::new(size, executor).unwrap();
        (runtime, pool)
    }

    #[test]
    fn runs_every_submitted_job() {
        let (_runtime, pool) = pool(3);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = counter.clone();
            pool.submit(Box::new(move |_: &Executor| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        pool.close_and_join(Duration::from_secs(5));

        assert_eq!(10, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn a_panicking_job_does_not_kill_its_worker() {
        let (_runtime, pool) = pool(1);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(Box::new(|_: &Executor| panic!("job failed"))).unwrap();
        let after = counter.clone();
        pool.submit(Box::new(move |_: &Executor| {
            after.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        pool.close_and_join(Duration::from_secs(5));

        assert_eq!(1, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn close_cancels_cooperative_workers_after_the_grace_period() {
        let (_runtime, pool) = pool(1);
        let (sender, receiver) = mpsc::channel();

        pool.submit(Box::new(move |executor: &Executor| {
            let slept = executor.sleep(Duration::from_secs(60));
            let _ = sender.send(slept.is_err());
        }))
        .unwrap();

        let start = Instant::now();
        pool.close_and_join(Duration::from_millis(100));

        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(receiver.recv_timeout(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn a_grace_period_past_the_end_of_time_waits_for_the_workers() {
        let (_runtime, pool) = pool(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let counter = counter.clone();
            pool.submit(Box::new(move |_: &Executor| {
                std::thread::sleep(Duration::from_millis(20));
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        pool.close_and_join(Duration::MAX);

        assert_eq!(2, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn terminate_drops_queued_jobs() {
        let (_runtime, pool) = pool(1);
        let executor = pool.executor().clone();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(Box::new(|executor: &Executor| {
            let _ = executor.sleep(Duration::from_secs(60));
        }))
        .unwrap();
        let queued = counter.clone();
        pool.submit(Box::new(move |_: &Executor| {
            queued.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        pool.terminate();

        assert!(executor.is_cancelled());
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(0, counter.load(Ordering::SeqCst));
    }
}
