//! Bounded-concurrency worker pool.
//!
//! Jobs are dispatched in submission order by a single dispatcher task,
//! gated by a semaphore (`concurrency`) and a per-pool rate ceiling.
//! `wait` blocks until every listed job has completed and surfaces the
//! first error by completion order; the remaining jobs still run to
//! completion and are logged. Cancelling the pool abandons queued jobs and
//! hands in-flight jobs a cancelled token.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::{Error, Result};

type JobFuture = BoxFuture<'static, Result<()>>;
type Job = Box<dyn FnOnce(CancellationToken) -> JobFuture + Send + 'static>;

struct Completion {
    seq: u64,
    error: Option<Error>,
}

struct PoolShared {
    done: Mutex<HashMap<u64, Completion>>,
    completed_seq: AtomicU64,
    notify: Notify,
}

impl PoolShared {
    fn complete(&self, id: u64, error: Option<Error>) {
        if let Some(err) = &error {
            error!(job_id = id, error = %err, "worker job failed");
        }
        let seq = self.completed_seq.fetch_add(1, Ordering::SeqCst);
        self.done
            .lock()
            .expect("pool completion lock poisoned")
            .insert(id, Completion { seq, error });
        self.notify.notify_waiters();
    }
}

pub struct WorkerPool {
    tx: mpsc::UnboundedSender<(u64, Job)>,
    next_id: AtomicU64,
    shared: Arc<PoolShared>,
    token: CancellationToken,
}

impl WorkerPool {
    pub fn new(concurrency: usize, rate_per_sec: u32, token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(PoolShared {
            done: Mutex::new(HashMap::new()),
            completed_seq: AtomicU64::new(0),
            notify: Notify::new(),
        });
        tokio::spawn(dispatch(
            rx,
            concurrency.max(1),
            rate_per_sec.max(1),
            Arc::clone(&shared),
            token.clone(),
        ));
        Self {
            tx,
            next_id: AtomicU64::new(1),
            shared,
            token,
        }
    }

    /// Enqueue a job. Non-blocking; returns a monotonically increasing id.
    pub fn submit<F, Fut>(&self, f: F) -> u64
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job: Job = Box::new(move |token| Box::pin(f(token)));
        if self.tx.send((id, job)).is_err() {
            // dispatcher already shut down
            self.shared.complete(id, Some(Error::Cancelled));
        }
        id
    }

    /// Wait until every id has completed. Returns the first job error in
    /// completion order, or a cancellation error as soon as the pool's
    /// token fires.
    pub async fn wait(&self, ids: &[u64]) -> Result<()> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut done = self.shared.done.lock().expect("pool completion lock poisoned");
                if ids.iter().all(|id| done.contains_key(id)) {
                    let mut first_id = None;
                    let mut first_seq = u64::MAX;
                    for id in ids {
                        let completion = &done[id];
                        if completion.error.is_some() && completion.seq < first_seq {
                            first_seq = completion.seq;
                            first_id = Some(*id);
                        }
                    }
                    return match first_id {
                        Some(id) => {
                            let err = done
                                .get_mut(&id)
                                .and_then(|c| c.error.take())
                                .unwrap_or(Error::Cancelled);
                            Err(err)
                        }
                        None => Ok(()),
                    };
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = self.token.cancelled() => return Err(Error::Cancelled),
            }
        }
    }

    /// `wait`, but also returning promptly when the caller's own context
    /// is cancelled while jobs are still draining.
    pub async fn wait_with_token(&self, ids: &[u64], token: &CancellationToken) -> Result<()> {
        tokio::select! {
            result = self.wait(ids) => result,
            _ = token.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Abandon queued jobs and cancel in-flight ones.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<(u64, Job)>,
    concurrency: usize,
    rate_per_sec: u32,
    shared: Arc<PoolShared>,
    token: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let min_interval = Duration::from_secs(1) / rate_per_sec;
    let mut next_dispatch = tokio::time::Instant::now();

    loop {
        let (id, job) = tokio::select! {
            _ = token.cancelled() => break,
            received = rx.recv() => match received {
                Some(pair) => pair,
                None => return, // pool dropped, nothing queued
            },
        };

        tokio::select! {
            _ = tokio::time::sleep_until(next_dispatch) => {}
            _ = token.cancelled() => {
                shared.complete(id, Some(Error::Cancelled));
                break;
            }
        }
        next_dispatch = tokio::time::Instant::now() + min_interval;

        let permit = tokio::select! {
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
            _ = token.cancelled() => {
                shared.complete(id, Some(Error::Cancelled));
                break;
            }
        };

        let shared = Arc::clone(&shared);
        let job_token = token.child_token();
        tokio::spawn(async move {
            let result = job(job_token).await;
            drop(permit);
            shared.complete(id, result.err());
        });
    }

    // abandon everything still queued
    while let Ok((id, _job)) = rx.try_recv() {
        shared.complete(id, Some(Error::Cancelled));
    }
}
