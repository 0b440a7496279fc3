use futures::future::join_all;
use log::{info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time;

use super::error::{BatchError, OpError};
use super::executor;
use super::operation::{OperationRequest, OperationResult};
use crate::client::chain::ChainClient;
use crate::config::cfg::{BatchCfg, FixedFee};
use crate::config::key::Identity;

/// One operation fanned out over many identities.
///
/// Identities run in windows of `concurrency_limit`: concurrently within a
/// window, windows one after another.
#[derive(Clone, Debug)]
pub struct BatchJob {
    identities: Vec<Identity>,
    concurrency_limit: usize,
    per_item_delay: Duration,
    retry_backoff: Duration,
}

impl BatchJob {
    pub fn new(identities: Vec<Identity>, concurrency_limit: usize) -> Result<Self, BatchError> {
        if concurrency_limit == 0 {
            return Err(BatchError::ConcurrencyLimit);
        }

        let defaults = BatchCfg::default();
        Ok(Self {
            identities,
            concurrency_limit,
            per_item_delay: Duration::from_millis(defaults.per_item_delay_ms),
            retry_backoff: Duration::from_millis(defaults.retry_backoff_ms),
        })
    }

    pub fn from_cfg(identities: Vec<Identity>, cfg: &BatchCfg) -> Result<Self, BatchError> {
        Ok(Self::new(identities, cfg.concurrency_limit)?
            .per_item_delay(Duration::from_millis(cfg.per_item_delay_ms))
            .retry_backoff(Duration::from_millis(cfg.retry_backoff_ms)))
    }

    /// Staggers the start of the items inside a window.
    pub fn per_item_delay(mut self, delay: Duration) -> Self {
        self.per_item_delay = delay;
        self
    }

    /// Pause before a failed window is retried.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn windows(&self) -> impl Iterator<Item = &[Identity]> {
        self.identities.chunks(self.concurrency_limit)
    }
}

/// Runs `op_fn` once per identity of `job`.
///
/// A window with any failure is retried once in full after the job's backoff.
/// If it fails again every identity of that window is reported failed and the
/// run moves on to the next window. Results follow the input identity order.
pub async fn run_batch<F, Fut, T>(job: &BatchJob, op_fn: F) -> Vec<Result<T, BatchError>>
where
    F: Fn(Identity) -> Fut,
    Fut: Future<Output = Result<T, OpError>>,
{
    let mut results = Vec::with_capacity(job.identities.len());

    for (window_idx, window) in job.windows().enumerate() {
        let offset = window_idx * job.concurrency_limit;

        let mut outcome = run_window(job, window, &op_fn).await;
        if outcome.iter().any(Result::is_err) {
            warn!(
                "batch window {} had {} failures, retrying in {:?}",
                window_idx,
                outcome.iter().filter(|r| r.is_err()).count(),
                job.retry_backoff
            );
            time::sleep(job.retry_backoff).await;
            outcome = run_window(job, window, &op_fn).await;
        }

        if outcome.iter().all(Result::is_ok) {
            results.extend(outcome.into_iter().flatten().map(Ok));
            continue;
        }

        warn!(
            "batch window {} failed twice, marking {} identities failed",
            window_idx,
            window.len()
        );
        for (i, (res, identity)) in outcome.into_iter().zip(window).enumerate() {
            results.push(Err(match res {
                Err(source) => BatchError::Operation {
                    index: offset + i,
                    source,
                },
                Ok(_) => BatchError::WindowFailed {
                    window: window_idx,
                    identity: identity.to_string(),
                },
            }));
        }
    }

    info!(
        "batch finished: {}/{} succeeded",
        results.iter().filter(|r| r.is_ok()).count(),
        results.len()
    );

    results
}

/// Runs the same `request` for every identity of `job` through the executor.
pub async fn run_batch_request<C>(
    client: &C,
    job: &BatchJob,
    request: &OperationRequest,
    fee: Option<FixedFee>,
    deadline: Option<Duration>,
) -> Vec<Result<OperationResult, BatchError>>
where
    C: ChainClient + ?Sized,
{
    run_batch(job, move |identity| async move {
        executor::execute(client, &identity, request, fee, deadline).await
    })
    .await
}

async fn run_window<F, Fut, T>(
    job: &BatchJob,
    window: &[Identity],
    op_fn: &F,
) -> Vec<Result<T, OpError>>
where
    F: Fn(Identity) -> Fut,
    Fut: Future<Output = Result<T, OpError>>,
{
    join_all(window.iter().enumerate().map(|(i, identity)| {
        let delay = job.per_item_delay * i as u32;
        let fut = op_fn(identity.clone());
        async move {
            if !delay.is_zero() {
                time::sleep(delay).await;
            }
            fut.await
        }
    }))
    .await
}
