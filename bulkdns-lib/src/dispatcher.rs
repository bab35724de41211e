//! Concurrent dispatch of NS queries across the resolver pool.
//!
//! The [`Dispatcher`] walks the domain stream in arrival order. Each domain
//! gets the next resolver in round-robin order, waits for a concurrency
//! slot, and is handed to a task owned by a `JoinSet`. Tasks report through
//! one mpsc channel, so whoever drains that channel is the only writer of
//! results.
//!
//! # Example
//!
//! ```rust,no_run
//! use bulkdns_lib::{Dispatcher, ResolveConfig, ResolverPool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = ResolverPool::new(["9.9.9.9", "1.1.1.1"])?;
//!     let dispatcher = Dispatcher::from_config(&ResolveConfig::default().with_concurrency(8), pool);
//!     for result in dispatcher.run(vec!["example.com".into(), "rust-lang.org".into()]).await {
//!         println!("{}: {}", result.domain, result.outcome);
//!     }
//!     Ok(())
//! }
//! ```

use crate::concurrent::ConcurrencyLimiter;
use crate::error::BulkDnsError;
use crate::pool::{ResolverEndpoint, ResolverPool};
use crate::query::QueryExecutor;
use crate::types::{QueryOutcome, QueryResult, ResolveConfig};
use futures::stream::{Stream, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Event emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// A domain got its resolver and a slot; its query is about to start.
    Assigned {
        index: usize,
        domain: String,
        resolver: ResolverEndpoint,
    },

    /// A query reached its terminal outcome.
    Completed(QueryResult),
}

/// Summary of a finished dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Domains taken from the input and launched
    pub dispatched: usize,

    /// Tasks whose result never reached the channel
    pub lost: usize,

    /// Read error that stopped intake, if any
    pub input_error: Option<BulkDnsError>,

    /// Most tasks held at once, finished or not. Never above the limiter
    /// capacity.
    pub peak_tasks: usize,
}

impl DispatchReport {
    fn reap(&mut self, joined: Result<bool, tokio::task::JoinError>) {
        match joined {
            Ok(true) => {}
            Ok(false) => self.lost += 1,
            Err(e) => {
                tracing::warn!(error = %e, "query task did not finish");
                self.lost += 1;
            }
        }
    }
}

/// Pairs domains with resolvers and runs their queries under a bound.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Arc<ResolverPool>,
    limiter: ConcurrencyLimiter,
    executor: Arc<QueryExecutor>,
}

impl Dispatcher {
    pub fn new(pool: ResolverPool, limiter: ConcurrencyLimiter, executor: QueryExecutor) -> Self {
        Self {
            pool: Arc::new(pool),
            limiter,
            executor: Arc::new(executor),
        }
    }

    /// Dispatcher using the limiter and transport described by `config`.
    pub fn from_config(config: &ResolveConfig, pool: ResolverPool) -> Self {
        Self::new(
            pool,
            ConcurrencyLimiter::new(config.concurrency),
            QueryExecutor::for_protocol(config.protocol, config.timeout),
        )
    }

    pub fn pool(&self) -> &ResolverPool {
        &self.pool
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Resolve every domain of `domains`, sending events to `events`.
    ///
    /// Domain `k` (0-based, in arrival order) always goes to resolver
    /// `k mod pool.len()`. Returns only after every launched query has
    /// reported. An input error stops intake but never cancels queries
    /// already in flight.
    ///
    /// The receiving side of `events` must be drained concurrently, or the
    /// dispatch stalls once the channel is full.
    pub async fn dispatch<S>(&self, domains: S, events: mpsc::Sender<DispatchEvent>) -> DispatchReport
    where
        S: Stream<Item = Result<String, BulkDnsError>>,
    {
        let mut domains = std::pin::pin!(domains);
        let mut tasks = JoinSet::new();
        let mut report = DispatchReport::default();
        let mut cursor = 0usize;

        while let Some(item) = domains.next().await {
            let domain = match item {
                Ok(domain) => domain,
                Err(e) => {
                    tracing::error!(error = %e, dispatched = report.dispatched, "stopping domain intake");
                    report.input_error = Some(e);
                    break;
                }
            };

            while let Some(joined) = tasks.try_join_next() {
                report.reap(joined);
            }
            // A task can release its slot a moment before it is reaped.
            if tasks.len() >= self.limiter.capacity() {
                if let Some(joined) = tasks.join_next().await {
                    report.reap(joined);
                }
            }

            let index = report.dispatched;
            let resolver = self.pool.select(cursor).clone();
            cursor = (cursor + 1) % self.pool.len();

            let slot = match self.limiter.acquire().await {
                Ok(slot) => slot,
                Err(e) => {
                    report.input_error = Some(e);
                    break;
                }
            };
            report.dispatched += 1;

            tracing::debug!(index, domain = %domain, resolver = %resolver, "dispatching");
            // A closed receiver only means nobody is listening any more.
            let _ = events
                .send(DispatchEvent::Assigned {
                    index,
                    domain: domain.clone(),
                    resolver: resolver.clone(),
                })
                .await;

            let executor = Arc::clone(&self.executor);
            let events = events.clone();
            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = AssertUnwindSafe(executor.execute(&domain, &resolver))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let cause = panic_message(panic.as_ref());
                        tracing::warn!(index, domain = %domain, cause = %cause, "query task panicked");
                        QueryOutcome::TaskFailed { cause }
                    });

                let result = QueryResult {
                    index,
                    domain,
                    resolver,
                    elapsed: started.elapsed(),
                    outcome,
                };
                tracing::debug!(
                    index,
                    domain = %result.domain,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    outcome = result.outcome.kind(),
                    "query finished"
                );
                // Hold the slot until the result is queued so sequential
                // runs report in input order.
                let delivered = events.send(DispatchEvent::Completed(result)).await.is_ok();
                slot.release();
                delivered
            });
            report.peak_tasks = report.peak_tasks.max(tasks.len());
        }
        drop(events);

        while let Some(joined) = tasks.join_next().await {
            report.reap(joined);
        }

        report
    }

    /// Resolve `domains` and collect the results in completion order.
    ///
    /// Use [`QueryResult::index`] to restore input order.
    pub async fn run(&self, domains: Vec<String>) -> Vec<QueryResult> {
        let (tx, mut rx) = mpsc::channel(self.limiter.capacity().saturating_mul(2).max(16));
        let input = futures::stream::iter(domains.into_iter().map(Ok));

        let collect = async {
            let mut results = Vec::new();
            while let Some(event) = rx.recv().await {
                if let DispatchEvent::Completed(result) = event {
                    results.push(result);
                }
            }
            results
        };

        let (_, results) = tokio::join!(self.dispatch(input, tx), collect);
        results
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
