//! Bounded fan-out of copy tasks.

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::check_concurrency;
use crate::error::Result;
use crate::identifiers::Identifier;
use crate::outcome::TaskOutcome;

pub const CANCELLED_MESSAGE: &str = "cancelled before start";
pub const LOST_TASK_MESSAGE: &str = "task ended without reporting an outcome";

/// Runs one task per identifier with at most `max_concurrency` in flight.
///
/// There is no early exit: `run` returns once every identifier has an outcome.
pub struct Orchestrator {
    max_concurrency: usize,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Fails with a configuration error outside 1..=20.
    pub fn new(max_concurrency: usize) -> Result<Self> {
        check_concurrency(max_concurrency)?;
        Ok(Self {
            max_concurrency,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop dispatching new tasks once `cancel` fires. In-flight tasks finish.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `task_fn` for every identifier.
    ///
    /// `on_outcome` is called once per identifier, in completion order, from
    /// the calling task; keep it quick or it holds up dispatch.
    pub async fn run<F, Fut, C>(
        &self,
        identifiers: Vec<Identifier>,
        task_fn: F,
        mut on_outcome: C,
    ) -> Vec<TaskOutcome>
    where
        F: Fn(Identifier) -> Fut,
        Fut: Future<Output = TaskOutcome> + Send + 'static,
        C: FnMut(&TaskOutcome),
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        // Dispatched identifiers still owed an outcome.
        let mut in_flight: BTreeMap<Identifier, usize> = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(identifiers.len());
        let mut collect = |outcome: TaskOutcome, outcomes: &mut Vec<TaskOutcome>| {
            on_outcome(&outcome);
            outcomes.push(outcome);
        };

        for identifier in identifiers {
            let mut permit = None;
            while !self.cancel.is_cancelled() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        if let Some(outcome) = joined_outcome(joined, &mut in_flight) {
                            collect(outcome, &mut outcomes);
                        }
                    }
                    acquired = semaphore.clone().acquire_owned() => {
                        permit = acquired.ok();
                        break;
                    }
                }
            }

            // A permit can be won in the same wake-up that cancels the run.
            let permit = match permit {
                Some(permit) if !self.cancel.is_cancelled() => permit,
                _ => {
                    collect(
                        TaskOutcome::failed(identifier, Duration::ZERO, CANCELLED_MESSAGE),
                        &mut outcomes,
                    );
                    continue;
                }
            };

            *in_flight.entry(identifier.clone()).or_default() += 1;
            let started = Instant::now();
            let task = task_fn(identifier.clone());
            tasks.spawn(async move {
                let _permit = permit;
                match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => TaskOutcome::failed(
                        identifier,
                        started.elapsed(),
                        format!("task panicked: {}", panic_message(&*panic)),
                    ),
                }
            });
        }

        if self.cancel.is_cancelled() {
            info!(in_flight = tasks.len(), "cancelled; waiting for in-flight copies");
        }

        while let Some(joined) = tasks.join_next().await {
            if let Some(outcome) = joined_outcome(joined, &mut in_flight) {
                collect(outcome, &mut outcomes);
            }
        }

        for (identifier, missing) in in_flight {
            for _ in 0..missing {
                collect(
                    TaskOutcome::failed(identifier.clone(), Duration::ZERO, LOST_TASK_MESSAGE),
                    &mut outcomes,
                );
            }
        }

        outcomes
    }
}

fn joined_outcome(
    joined: std::result::Result<TaskOutcome, tokio::task::JoinError>,
    in_flight: &mut BTreeMap<Identifier, usize>,
) -> Option<TaskOutcome> {
    match joined {
        Ok(outcome) => {
            if let Some(count) = in_flight.get_mut(&outcome.identifier) {
                *count -= 1;
                if *count == 0 {
                    in_flight.remove(&outcome.identifier);
                }
            }
            Some(outcome)
        }
        Err(e) => {
            error!(error = %e, "copy task aborted");
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
