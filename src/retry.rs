// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded polling with a fixed interval.
//!
//! Engine and cluster startup are observed by polling rather than by
//! watching, so every wait in the crate goes through [`Poller`]. Sleeping is
//! delegated to a [`Clock`] so tests can run the loops without waiting, and
//! the poller's [`CancellationToken`] is checked before every attempt and
//! while sleeping.

use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Source of sleeps for polling loops
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Why a poll gave up
#[derive(Debug)]
pub enum PollError<E> {
    /// Attempts or deadline exhausted; carries the last failure
    Exhausted { attempts: u32, last: E },
    Cancelled,
}

#[derive(Clone)]
pub struct Poller {
    attempts: u32,
    interval: Duration,
    deadline: Option<Duration>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(
        attempts: u32,
        interval: Duration,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
            deadline: None,
            clock,
            cancel,
        }
    }

    /// Stop once this much time has been spent sleeping
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `check` until it succeeds, sleeping `interval` between failures.
    pub async fn poll<F, Fut, T, E>(&self, what: &str, mut check: F) -> Result<T, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut slept = Duration::ZERO;
        let mut attempt = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            attempt += 1;
            let last = match check().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let past_deadline = self
                .deadline
                .is_some_and(|deadline| slept + self.interval > deadline);
            if attempt >= self.attempts || past_deadline {
                return Err(PollError::Exhausted {
                    attempts: attempt,
                    last,
                });
            }

            debug!(attempt, error = %last, "Still waiting for {}", what);

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
                _ = self.clock.sleep(self.interval) => {}
            }
            slept += self.interval;
        }
    }
}
