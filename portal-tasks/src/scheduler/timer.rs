//! Cancellable trigger sequence driven by a [`ScheduleSpec`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::calculator::next_run_time;
use super::schedule::ScheduleSpec;

/// Lazy sequence of trigger timestamps.
///
/// Each call to [`next`](Self::next) sleeps until the next run time computed
/// from the current wall clock and yields the time the wait completed.
/// Cancellation ends the sequence without yielding a final element, and an
/// ended timer stays ended; build a new one to resume.
///
/// A degenerate spec (zero interval, or no configured times) fires once
/// immediately and then ends.
pub struct ScheduledTimer {
    spec: ScheduleSpec,
    cancellation_token: CancellationToken,
    finished: bool,
}

impl ScheduledTimer {
    pub fn new(spec: ScheduleSpec, cancellation_token: CancellationToken) -> Self {
        Self {
            spec,
            cancellation_token,
            finished: false,
        }
    }

    pub fn spec(&self) -> &ScheduleSpec {
        &self.spec
    }

    /// Instant the next trigger would fire if waited for from `now`.
    pub fn next_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        next_run_time(&self.spec, now)
    }

    /// Whether the sequence has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Wait for the next trigger.
    ///
    /// Returns `None` once cancelled or exhausted.
    pub async fn next(&mut self) -> Option<DateTime<Utc>> {
        if self.finished {
            return None;
        }
        if self.cancellation_token.is_cancelled() {
            self.finished = true;
            return None;
        }

        let now = Utc::now();
        let target = next_run_time(&self.spec, now);
        let delay = delay_until(target, now);
        trace!(%target, ?delay, "Waiting for next scheduled run");

        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    self.finished = true;
                    return None;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if self.spec.is_degenerate() {
            self.finished = true;
        }

        Some(Utc::now())
    }

    /// Convert the timer into a [`Stream`] of trigger timestamps.
    pub fn into_stream(self) -> impl Stream<Item = DateTime<Utc>> + Send {
        stream::unfold(self, |mut timer| async move {
            let fired = timer.next().await?;
            Some((fired, timer))
        })
    }
}

/// Sleep until the next run time of `spec`.
///
/// Returns `false` if cancelled before the run time was reached.
pub async fn wait_until_next(spec: &ScheduleSpec, cancellation_token: &CancellationToken) -> bool {
    let now = Utc::now();
    let delay = delay_until(next_run_time(spec, now), now);

    tokio::select! {
        biased;
        _ = cancellation_token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

fn delay_until(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}
