//! Exponential backoff for retrying transient failures, adapted from
//! `jason/src/rpc/backoff_delayer.rs` (there used for reconnecting the
//! RPC transport) to `tokio::time::sleep` instead of a platform-specific
//! delay function.

use std::time::Duration;

use backoff::{future::Retry, ExponentialBackoff};
use futures::future::BoxFuture;

/// [`ExponentialBackoff`] adapted for the `tokio` runtime.
pub struct BackoffDelayer(ExponentialBackoff);

impl BackoffDelayer {
    pub fn new(
        initial_interval: Duration,
        multiplier: f64,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
    ) -> Self {
        let max_interval = max_elapsed_time.map_or(max_interval, |max| max_interval.min(max));
        let initial_interval = initial_interval.min(max_interval);

        Self(ExponentialBackoff {
            current_interval: initial_interval,
            initial_interval,
            randomization_factor: 0.0,
            multiplier,
            max_interval,
            max_elapsed_time,
            ..ExponentialBackoff::default()
        })
    }

    /// Retries `operation` according to this delayer's policy until it
    /// succeeds or `backoff::Error::Permanent` is returned.
    pub async fn retry<F, Fut, I, E>(self, operation: F) -> Result<I, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<I, backoff::Error<E>>>,
    {
        Retry::new(Sleeper, self.0, |_, _| {}, operation).await
    }
}

struct Sleeper;

impl backoff::future::Sleeper for Sleeper {
    type Sleep = BoxFuture<'static, ()>;

    fn sleep(&self, dur: Duration) -> Self::Sleep {
        Box::pin(tokio::time::sleep(dur))
    }
}
