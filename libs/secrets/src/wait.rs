//! Bounded waiting on a watched value

use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("timeout: '{0}' event")]
    TimedOut(&'static str),
    #[error("'{0}' event source closed")]
    Closed(&'static str),
}

/// Wait until `predicate` holds for the watched value.
///
/// A zero `timeout` waits indefinitely. The current value is checked first,
/// so a condition that already holds resolves without suspending. Each call
/// waits independently of any other waiter on the same channel.
pub async fn once_with_timeout<T, F>(
    mut rx: watch::Receiver<T>,
    event: &'static str,
    timeout: Duration,
    mut predicate: F,
) -> Result<(), WaitError>
where
    F: FnMut(&T) -> bool,
{
    let wait = async {
        rx.wait_for(|value| predicate(value))
            .await
            .map(|_| ())
            .map_err(|_| WaitError::Closed(event))
    };

    if timeout.is_zero() {
        return wait.await;
    }

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(WaitError::TimedOut(event)),
    }
}
