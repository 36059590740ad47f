//! Retry with a fixed backoff

use std::time::Duration;

use anyhow::Result;

/// Run `op` until it succeeds, sleeping `backoff` after every failure.
///
/// Never gives up. Returns the value and the number of attempts it took.
pub async fn retry_until_ok<T, F>(what: &str, backoff: Duration, mut op: F) -> (T, u32)
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 1;

    loop {
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded after {} attempts", what, attempt);
                }
                return (value, attempt);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to {} (attempt {}): {:#}; retrying in {:?}",
                    what,
                    attempt,
                    e,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
