use std::future::Future;

use tracing::warn;

use crate::{
    config::PageErrorPolicy,
    error::{FinderError, Result},
};

/// Result of a single upstream request, classified for the caller
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Ready(T),
    /// The same request may succeed if sent again
    Retryable(FinderError),
    Fatal(FinderError),
}

impl<T> From<Result<T>> for FetchOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => FetchOutcome::Ready(value),
            Err(e) if e.is_retryable() => FetchOutcome::Retryable(e),
            Err(e) => FetchOutcome::Fatal(e),
        }
    }
}

/// Run a request, retrying it when `policy` allows
///
/// Only [`PageErrorPolicy::Retry`] sends a request more than once; fatal
/// errors are returned on the first attempt under every policy.
pub async fn with_policy<T, F, Fut>(policy: PageErrorPolicy, what: &str, mut request: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchOutcome<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match request().await {
            FetchOutcome::Ready(value) => return Ok(value),
            FetchOutcome::Fatal(e) => return Err(e),
            FetchOutcome::Retryable(e) => match policy {
                PageErrorPolicy::Retry {
                    max_attempts,
                    initial_backoff,
                } if attempt < max_attempts => {
                    let delay = initial_backoff.saturating_mul(2u32.saturating_pow(attempt - 1));
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        what, attempt, max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(e),
            },
        }
    }
}
