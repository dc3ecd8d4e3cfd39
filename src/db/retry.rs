use std::thread;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::StorageError;

/// Run a corpus call, retrying transient failures up to the policy's limit.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: impl FnMut() -> Result<T, StorageError>,
) -> Result<T, StorageError> {
    let mut attempt = 1;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                warn!(operation, attempt, %err, "transient corpus failure, retrying");
                thread::sleep(policy.backoff * attempt);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
