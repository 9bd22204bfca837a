//! Deadline wrapper for driver operations
//!
//! Every probe, navigation and surface operation races its own deadline.
//! The losing future is dropped; whatever it held is released by the
//! caller's teardown, not here.

use std::future::Future;
use std::time::Duration;

use crate::browser::DriverError;

/// Run `operation` with a deadline of `limit`.
///
/// # Returns
/// * `Ok(T)` - operation finished in time and succeeded
/// * `Err(DriverError::Timeout)` - deadline hit first
/// * `Err(_)` - operation failed on its own
pub async fn with_timeout<F, T>(
    operation: F,
    limit: Duration,
    operation_name: &str,
) -> Result<T, DriverError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::timeout(operation_name, limit)),
    }
}
