//! Call Timeouts
//!
//! Every model call is bounded; an elapsed deadline becomes
//! [`LensError::Timeout`] so the router can fail over like any other error.

use std::future::Future;
use std::time::Duration;

use crate::types::{LensError, Result};

/// Execute an async operation with a timeout
///
/// # Example
///
/// ```ignore
/// let text = with_timeout(
///     Duration::from_secs(30),
///     backend.call(system_prompt, &inputs),
///     "openai call",
/// ).await?;
/// ```
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(LensError::timeout(operation_name, timeout)),
    }
}
