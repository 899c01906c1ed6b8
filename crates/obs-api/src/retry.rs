//! Transparent retry of calls the OBS answers with `503 Service Unavailable`.
//!
//! OBS instances shed load with 503s at random, sometimes as a proper status code and sometimes
//! as an HTML error page inside a `200` answer. Both surface as
//! [`ObsError::ServiceUnavailable`] and are retried here without limit. Every other error is
//! returned on the spot.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ObsError;

/// Run `op` until it yields something other than a transient error.
///
/// `call_site` names the operation in the retry log. `delay` is slept between attempts; a zero
/// delay retries immediately.
pub async fn transparent_retry<T, F, Fut>(
    call_site: &'static str,
    delay: Duration,
    mut op: F,
) -> Result<T, ObsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ObsError>>,
{
    let mut attempt: u64 = 0;
    loop {
        match op().await {
            Err(err) if err.is_transient() => {
                attempt += 1;
                warn!(call_site, attempt, error = %err, "Transient upstream failure, retrying.");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            other => return other,
        }
    }
}
