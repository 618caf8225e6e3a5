use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, warn};

use crate::error::ProxyError;

/// Total number of upstream attempts per logical call.
pub const MAX_ATTEMPTS: u32 = 3;

/// Delay slept after failed attempt `attempt` (0-indexed): 1s, 2s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

/// Runs `call` up to [`MAX_ATTEMPTS`] times with exponential backoff.
///
/// `call` resolves to the parsed upstream body on success, or to a
/// failure detail (the upstream error body, or a transport/parse error
/// message). Only a successful attempt returns early; everything else
/// is remembered as the last error and surfaced once attempts run out.
///
/// `sleep` is passed in rather than hardcoded so tests can drive the
/// loop without waiting on the wall clock.
pub async fn fetch_with_retry<C, CF, S, SF>(mut call: C, sleep: S) -> Result<Value, ProxyError>
where
    C: FnMut() -> CF,
    CF: Future<Output = Result<Value, String>>,
    S: Fn(Duration) -> SF,
    SF: Future<Output = ()>,
{
    let mut last_error = String::new();

    for attempt in 0..MAX_ATTEMPTS {
        match call().await {
            Ok(body) => return Ok(body),
            Err(detail) => {
                warn!(
                    "upstream attempt {}/{} failed: {}",
                    attempt + 1,
                    MAX_ATTEMPTS,
                    detail
                );
                last_error = detail;
            }
        }

        if attempt + 1 < MAX_ATTEMPTS {
            sleep(backoff_delay(attempt)).await;
        }
    }

    error!("giving up after {} attempts", MAX_ATTEMPTS);
    Err(ProxyError::Upstream {
        attempts: MAX_ATTEMPTS,
        detail: last_error,
    })
}
