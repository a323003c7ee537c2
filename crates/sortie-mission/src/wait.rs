use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::MissionError;

/// Polls `ready` every `interval` until it returns `Ok(true)`.
///
/// `deadline: None` waits forever. Errors from `ready` are returned
/// immediately; a false poll after `deadline` has elapsed yields
/// [`MissionError::Timeout`]. Each iteration is poll, decide, sleep.
pub async fn wait_until<F, Fut>(
    what: &str,
    interval: Duration,
    deadline: Option<Duration>,
    mut ready: F,
) -> Result<(), MissionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, MissionError>>,
{
    let started = Instant::now();
    loop {
        if ready().await? {
            return Ok(());
        }
        if let Some(limit) = deadline {
            let waited = started.elapsed();
            if waited >= limit {
                return Err(MissionError::Timeout { what: what.to_string(), waited });
            }
        }
        tokio::time::sleep(interval).await;
    }
}
