//! Polling waits against the host document

use std::time::Duration;
use tokio::time::Instant;

/// Poll `check` every `poll` until it yields a value or `timeout` elapses.
///
/// `check` runs once immediately. Every wait yields to the runtime between
/// polls; a timeout returns `None` rather than an error.
pub async fn wait_until<T, F>(poll: Duration, timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(poll).await;
    }
}
