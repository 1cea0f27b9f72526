//! Best-effort side actions
//!
//! Welcome emails, service-request auto-completion and post-provision syncs
//! must never fail the stage that triggered them. Routing them through one
//! combinator makes that contract explicit and testable.

use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

/// Await a fallible side action, logging failure and continuing.
///
/// The stage outcome is already decided by the time a side action runs; an
/// error here is operator-visible in the logs only.
pub async fn best_effort<T, E, F>(action: &'static str, fut: F)
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(_) => debug!(action, "Best-effort side action completed"),
        Err(err) => warn!(action, error = %err, "Best-effort side action failed"),
    }
}
