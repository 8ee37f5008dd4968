//! Adaptive refresh scheduling
//!
//! Views have no push channel from the controller, so they poll. The loop
//! is self-paced: the next tick is armed when the previous fetch completes,
//! at an interval that drops to a floor after a detected change and grows
//! geometrically toward a ceiling while nothing changes.

mod backoff;
mod refresher;

pub use backoff::{BackoffPolicy, Phase, RefreshState};
pub use refresher::AdaptiveRefreshScheduler;

use async_trait::async_trait;

use crate::error::Result;

/// Something the scheduler can poll
#[async_trait]
pub trait Refresh: Send + Sync {
    /// Fetches once and commits the result
    ///
    /// # Returns
    /// Whether the held state changed. Errors are logged by the scheduler and
    /// count as "no change"; they never stop the loop.
    async fn refresh(&self) -> Result<bool>;
}
