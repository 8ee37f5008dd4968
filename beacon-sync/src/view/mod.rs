//! Views: the stores presentation subscribes to, and the operations on them
//!
//! A view owns its store and token streams. Watching a view starts an
//! adaptive refresh loop and hands back a [`ViewSession`]; closing or
//! dropping the session is the view's teardown.

mod list;
mod logs;
mod pipeline;

pub use list::PipelineList;
pub use logs::LogFeed;
pub use pipeline::PipelineView;

use tracing::debug;

use crate::scheduler::{AdaptiveRefreshScheduler, RefreshState};
use crate::sequencer::TokenStream;

type Cleanup = Box<dyn FnOnce() + Send>;

/// Lifetime of a watched view
///
/// Teardown stops the refresh timer and freezes every stream of the view,
/// so a fetch that completes afterwards cannot touch the store.
pub struct ViewSession {
    scheduler: AdaptiveRefreshScheduler,
    streams: Vec<TokenStream>,
    cleanup: Option<Cleanup>,
}

impl ViewSession {
    pub(crate) fn new(scheduler: AdaptiveRefreshScheduler, streams: Vec<TokenStream>) -> Self {
        Self {
            scheduler,
            streams,
            cleanup: None,
        }
    }

    pub(crate) fn on_close(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    /// Polls now instead of waiting for the current interval to elapse
    pub fn refresh_now(&self) {
        self.scheduler.refresh_now();
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.scheduler.state()
    }

    pub fn is_closed(&self) -> bool {
        !self.scheduler.is_running()
    }

    /// Tears the view down; same as dropping the session
    pub fn close(self) {}

    fn teardown(&mut self) {
        self.scheduler.stop();
        for stream in &self.streams {
            stream.freeze();
        }
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
        debug!(streams = self.streams.len(), "View closed");
    }
}

impl Drop for ViewSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
