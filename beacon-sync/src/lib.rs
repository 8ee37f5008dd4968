//! Beacon Sync
//!
//! Keeps locally held views of pipelines, jobs and logs consistent with the
//! controller without a push channel. Views poll on an adaptive interval,
//! discard results of superseded requests, commit mutations optimistically
//! with rollback, and query the pipeline list page by page behind a
//! debounced filter.
//!
//! Presentation subscribes to a view's [`Store`] and redraws when the state's
//! `revision` moves; nothing in this crate refers back to presentation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use beacon_client::ControllerClient;
//! use beacon_sync::{PipelineView, RequestSequencer, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig::from_env()?;
//!     let client = Arc::new(ControllerClient::new(&config.controller_url));
//!     let sequencer = RequestSequencer::new();
//!
//!     let view = Arc::new(PipelineView::new(
//!         uuid::Uuid::new_v4(),
//!         client.clone(),
//!         client,
//!         &sequencer,
//!     ));
//!     let session = view.watch(config.backoff_policy());
//!
//!     let mut updates = view.store().subscribe();
//!     updates.changed().await?;
//!     if let Some(detail) = updates.borrow().entity() {
//!         println!("{} is {}", detail.pipeline.name, detail.pipeline.status);
//!     }
//!
//!     session.close();
//!     Ok(())
//! }
//! ```

pub mod change;
pub mod config;
pub mod error;
pub mod mutation;
pub mod query;
pub mod scheduler;
pub mod sequencer;
pub mod source;
pub mod store;
pub mod view;

#[cfg(test)]
mod testing;

pub use change::ChangeDetector;
pub use config::SyncConfig;
pub use error::{ErrorKind, Result, SyncError, ViewError};
pub use mutation::OptimisticMutationCoordinator;
pub use query::PaginatedFilterQuery;
pub use scheduler::{AdaptiveRefreshScheduler, BackoffPolicy, Refresh};
pub use sequencer::{RequestSequencer, RequestToken, StreamId, TokenStream};
pub use source::{FetchSource, MutationSink};
pub use store::{Applied, LoadState, Snapshot, Store, ViewState};
pub use view::{LogFeed, PipelineList, PipelineView, ViewSession};
