//! Held snapshot and load state of one view
//!
//! The store is the single owner of a view's snapshot. Presentation observes
//! it through a `watch` receiver; the store never refers back to observers.
//! Every commit checks its request token inside the channel's write lock, so
//! the check and the write cannot interleave with a newer issue.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::change::ChangeDetector;
use crate::error::{SyncError, ViewError};
use crate::sequencer::{RequestToken, TokenStream};

/// Whether a snapshot came from the controller or from a local mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Fetched,
    Optimistic,
}

/// Immutable copy of server state, replaced wholesale on each commit
#[derive(Debug)]
pub struct Snapshot<T> {
    pub entity: T,
    pub fetched_at: DateTime<Utc>,
    /// Token under which this snapshot was committed
    pub token: RequestToken,
    pub origin: Origin,
    /// For optimistic snapshots, the last fetched state they were derived from
    base: Option<Arc<Snapshot<T>>>,
}

impl<T> Snapshot<T> {
    pub(crate) fn fetched(entity: T, token: RequestToken) -> Self {
        Self {
            entity,
            fetched_at: Utc::now(),
            token,
            origin: Origin::Fetched,
            base: None,
        }
    }

    pub(crate) fn optimistic(entity: T, token: RequestToken, base: Arc<Snapshot<T>>) -> Self {
        Self {
            entity,
            fetched_at: base.fetched_at,
            token,
            origin: Origin::Optimistic,
            base: Some(base),
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.origin == Origin::Optimistic
    }

    /// Most recent non-optimistic snapshot behind `this` (itself if fetched)
    pub(crate) fn base_of(this: &Arc<Snapshot<T>>) -> Arc<Snapshot<T>> {
        match &this.base {
            Some(base) => Arc::clone(base),
            None => Arc::clone(this),
        }
    }
}

/// Load state exposed to presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
    Error,
}

/// Everything presentation needs to draw a view
#[derive(Debug)]
pub struct ViewState<T> {
    pub snapshot: Option<Arc<Snapshot<T>>>,
    pub status: LoadState,
    /// Set while `status` is [`LoadState::Error`]
    pub error: Option<ViewError>,
    /// Bumped on every applied change; observers redraw when it moves
    pub revision: u64,
    /// Fetch that flagged the view as loading
    loading_token: Option<RequestToken>,
}

impl<T> ViewState<T> {
    fn initial() -> Self {
        Self {
            snapshot: None,
            status: LoadState::Loading,
            error: None,
            revision: 0,
            loading_token: None,
        }
    }

    pub fn entity(&self) -> Option<&T> {
        self.snapshot.as_deref().map(|s| &s.entity)
    }
}

impl<T> Clone for ViewState<T> {
    fn clone(&self) -> Self {
        Self {
            snapshot: self.snapshot.clone(),
            status: self.status,
            error: self.error.clone(),
            revision: self.revision,
            loading_token: self.loading_token,
        }
    }
}

/// Outcome of offering a fetched entity to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The token was superseded or the stream frozen; nothing was written
    Stale,
    /// Committed, but equal to what was held; observers were not notified
    Unchanged,
    /// Committed and observers notified
    Changed,
}

/// Single-owner holder of a view's snapshot
pub struct Store<T> {
    tx: watch::Sender<ViewState<T>>,
}

impl<T> Store<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ViewState::initial());
        Self { tx }
    }

    /// Receiver that wakes on every applied change
    pub fn subscribe(&self) -> watch::Receiver<ViewState<T>> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> ViewState<T> {
        self.tx.borrow().clone()
    }

    pub fn current(&self) -> Option<Arc<Snapshot<T>>> {
        self.tx.borrow().snapshot.clone()
    }

    /// Runs `modify` under the write lock; a `true` return bumps the revision
    /// and notifies observers
    pub(crate) fn update(&self, modify: impl FnOnce(&mut ViewState<T>) -> bool) -> bool {
        self.tx.send_if_modified(|state| {
            let notify = modify(state);
            if notify {
                state.revision += 1;
            }
            notify
        })
    }

    /// Flags a fetch as in flight, if it is still the current one
    pub fn mark_loading(&self, stream: &TokenStream, token: RequestToken) -> bool {
        self.update(|state| {
            if !stream.is_current(token) {
                return false;
            }
            state.loading_token = Some(token);
            if state.status == LoadState::Loading {
                return false;
            }
            state.status = LoadState::Loading;
            true
        })
    }

    /// Records a failed fetch; a superseded one at most clears its loading flag
    pub fn fail(&self, stream: &TokenStream, token: RequestToken, error: &SyncError) -> bool {
        let error = ViewError::from(error);
        self.update(|state| {
            if !stream.is_current(token) {
                debug!(stream = %stream.id(), %token, "Discarding stale failure");
                return !stream.is_frozen() && state.settle_superseded(token);
            }
            state.loading_token = None;
            if state.status == LoadState::Error && state.error.as_ref() == Some(&error) {
                return false;
            }
            state.status = LoadState::Error;
            state.error = Some(error);
            true
        })
    }
}

impl<T> ViewState<T> {
    /// Clears a loading flag whose fetch was superseded by a commit that did
    /// not flag loading itself, such as an optimistic mutation
    fn settle_superseded(&mut self, token: RequestToken) -> bool {
        if self.loading_token != Some(token) {
            return false;
        }
        self.loading_token = None;
        if self.status != LoadState::Loading || self.snapshot.is_none() {
            return false;
        }
        self.status = LoadState::Loaded;
        true
    }
}

impl<T: Serialize> Store<T> {
    /// Commits a fetched entity if `token` is still current on `stream`
    ///
    /// An entity equal to the held one still replaces the snapshot (fresh
    /// `fetched_at`, origin reset to fetched) without notifying observers.
    pub fn accept(
        &self,
        stream: &TokenStream,
        token: RequestToken,
        entity: T,
        detector: &ChangeDetector,
    ) -> Applied {
        self.accept_with(stream, token, entity, detector, || {})
    }

    /// Like [`Store::accept`], running `on_commit` under the same lock when
    /// the entity is committed
    pub(crate) fn accept_with(
        &self,
        stream: &TokenStream,
        token: RequestToken,
        entity: T,
        detector: &ChangeDetector,
        on_commit: impl FnOnce(),
    ) -> Applied {
        let mut applied = Applied::Stale;
        self.update(|state| {
            if !stream.is_current(token) {
                return !stream.is_frozen() && state.settle_superseded(token);
            }
            let changed = detector.has_changed(state.entity(), &entity);
            let settled = state.status == LoadState::Loaded && state.error.is_none();

            state.snapshot = Some(Arc::new(Snapshot::fetched(entity, token)));
            state.status = LoadState::Loaded;
            state.error = None;
            state.loading_token = None;
            on_commit();

            applied = if changed {
                Applied::Changed
            } else {
                Applied::Unchanged
            };
            changed || !settled
        });

        if applied == Applied::Stale {
            debug!(stream = %stream.id(), %token, "Discarding stale result");
        }
        applied
    }
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}
