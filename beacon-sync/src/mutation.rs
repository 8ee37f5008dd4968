//! Optimistic mutations with rollback
//!
//! A mutation commits its local effect before the remote call so the view
//! reflects it with zero latency. The commit mints a token on the view's
//! stream, which also invalidates every poll issued before it: an older poll
//! can never overwrite the optimistic state. If the remote call fails, the
//! optimistic part is discarded and the most recent fetched state restored.
//! A confirmed answer is only folded in if no fetch issued after the commit
//! has landed, since that fetch is newer than the answer.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::sequencer::{RequestToken, TokenStream};
use crate::store::{Snapshot, Store};

/// Transaction log entry of one in-flight mutation
///
/// Lives from the optimistic commit until the remote operation resolves.
#[derive(Debug)]
pub struct MutationRecord<T> {
    /// Snapshot held when the mutation began
    pub previous: Arc<Snapshot<T>>,
    /// Snapshot committed in its place
    pub optimistic: Arc<Snapshot<T>>,
    /// Token minted for the optimistic commit
    pub commit_token: RequestToken,
}

struct Pending<'a>(&'a AtomicUsize);

impl<'a> Pending<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Applies local transforms ahead of their remote operations
pub struct OptimisticMutationCoordinator<T> {
    store: Arc<Store<T>>,
    stream: TokenStream,
    pending: AtomicUsize,
}

impl<T: Send + Sync + 'static> OptimisticMutationCoordinator<T> {
    /// `stream` must be the stream the view's refreshes commit under
    pub fn new(store: Arc<Store<T>>, stream: TokenStream) -> Self {
        Self {
            store,
            stream,
            pending: AtomicUsize::new(0),
        }
    }

    /// Number of mutations whose remote operation has not resolved yet
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Commits `transform(current)` immediately, then awaits `remote`
    ///
    /// Returns the remote answer with the record to [`confirm`](Self::confirm) it by.
    ///
    /// # Errors
    /// - [`SyncError::Closed`] if the view was torn down
    /// - [`SyncError::Validation`] if nothing has been loaded yet
    /// - [`SyncError::MutationConflict`] if `remote` failed; the optimistic
    ///   commit has been rolled back by then
    pub async fn mutate<R, F, Fut>(
        &self,
        operation: &str,
        transform: F,
        remote: Fut,
    ) -> Result<(R, MutationRecord<T>)>
    where
        F: FnOnce(&T) -> T,
        Fut: Future<Output = Result<R>>,
    {
        let _pending = Pending::enter(&self.pending);
        let record = self.begin(transform)?;
        debug!(operation, token = %record.commit_token, "Optimistic commit");

        match remote.await {
            Ok(value) => Ok((value, record)),
            Err(e) => {
                let restored = self.rollback(&record);
                warn!(
                    operation,
                    restored, "Remote mutation failed, rolled back: {}", e
                );
                Err(SyncError::conflict(operation, e))
            }
        }
    }

    fn begin(&self, transform: impl FnOnce(&T) -> T) -> Result<MutationRecord<T>> {
        let mut outcome = Err(SyncError::Closed);
        self.store.update(|state| {
            if self.stream.is_frozen() {
                return false;
            }
            let Some(previous) = state.snapshot.clone() else {
                outcome = Err(SyncError::Validation(
                    "nothing has been loaded yet".to_string(),
                ));
                return false;
            };

            let token = self.stream.issue();
            let optimistic = Arc::new(Snapshot::optimistic(
                transform(&previous.entity),
                token,
                Snapshot::base_of(&previous),
            ));
            state.snapshot = Some(Arc::clone(&optimistic));
            outcome = Ok(MutationRecord {
                previous,
                optimistic,
                commit_token: token,
            });
            true
        });
        outcome
    }

    /// Restores the last fetched state if optimistic state is still shown
    ///
    /// If a fetch or confirmation landed after the optimistic commit, the
    /// held state is already authoritative and is kept.
    fn rollback(&self, record: &MutationRecord<T>) -> bool {
        self.store.update(|state| {
            if self.stream.is_frozen() {
                return false;
            }
            match &state.snapshot {
                Some(current) if current.is_optimistic() => {
                    debug!(token = %record.commit_token, "Discarding optimistic commit");
                    state.snapshot = Some(Snapshot::base_of(current));
                    true
                }
                _ => false,
            }
        })
    }

    /// Folds the remote answer of a resolved mutation into the held state
    ///
    /// `reconcile` is applied to the last fetched state. If other mutations
    /// are still pending, their optimistic view is rebuilt on top of it so it
    /// stays visible until they resolve. Nothing is written if a fetch issued
    /// after `record`'s commit has landed already.
    ///
    /// The confirmed state keeps the token of the fetch it was built on, so
    /// a fetch issued later still takes precedence.
    pub fn confirm(&self, record: &MutationRecord<T>, reconcile: impl Fn(&T) -> T) -> bool {
        let others_pending = self.pending() > 0;
        self.store.update(|state| {
            if self.stream.is_frozen() {
                return false;
            }
            let Some(current) = state.snapshot.clone() else {
                return false;
            };
            let fetched = Snapshot::base_of(&current);
            if fetched.token > record.commit_token {
                debug!(
                    commit = %record.commit_token,
                    fetched = %fetched.token,
                    "Newer fetch held, skipping confirmation"
                );
                return false;
            }

            let base = Arc::new(Snapshot::fetched(reconcile(&fetched.entity), fetched.token));
            state.snapshot = Some(if current.is_optimistic() && others_pending {
                Arc::new(Snapshot::optimistic(
                    reconcile(&current.entity),
                    current.token,
                    base,
                ))
            } else {
                base
            });
            true
        })
    }
}
