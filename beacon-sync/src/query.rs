//! Debounced, paginated pipeline list query
//!
//! Every query mints a token on the list stream, so of several overlapping
//! queries only the latest one issued can update the page or flip the load
//! state. The cursor moves together with the page it describes. Filter edits
//! wait for a quiet period before querying; page and page-size changes query
//! right away.

use async_trait::async_trait;
use beacon_core::dto::pipeline::{FIRST_PAGE, PageQuery, PipelinePage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use crate::change::ChangeDetector;
use crate::error::{Result, SyncError};
use crate::scheduler::Refresh;
use crate::sequencer::TokenStream;
use crate::source::FetchSource;
use crate::store::{Applied, Store};

/// Attempts for a query whose result only list mutations superseded
const MAX_ATTEMPTS: usize = 3;

/// Cursor over the controller's pipeline list
pub struct PaginatedFilterQuery {
    source: Arc<dyn FetchSource>,
    store: Arc<Store<PipelinePage>>,
    stream: TokenStream,
    /// Cursor of the page on display
    cursor: Mutex<PageQuery>,
    /// Latest cursor asked for; ahead of `cursor` while its query is in flight
    requested: Mutex<PageQuery>,
    generation: AtomicU64,
    debounce: Duration,
    pending_filter: Mutex<Option<JoinHandle<()>>>,
    detector: ChangeDetector,
}

impl PaginatedFilterQuery {
    pub fn new(
        source: Arc<dyn FetchSource>,
        stream: TokenStream,
        page_size: u32,
        debounce: Duration,
    ) -> Self {
        Self {
            source,
            store: Arc::new(Store::new()),
            stream,
            cursor: Mutex::new(PageQuery::new(FIRST_PAGE, page_size, "")),
            requested: Mutex::new(PageQuery::new(FIRST_PAGE, page_size, "")),
            generation: AtomicU64::new(0),
            debounce,
            pending_filter: Mutex::new(None),
            detector: ChangeDetector::new(),
        }
    }

    pub fn store(&self) -> &Arc<Store<PipelinePage>> {
        &self.store
    }

    pub fn stream(&self) -> &TokenStream {
        &self.stream
    }

    /// Page, size and filter of the page on display
    pub fn cursor(&self) -> PageQuery {
        self.cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn requested(&self) -> PageQuery {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queries one page and commits it if no newer query was issued meanwhile
    ///
    /// A result discarded only because a list mutation committed in between
    /// is fetched again, so the page change is not lost.
    ///
    /// # Errors
    /// [`SyncError::Validation`] for out-of-range input, before anything is
    /// fetched. Fetch errors are returned as well, but only mark the list as
    /// failed if this query is still the current one.
    pub async fn query(
        &self,
        page: u32,
        page_size: u32,
        filter: impl Into<String>,
    ) -> Result<Applied> {
        let query = PageQuery::new(page, page_size, filter);
        query.validate().map_err(SyncError::Validation)?;
        if self.stream.is_frozen() {
            return Err(SyncError::Closed);
        }

        *self.requested.lock().unwrap_or_else(PoisonError::into_inner) = query.clone();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut applied = Applied::Stale;
        for attempt in 1..=MAX_ATTEMPTS {
            applied = self.fetch(query.clone(), true).await?;
            let superseded_by_query = self.generation.load(Ordering::SeqCst) != generation;
            if applied != Applied::Stale
                || superseded_by_query
                || self.stream.is_frozen()
                || self.cursor() == query
            {
                break;
            }
            debug!(attempt, page = query.page, "Query overtaken by a list mutation, retrying");
        }
        Ok(applied)
    }

    /// Replaces the filter after the debounce period and returns to page 1
    ///
    /// Each call restarts the quiet period, so a burst of edits results in a
    /// single query for the last text.
    pub fn set_filter(self: &Arc<Self>, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let page_size = self.requested().items_per_page;
        PageQuery::new(FIRST_PAGE, page_size, text.as_str())
            .validate()
            .map_err(SyncError::Validation)?;

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            time::sleep(this.debounce).await;
            debug!(filter = %text, "Filter settled");
            let page_size = this.requested().items_per_page;
            if let Err(e) = this.query(FIRST_PAGE, page_size, text).await {
                warn!("Filtered query failed: {}", e);
            }
        });

        let previous = self
            .pending_filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    pub async fn set_page(&self, page: u32) -> Result<Applied> {
        let requested = self.requested();
        self.query(page, requested.items_per_page, requested.filter).await
    }

    /// Changes the page size and returns to the first page
    pub async fn set_page_size(&self, page_size: u32) -> Result<Applied> {
        let requested = self.requested();
        self.query(FIRST_PAGE, page_size, requested.filter).await
    }

    /// Re-queries after an item was removed from the held page
    ///
    /// If that emptied a page beyond the first, steps back one page first so
    /// the list does not land on an empty page.
    pub async fn requery_after_removal(&self) -> Result<Applied> {
        let cursor = self.cursor();
        let emptied = self
            .store
            .state()
            .entity()
            .is_some_and(|page| page.pipelines.is_empty());

        let page = if emptied && cursor.page > FIRST_PAGE {
            debug!(from = cursor.page, "Page emptied, stepping back");
            cursor.page - 1
        } else {
            cursor.page
        };
        self.query(page, cursor.items_per_page, cursor.filter).await
    }

    /// Drops a filter edit that has not settled yet
    pub fn cancel_pending(&self) {
        let pending = self
            .pending_filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = pending {
            handle.abort();
        }
    }

    async fn fetch(&self, query: PageQuery, show_loading: bool) -> Result<Applied> {
        let token = self.stream.issue();
        if show_loading {
            self.store.mark_loading(&self.stream, token);
        }
        debug!(
            %token,
            page = query.page,
            page_size = query.items_per_page,
            filter = %query.filter,
            "Querying pipelines"
        );

        let fetched = self.source.list_pipelines(&query).await;
        match fetched {
            Ok(page) => {
                let commit_cursor = || {
                    *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = query;
                };
                Ok(self.store.accept_with(
                    &self.stream,
                    token,
                    page,
                    &self.detector,
                    commit_cursor,
                ))
            }
            Err(e) => {
                self.store.fail(&self.stream, token, &e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Refresh for PaginatedFilterQuery {
    /// Polls the latest requested cursor without flagging the list as loading
    async fn refresh(&self) -> Result<bool> {
        let applied = self.fetch(self.requested(), false).await?;
        Ok(applied == Applied::Changed)
    }
}

impl Drop for PaginatedFilterQuery {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sequencer::StreamId;
    use crate::store::LoadState;
    use crate::testing::{FakeController, Op, pipeline};

    fn catalog(count: usize) -> Arc<FakeController> {
        FakeController::with_pipelines(
            (0..count)
                .map(|i| pipeline(&format!("p{:02}", i)))
                .collect(),
        )
    }

    fn query_over(fake: &Arc<FakeController>) -> Arc<PaginatedFilterQuery> {
        Arc::new(PaginatedFilterQuery::new(
            fake.clone(),
            TokenStream::detached(StreamId::PipelineList),
            10,
            Duration::from_millis(300),
        ))
    }

    #[tokio::test]
    async fn test_query_commits_page() {
        let fake = catalog(12);
        let query = query_over(&fake);

        assert_eq!(query.query(2, 10, "").await.unwrap(), Applied::Changed);
        let state = query.store().state();
        let page = state.entity().unwrap();
        assert_eq!(page.pipelines.len(), 2);
        assert_eq!(page.total, 12);
        assert_eq!(page.page, 2);
        assert_eq!(state.status, LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_invalid_input_never_fetches() {
        let fake = catalog(3);
        let query = query_over(&fake);

        let err = query.query(0, 10, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = query.query(1, 0, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(query.set_filter("x".repeat(300)).is_err());
        assert_eq!(fake.calls(Op::ListPipelines), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_burst_queries_once() {
        let fake = catalog(3);
        let query = query_over(&fake);
        query.query(1, 10, "").await.unwrap();
        let before = fake.calls(Op::ListPipelines);

        query.set_filter("a").unwrap();
        time::sleep(Duration::from_millis(100)).await;
        query.set_filter("ab").unwrap();
        time::sleep(Duration::from_millis(100)).await;
        query.set_filter("abc").unwrap();
        time::sleep(Duration::from_millis(299)).await;
        assert_eq!(fake.calls(Op::ListPipelines), before);

        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fake.calls(Op::ListPipelines), before + 1);
        let last = fake.queries().pop().unwrap();
        assert_eq!(last.filter, "abc");
        assert_eq!(last.page, FIRST_PAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_resets_page() {
        let fake = catalog(25);
        let query = query_over(&fake);
        query.set_page(3).await.unwrap();

        query.set_filter("p1").unwrap();
        time::sleep(Duration::from_millis(301)).await;
        let cursor = query.cursor();
        assert_eq!(cursor.page, FIRST_PAGE);
        assert_eq!(cursor.filter, "p1");
        assert_eq!(query.store().state().entity().unwrap().total, 10);
    }

    #[tokio::test]
    async fn test_page_size_change_is_immediate() {
        let fake = catalog(12);
        let query = query_over(&fake);
        query.set_page(2).await.unwrap();

        query.set_page_size(5).await.unwrap();
        let page = query.store().current().unwrap();
        assert_eq!(page.entity.page, 1);
        assert_eq!(page.entity.items_per_page, 5);
        assert_eq!(page.entity.pipelines.len(), 5);
    }

    #[tokio::test]
    async fn test_superseded_query_is_discarded() {
        let fake = catalog(12);
        let query = query_over(&fake);
        let release = fake.hold(Op::ListPipelines);

        let slow = {
            let query = query.clone();
            tokio::spawn(async move { query.query(1, 10, "").await })
        };
        tokio::task::yield_now().await;

        assert_eq!(query.query(2, 10, "").await.unwrap(), Applied::Changed);
        release.send(()).unwrap();
        assert_eq!(slow.await.unwrap().unwrap(), Applied::Stale);

        let page = query.store().current().unwrap();
        assert_eq!(page.entity.page, 2);
    }

    #[tokio::test]
    async fn test_superseded_failure_keeps_state() {
        let fake = catalog(12);
        let query = query_over(&fake);
        let release = fake.hold_and_fail(Op::ListPipelines, SyncError::Network("reset".into()));

        let slow = {
            let query = query.clone();
            tokio::spawn(async move { query.query(1, 10, "").await })
        };
        tokio::task::yield_now().await;
        query.query(2, 10, "").await.unwrap();

        release.send(()).unwrap();
        assert!(slow.await.unwrap().is_err());
        let state = query.store().state();
        assert_eq!(state.status, LoadState::Loaded);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_current_failure_sets_error() {
        let fake = catalog(3);
        let query = query_over(&fake);
        fake.fail(
            Op::ListPipelines,
            SyncError::Remote {
                status: 500,
                message: "boom".into(),
            },
        );

        assert!(query.query(1, 10, "").await.is_err());
        let state = query.store().state();
        assert_eq!(state.status, LoadState::Error);
        assert_eq!(state.error.unwrap().kind, ErrorKind::Remote);
    }

    #[tokio::test]
    async fn test_cursor_follows_committed_page() {
        let fake = catalog(12);
        let query = query_over(&fake);
        query.query(1, 10, "").await.unwrap();
        let release = fake.hold(Op::ListPipelines);

        let pending = {
            let query = query.clone();
            tokio::spawn(async move { query.set_page(2).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(query.cursor().page, 1);
        assert_eq!(query.store().state().status, LoadState::Loading);

        release.send(()).unwrap();
        assert_eq!(pending.await.unwrap().unwrap(), Applied::Changed);
        assert_eq!(query.cursor().page, 2);
    }

    #[tokio::test]
    async fn test_query_overtaken_by_other_commit_is_reissued() {
        let fake = catalog(12);
        let query = query_over(&fake);
        query.query(1, 10, "").await.unwrap();
        let release = fake.hold(Op::ListPipelines);

        let pending = {
            let query = query.clone();
            tokio::spawn(async move { query.set_page(2).await })
        };
        tokio::task::yield_now().await;
        query.stream().issue();
        release.send(()).unwrap();

        assert_eq!(pending.await.unwrap().unwrap(), Applied::Changed);
        let state = query.store().state();
        assert_eq!(state.status, LoadState::Loaded);
        assert_eq!(state.entity().unwrap().page, 2);
        assert_eq!(query.cursor().page, 2);
        assert_eq!(fake.calls(Op::ListPipelines), 3);
    }

    #[tokio::test]
    async fn test_emptied_page_steps_back() {
        let fake = catalog(11);
        let query = query_over(&fake);
        query.set_page(2).await.unwrap();
        let last = query.store().current().unwrap().entity.pipelines[0].id;

        fake.remove(last);
        let trimmed = query.store().current().unwrap().entity.without(last);
        query.store().accept(
            query.stream(),
            query.stream().issue(),
            trimmed,
            &ChangeDetector::new(),
        );

        query.requery_after_removal().await.unwrap();
        assert_eq!(query.cursor().page, 1);
        let page = query.store().current().unwrap();
        assert_eq!(page.entity.page, 1);
        assert_eq!(page.entity.pipelines.len(), 10);
        assert_eq!(fake.queries().last().unwrap().page, 1);
    }

    #[tokio::test]
    async fn test_poll_does_not_flag_loading() {
        let fake = catalog(3);
        let query = query_over(&fake);
        query.query(1, 10, "").await.unwrap();
        let revision = query.store().state().revision;

        assert!(!query.refresh().await.unwrap());
        assert_eq!(query.store().state().revision, revision);

        fake.insert(pipeline("p99"));
        assert!(query.refresh().await.unwrap());
    }
}
