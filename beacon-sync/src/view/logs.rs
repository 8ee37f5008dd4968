//! Execution log feed of one pipeline

use beacon_core::domain::log::LogPage;
use beacon_core::dto::log::LogQuery;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

use crate::change::ChangeDetector;
use crate::error::{Result, SyncError};
use crate::sequencer::{RequestSequencer, StreamId, TokenStream};
use crate::source::FetchSource;
use crate::store::{Applied, Store};

/// Newest-first log entries, extended page by page on demand
pub struct LogFeed {
    pipeline_id: Uuid,
    source: Arc<dyn FetchSource>,
    store: Arc<Store<LogPage>>,
    stream: TokenStream,
    query: Mutex<LogQuery>,
    detector: ChangeDetector,
}

impl LogFeed {
    pub fn new(
        pipeline_id: Uuid,
        source: Arc<dyn FetchSource>,
        sequencer: &RequestSequencer,
    ) -> Self {
        Self {
            pipeline_id,
            source,
            store: Arc::new(Store::new()),
            stream: sequencer.stream(StreamId::Logs(pipeline_id)),
            query: Mutex::new(LogQuery::default()),
            detector: ChangeDetector::new(),
        }
    }

    pub fn store(&self) -> &Arc<Store<LogPage>> {
        &self.store
    }

    pub(crate) fn stream(&self) -> &TokenStream {
        &self.stream
    }

    pub fn query(&self) -> LogQuery {
        self.query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reloads the newest page for the current filters
    ///
    /// Returns whether the held entries changed.
    pub async fn refresh(&self) -> Result<bool> {
        let applied = self.fetch_first(false).await?;
        Ok(applied == Applied::Changed)
    }

    /// Replaces the filters and reloads from the newest entry
    pub async fn set_query(&self, query: LogQuery) -> Result<Applied> {
        *self.query.lock().unwrap_or_else(PoisonError::into_inner) = query.first_page();
        self.fetch_first(true).await
    }

    /// Appends the next page of older entries
    ///
    /// Returns `false` without fetching when there is nothing more to load.
    /// The appended page is dropped if anything else was committed meanwhile.
    pub async fn load_more(&self) -> Result<bool> {
        if self.stream.is_frozen() {
            return Err(SyncError::Closed);
        }
        let Some(held) = self.store.current() else {
            return Ok(false);
        };
        let Some(next) = held.entity.next_page_token.clone() else {
            return Ok(false);
        };
        let token = self.stream.issue();

        let query = self.query().after(next);
        let page = match self.source.fetch_logs(self.pipeline_id, &query).await {
            Ok(page) => page,
            Err(e) => {
                self.store.fail(&self.stream, token, &e);
                return Err(e);
            }
        };

        let mut entries = held.entity.entries.clone();
        entries.extend(page.entries);
        let extended = LogPage {
            entries,
            next_page_token: page.next_page_token,
        };
        let applied = self.store.accept(&self.stream, token, extended, &self.detector);
        debug!(pipeline = %self.pipeline_id, ?applied, "Loaded older log entries");
        Ok(applied == Applied::Changed)
    }

    async fn fetch_first(&self, show_loading: bool) -> Result<Applied> {
        if self.stream.is_frozen() {
            return Err(SyncError::Closed);
        }
        let token = self.stream.issue();
        if show_loading {
            self.store.mark_loading(&self.stream, token);
        }

        let query = self.query();
        match self.source.fetch_logs(self.pipeline_id, &query).await {
            Ok(page) => Ok(self.store.accept(&self.stream, token, page, &self.detector)),
            Err(e) => {
                self.store.fail(&self.stream, token, &e);
                Err(e)
            }
        }
    }
}
