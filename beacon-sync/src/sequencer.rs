//! Request sequencing
//!
//! Network completions arrive in any order. Every fetch captures a token when
//! it is issued and may only commit while that token is still the latest one
//! of its stream. Issuing a token therefore invalidates, without cancelling,
//! everything issued before it on the same stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Identifies one logical stream of queries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamId {
    /// Refreshes and mutations of a single pipeline view
    Pipeline(Uuid),
    /// Execution log pages of a pipeline
    Logs(Uuid),
    /// Paginated pipeline list queries
    PipelineList,
    /// Any other caller-defined stream
    Named(String),
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamId::Pipeline(id) => write!(f, "pipeline:{}", id),
            StreamId::Logs(id) => write!(f, "logs:{}", id),
            StreamId::PipelineList => write!(f, "pipeline-list"),
            StreamId::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Opaque, strictly increasing id of one issued query within a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counter {
    latest: AtomicU64,
    frozen: AtomicBool,
}

/// Handle on a single stream's counter
///
/// Cheap to clone and safe to use from any task or thread.
#[derive(Debug, Clone)]
pub struct TokenStream {
    id: StreamId,
    counter: Arc<Counter>,
}

impl TokenStream {
    /// Creates a stream that is not registered with any sequencer
    pub fn detached(id: StreamId) -> Self {
        Self {
            id,
            counter: Arc::new(Counter::default()),
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Mints a token greater than every token issued before on this stream
    pub fn issue(&self) -> RequestToken {
        RequestToken(self.counter.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// True iff `token` is the latest issued and the stream is not frozen
    pub fn is_current(&self, token: RequestToken) -> bool {
        !self.is_frozen() && self.counter.latest.load(Ordering::SeqCst) == token.0
    }

    /// Permanently rejects every token of this stream, issued or future
    pub fn freeze(&self) {
        self.counter.frozen.store(true, Ordering::SeqCst);
    }

    pub fn is_frozen(&self) -> bool {
        self.counter.frozen.load(Ordering::SeqCst)
    }
}

/// Registry of per-stream counters
#[derive(Debug, Default)]
pub struct RequestSequencer {
    streams: Mutex<HashMap<StreamId, TokenStream>>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `id`, creating the stream on first use
    ///
    /// A frozen stream belongs to a torn-down view; asking for it again
    /// starts a fresh stream whose tokens the old handles never accept.
    pub fn stream(&self, id: StreamId) -> TokenStream {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let stream = streams
            .entry(id.clone())
            .or_insert_with(|| TokenStream::detached(id.clone()));
        if stream.is_frozen() {
            *stream = TokenStream::detached(id);
        }
        stream.clone()
    }

    pub fn issue(&self, id: &StreamId) -> RequestToken {
        self.stream(id.clone()).issue()
    }

    pub fn is_current(&self, id: &StreamId, token: RequestToken) -> bool {
        self.stream(id.clone()).is_current(token)
    }

    /// Freezes a stream; late completions on it become no-ops
    pub fn freeze(&self, id: &StreamId) {
        self.stream(id.clone()).freeze();
    }
}
