//! Asynchronous resource loading.
//!
//! The MMD loader of the rendering library reports every load through three
//! callbacks (progress, result, error). This module turns those callbacks into
//! streams ([`callback_stream`]) and merges any number of them into one stream
//! of [`LoadEvent`]s ([`pipeline::load_all`]).
//!
//! # Key types
//!
//! - [`LoadSignal<T>`] is what a single load reports
//! - [`LoadStream<T>`] is the stream of signals for one URL
//! - [`LoadEvent<T>`] is a signal tagged with the URL it belongs to
//! - [`CancelToken`] stops a pipeline from issuing further loads
//!

use std::{cell::RefCell, rc::Rc};

use futures::{
    StreamExt,
    channel::mpsc::{self, UnboundedSender},
    stream::LocalBoxStream,
};
use futures_intrusive::sync::LocalManualResetEvent;

pub mod pipeline;

pub use pipeline::{LoadPipeline, load_all};

/// What one load reports. Zero or more `Progress`, then exactly one `Result` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSignal<T> {
    Progress { loaded: u64, total: u64 },
    Result(T),
    Error(String),
}

impl<T> LoadSignal<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadSignal::Progress { .. })
    }
}

/// Signals of a single URL's load. Single-threaded: completions arrive on the host event queue.
pub type LoadStream<T> = LocalBoxStream<'static, LoadSignal<T>>;

/// A load signal tagged with its URL.
///
/// Completions of different URLs interleave freely, so consumers correlate by
/// `url` (or by the resource itself), never by position.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent<T> {
    Progress { url: String, loaded: u64, total: u64 },
    Loaded { url: String, resource: T },
    Failed { url: String, reason: String },
}

impl<T> LoadEvent<T> {
    pub(crate) fn from_signal(url: &str, signal: LoadSignal<T>) -> Self {
        let url = url.to_string();
        match signal {
            LoadSignal::Progress { loaded, total } => LoadEvent::Progress { url, loaded, total },
            LoadSignal::Result(resource) => LoadEvent::Loaded { url, resource },
            LoadSignal::Error(reason) => LoadEvent::Failed { url, reason },
        }
    }

    pub fn url(&self) -> &str {
        match self {
            LoadEvent::Progress { url, .. } => url,
            LoadEvent::Loaded { url, .. } => url,
            LoadEvent::Failed { url, .. } => url,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadEvent::Progress { .. })
    }
}

/// Sink side of [`callback_stream`].
///
/// Hand `progress`, `resolve` and `reject` to the callback based loader. The
/// first terminal call closes the stream; anything reported afterwards is dropped.
pub struct LoadCallbacks<T> {
    tx: RefCell<Option<UnboundedSender<LoadSignal<T>>>>,
}

impl<T> LoadCallbacks<T> {
    pub fn progress(&self, loaded: u64, total: u64) {
        if let Some(tx) = self.tx.borrow().as_ref() {
            // the receiver may already be gone after a cancelled pipeline dropped it
            let _ = tx.unbounded_send(LoadSignal::Progress { loaded, total });
        }
    }

    pub fn resolve(&self, resource: T) {
        self.finish(LoadSignal::Result(resource));
    }

    pub fn reject(&self, reason: impl Into<String>) {
        self.finish(LoadSignal::Error(reason.into()));
    }

    pub fn is_finished(&self) -> bool {
        self.tx.borrow().is_none()
    }

    fn finish(&self, signal: LoadSignal<T>) {
        match self.tx.borrow_mut().take() {
            Some(tx) => {
                let _ = tx.unbounded_send(signal);
            }
            None => log::warn!("Load callback fired after the load already finished."),
        }
    }
}

/// Create a callback sink and the stream it feeds.
///
/// Callbacks are synchronous and cannot wait for a consumer, so signals are
/// queued until the stream is polled.
pub fn callback_stream<T: 'static>() -> (Rc<LoadCallbacks<T>>, LoadStream<T>) {
    let (tx, rx) = mpsc::unbounded();
    let callbacks = Rc::new(LoadCallbacks {
        tx: RefCell::new(Some(tx)),
    });
    (callbacks, rx.boxed_local())
}

/// Keep `guard` alive for as long as `stream` is.
///
/// Used to tie native callback handles to the stream they feed, so they are
/// released exactly when the pipeline drops the finished source.
pub fn with_guard<T: 'static, G: 'static>(stream: LoadStream<T>, guard: G) -> LoadStream<T> {
    stream
        .map(move |signal| {
            let _alive = &guard;
            signal
        })
        .boxed_local()
}

/// Set-once cancellation signal shared between a pipeline and whoever owns the load.
#[derive(Clone)]
pub struct CancelToken(Rc<LocalManualResetEvent>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Rc::new(LocalManualResetEvent::new(false)))
    }

    pub fn cancel(&self) {
        self.0.set();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_set()
    }

    /// Resolves once [`CancelToken::cancel`] was called.
    pub async fn cancelled(&self) {
        self.0.wait().await
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CancelToken")
            .field(&self.is_cancelled())
            .finish()
    }
}
