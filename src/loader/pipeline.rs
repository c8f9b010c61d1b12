//! Fan-out / fan-in of many loads into one stream.
//!
//! Every URL gets its own load, issued without waiting for the others. All
//! their signals are funneled into a single [`LoadPipeline`] which is pulled
//! by the consumer: a source is only polled when the consumer asks for the
//! next event, so a slow consumer holds the producers back.

use std::{
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    Stream, StreamExt,
    stream::{FusedStream, SelectAll},
};

use super::{CancelToken, LoadEvent, LoadSignal, LoadStream};

/// One URL's load. Ends right after its terminal event and drops the source at that point.
struct Source<T> {
    url: String,
    signals: Option<LoadStream<T>>,
}

impl<T> Stream for Source<T> {
    type Item = LoadEvent<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let signals = match this.signals.as_mut() {
            Some(signals) => signals,
            None => return Poll::Ready(None),
        };
        match signals.poll_next_unpin(cx) {
            Poll::Ready(Some(signal)) => {
                if signal.is_terminal() {
                    this.signals = None;
                }
                Poll::Ready(Some(LoadEvent::from_signal(&this.url, signal)))
            }
            Poll::Ready(None) => {
                // every issued load owes exactly one terminal event
                this.signals = None;
                Poll::Ready(Some(LoadEvent::from_signal(
                    &this.url,
                    LoadSignal::Error("load ended without a result".to_string()),
                )))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Merged stream of [`LoadEvent`]s for a batch of URLs.
///
/// Yields zero or more progress events and exactly one terminal event
/// ([`LoadEvent::Loaded`] or [`LoadEvent::Failed`]) per issued URL, in
/// whatever order the loads complete. The stream ends after the last terminal
/// event, immediately for an empty batch.
///
/// Once the [`CancelToken`] is set no further URL is issued. Loads already in
/// flight cannot be aborted; they are drained and their events discarded, and
/// the stream ends once they are done.
pub struct LoadPipeline<T> {
    pending: VecDeque<String>,
    issue: Box<dyn FnMut(&str) -> LoadStream<T>>,
    in_flight: SelectAll<Source<T>>,
    cancel: CancelToken,
    issued: usize,
    finished: usize,
    discarded: usize,
}

impl<T> LoadPipeline<T> {
    /// Number of loads started so far.
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Number of loads that reached their terminal event.
    pub fn finished(&self) -> usize {
        self.finished
    }

    /// Number of events swallowed after cancellation.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn issue_pending(&mut self) {
        while let Some(url) = self.pending.pop_front() {
            if self.cancel.is_cancelled() {
                log::debug!(
                    "Load cancelled, {} url(s) will not be requested.",
                    self.pending.len() + 1
                );
                self.pending.clear();
                break;
            }
            let signals = (self.issue)(&url);
            self.in_flight.push(Source {
                url,
                signals: Some(signals),
            });
            self.issued += 1;
        }
    }
}

impl<T> Stream for LoadPipeline<T> {
    type Item = LoadEvent<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.issue_pending();
        loop {
            match this.in_flight.poll_next_unpin(cx) {
                Poll::Ready(Some(event)) => {
                    if event.is_terminal() {
                        this.finished += 1;
                    }
                    if this.cancel.is_cancelled() {
                        this.discarded += 1;
                        continue;
                    }
                    return Poll::Ready(Some(event));
                }
                Poll::Ready(None) => {
                    if this.issued > 0 {
                        log::trace!("All {} load(s) finished.", this.finished);
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T> FusedStream for LoadPipeline<T> {
    fn is_terminated(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

/// Start loading `urls` with `issue`, one call per URL.
///
/// `issue` is the "load one" capability, typically a closure over an
/// [`crate::backend::MmdLoader`]. Loads are issued on the first poll.
pub fn load_all<T, I, F>(urls: I, cancel: CancelToken, issue: F) -> LoadPipeline<T>
where
    I: IntoIterator,
    I::Item: Into<String>,
    F: FnMut(&str) -> LoadStream<T> + 'static,
{
    LoadPipeline {
        pending: urls.into_iter().map(Into::into).collect(),
        issue: Box::new(issue),
        in_flight: SelectAll::new(),
        cancel,
        issued: 0,
        finished: 0,
        discarded: 0,
    }
}
