//! Reconciliation of background retrievals with the owner-thread store.
//!
//! Retriever workers never touch the cache directly.  A successful fetch is reduced to an
//! immutable [Completed] record and parked on the [RetrievalQueue]; the owner thread adopts
//! pending records the next time it looks something up.  Failures and rejections produce nothing
//! but diagnostics; the requesting caller simply sees absence and asks again on a later frame.
use std::collections::VecDeque;
use std::error::Error;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{ImageData, ImageSource, RedrawSignal};

/// Why a retrieval produced no image.
///
/// Purely diagnostic: none of these ever reach a cache caller.  Timeouts are split out because
/// they are common and expected, and get logged without their cause chain.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("image retrieval timed out")]
    Timeout,
    #[error("image transport failed")]
    Transport(#[source] Box<dyn Error + Send + Sync>),
    #[error("image decoding failed")]
    Decode(#[source] Box<dyn Error + Send + Sync>),
    #[error("{0}")]
    Other(String),
}

/// The one-shot outcome protocol a [Retriever](crate::Retriever) reports through.
///
/// Exactly one of these is invoked per `retrieve` call, at most once, from any thread.  A
/// rejection means the request was never attempted (the retriever's queue was full, or a
/// duplicate was suppressed); a failure means it was attempted and did not succeed.
pub trait RetrievalCallback: Send + Sync {
    fn retrieval_succeeded(&self, source: ImageSource, image: ImageData);

    fn retrieval_failed(&self, source: &ImageSource, error: RetrievalError);

    fn retrieval_rejected(&self, source: &ImageSource);
}

/// A finished background retrieval waiting to be adopted into the store.
pub struct Completed {
    pub source: ImageSource,
    pub image: ImageData,
}

/// Concurrent FIFO of [Completed] records; offered from worker threads, polled by the owner.
pub struct RetrievalQueue {
    pending: Mutex<VecDeque<Completed>>,
}

impl RetrievalQueue {
    pub fn new() -> RetrievalQueue {
        RetrievalQueue {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn offer(&self, completed: Completed) {
        self.pending.lock().push_back(completed);
    }

    pub fn poll(&self) -> Option<Completed> {
        self.pending.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl Default for RetrievalQueue {
    fn default() -> RetrievalQueue {
        RetrievalQueue::new()
    }
}

/// The cache's side of the callback protocol: queue the success, nudge the render loop, log the
/// rest.
///
/// This is what [RenderResourceCache](crate::RenderResourceCache) hands to its retriever.  It
/// holds only the queue and the redraw handle, never the cache itself, so worker threads can
/// keep it alive for as long as they like.
pub struct RetrievalInbox {
    queue: Arc<RetrievalQueue>,
    redraw: Arc<dyn RedrawSignal>,
}

impl RetrievalInbox {
    pub fn new(queue: Arc<RetrievalQueue>, redraw: Arc<dyn RedrawSignal>) -> RetrievalInbox {
        RetrievalInbox { queue, redraw }
    }
}

impl RetrievalCallback for RetrievalInbox {
    fn retrieval_succeeded(&self, source: ImageSource, image: ImageData) {
        tracing::debug!(source = %source, "image retrieval succeeded");
        self.queue.offer(Completed { source, image });
        self.redraw.request_redraw();
    }

    fn retrieval_failed(&self, source: &ImageSource, error: RetrievalError) {
        match error {
            // Timeouts are routine; keep the log line short.
            RetrievalError::Timeout => {
                tracing::error!(source = %source, "timed out retrieving image");
            }
            other => {
                tracing::error!(source = %source, error = ?other, "image retrieval failed");
            }
        }
    }

    fn retrieval_rejected(&self, source: &ImageSource) {
        tracing::debug!(source = %source, "image retrieval rejected");
    }
}
