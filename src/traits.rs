//! The seams of the cache: what a resource is, how one is built from pixels, how raw image data
//! is fetched, and how the render loop is nudged when a fetch completes.
//!
//! The cache itself never talks to a graphics API or a network stack.  Implement [RenderResource]
//! for your texture type, [ResourceFactory] to wrap texture construction, and [Retriever] over
//! whatever fetching machinery you have, then hand them to a
//! [RenderResourceCache](crate::RenderResourceCache).
use std::sync::Arc;

use crate::{ImageData, ImageSource, RetrievalCallback};

/// A GPU-backed resource with a known footprint.
///
/// The resource must be `Send + Sync` so displaced handles can sit in the cache's concurrent
/// queues.  `release` is called exactly once per evicted resource, and only ever from the thread
/// that drains the eviction relay; a failed release is logged and swallowed there, never
/// propagated.
pub trait RenderResource: Send + Sync {
    type Error: std::error::Error;

    /// Size of the underlying resource in bytes, as counted against the cache budget.
    fn size_bytes(&self) -> u64;

    /// Free the underlying graphics object.
    fn release(&self) -> Result<(), Self::Error>;
}

/// Builds a [RenderResource] from decoded pixels.
///
/// Construction does not fail: uploading to the GPU is deferred inside the resource itself, so
/// building amounts to wrapping the pixels in the handle type.
pub trait ResourceFactory {
    type Resource: RenderResource;

    fn create(&self, image: &ImageData) -> Self::Resource;
}

/// Schedules asynchronous acquisition of image data.
///
/// For every `retrieve` call the implementation must eventually invoke exactly one of the three
/// [RetrievalCallback] outcomes, at most once, from any thread it likes (or none at all, if it
/// abandons the request outright).  De-duplicating concurrent requests for the same source and
/// applying backpressure are the retriever's own policy; the cache re-requests on every miss.
pub trait Retriever {
    /// Opaque platform handle forwarded through [set_context](Retriever::set_context), used by
    /// implementations that resolve bundled or packaged image data.  Use `()` if there is nothing
    /// to forward.
    type Context;

    fn retrieve(&self, source: ImageSource, callback: Arc<dyn RetrievalCallback>);

    fn set_context(&mut self, context: Self::Context);
}

/// Asks the embedding application to schedule another render pass.
///
/// Fired whenever a background retrieval completes, so the frame that adopts the result comes
/// promptly instead of waiting on an unrelated redraw trigger.
pub trait RedrawSignal: Send + Sync {
    fn request_redraw(&self);
}

/// Receives entries displaced from a [BoundedLru](crate::BoundedLru).
///
/// The store distinguishes an entry pushed out by the eviction policy (`entry_removed`) from one
/// superseded by a new value under the same key (`entry_replaced`).  Both hand over the store's
/// owning reference; whatever the observer does with it is the last word on the value's lifetime.
pub trait EvictionObserver<V> {
    fn entry_removed(&self, value: Arc<V>);

    fn entry_replaced(&self, value: Arc<V>);
}

/// An [EvictionObserver] that drops displaced entries on the floor.
pub struct DiscardEvictions;

impl<V> EvictionObserver<V> for DiscardEvictions {
    fn entry_removed(&self, _value: Arc<V>) {}

    fn entry_replaced(&self, _value: Arc<V>) {}
}
