//! An LRU cache for GPU render resources that must be freed on the thread that owns them.
//!
//! Textures and similar GPU objects are expensive to build and live against a byte budget, and
//! the awkward part is that they may only be released on the rendering thread, because release
//! touches graphics-API handles.  At the same time the things they are built from arrive from
//! two directions: sometimes the pixels are already decoded and in hand, and sometimes a
//! background worker has to go fetch and decode them first.  A plain map with a lock around it
//! handles none of this well.  This crate solves it with one store and two queues:
//!
//! [BoundedLru] is the store: a byte-budget LRU map that sheds least-recently-used entries down
//! to a low-water mark whenever an insertion goes over capacity.  It does no locking at all,
//! because only one thread ever touches it.  Instead of dropping what it evicts, it hands every
//! displaced value to an [EvictionObserver], telling apart entries pushed out by the budget from
//! entries replaced under their own key.  This is the basic low-level building block, and is
//! exposed because it's useful on its own.
//!
//! [EvictionRelay] is where displaced resources go to die properly: a concurrent queue the owner
//! thread drains once per frame, releasing each resource behind a per-item fault boundary so one
//! misbehaving release can't starve the rest of the cleanup.
//!
//! [RetrievalQueue] is the reverse direction: background workers park finished retrievals on it
//! as immutable [Completed] records, and the owner thread adopts everything pending the next
//! time it looks a resource up.  Workers never see the store; the queue is the entire hand-off.
//!
//! The higher level piece is [RenderResourceCache], which wires the three together with a
//! [Retriever] and a [RedrawSignal] and exposes the one operation callers actually want:
//! [retrieve_resource](RenderResourceCache::retrieve_resource), get the resource or schedule
//! whatever makes it exist, returning `None` until it does.  Misses are not errors; the caller
//! asks again next frame, and the redraw signal makes sure that frame comes soon.
//!
//! To use this crate, implement [RenderResource], [ResourceFactory], [Retriever], and
//! [RedrawSignal], then construct a [RenderResourceCache] with your chosen [RenderCacheConfig].
//! When the graphics context itself is lost, call
//! [invalidate_all](RenderResourceCache::invalidate_all) instead of releasing anything: the
//! resources died with their context.
mod bounded_lru;
mod eviction;
mod image_source;
mod resource_cache;
mod retrieval;
mod stats;
mod traits;

pub use bounded_lru::*;
pub use eviction::*;
pub use image_source::*;
pub use resource_cache::*;
pub use retrieval::*;
pub use stats::*;
pub use traits::*;
