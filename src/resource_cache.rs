//! The [RenderResourceCache] ties the pieces together: a [BoundedLru] of GPU resources keyed by
//! [ImageSource], an [EvictionRelay] for deferred release, a [RetrievalQueue] fed by a
//! [Retriever], and the redraw signal that keeps the whole thing moving.
//!
//! One thread, the render thread, owns the cache and is the only mutator.  Per frame it is
//! expected to call [retrieve_resource](RenderResourceCache::retrieve_resource) for whatever it
//! wants to draw and [release_evicted_resources](RenderResourceCache::release_evicted_resources)
//! once to clean up after the budget.  Everything a background worker produces crosses over
//! through the two queues; nothing else is shared.
//!
//! A lookup that misses is not an error.  The cache schedules a background retrieval and returns
//! `None`; the caller draws without the resource this frame and asks again on the next one, by
//! which point the result has usually been adopted.
use std::sync::Arc;

use crate::{
    BoundedLru, CacheStats, Completed, EvictionObserver, EvictionRelay, ImageSource,
    RedrawSignal, ReleaseSummary, RenderResource, ResourceFactory, RetrievalCallback,
    RetrievalInbox, RetrievalQueue, Retriever,
};

/// Byte budgets for a [RenderResourceCache].
#[derive(Debug, Clone, derive_builder::Builder)]
pub struct RenderCacheConfig {
    /// Hard budget; an insertion past this point triggers eviction.
    pub capacity_bytes: u64,
    /// Occupancy eviction drains down to.  `None` means no hysteresis: drain to the capacity.
    #[builder(default)]
    pub low_water_bytes: Option<u64>,
}

/// Routes entries displaced from the store into the relay, keeping the removed/replaced split
/// visible in the stats.
struct RelayObserver<R> {
    relay: Arc<EvictionRelay<R>>,
    stats: Arc<CacheStats>,
}

impl<R> EvictionObserver<R> for RelayObserver<R> {
    fn entry_removed(&self, value: Arc<R>) {
        self.stats.record_eviction();
        self.relay.offer(value);
    }

    fn entry_replaced(&self, value: Arc<R>) {
        self.stats.record_replacement();
        self.relay.offer(value);
    }
}

/// A bounded cache of GPU render resources built from image sources.
pub struct RenderResourceCache<F, T>
where
    F: ResourceFactory,
    T: Retriever,
{
    store: BoundedLru<ImageSource, F::Resource, RelayObserver<F::Resource>>,
    eviction_relay: Arc<EvictionRelay<F::Resource>>,
    retrieval_queue: Arc<RetrievalQueue>,
    inbox: Arc<RetrievalInbox>,
    factory: F,
    retriever: T,
    stats: Arc<CacheStats>,
}

impl<F, T> RenderResourceCache<F, T>
where
    F: ResourceFactory,
    T: Retriever,
{
    pub fn new(
        factory: F,
        retriever: T,
        redraw: Arc<dyn RedrawSignal>,
        config: RenderCacheConfig,
    ) -> RenderResourceCache<F, T> {
        let stats = Arc::new(CacheStats::new());
        let eviction_relay = Arc::new(EvictionRelay::new());
        let retrieval_queue = Arc::new(RetrievalQueue::new());
        let observer = RelayObserver {
            relay: eviction_relay.clone(),
            stats: stats.clone(),
        };
        let low_water = config.low_water_bytes.unwrap_or(config.capacity_bytes);
        RenderResourceCache {
            store: BoundedLru::with_low_water(config.capacity_bytes, low_water, observer),
            eviction_relay,
            inbox: Arc::new(RetrievalInbox::new(retrieval_queue.clone(), redraw)),
            retrieval_queue,
            factory,
            retriever,
            stats,
        }
    }

    /// Get the resource for `source`, or schedule the work that will produce it.
    ///
    /// Resident resources are returned directly.  A source carrying inline pixels is built and
    /// published on the spot.  Otherwise every pending background completion is adopted into the
    /// store (all of them, not just a match, so the queue stays bounded and other requests'
    /// results get published while we are here), and if one of them was for `source` it is
    /// returned.  Failing all that, a retrieval is scheduled and the caller gets `None`: ask
    /// again next frame.
    pub fn retrieve_resource(&mut self, source: &ImageSource) -> Option<Arc<F::Resource>> {
        if let Some(resource) = self.store.get(source) {
            self.stats.record_hit();
            return Some(resource);
        }
        self.stats.record_miss();

        if let Some(image) = source.pixels() {
            let resource = self.factory.create(image);
            return Some(self.insert_resource(source.clone(), resource));
        }

        if let Some(resource) = self.adopt_completed(source) {
            return Some(resource);
        }

        let callback: Arc<dyn RetrievalCallback> = self.inbox.clone();
        self.retriever.retrieve(source.clone(), callback);
        None
    }

    /// Release everything the budget has displaced since the last call.
    ///
    /// Call once per frame from the thread that owns the graphics context.
    pub fn release_evicted_resources(&mut self) -> ReleaseSummary {
        self.eviction_relay.drain_and_release()
    }

    /// Drop every resident entry and everything pending release, without releasing any of it.
    ///
    /// For context-loss scenarios: the graphics context that owned these resources is gone, so
    /// per-resource release would be meaningless at best.  Completed retrievals that have not
    /// been adopted yet are raw pixels, not context-bound state, and stay adoptable.
    pub fn invalidate_all(&mut self) {
        self.store.invalidate_all();
        self.eviction_relay.clear();
        tracing::debug!("render resource cache invalidated");
    }

    /// Forward an opaque platform handle to the retriever.
    pub fn set_context(&mut self, context: T::Context) {
        self.retriever.set_context(context);
    }

    pub fn contains(&self, source: &ImageSource) -> bool {
        self.store.contains_key(source)
    }

    pub fn used_bytes(&self) -> u64 {
        self.store.used_bytes()
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.store.capacity_bytes()
    }

    pub fn low_water_bytes(&self) -> u64 {
        self.store.low_water_bytes()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn insert_resource(&mut self, source: ImageSource, resource: F::Resource) -> Arc<F::Resource> {
        let size = resource.size_bytes();
        self.stats.record_insert();
        self.store.insert(source.clone(), resource, size);
        self.store.get(&source).expect("We just inserted this")
    }

    /// Adopt every pending completed retrieval, remembering the first one for `wanted`.
    ///
    /// Unrelated adoptions can trigger unrelated evictions; those land in the relay like any
    /// others.
    fn adopt_completed(&mut self, wanted: &ImageSource) -> Option<Arc<F::Resource>> {
        let mut matched = None;
        while let Some(Completed { source, image }) = self.retrieval_queue.poll() {
            let resource = self.factory.create(&image);
            let adopted = self.insert_resource(source.clone(), resource);
            if matched.is_none() && &source == wanted {
                matched = Some(adopted);
            }
        }
        matched
    }
}
