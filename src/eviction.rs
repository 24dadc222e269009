//! The [EvictionRelay] decouples deciding to evict a resource from actually freeing it.
//!
//! Eviction happens wherever an insertion goes over budget, but freeing a GPU object is only
//! legal on the thread that owns the graphics context.  So displaced resources are parked here
//! and the owner thread drains the queue once per frame, releasing each one behind a per-item
//! fault boundary: one resource whose release fails must not starve the cleanup of the rest.
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::RenderResource;

/// Concurrent FIFO of resources awaiting release on the owner thread.
///
/// `offer` is safe from any thread; `drain_and_release` is meant to be called from exactly one.
pub struct EvictionRelay<R> {
    pending: Mutex<VecDeque<Arc<R>>>,
}

/// What a drain did, for callers that want to surface it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub released: usize,
    pub faulted: usize,
}

impl<R> EvictionRelay<R> {
    pub fn new() -> EvictionRelay<R> {
        EvictionRelay {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Park a displaced resource until the owner thread gets around to releasing it.
    pub fn offer(&self, resource: Arc<R>) {
        self.pending.lock().push_back(resource);
    }

    /// Discard everything without releasing.
    ///
    /// Only correct when the queued resources are already dead along with their context;
    /// releasing them individually would touch a graphics API that no longer exists.
    pub fn clear(&self) {
        self.pending.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl<R> Default for EvictionRelay<R> {
    fn default() -> EvictionRelay<R> {
        EvictionRelay::new()
    }
}

impl<R: RenderResource> EvictionRelay<R> {
    /// Poll the queue until empty, releasing each resource in arrival order.
    ///
    /// A failed release is logged and skipped; the drain keeps going.  The lock is dropped
    /// between polls so producers are never stalled behind a release call.
    pub fn drain_and_release(&self) -> ReleaseSummary {
        let mut summary = ReleaseSummary::default();
        loop {
            let resource = match self.pending.lock().pop_front() {
                Some(r) => r,
                None => break,
            };
            match resource.release() {
                Ok(()) => {
                    summary.released += 1;
                    tracing::debug!(
                        size_bytes = resource.size_bytes(),
                        "released evicted render resource"
                    );
                }
                Err(error) => {
                    summary.faulted += 1;
                    tracing::warn!(
                        error = %error,
                        size_bytes = resource.size_bytes(),
                        "failed to release evicted render resource"
                    );
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("release refused")]
    struct ReleaseRefused;

    struct Probe {
        releases: AtomicUsize,
        faulty: bool,
    }

    impl Probe {
        fn new() -> Arc<Probe> {
            Arc::new(Probe {
                releases: AtomicUsize::new(0),
                faulty: false,
            })
        }

        fn faulty() -> Arc<Probe> {
            Arc::new(Probe {
                releases: AtomicUsize::new(0),
                faulty: true,
            })
        }

        fn release_count(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    impl RenderResource for Probe {
        type Error = ReleaseRefused;

        fn size_bytes(&self) -> u64 {
            64
        }

        fn release(&self) -> Result<(), ReleaseRefused> {
            if self.faulty {
                return Err(ReleaseRefused);
            }
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn nothing_is_released_until_the_drain() {
        let relay = EvictionRelay::new();
        let probes: Vec<_> = (0..3).map(|_| Probe::new()).collect();
        for p in &probes {
            relay.offer(p.clone());
        }

        assert_eq!(relay.len(), 3);
        assert!(probes.iter().all(|p| p.release_count() == 0));

        let summary = relay.drain_and_release();
        assert_eq!(summary, ReleaseSummary { released: 3, faulted: 0 });
        assert!(relay.is_empty());
        assert!(probes.iter().all(|p| p.release_count() == 1));
    }

    #[test]
    fn one_faulty_release_does_not_stop_the_drain() {
        let relay = EvictionRelay::new();
        let first = Probe::new();
        let second = Probe::faulty();
        let third = Probe::new();
        relay.offer(first.clone());
        relay.offer(second.clone());
        relay.offer(third.clone());

        let summary = relay.drain_and_release();
        assert_eq!(summary, ReleaseSummary { released: 2, faulted: 1 });
        assert_eq!(first.release_count(), 1);
        assert_eq!(second.release_count(), 0);
        assert_eq!(third.release_count(), 1);
        assert!(relay.is_empty());
    }

    #[test]
    fn clear_discards_without_releasing() {
        let relay = EvictionRelay::new();
        let probe = Probe::new();
        relay.offer(probe.clone());

        relay.clear();
        assert!(relay.is_empty());
        assert_eq!(probe.release_count(), 0);

        // A later drain finds nothing left over.
        assert_eq!(relay.drain_and_release(), ReleaseSummary::default());
    }

    #[test]
    fn offers_from_many_threads_all_arrive() {
        let relay = Arc::new(EvictionRelay::new());
        let probe = Probe::new();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let relay = relay.clone();
                let probe = probe.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        relay.offer(probe.clone());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(relay.len(), 100);
        let summary = relay.drain_and_release();
        assert_eq!(summary.released, 100);
        assert_eq!(probe.release_count(), 100);
    }
}
