//! A [BoundedLru] is an LRU map with a byte budget: every entry carries the size of its value,
//! and once an insertion pushes the total over capacity the least-recently-used entries are shed
//! until occupancy falls back to the low-water mark.
//!
//! This is implemented as a vec-backed doubly linked list with a free list threaded through the
//! vacant slots, plus an auxiliary hash index.  Keys are allocated behind `Arc` so the index and
//! the slot can share them; values are behind `Arc` so a caller can keep using a resource after
//! the budget pushes it out.
//!
//! Displaced values are not dropped silently: they are handed to an
//! [EvictionObserver](crate::EvictionObserver) supplied at construction, which distinguishes
//! entries evicted by policy from entries replaced under their own key.  The store itself does no
//! locking; it is owned and mutated by exactly one thread.
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use ahash::RandomState;

use crate::EvictionObserver;

struct OccupiedSlot<K, V> {
    key: Arc<K>,
    value: Arc<V>,
    size_bytes: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

struct FreeSlot {
    next_free: Option<usize>,
}

enum Slot<K, V> {
    /// Vacant, possibly pointing at the next vacant slot.
    Free(FreeSlot),
    /// Resident, doubly linked to its recency neighbors.
    Occupied(OccupiedSlot<K, V>),
}

impl<K, V> Slot<K, V> {
    fn as_occupied(&self) -> &OccupiedSlot<K, V> {
        match self {
            Slot::Occupied(ref x) => x,
            _ => panic!("Slot should be occupied"),
        }
    }

    fn as_occupied_mut(&mut self) -> &mut OccupiedSlot<K, V> {
        match self {
            Slot::Occupied(ref mut x) => x,
            _ => panic!("Slot should be occupied"),
        }
    }

    fn as_free_mut(&mut self) -> &mut FreeSlot {
        match self {
            Slot::Free(ref mut x) => x,
            _ => panic!("Slot should be free"),
        }
    }
}

/// A byte-budget LRU store with hysteresis and displacement notifications.
pub struct BoundedLru<K: Hash + Eq, V, O: EvictionObserver<V>> {
    slots: Vec<Slot<K, V>>,
    /// Points at the slot index of each resident key.
    index: HashMap<Arc<K>, usize, RandomState>,
    /// Occupancy that triggers eviction.
    capacity_bytes: u64,
    /// Occupancy that eviction drains down to; equal to the capacity unless hysteresis is wanted.
    low_water_bytes: u64,
    used_bytes: u64,
    lru_head: Option<usize>,
    lru_tail: Option<usize>,
    free_head: Option<usize>,
    observer: O,
}

impl<K: Hash + Eq, V, O: EvictionObserver<V>> BoundedLru<K, V, O> {
    /// A store with no hysteresis: eviction drains straight down to `capacity_bytes`.
    pub fn new(capacity_bytes: u64, observer: O) -> BoundedLru<K, V, O> {
        Self::with_low_water(capacity_bytes, capacity_bytes, observer)
    }

    pub fn with_low_water(
        capacity_bytes: u64,
        low_water_bytes: u64,
        observer: O,
    ) -> BoundedLru<K, V, O> {
        assert!(
            low_water_bytes <= capacity_bytes,
            "low water mark must not exceed capacity"
        );
        BoundedLru {
            slots: Default::default(),
            index: Default::default(),
            capacity_bytes,
            low_water_bytes,
            used_bytes: 0,
            lru_head: None,
            lru_tail: None,
            free_head: None,
            observer,
        }
    }

    /// Entirely unlink an occupied slot from the recency list.
    /// Used as a precursor to promotion and to vacating the slot.
    fn unlink(&mut self, index: usize) {
        if Some(index) == self.lru_tail {
            self.lru_tail = self.slots[index].as_occupied().prev;
        }

        if Some(index) == self.lru_head {
            // Unlinking the head is special.
            self.lru_head = self.slots[index].as_occupied_mut().next;
            if let Some(n) = self.lru_head {
                self.slots[n].as_occupied_mut().prev = None;
            }

            return;
        }

        let old_prev = self.slots[index]
            .as_occupied_mut()
            .prev
            .expect("Isn't the head");
        let old_next = self.slots[index].as_occupied_mut().next;
        self.slots[old_prev].as_occupied_mut().next = old_next;
        if let Some(n) = old_next {
            self.slots[n].as_occupied_mut().prev = Some(old_prev);
        }
    }

    /// Given the index of an occupied slot, make it the most recently used entry.
    fn promote(&mut self, index: usize) {
        self.unlink(index);
        self.slots[index].as_occupied_mut().prev = None;
        self.slots[index].as_occupied_mut().next = self.lru_head;
        if let Some(h) = self.lru_head {
            self.slots[h].as_occupied_mut().prev = Some(index);
        }
        self.lru_head = Some(index);

        // If this is the only entry, unlinking it broke the tail.
        if self.lru_tail.is_none() {
            self.lru_tail = Some(index);
        }
    }

    /// Vacate an occupied slot, fixing up the index and the budget, and return the value.
    fn take_slot(&mut self, index: usize) -> Arc<V> {
        self.unlink(index);
        let mut old = Slot::Free(FreeSlot {
            next_free: self.free_head,
        });
        std::mem::swap(&mut old, &mut self.slots[index]);
        self.free_head = Some(index);
        match old {
            Slot::Occupied(OccupiedSlot {
                key,
                value,
                size_bytes,
                ..
            }) => {
                self.index.remove(&key);
                self.used_bytes -= size_bytes;
                value
            }
            _ => panic!("Slot should have been occupied"),
        }
    }

    /// Find a vacant slot, or grow the vec if there is none.
    fn acquire_slot(&mut self) -> usize {
        if let Some(f) = self.free_head {
            self.free_head = self.slots[f].as_free_mut().next_free;
            return f;
        }

        self.slots.push(Slot::Free(FreeSlot { next_free: None }));
        self.slots.len() - 1
    }

    /// Return the value for `key` and promote it to most recently used.
    pub fn get(&mut self, key: &K) -> Option<Arc<V>> {
        let index = *self.index.get(key)?;
        self.promote(index);
        Some(self.slots[index].as_occupied().value.clone())
    }

    /// Whether `key` is resident, without touching recency.
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace the entry for `key`.
    ///
    /// Replacing fires `entry_replaced` for the old value.  If the insertion pushes occupancy
    /// over capacity, least-recently-used entries other than the one just inserted are handed to
    /// `entry_removed` until occupancy is back at the low-water mark or nothing else can go.
    pub fn insert(&mut self, key: K, value: V, size_bytes: u64) {
        let key = Arc::new(key);
        if let Some(existing) = self.index.get(&*key).copied() {
            let old = self.take_slot(existing);
            self.observer.entry_replaced(old);
        }

        let index = self.acquire_slot();
        let old_head = self.lru_head;
        self.slots[index] = Slot::Occupied(OccupiedSlot {
            key: key.clone(),
            value: Arc::new(value),
            size_bytes,
            prev: None,
            next: old_head,
        });
        self.lru_head = Some(index);
        if let Some(h) = old_head {
            self.slots[h].as_occupied_mut().prev = Some(index);
        }
        if self.lru_tail.is_none() {
            self.lru_tail = Some(index);
        }
        self.index.insert(key, index);
        self.used_bytes += size_bytes;

        self.shed_over_budget(index);
    }

    /// Remove the entry for `key` without notifying the observer; the caller takes over the
    /// value's disposal.
    pub fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        let index = self.index.get(key).copied()?;
        Some(self.take_slot(index))
    }

    /// Run evictions if the last insertion went over budget.
    ///
    /// The entry at `protected` is the one just inserted and is never a victim, so a single entry
    /// larger than the whole budget still becomes resident.
    fn shed_over_budget(&mut self, protected: usize) {
        if self.used_bytes <= self.capacity_bytes {
            return;
        }

        while self.used_bytes > self.low_water_bytes {
            let victim = match self.lru_tail {
                Some(t) if t != protected => t,
                _ => break,
            };
            let value = self.take_slot(victim);
            self.observer.entry_removed(value);
        }
    }

    /// Drop every entry and zero the budget without firing any notifications.
    ///
    /// For when the values are already dead (the graphics context that owned them is gone) and
    /// routing them through release bookkeeping would be wrong.
    pub fn invalidate_all(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.lru_head = None;
        self.lru_tail = None;
        self.free_head = None;
        self.used_bytes = 0;
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn low_water_bytes(&self) -> u64 {
        self.low_water_bytes
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Iterator visiting entries in most-recently-used order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Arc<V>)> {
        let mut cursor = self.lru_head;
        std::iter::from_fn(move || {
            let index = cursor?;
            let slot = self.slots[index].as_occupied();
            cursor = slot.next;
            Some((&*slot.key, &slot.value))
        })
    }
}
