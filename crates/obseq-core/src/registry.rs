//! Weak, non-owning backreference set keyed by identity tokens.

use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// A set of weak references bucketed by an identity token.
///
/// Tokens may collide: a bucket holds one slot per distinct referent, and
/// membership is always decided by pointer identity, never by the token
/// alone. Dead slots (referents that have been dropped) are excluded from
/// every read and culled from the backing map as a side effect; nothing is
/// ever removed eagerly.
///
/// This component never fails; absence is simply "not found".
#[derive(Debug)]
pub struct IdentityRegistry<R> {
    buckets: BTreeMap<u64, Vec<Weak<R>>>,
}

impl<R> Default for IdentityRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> IdentityRegistry<R> {
    pub fn new() -> Self {
        Self { buckets: BTreeMap::new() }
    }

    /// Adds a weak reference under `key`. A second insert of the same
    /// referent into the same bucket is a no-op; dead slots in the bucket
    /// are culled first.
    pub fn insert(&mut self, key: u64, entry: &Rc<R>) {
        let bucket = self.buckets.entry(key).or_default();
        bucket.retain(|slot| slot.strong_count() > 0);
        if bucket.iter().any(|slot| std::ptr::eq(slot.as_ptr(), Rc::as_ptr(entry))) {
            return;
        }
        bucket.push(Rc::downgrade(entry));
    }

    /// Drops the slot for `entry` under `key`; when the bucket empties it is
    /// dropped as well.
    pub fn remove(&mut self, key: u64, entry: &Rc<R>) {
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.retain(|slot| {
                slot.strong_count() > 0 && !std::ptr::eq(slot.as_ptr(), Rc::as_ptr(entry))
            });
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
    }

    /// Whether a live slot for `entry` exists under `key`. Dead slots
    /// encountered on the way are culled.
    pub fn contains(&mut self, key: u64, entry: &Rc<R>) -> bool {
        let Some(bucket) = self.buckets.get_mut(&key) else {
            return false;
        };
        bucket.retain(|slot| slot.strong_count() > 0);
        if bucket.is_empty() {
            self.buckets.remove(&key);
            return false;
        }
        bucket.iter().any(|slot| std::ptr::eq(slot.as_ptr(), Rc::as_ptr(entry)))
    }

    /// Upgrades every live slot, culling dead ones. Order is unspecified.
    pub fn live(&mut self) -> Vec<Rc<R>> {
        let mut out = Vec::new();
        self.buckets.retain(|_, bucket| {
            bucket.retain(|slot| {
                if let Some(strong) = slot.upgrade() {
                    out.push(strong);
                    true
                } else {
                    false
                }
            });
            !bucket.is_empty()
        });
        out
    }

    /// Number of live entries. Dead slots are culled as a side effect.
    pub fn live_count(&mut self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.live_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates_by_referent() {
        let mut registry: IdentityRegistry<u32> = IdentityRegistry::new();
        let a = Rc::new(1u32);
        registry.insert(70_000, &a);
        registry.insert(70_000, &a);
        assert_eq!(registry.live_count(), 1);
        assert!(registry.contains(70_000, &a));
    }

    #[test]
    fn colliding_tokens_share_a_bucket() {
        let mut registry: IdentityRegistry<u32> = IdentityRegistry::new();
        let a = Rc::new(1u32);
        let b = Rc::new(2u32);
        registry.insert(70_000, &a);
        registry.insert(70_000, &b);
        assert_eq!(registry.live_count(), 2);
        assert!(registry.contains(70_000, &a));
        assert!(registry.contains(70_000, &b));
    }

    #[test]
    fn remove_drops_only_the_matching_slot() {
        let mut registry: IdentityRegistry<u32> = IdentityRegistry::new();
        let a = Rc::new(1u32);
        let b = Rc::new(2u32);
        registry.insert(70_000, &a);
        registry.insert(70_000, &b);
        registry.remove(70_000, &a);
        assert!(!registry.contains(70_000, &a));
        assert!(registry.contains(70_000, &b));
    }

    #[test]
    fn dead_entries_are_excluded_and_culled_lazily() {
        let mut registry: IdentityRegistry<u32> = IdentityRegistry::new();
        let a = Rc::new(1u32);
        let b = Rc::new(2u32);
        registry.insert(70_000, &a);
        registry.insert(80_000, &b);
        drop(a);
        let live = registry.live();
        assert_eq!(live.len(), 1);
        assert_eq!(*live[0], 2);
        // The dead bucket is gone; a fresh insert observes the cleaned state.
        let c = Rc::new(3u32);
        registry.insert(70_000, &c);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn absence_is_not_an_error() {
        let mut registry: IdentityRegistry<u32> = IdentityRegistry::new();
        let a = Rc::new(1u32);
        registry.remove(90_000, &a);
        assert!(!registry.contains(90_000, &a));
        assert!(registry.is_empty());
    }
}
