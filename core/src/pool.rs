//! Reference-counted resource pool keyed by virtual path.
//!
//! [`ResourcePool<T>`] maps case-insensitive string keys to owned values. Each
//! entry carries a reference count; an entry that is still referenced cannot be
//! removed, and unreferenced entries are reclaimed lazily by
//! [`release_unused`](ResourcePool::release_unused), one per call, so the cost of
//! collection is spread over many frames.
//!
//! # Example
//!
//! ```
//! use surge_core::pool::ResourcePool;
//!
//! let mut images = ResourcePool::<Vec<u8>>::new();
//! images.add("images/Title.png", vec![0u8; 16]);
//!
//! // lookups ignore case and slash direction is the caller's business
//! assert!(images.contains("IMAGES/title.PNG"));
//!
//! images.add_ref("images/title.png");
//! assert!(images.remove("images/title.png").is_err()); // still referenced
//!
//! images.unref("images/title.png");
//! assert!(images.release_unused());
//! assert!(images.is_empty());
//! ```

use thiserror::Error;

/// Number of buckets; a prime keeps the modulo well distributed.
pub const BUCKET_COUNT: usize = 97;

/// Hashing and equality policy for pool keys.
pub trait KeyPolicy {
    /// Hashes a key. Keys that compare equal must hash equally.
    fn hash(key: &str) -> u32;

    /// Compares two keys for equality.
    fn eq(a: &str, b: &str) -> bool;
}

/// Default key policy: ASCII case-insensitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl KeyPolicy for CaseInsensitive {
    fn hash(key: &str) -> u32 {
        key.bytes().fold(0u32, |h, c| {
            (c.to_ascii_lowercase() as u32)
                .wrapping_add(h << 6)
                .wrapping_add(h << 16)
                .wrapping_sub(h)
        })
    }

    fn eq(a: &str, b: &str) -> bool {
        a.eq_ignore_ascii_case(b)
    }
}

/// Exact, case-sensitive key policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseSensitive;

impl KeyPolicy for CaseSensitive {
    fn hash(key: &str) -> u32 {
        key.bytes().fold(0u32, |h, c| {
            (c as u32)
                .wrapping_add(h << 6)
                .wrapping_add(h << 16)
                .wrapping_sub(h)
        })
    }

    fn eq(a: &str, b: &str) -> bool {
        a == b
    }
}

/// Errors returned by pool mutations that were refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("can't remove \"{key}\": it has {count} active references")]
    Referenced { key: String, count: u32 },
    #[error("\"{0}\" does not exist")]
    NotFound(String),
}

type Destructor<T> = Box<dyn FnMut(&str, T)>;

struct Slot<T> {
    key: String,
    value: T,
    refs: u32,
}

/// A case-insensitive, reference-counted string-keyed table.
pub struct ResourcePool<T, K: KeyPolicy = CaseInsensitive> {
    buckets: Vec<Vec<Slot<T>>>,
    destructor: Option<Destructor<T>>,
    len: usize,
    _policy: std::marker::PhantomData<K>,
}

impl<T, K: KeyPolicy> Default for ResourcePool<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K: KeyPolicy> ResourcePool<T, K> {
    /// Creates an empty pool. Values are dropped when removed.
    pub fn new() -> Self {
        Self {
            buckets: (0..BUCKET_COUNT).map(|_| Vec::new()).collect(),
            destructor: None,
            len: 0,
            _policy: std::marker::PhantomData,
        }
    }

    /// Creates an empty pool whose removed values are handed to `destructor`.
    pub fn with_destructor(destructor: impl FnMut(&str, T) + 'static) -> Self {
        let mut pool = Self::new();
        pool.destructor = Some(Box::new(destructor));
        pool
    }

    fn bucket_of(key: &str) -> usize {
        K::hash(key) as usize % BUCKET_COUNT
    }

    fn position(&self, key: &str) -> (usize, Option<usize>) {
        let b = Self::bucket_of(key);
        let pos = self.buckets[b].iter().position(|slot| K::eq(&slot.key, key));
        (b, pos)
    }

    fn slot(&self, key: &str) -> Option<&Slot<T>> {
        let (b, pos) = self.position(key);
        pos.map(|i| &self.buckets[b][i])
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Slot<T>> {
        match self.position(key) {
            (b, Some(i)) => Some(&mut self.buckets[b][i]),
            (_, None) => None,
        }
    }

    fn destroy(&mut self, slot: Slot<T>) {
        log::trace!("pool: destroying \"{}\"", slot.key);
        match self.destructor.as_mut() {
            Some(destructor) => destructor(&slot.key, slot.value),
            None => drop(slot.value),
        }
    }

    /// Looks up a value, moving its entry to the front of its bucket.
    pub fn find(&mut self, key: &str) -> Option<&T> {
        let (b, pos) = self.position(key);
        let i = pos?;
        if i > 0 {
            let slot = self.buckets[b].remove(i);
            self.buckets[b].insert(0, slot);
        }
        Some(&self.buckets[b][0].value)
    }

    /// Looks up a value without touching bucket order.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.slot(key).map(|slot| &slot.value)
    }

    /// Mutable lookup without touching bucket order.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.slot_mut(key).map(|slot| &mut slot.value)
    }

    /// Returns `true` if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.slot(key).is_some()
    }

    /// Inserts a value at the head of its bucket with a reference count of zero.
    ///
    /// Does nothing and returns `false` when the key is already present; the
    /// given value is dropped in that case.
    pub fn add(&mut self, key: &str, value: T) -> bool {
        if self.contains(key) {
            return false;
        }
        let b = Self::bucket_of(key);
        self.buckets[b].insert(
            0,
            Slot {
                key: key.to_string(),
                value,
                refs: 0,
            },
        );
        self.len += 1;
        true
    }

    /// Replaces the value of an unreferenced entry, or adds it if missing.
    ///
    /// The previous value goes through the destructor.
    pub fn replace(&mut self, key: &str, value: T) -> Result<(), PoolError> {
        match self.refcount(key) {
            0 => {
                if self.contains(key) {
                    self.remove(key)?;
                }
                self.add(key, value);
                Ok(())
            }
            count => {
                log::warn!("pool: can't replace \"{key}\" with {count} active references");
                Err(PoolError::Referenced {
                    key: key.to_string(),
                    count,
                })
            }
        }
    }

    /// Removes and destroys an entry whose reference count is zero.
    ///
    /// A referenced entry is left intact and an error is returned; this is not
    /// fatal and the caller may retry once the references are dropped.
    pub fn remove(&mut self, key: &str) -> Result<(), PoolError> {
        let (b, pos) = self.position(key);
        let Some(i) = pos else {
            return Err(PoolError::NotFound(key.to_string()));
        };

        let count = self.buckets[b][i].refs;
        if count > 0 {
            log::warn!("pool: can't remove \"{key}\": it has {count} active references");
            return Err(PoolError::Referenced {
                key: key.to_string(),
                count,
            });
        }

        let slot = self.buckets[b].remove(i);
        self.len -= 1;
        self.destroy(slot);
        Ok(())
    }

    /// Increments the reference count of an entry and returns the new count.
    pub fn add_ref(&mut self, key: &str) -> u32 {
        match self.slot_mut(key) {
            Some(slot) => {
                slot.refs += 1;
                slot.refs
            }
            None => {
                log::warn!("pool: can't reference \"{key}\": element does not exist");
                0
            }
        }
    }

    /// Decrements the reference count of an entry, flooring at zero.
    pub fn unref(&mut self, key: &str) -> u32 {
        match self.slot_mut(key) {
            Some(slot) => {
                slot.refs = slot.refs.saturating_sub(1);
                slot.refs
            }
            None => {
                log::warn!("pool: can't unreference \"{key}\": element does not exist");
                0
            }
        }
    }

    /// Returns the reference count of an entry, or 0 when it does not exist.
    pub fn refcount(&self, key: &str) -> u32 {
        self.slot(key).map_or(0, |slot| slot.refs)
    }

    /// Removes the first unreferenced entry found, if any.
    ///
    /// At most one entry is collected per call. Returns whether one was.
    pub fn release_unused(&mut self) -> bool {
        let found = self
            .buckets
            .iter()
            .flat_map(|bucket| bucket.iter())
            .find(|slot| slot.refs == 0)
            .map(|slot| slot.key.clone());

        match found {
            Some(key) => self.remove(&key).is_ok(),
            None => false,
        }
    }

    /// Returns the first value satisfying `predicate`, in bucket order.
    pub fn find_where(&self, mut predicate: impl FnMut(&str, &T) -> bool) -> Option<&T> {
        self.iter()
            .find(|(key, value)| predicate(key, value))
            .map(|(_, value)| value)
    }

    /// Iterates over `(key, value)` pairs in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter())
            .map(|slot| (slot.key.as_str(), &slot.value))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the pool holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Destroys every entry regardless of its reference count.
    pub fn clear(&mut self) {
        let slots: Vec<Slot<T>> = self.buckets.iter_mut().flat_map(|b| b.drain(..)).collect();
        self.len = 0;
        for slot in slots {
            self.destroy(slot);
        }
    }
}

impl<T, K: KeyPolicy> Drop for ResourcePool<T, K> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T, K: KeyPolicy> std::fmt::Debug for ResourcePool<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tracked() -> (ResourcePool<i32>, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let pool = ResourcePool::with_destructor(move |key: &str, _value: i32| {
            sink.borrow_mut().push(key.to_string());
        });
        (pool, log)
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut pool = ResourcePool::<i32>::new();
        assert!(pool.add("Sprites/Surge.SPR", 1));
        assert_eq!(pool.get("sprites/surge.spr"), Some(&1));
        assert_eq!(CaseInsensitive::hash("ABC"), CaseInsensitive::hash("abc"));
    }

    #[test]
    fn test_add_existing_is_noop() {
        let mut pool = ResourcePool::<i32>::new();
        assert!(pool.add("a", 1));
        assert!(!pool.add("A", 2));
        assert_eq!(pool.get("a"), Some(&1));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove_refuses_referenced_entry() {
        let (mut pool, destroyed) = tracked();
        pool.add("a", 7);
        pool.add_ref("a");

        let err = pool.remove("a").unwrap_err();
        assert_eq!(
            err,
            PoolError::Referenced {
                key: "a".into(),
                count: 1
            }
        );
        assert_eq!(pool.find("a"), Some(&7));
        assert!(destroyed.borrow().is_empty());

        pool.unref("a");
        pool.remove("a").unwrap();
        assert_eq!(pool.find("a"), None);
        assert_eq!(*destroyed.borrow(), vec!["a".to_string()]);
    }

    #[test]
    fn test_release_unused_collects_one_per_call() {
        let (mut pool, destroyed) = tracked();
        pool.add("a", 1);
        pool.add("b", 2);
        pool.add("c", 3);
        pool.add_ref("b");

        assert!(pool.release_unused());
        assert_eq!(pool.len(), 2);
        assert!(pool.release_unused());
        assert_eq!(pool.len(), 1);
        assert!(!pool.release_unused());
        assert!(pool.contains("b"));
        assert_eq!(destroyed.borrow().len(), 2);
    }

    #[test]
    fn test_unref_floors_at_zero() {
        let mut pool = ResourcePool::<i32>::new();
        pool.add("a", 1);
        assert_eq!(pool.unref("a"), 0);
        assert_eq!(pool.unref("a"), 0);
        assert_eq!(pool.add_ref("a"), 1);
        assert_eq!(pool.refcount("a"), 1);
    }

    #[test]
    fn test_missing_keys() {
        let mut pool = ResourcePool::<i32>::new();
        assert_eq!(pool.add_ref("ghost"), 0);
        assert_eq!(pool.unref("ghost"), 0);
        assert_eq!(pool.refcount("ghost"), 0);
        assert_eq!(pool.remove("ghost"), Err(PoolError::NotFound("ghost".into())));
        assert_eq!(pool.find("ghost"), None);
    }

    #[test]
    fn test_find_moves_entry_to_bucket_head() {
        let mut pool = ResourcePool::<usize>::new();
        // keys that collide into one bucket
        let keys: Vec<String> = (0..5000)
            .map(|i| format!("k{i}"))
            .filter(|k| ResourcePool::<usize>::bucket_of(k) == 0)
            .take(3)
            .collect();
        for (i, k) in keys.iter().enumerate() {
            pool.add(k, i);
        }
        // newest first
        assert_eq!(pool.buckets[0][0].key, keys[2]);

        pool.find(&keys[0]);
        assert_eq!(pool.buckets[0][0].key, keys[0]);
        assert_eq!(pool.buckets[0].len(), 3);
    }

    #[test]
    fn test_replace() {
        let (mut pool, destroyed) = tracked();
        pool.replace("a", 1).unwrap();
        pool.replace("a", 2).unwrap();
        assert_eq!(pool.get("a"), Some(&2));
        assert_eq!(destroyed.borrow().len(), 1);

        pool.add_ref("a");
        assert!(pool.replace("a", 3).is_err());
        assert_eq!(pool.get("a"), Some(&2));
    }

    #[test]
    fn test_clear_and_drop_destroy_everything() {
        let (mut pool, destroyed) = tracked();
        pool.add("a", 1);
        pool.add("b", 2);
        pool.add_ref("a");
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(destroyed.borrow().len(), 2);

        pool.add("c", 3);
        drop(pool);
        assert_eq!(destroyed.borrow().len(), 3);
    }

    #[test]
    fn test_find_where_and_iter() {
        let mut pool = ResourcePool::<i32>::new();
        pool.add("one", 1);
        pool.add("two", 2);
        pool.add("three", 3);
        assert_eq!(pool.find_where(|_, v| *v > 2), Some(&3));
        assert_eq!(pool.iter().count(), 3);
    }

    #[test]
    fn test_case_sensitive_policy() {
        let mut pool = ResourcePool::<i32, CaseSensitive>::new();
        pool.add("a", 1);
        pool.add("A", 2);
        assert_eq!(pool.len(), 2);
    }
}
