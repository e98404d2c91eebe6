// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The thread-safe keyed storage underneath every cache.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Maps keys to shared element handles behind a single, non-recursive mutex.
///
/// Single operations lock internally. Multi-step operations (check-then-insert,
/// batch iteration) take the lock once with [`Collection::lock`] and work on the
/// returned [`CollectionLock`]; dropping it unlocks.
#[derive(Debug)]
pub struct Collection<K, E> {
    elements: Mutex<HashMap<K, Arc<E>>>,
}

impl<K: Eq + Hash, E> Collection<K, E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            elements: Mutex::new(HashMap::new()),
        }
    }

    /// Takes the collection lock until the returned guard is dropped.
    ///
    /// The lock is not re-entrant: calling any other method of this collection
    /// while holding the guard on the same thread deadlocks.
    pub fn lock(&self) -> CollectionLock<'_, K, E> {
        CollectionLock {
            guard: self.elements.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Returns the element stored under `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<Arc<E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().find(key)
    }

    /// Returns `true` if `key` is present.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().has(key)
    }

    /// Removes and returns the element stored under `key`.
    pub fn erase<Q>(&self, key: &Q) -> Option<Arc<E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().erase(key)
    }

    /// The number of stored elements.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, E> Default for Collection<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to a [`Collection`]'s contents.
pub struct CollectionLock<'a, K, E> {
    guard: MutexGuard<'a, HashMap<K, Arc<E>>>,
}

impl<K: Eq + Hash, E> CollectionLock<'_, K, E> {
    /// Returns the element stored under `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<Arc<E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.guard.get(key).cloned()
    }

    /// Returns `true` if `key` is present.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.guard.contains_key(key)
    }

    /// Stores `element` under `key` unless the key is taken.
    ///
    /// Returns the element now stored under `key` and whether it is `element`.
    pub fn insert_if_absent(&mut self, key: K, element: Arc<E>) -> (Arc<E>, bool) {
        match self.guard.get(&key) {
            Some(existing) => (existing.clone(), false),
            None => {
                self.guard.insert(key, element.clone());
                (element, true)
            }
        }
    }

    /// Removes and returns the element stored under `key`.
    pub fn erase<Q>(&mut self, key: &Q) -> Option<Arc<E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.guard.remove(key)
    }

    /// Removes every element, handing them out.
    pub fn drain(&mut self) -> impl Iterator<Item = (K, Arc<E>)> + '_ {
        self.guard.drain()
    }
}

impl<K, E> Deref for CollectionLock<'_, K, E> {
    type Target = HashMap<K, Arc<E>>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<K, E> DerefMut for CollectionLock<'_, K, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_if_absent_keeps_first() {
        let collection = Collection::<String, u32>::new();
        let mut lock = collection.lock();
        let (first, inserted) = lock.insert_if_absent("a".into(), Arc::new(1));
        assert!(inserted);
        let (second, inserted) = lock.insert_if_absent("a".into(), Arc::new(2));
        assert!(!inserted);
        assert!(Arc::ptr_eq(&first, &second));
        drop(lock);
        assert_eq!(*collection.find("a").unwrap(), 1);
    }

    #[test]
    fn erase_missing_key_is_none() {
        let collection = Collection::<String, u32>::new();
        assert!(collection.erase("nothing").is_none());
        assert!(collection.is_empty());
    }

    #[test]
    fn lock_allows_batch_iteration() {
        let collection = Collection::<String, u32>::new();
        {
            let mut lock = collection.lock();
            for (i, key) in ["x", "y", "z"].iter().enumerate() {
                lock.insert_if_absent(key.to_string(), Arc::new(i as u32));
            }
        }
        let sum: u32 = collection.lock().values().map(|v| **v).sum();
        assert_eq!(sum, 3);
        assert_eq!(collection.lock().drain().count(), 3);
        assert!(collection.is_empty());
    }
}
