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

//! The generic owning cache.
//!
//! A [`Cache`] is the single source of truth for the lifetime of one resource
//! type. It guarantees at most one element per key; duplicate or null inserts
//! are logged and the existing state is returned, never an error.

use super::collection::{Collection, CollectionLock};
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Builds an element from its key and constructor arguments.
///
/// Runs under the collection lock and must not touch the cache it feeds.
pub type Producer<E, A, K> = Box<dyn Fn(&K, A) -> Arc<E> + Send + Sync>;

/// Post-construction setup, run once for each inserted element.
pub type Initialiser<E, K> = Box<dyn Fn(&K, &Arc<E>) + Send + Sync>;

/// Pre-destruction teardown.
pub type Cleaner<E, K> = Box<dyn Fn(&K, &Arc<E>) + Send + Sync>;

/// Moves one element of a source cache into a locked destination collection.
pub type Merger<E, K> = Box<dyn Fn(K, Arc<E>, &mut CollectionLock<'_, K, E>) + Send + Sync>;

/// Inserts into the destination unless the key is taken there, in which case
/// the destination's element wins.
pub fn default_merger<E, K>(key: K, element: Arc<E>, destination: &mut CollectionLock<'_, K, E>)
where
    K: Eq + Hash + fmt::Debug,
{
    let (_, inserted) = destination.insert_if_absent(key, element);
    if !inserted {
        log::warn!("Merge: duplicate key, the destination element is kept");
    }
}

/// A keyed, thread-safe owner of shared elements.
///
/// `A` is the type of the constructor arguments handed to the producer and `K`
/// the key type.
///
/// ```
/// use pollux_data::cache::Cache;
/// use std::sync::Arc;
///
/// let meshes: Cache<String> = Cache::new("Mesh", |name: &String, ()| Arc::new(name.clone()));
/// let floor = meshes.add("floor".to_string(), ());
/// let again = meshes.add("floor".to_string(), ());
/// assert!(Arc::ptr_eq(&floor, &again));
/// assert_eq!(meshes.len(), 1);
/// ```
pub struct Cache<E, A = (), K = String> {
    name: String,
    elements: Collection<K, E>,
    producer: Producer<E, A, K>,
    initialiser: Option<Initialiser<E, K>>,
    cleaner: Option<Cleaner<E, K>>,
    merger: Merger<E, K>,
}

impl<E, A, K> Cache<E, A, K>
where
    E: 'static,
    K: Eq + Hash + Clone + fmt::Debug + 'static,
{
    /// Creates an empty cache named `name` (used in log lines).
    pub fn new(
        name: impl Into<String>,
        producer: impl Fn(&K, A) -> Arc<E> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            elements: Collection::new(),
            producer: Box::new(producer),
            initialiser: None,
            cleaner: None,
            merger: Box::new(default_merger::<E, K>),
        }
    }

    /// Sets the initialiser run on every element inserted with initialisation.
    pub fn with_initialiser(
        mut self,
        initialiser: impl Fn(&K, &Arc<E>) + Send + Sync + 'static,
    ) -> Self {
        self.initialiser = Some(Box::new(initialiser));
        self
    }

    /// Sets the cleaner run by [`Cache::cleanup`].
    pub fn with_cleaner(mut self, cleaner: impl Fn(&K, &Arc<E>) + Send + Sync + 'static) -> Self {
        self.cleaner = Some(Box::new(cleaner));
        self
    }

    /// Replaces the [`default_merger`].
    pub fn with_merger(
        mut self,
        merger: impl Fn(K, Arc<E>, &mut CollectionLock<'_, K, E>) + Send + Sync + 'static,
    ) -> Self {
        self.merger = Box::new(merger);
        self
    }

    /// The cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds an element through the producer without inserting it.
    pub fn create(&self, key: &K, args: A) -> Arc<E> {
        log::trace!("{}: creating {:?}", self.name, key);
        (self.producer)(key, args)
    }

    fn initialise(&self, key: &K, element: &Arc<E>) {
        if let Some(initialiser) = &self.initialiser {
            initialiser(key, element);
        }
    }

    /// Inserts a pre-built element.
    ///
    /// Returns the element stored under `key` afterwards: `element` itself, or
    /// the existing one if the key was taken. A `None` element is rejected with
    /// a warning and `None` is returned.
    pub fn add_element(&self, key: K, element: Option<Arc<E>>, initialise: bool) -> Option<Arc<E>> {
        let Some(element) = element else {
            log::warn!("{}: can't add null element {:?}", self.name, key);
            return None;
        };
        let mut lock = self.elements.lock();
        if let Some(existing) = lock.find(&key) {
            log::warn!("{}: duplicate {:?}, keeping the existing element", self.name, key);
            return Some(existing);
        }
        if initialise {
            self.initialise(&key, &element);
        }
        lock.insert_if_absent(key.clone(), element.clone());
        log::debug!("{}: added {:?}", self.name, key);
        Some(element)
    }

    /// Creates, initialises and inserts an element under a single lock.
    ///
    /// If `key` is taken, the existing element is returned with a duplicate
    /// warning and the producer is not called.
    pub fn add(&self, key: K, args: A) -> Arc<E> {
        let (element, created) = self.try_add(key.clone(), true, args);
        if !created {
            log::warn!("{}: duplicate {:?}, keeping the existing element", self.name, key);
        }
        element
    }

    /// Like [`Cache::add`] but reports whether the element was created by this
    /// call, and leaves duplicate handling to the caller.
    pub fn try_add(&self, key: K, initialise: bool, args: A) -> (Arc<E>, bool) {
        let mut lock = self.elements.lock();
        if let Some(existing) = lock.find(&key) {
            return (existing, false);
        }
        let element = self.create(&key, args);
        if initialise {
            self.initialise(&key, &element);
        }
        log::debug!("{}: added {:?}", self.name, key);
        lock.insert_if_absent(key, element)
    }

    /// Removes the element stored under `key`, if any.
    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.elements.erase(key)
    }

    /// Returns the element stored under `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<Arc<E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.elements.find(key)
    }

    /// Returns `true` if `key` is present.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.elements.has(key)
    }

    /// Moves every element into `other` through this cache's merger, then
    /// leaves this cache empty.
    ///
    /// Both collections are locked for the whole merge, in address order, so
    /// two merges running in opposite directions can't deadlock. Every
    /// operation that locks two caches must follow the same order.
    pub fn merge_into(&self, other: &Self) {
        self.merge_into_with(other, &self.merger);
    }

    /// [`Cache::merge_into`] with a one-off merger.
    pub fn merge_into_with<M>(&self, other: &Self, merger: M)
    where
        M: Fn(K, Arc<E>, &mut CollectionLock<'_, K, E>),
    {
        if std::ptr::eq(self, other) {
            log::warn!("{}: can't merge a cache into itself", self.name);
            return;
        }
        let (mut source, mut destination) = if (self as *const Self) < (other as *const Self) {
            let source = self.elements.lock();
            (source, other.elements.lock())
        } else {
            let destination = other.elements.lock();
            (self.elements.lock(), destination)
        };
        let count = source.len();
        for (key, element) in source.drain() {
            merger(key, element, &mut destination);
        }
        log::debug!(
            "{}: merged {} element(s) into {}",
            self.name,
            count,
            other.name
        );
    }

    /// Runs `f` on every element under the collection lock.
    ///
    /// `f` must not call back into this cache.
    pub fn for_each(&self, mut f: impl FnMut(&K, &Arc<E>)) {
        let lock = self.elements.lock();
        for (key, element) in lock.iter() {
            f(key, element);
        }
    }

    /// Snapshot of the current elements.
    pub fn elements(&self) -> Vec<(K, Arc<E>)> {
        self.elements
            .lock()
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    /// Runs the cleaner on every element without removing them.
    pub fn cleanup(&self) {
        if let Some(cleaner) = &self.cleaner {
            self.for_each(|key, element| cleaner(key, element));
        }
    }

    /// Runs the cleaner on one element, if a cleaner is set.
    pub fn clean(&self, key: &K, element: &Arc<E>) {
        if let Some(cleaner) = &self.cleaner {
            cleaner(key, element);
        }
    }

    /// Empties the cache unconditionally.
    pub fn clear(&self) {
        self.elements.lock().clear();
    }

    /// Takes the collection lock for a multi-step operation.
    pub fn lock(&self) -> CollectionLock<'_, K, E> {
        self.elements.lock()
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<E, A, K> fmt::Debug for Cache<E, A, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Mesh {
        name: String,
    }

    fn mesh_cache() -> Cache<Mesh> {
        Cache::new("Mesh", |name: &String, ()| {
            Arc::new(Mesh { name: name.clone() })
        })
    }

    #[test]
    fn create_does_not_insert() {
        let cache = mesh_cache();
        let mesh = cache.create(&"floor".to_string(), ());
        assert_eq!(mesh.name, "floor");
        assert!(cache.is_empty());
    }

    #[test]
    fn add_element_rejects_null_and_duplicates() {
        let cache = mesh_cache();
        assert!(cache.add_element("a".into(), None, false).is_none());
        assert!(cache.is_empty());

        let first = Arc::new(Mesh { name: "a".into() });
        let stored = cache
            .add_element("a".into(), Some(first.clone()), false)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &stored));

        let second = Arc::new(Mesh { name: "a2".into() });
        let stored = cache.add_element("a".into(), Some(second), false).unwrap();
        assert!(Arc::ptr_eq(&first, &stored));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn initialiser_runs_once_per_created_element() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let cache = mesh_cache().with_initialiser(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        cache.add("a".into(), ());
        cache.add("a".into(), ());
        let (_, created) = cache.try_add("b".into(), false, ());
        assert!(created);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_missing_is_noop() {
        let cache = mesh_cache();
        cache.add("a".into(), ());
        assert!(cache.remove("b").is_none());
        assert!(cache.remove("a").is_some());
        assert!(!cache.has("a"));
    }

    #[test]
    fn cleanup_keeps_elements_clear_drops_them() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let counter = cleaned.clone();
        let cache = mesh_cache().with_cleaner(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        cache.add("a".into(), ());
        cache.add("b".into(), ());
        cache.cleanup();
        assert_eq!(cleaned.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cleaned.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn merge_into_itself_is_refused() {
        let cache = mesh_cache();
        cache.add("a".into(), ());
        cache.merge_into(&cache);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn merge_keeps_destination_on_conflict() {
        let a = mesh_cache();
        let b = mesh_cache();
        let original = b.add("shared".into(), ());
        a.add("shared".into(), ());
        a.add("only_a".into(), ());
        a.merge_into(&b);
        assert!(a.is_empty());
        assert_eq!(b.len(), 2);
        assert!(Arc::ptr_eq(&b.find("shared").unwrap(), &original));
    }

    #[test]
    fn custom_merger_can_rename() {
        let a = mesh_cache().with_merger(|key: String, element, destination| {
            let key = if destination.has(&key) {
                format!("{key}_merged")
            } else {
                key
            };
            destination.insert_if_absent(key, element);
        });
        let b = mesh_cache();
        a.add("x".into(), ());
        b.add("x".into(), ());
        a.merge_into(&b);
        assert!(b.has("x") && b.has("x_merged"));
    }
}
