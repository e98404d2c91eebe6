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

use super::cache::Cache;
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

type ViewCleaner<E, K> = Box<dyn Fn(&K, &Arc<E>) + Send + Sync>;

/// A scoped subset of a shared [`Cache`].
///
/// The view records the keys it created and removes exactly those from the
/// cache when cleared or dropped. It never owns elements and holds no lock of
/// its own: mutation goes through `&mut self` and the cache's locking.
///
/// Keys removed from the cache by a third party while tracked are skipped when
/// the view is cleared.
pub struct CacheView<E, A = (), K = String>
where
    E: 'static,
    K: Eq + Hash + Clone + fmt::Debug + 'static,
{
    name: String,
    cache: Arc<Cache<E, A, K>>,
    tracked: HashSet<K>,
    cleaner: Option<ViewCleaner<E, K>>,
}

impl<E, A, K> CacheView<E, A, K>
where
    E: 'static,
    K: Eq + Hash + Clone + fmt::Debug + 'static,
{
    /// Creates an empty view over `cache`.
    pub fn new(name: impl Into<String>, cache: Arc<Cache<E, A, K>>) -> Self {
        Self {
            name: name.into(),
            cache,
            tracked: HashSet::new(),
            cleaner: None,
        }
    }

    /// Sets a cleaner run on every element this view removes.
    pub fn with_cleaner(mut self, cleaner: impl Fn(&K, &Arc<E>) + Send + Sync + 'static) -> Self {
        self.cleaner = Some(Box::new(cleaner));
        self
    }

    /// Adds through the underlying cache, tracking `key` only if this call
    /// created the element.
    pub fn add(&mut self, key: K, args: A) -> Arc<E> {
        let (element, created) = self.try_add(key.clone(), true, args);
        if !created {
            log::warn!(
                "{}: {:?} already exists in {}, not tracked by this view",
                self.name,
                key,
                self.cache.name()
            );
        }
        element
    }

    /// Adds through the underlying cache and reports whether creation occurred.
    pub fn try_add(&mut self, key: K, initialise: bool, args: A) -> (Arc<E>, bool) {
        let (element, created) = self.cache.try_add(key.clone(), initialise, args);
        if created {
            self.tracked.insert(key);
        }
        (element, created)
    }

    /// Inserts a pre-built element, tracking it only if it was stored.
    pub fn add_element(
        &mut self,
        key: K,
        element: Option<Arc<E>>,
        initialise: bool,
    ) -> Option<Arc<E>> {
        let candidate = element.clone();
        let stored = self.cache.add_element(key.clone(), element, initialise)?;
        if candidate.is_some_and(|c| Arc::ptr_eq(&c, &stored)) {
            self.tracked.insert(key);
        }
        Some(stored)
    }

    /// Removes `key` from the tracked set and from the underlying cache.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<Arc<E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let owned = self.tracked.take(key);
        let removed = self.cache.remove(key);
        if let (Some(key), Some(element), Some(cleaner)) = (&owned, &removed, &self.cleaner) {
            cleaner(key, element);
        }
        removed
    }

    /// Looks `key` up in the underlying cache.
    pub fn find<Q>(&self, key: &Q) -> Option<Arc<E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.find(key)
    }

    /// Returns `true` if this view created `key`.
    pub fn is_tracked<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.tracked.contains(key)
    }

    /// The keys this view created.
    pub fn tracked(&self) -> impl Iterator<Item = &K> {
        self.tracked.iter()
    }

    /// The number of tracked keys.
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// The underlying cache.
    pub fn cache(&self) -> &Arc<Cache<E, A, K>> {
        &self.cache
    }

    /// Removes every tracked key from the underlying cache.
    pub fn clear(&mut self) {
        for key in self.tracked.drain() {
            match self.cache.remove(&key) {
                Some(element) => {
                    if let Some(cleaner) = &self.cleaner {
                        cleaner(&key, &element);
                    }
                }
                None => log::debug!(
                    "{}: {:?} was already removed from {}",
                    self.name,
                    key,
                    self.cache.name()
                ),
            }
        }
    }
}

impl<E, A, K> Drop for CacheView<E, A, K>
where
    E: 'static,
    K: Eq + Hash + Clone + fmt::Debug + 'static,
{
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn listeners() -> Arc<Cache<String>> {
        Arc::new(Cache::new("Listener", |name: &String, ()| {
            Arc::new(name.clone())
        }))
    }

    #[test]
    fn view_does_not_claim_existing_keys() {
        let cache = listeners();
        cache.add("global".into(), ());
        let mut view = CacheView::new("Scene", cache.clone());
        let (_, created) = view.try_add("global".into(), true, ());
        assert!(!created);
        assert!(!view.is_tracked("global"));

        drop(view);
        assert!(cache.has("global"));
    }

    #[test]
    fn add_element_tracks_only_stored_elements() {
        let cache = listeners();
        let mut view = CacheView::new("Scene", cache.clone());
        view.add_element("a".into(), Some(Arc::new("a".to_string())), false);
        view.add_element("a".into(), Some(Arc::new("other".to_string())), false);
        assert!(view.add_element("b".into(), None, false).is_none());
        assert_eq!(view.len(), 1);
        assert_eq!(*cache.find("a").unwrap(), "a");
    }

    #[test]
    fn remove_forwards_and_untracks() {
        let cache = listeners();
        let mut view = CacheView::new("Scene", cache.clone());
        view.add("a".into(), ());
        assert!(view.remove("a").is_some());
        assert!(!cache.has("a"));
        assert!(view.is_empty());
    }

    #[test]
    fn clear_runs_cleaner_and_tolerates_external_removal() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let counter = cleaned.clone();
        let cache = listeners();
        let mut view = CacheView::new("Scene", cache.clone()).with_cleaner(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        view.add("a".into(), ());
        view.add("b".into(), ());
        cache.remove("b");

        view.clear();
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
        assert!(view.is_empty());
    }
}
