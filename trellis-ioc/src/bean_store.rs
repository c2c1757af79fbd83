//! The concurrent cache of live bean instances, keyed solely by bean name.
//!
//! The store is the only shared mutable state on the resolution hot path and needs no external
//! locking. Internally it is a sharded concurrent map; every accessor clones entries out instead
//! of handing out guards, so resolution can safely re-enter the store while constructing nested
//! dependencies.

use crate::component_registry::ComponentMetadata;
use crate::instance_provider::{AnyBeanPtr, CastFunction};
use crate::lifecycle::Readiness;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use derivative::Derivative;
use fxhash::FxBuildHasher;
use itertools::Itertools;
use std::sync::Arc;

type FxDashMap<K, V> = DashMap<K, V, FxBuildHasher>;

/// A cached instance: its name, the type-erased handle, the cast registered for it, its shutdown
/// hook and its construction-completion state.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanInstance {
    pub bean_name: String,
    #[derivative(Debug = "ignore")]
    pub instance: AnyBeanPtr,
    #[derivative(Debug = "ignore")]
    pub(crate) cast: CastFunction,
    #[derivative(Debug = "ignore")]
    stop: fn(&AnyBeanPtr),
    pub(crate) readiness: Arc<Readiness>,
}

impl BeanInstance {
    /// Creates a fresh zero-value placeholder for the given metadata.
    pub(crate) fn new(bean_name: impl Into<String>, metadata: &ComponentMetadata) -> Self {
        Self {
            bean_name: bean_name.into(),
            instance: (metadata.constructor)(),
            cast: metadata.cast,
            stop: metadata.stop,
            readiness: Arc::new(Readiness::new()),
        }
    }

    /// The construction-completion signal for this instance.
    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub(crate) fn stop(&self) {
        (self.stop)(&self.instance)
    }

    /// Instance identity - two records are the same bean iff they share the underlying handle.
    pub fn same_instance(&self, other: &BeanInstance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

/// Concurrent name -> instance cache supporting safe concurrent read, create-if-absent, swap and
/// compare-and-swap.
#[derive(Debug, Default)]
pub struct BeanStore {
    beans: FxDashMap<String, BeanInstance>,
}

impl BeanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, name: &str) -> Option<BeanInstance> {
        self.beans.get(name).map(|entry| entry.value().clone())
    }

    pub fn store(&self, bean: BeanInstance) {
        self.beans.insert(bean.bean_name.clone(), bean);
    }

    /// Stores the bean unless an entry already exists under its name; returns the winning entry
    /// and whether it was already present.
    pub fn load_or_store(&self, bean: BeanInstance) -> (BeanInstance, bool) {
        match self.beans.entry(bean.bean_name.clone()) {
            Entry::Occupied(existing) => (existing.get().clone(), true),
            Entry::Vacant(slot) => {
                slot.insert(bean.clone());
                (bean, false)
            }
        }
    }

    /// Replaces whatever is stored under the bean's name, returning the previous entry.
    pub fn swap(&self, bean: BeanInstance) -> Option<BeanInstance> {
        self.beans.insert(bean.bean_name.clone(), bean)
    }

    /// Replaces the entry under the bean's name only if it currently holds `expected`'s
    /// instance.
    pub fn compare_and_swap(&self, expected: &BeanInstance, bean: BeanInstance) -> bool {
        match self.beans.entry(bean.bean_name.clone()) {
            Entry::Occupied(mut entry) if entry.get().same_instance(expected) => {
                entry.insert(bean);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, name: &str) -> Option<BeanInstance> {
        self.beans.remove(name).map(|(_, bean)| bean)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.beans.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    /// Clones all current entries out. Used by the shutdown sweep to guarantee exactly-once hook
    /// invocation regardless of concurrent store mutation.
    pub fn snapshot(&self) -> Vec<BeanInstance> {
        self.beans
            .iter()
            .map(|entry| entry.value().clone())
            .collect_vec()
    }

    /// Calls `f` for each entry until it returns `false`. Do not resolve beans from within `f`.
    pub fn for_each(&self, mut f: impl FnMut(&str, &BeanInstance) -> bool) {
        for entry in self.beans.iter() {
            if !f(entry.key(), entry.value()) {
                break;
            }
        }
    }

    pub fn clear(&self) {
        self.beans.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::bean_store::{BeanInstance, BeanStore};
    use crate::component::{Component, Injectable};
    use crate::component_registry::ComponentMetadata;

    #[derive(Default)]
    struct TestComponent;

    impl Injectable for TestComponent {}
    impl Component for TestComponent {}

    fn bean(name: &str) -> BeanInstance {
        BeanInstance::new(name, &ComponentMetadata::of::<TestComponent>())
    }

    #[test]
    fn should_load_stored_bean() {
        let store = BeanStore::new();
        let stored = bean("a");
        store.store(stored.clone());

        assert!(store.load("a").unwrap().same_instance(&stored));
        assert!(store.load("b").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn should_keep_existing_bean_on_load_or_store() {
        let store = BeanStore::new();
        let first = bean("a");
        let second = bean("a");

        let (winner, loaded) = store.load_or_store(first.clone());
        assert!(!loaded);
        assert!(winner.same_instance(&first));

        let (winner, loaded) = store.load_or_store(second);
        assert!(loaded);
        assert!(winner.same_instance(&first));
    }

    #[test]
    fn should_swap_beans() {
        let store = BeanStore::new();
        let first = bean("a");
        let second = bean("a");

        assert!(store.swap(first.clone()).is_none());
        assert!(store.swap(second).unwrap().same_instance(&first));
    }

    #[test]
    fn should_compare_and_swap_by_identity() {
        let store = BeanStore::new();
        let first = bean("a");
        let stranger = bean("a");
        let replacement = bean("a");

        store.store(first.clone());
        assert!(!store.compare_and_swap(&stranger, replacement.clone()));
        assert!(store.compare_and_swap(&first, replacement.clone()));
        assert!(store.load("a").unwrap().same_instance(&replacement));
    }

    #[test]
    fn should_clear_all_beans() {
        let store = BeanStore::new();
        store.store(bean("a"));
        store.store(bean("b"));

        assert_eq!(store.snapshot().len(), 2);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn should_stop_iteration_early() {
        let store = BeanStore::new();
        store.store(bean("a"));
        store.store(bean("b"));
        store.store(bean("c"));

        let mut seen = 0;
        store.for_each(|_, _| {
            seen += 1;
            false
        });
        assert_eq!(seen, 1);
    }
}
