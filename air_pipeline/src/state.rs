//! Insert-once caches for fixed-function state objects.
//!
//! Blend, rasterizer, depth-stencil, sampler and input-layout state is
//! canonicalized through these: the first creation from a descriptor
//! wins and every later request with an equal descriptor returns the
//! same object.

use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

pub struct StateObjectCache<D, T> {
    objects: Mutex<HashMap<D, Arc<T>>>,
}

impl<D, T> StateObjectCache<D, T>
where
    D: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the canonical object for the descriptor, creating it on
    /// first use.
    pub fn get_or_create(&self, desc: &D, create: impl FnOnce(&D) -> T) -> Arc<T> {
        let mut objects = self.objects.lock();
        if let Some(object) = objects.get(desc) {
            return object.clone();
        }
        let object = Arc::new(create(desc));
        objects.insert(desc.clone(), object.clone());
        object
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

impl<D, T> Default for StateObjectCache<D, T>
where
    D: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::StateObjectCache;
    use crate::key::BlendDesc;

    #[test]
    fn returns_canonical_object() {
        let cache = StateObjectCache::<BlendDesc, u32>::new();
        let created = AtomicU32::new(0);

        let desc = BlendDesc::default();
        let a = cache.get_or_create(&desc, |_| {
            created.fetch_add(1, Ordering::SeqCst);
            7
        });
        let b = cache.get_or_create(&desc, |_| {
            created.fetch_add(1, Ordering::SeqCst);
            13
        });

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*b, 7);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_descriptors_get_distinct_objects() {
        let cache = StateObjectCache::<BlendDesc, u32>::new();
        let a = cache.get_or_create(&BlendDesc::default(), |_| 1);
        let mut desc = BlendDesc::default();
        desc.alpha_to_coverage = true;
        let b = cache.get_or_create(&desc, |_| 2);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }
}
