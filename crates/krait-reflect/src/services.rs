//! Type-keyed service locator
//!
//! Bridges resolve their host dependencies (definition manager, object
//! manager) through a [`Services`] instance instead of taking each one as a
//! constructor argument, matching how host applications wire subsystems
//! together.

use std::any::{Any, TypeId};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Type-keyed registry of shared services.
#[derive(Default)]
pub struct Services {
    entries: RwLock<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Services {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service instance, replacing any previous one of the same
    /// type.
    pub fn register<T: Send + Sync + 'static>(&self, service: Arc<T>) {
        self.entries.write().insert(TypeId::of::<T>(), service);
    }

    /// Look up a service by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let entries = self.entries.read();
        let entry = entries.get(&TypeId::of::<T>())?.clone();
        entry.downcast::<T>().ok()
    }

    /// Remove a service by type. Returns false if absent.
    pub fn deregister<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.write().remove(&TypeId::of::<T>()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DefinitionManager;
    use crate::object::ObjectManager;

    #[test]
    fn test_register_and_get() {
        let services = Services::new();
        services.register(Arc::new(DefinitionManager::new()));
        services.register(Arc::new(ObjectManager::new()));

        assert!(services.get::<DefinitionManager>().is_some());
        assert!(services.get::<ObjectManager>().is_some());

        let a = services.get::<DefinitionManager>().unwrap();
        let b = services.get::<DefinitionManager>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_missing_and_deregister() {
        let services = Services::new();
        assert!(services.get::<ObjectManager>().is_none());
        services.register(Arc::new(ObjectManager::new()));
        assert!(services.deregister::<ObjectManager>());
        assert!(!services.deregister::<ObjectManager>());
        assert!(services.get::<ObjectManager>().is_none());
    }
}
