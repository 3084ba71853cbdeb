//! Object handles and the identity-keyed object manager
//!
//! A wrapped foreign object lives behind an [`ObjectHandle`]: a shared,
//! identity-comparable reference to some [`ReflectedObject`]. The
//! [`ObjectManager`] maps stable [`ObjectId`]s to live handles without
//! keeping the objects alive, so the same foreign object always resolves to
//! the same wrapper while anyone still holds it.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

// ============================================================================
// Reflected Object
// ============================================================================

/// An object exposed through the reflection system.
///
/// Implementors are bridge-specific wrappers. Definitions are resolved
/// through [`DefinitionManager::definition_of`](crate::DefinitionManager),
/// not through the object itself.
pub trait ReflectedObject: Any + Send + Sync {
    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}

// ============================================================================
// Object Handle
// ============================================================================

/// Shared handle to a reflected object.
///
/// Handles compare by object identity. A default-constructed handle is null
/// and compares equal only to other null handles.
#[derive(Clone, Default)]
pub struct ObjectHandle {
    inner: Option<Arc<dyn ReflectedObject>>,
}

impl ObjectHandle {
    /// The null handle.
    pub fn null() -> Self {
        Self { inner: None }
    }

    /// Wrap a reflected object.
    pub fn new(object: Arc<dyn ReflectedObject>) -> Self {
        Self {
            inner: Some(object),
        }
    }

    /// True if this handle points at a live object.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Borrow the wrapped object as a concrete type.
    pub fn downcast_ref<T: ReflectedObject>(&self) -> Option<&T> {
        self.inner
            .as_deref()
            .and_then(|o| o.as_any().downcast_ref::<T>())
    }

    /// Non-owning copy of this handle.
    pub fn downgrade(&self) -> WeakObjectHandle {
        WeakObjectHandle {
            inner: self.inner.as_ref().map(Arc::downgrade),
        }
    }

    /// Address of the wrapped object, or 0 for the null handle.
    ///
    /// Only meaningful for identity comparison and logging.
    pub fn ptr_id(&self) -> usize {
        self.inner
            .as_ref()
            .map(|o| Arc::as_ptr(o) as *const () as usize)
            .unwrap_or(0)
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for ObjectHandle {}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(_) => write!(f, "ObjectHandle({:#x})", self.ptr_id()),
            None => write!(f, "ObjectHandle(null)"),
        }
    }
}

/// Weak counterpart of [`ObjectHandle`].
#[derive(Clone, Default)]
pub struct WeakObjectHandle {
    inner: Option<Weak<dyn ReflectedObject>>,
}

impl WeakObjectHandle {
    /// The null weak handle.
    pub fn null() -> Self {
        Self { inner: None }
    }

    /// Build from a raw weak reference, used when an object needs a weak
    /// handle to itself during construction.
    pub fn from_weak(weak: Weak<dyn ReflectedObject>) -> Self {
        Self { inner: Some(weak) }
    }

    /// Upgrade to a strong handle; null if the object is gone.
    pub fn upgrade(&self) -> ObjectHandle {
        ObjectHandle {
            inner: self.inner.as_ref().and_then(Weak::upgrade),
        }
    }
}

impl fmt::Debug for WeakObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakObjectHandle")
    }
}

// ============================================================================
// Object Id
// ============================================================================

/// Process-unique identifier assigned to a wrapped object.
///
/// Ids are never reused within a process. Id 0 is reserved as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// The invalid id.
    pub const INVALID: ObjectId = ObjectId(0);

    /// Allocate a fresh id.
    pub fn generate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ObjectId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// True unless this is [`ObjectId::INVALID`].
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Raw value, for logging.
    pub fn raw(self) -> u64 {
        self.0
    }
}

// ============================================================================
// Object Manager
// ============================================================================

/// Id-to-handle lookup for wrapped objects.
///
/// Holds only weak handles: registration never extends an object's lifetime,
/// and lookups of collected objects return the null handle.
#[derive(Default)]
pub struct ObjectManager {
    objects: RwLock<FxHashMap<ObjectId, WeakObjectHandle>>,
}

impl ObjectManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under an id, replacing any dead entry.
    pub fn register(&self, id: ObjectId, handle: &ObjectHandle) {
        debug_assert!(id.is_valid());
        self.objects.write().insert(id, handle.downgrade());
    }

    /// Look up the live handle for an id, or the null handle.
    pub fn get(&self, id: ObjectId) -> ObjectHandle {
        let objects = self.objects.read();
        objects
            .get(&id)
            .map(WeakObjectHandle::upgrade)
            .unwrap_or_else(ObjectHandle::null)
    }

    /// Drop the entry for an id. Returns false if it was not registered.
    pub fn deregister(&self, id: ObjectId) -> bool {
        self.objects.write().remove(&id).is_some()
    }

    /// Number of entries whose objects are still alive.
    pub fn live_count(&self) -> usize {
        self.objects
            .read()
            .values()
            .filter(|w| w.upgrade().is_valid())
            .count()
    }
}

// ============================================================================
// Tests
// ============================================================================
