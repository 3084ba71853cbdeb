//! Class definitions, properties and the definition manager
//!
//! A [`Definition`] describes one foreign class or instance: a stable name
//! plus the set of named [`Property`] entries its details provider exposes.
//! Definitions are owned by whoever wraps the foreign object; the
//! [`DefinitionManager`] tracks them weakly by name and resolves the
//! definition for an arbitrary [`ObjectHandle`] through registered
//! [`DefinitionHelper`]s.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::accessor::{PropertyAccessor, PropertyAccessorListener};
use crate::error::ReflectError;
use crate::object::ObjectHandle;
use crate::variant::{TypeTag, Variant};

/// Separator between attribute names in a property path.
pub const DOT_OPERATOR: char = '.';

/// Opening bracket of a collection index in a property path.
pub const INDEX_OPEN: char = '[';

// ============================================================================
// Property
// ============================================================================

/// One named, reflectable member of a definition.
///
/// Accessors receive the handle of the instance being accessed; bridge
/// implementations typically already carry the bound foreign object and may
/// ignore it.
pub trait Property: Send + Sync {
    /// Member name.
    fn name(&self) -> &str;

    /// Hash of the member name, stable for the process lifetime.
    fn name_hash(&self) -> u64;

    /// Read the current value. Failed reads yield [`Variant::Void`].
    fn get(&self, handle: &ObjectHandle) -> Variant;

    /// Write a new value. False on failure.
    fn set(&self, handle: &ObjectHandle, value: &Variant) -> bool;

    /// Call the member with positional arguments.
    fn invoke(&self, handle: &ObjectHandle, args: &[Variant]) -> Variant;

    /// Number of explicit parameters the member accepts when called.
    fn parameter_count(&self) -> usize;

    /// True if the member is callable.
    fn is_method(&self) -> bool;

    /// True if writes are rejected up front.
    ///
    /// Dynamic languages cannot know this without attempting the write, so
    /// the default is false.
    fn read_only(&self) -> bool {
        false
    }

    /// True if host UIs should not display this member.
    fn hidden(&self) -> bool {
        false
    }

    /// Tag of the last observed value.
    fn value_type(&self) -> TypeTag;
}

// ============================================================================
// Definition
// ============================================================================

/// Source of a definition's name and properties.
pub trait DefinitionDetails: Send + Sync {
    /// Unique definition name.
    fn name(&self) -> &str;

    /// Enumerate all reflectable members.
    fn properties(&self) -> Vec<Arc<dyn Property>>;

    /// Find one member by name.
    fn lookup(&self, name: &str) -> Option<Arc<dyn Property>>;
}

/// A registered class definition.
///
/// Dropping the last strong reference runs the cleanup callback installed by
/// the owning bridge, which deregisters the definition and releases any
/// per-object bookkeeping.
pub struct Definition {
    details: Arc<dyn DefinitionDetails>,
    cleanup: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Definition {
    /// Create a definition over a details provider.
    pub fn new(details: Arc<dyn DefinitionDetails>) -> Arc<Self> {
        Arc::new(Self {
            details,
            cleanup: Mutex::new(None),
        })
    }

    /// Unique definition name.
    pub fn name(&self) -> &str {
        self.details.name()
    }

    /// Enumerate all reflectable members.
    pub fn properties(&self) -> Vec<Arc<dyn Property>> {
        self.details.properties()
    }

    /// Find one member by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Property>> {
        self.details.lookup(name)
    }

    /// Install the callback run when the definition is dropped.
    ///
    /// Replaces any previously installed callback.
    pub fn set_cleanup(&self, cleanup: impl FnOnce() + Send + 'static) {
        *self.cleanup.lock() = Some(Box::new(cleanup));
    }

    /// Bind a named member of an instance to a [`PropertyAccessor`].
    ///
    /// `path` is the accessor's full path from its root object; `name` is
    /// the member to look up on this definition.
    pub fn bind(
        &self,
        manager: &Arc<DefinitionManager>,
        root: ObjectHandle,
        object: ObjectHandle,
        path: String,
        name: &str,
    ) -> Result<PropertyAccessor, ReflectError> {
        let property = self
            .lookup(name)
            .ok_or_else(|| ReflectError::NoSuchProperty(name.to_string(), self.name().to_string()))?;
        Ok(PropertyAccessor::new(
            manager.clone(),
            root,
            object,
            path,
            property,
        ))
    }
}

impl Drop for Definition {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.lock().take() {
            cleanup();
        }
    }
}

// ============================================================================
// Definition Helper
// ============================================================================

/// Resolves definitions for handles a bridge knows how to unwrap.
pub trait DefinitionHelper: Send + Sync {
    /// The definition for a handle, if this helper recognizes it.
    fn definition_of(&self, handle: &ObjectHandle) -> Option<Arc<Definition>>;
}

// ============================================================================
// Definition Manager
// ============================================================================

/// Name-keyed registry of live definitions.
///
/// Definitions are held weakly: registration never extends a definition's
/// lifetime, and the owning bridge deregisters on drop. The manager also
/// owns the process-wide list of [`PropertyAccessorListener`]s notified
/// around every property write.
#[derive(Default)]
pub struct DefinitionManager {
    definitions: RwLock<FxHashMap<String, Weak<Definition>>>,
    helpers: RwLock<Vec<Arc<dyn DefinitionHelper>>>,
    listeners: RwLock<Vec<Weak<dyn PropertyAccessorListener>>>,
}

impl DefinitionManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its name.
    pub fn register_definition(&self, definition: &Arc<Definition>) {
        let mut definitions = self.definitions.write();
        let previous = definitions.insert(definition.name().to_string(), Arc::downgrade(definition));
        if let Some(previous) = previous {
            if previous.upgrade().is_some() {
                tracing::warn!(name = definition.name(), "replacing live definition");
            }
        }
    }

    /// Remove a definition by name. Returns false if it was not registered.
    pub fn deregister_definition(&self, name: &str) -> bool {
        self.definitions.write().remove(name).is_some()
    }

    /// Look up a live definition by name.
    pub fn get_definition(&self, name: &str) -> Option<Arc<Definition>> {
        self.definitions.read().get(name).and_then(Weak::upgrade)
    }

    /// Resolve the definition for a handle through registered helpers.
    pub fn definition_of(&self, handle: &ObjectHandle) -> Option<Arc<Definition>> {
        let helpers = self.helpers.read();
        helpers.iter().find_map(|h| h.definition_of(handle))
    }

    /// Add a definition helper.
    pub fn register_helper(&self, helper: Arc<dyn DefinitionHelper>) {
        self.helpers.write().push(helper);
    }

    /// Remove a previously added helper. Returns false if absent.
    pub fn deregister_helper(&self, helper: &Arc<dyn DefinitionHelper>) -> bool {
        let mut helpers = self.helpers.write();
        let before = helpers.len();
        helpers.retain(|h| !Arc::ptr_eq(h, helper));
        helpers.len() != before
    }

    /// Add a property mutation listener, held weakly.
    pub fn register_listener(&self, listener: &Arc<dyn PropertyAccessorListener>) {
        self.listeners.write().push(Arc::downgrade(listener));
    }

    /// Remove a previously added listener. Returns false if absent.
    pub fn deregister_listener(&self, listener: &Arc<dyn PropertyAccessorListener>) -> bool {
        let target = Arc::downgrade(listener);
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Weak::ptr_eq(l, &target));
        listeners.len() != before
    }

    /// Notify all live listeners that a property write is about to happen.
    pub fn notify_pre_set(&self, accessor: &PropertyAccessor, value: &Variant) {
        for listener in self.live_listeners() {
            listener.pre_set_value(accessor, value);
        }
    }

    /// Notify all live listeners that a property write completed.
    pub fn notify_post_set(&self, accessor: &PropertyAccessor, value: &Variant) {
        for listener in self.live_listeners() {
            listener.post_set_value(accessor, value);
        }
    }

    // Snapshot under the read lock so listeners may re-enter the manager.
    fn live_listeners(&self) -> Vec<Arc<dyn PropertyAccessorListener>> {
        self.listeners
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
