//! Property accessors and mutation listeners
//!
//! A [`PropertyAccessor`] binds one [`Property`] to one instance, remembering
//! the root object and full path the binding was reached through. Writes go
//! through [`PropertyAccessor::set_value`], which notifies every listener
//! registered on the [`DefinitionManager`] before and after the underlying
//! write, whether or not the write succeeds.

use std::sync::Arc;

use crate::definition::{DefinitionManager, Property};
use crate::object::ObjectHandle;
use crate::variant::Variant;

/// Observer of property writes.
///
/// Both callbacks default to no-ops so listeners implement only what they
/// care about.
pub trait PropertyAccessorListener: Send + Sync {
    /// Called before the underlying write is attempted.
    fn pre_set_value(&self, _accessor: &PropertyAccessor, _value: &Variant) {}

    /// Called after the underlying write finished.
    fn post_set_value(&self, _accessor: &PropertyAccessor, _value: &Variant) {}
}

/// A property bound to a specific instance.
pub struct PropertyAccessor {
    manager: Arc<DefinitionManager>,
    root: ObjectHandle,
    object: ObjectHandle,
    full_path: String,
    property: Arc<dyn Property>,
}

impl PropertyAccessor {
    /// Bind a property to an instance.
    ///
    /// `full_path` is the path from `root` down to this property, using
    /// dotted attribute and bracketed index segments.
    pub fn new(
        manager: Arc<DefinitionManager>,
        root: ObjectHandle,
        object: ObjectHandle,
        full_path: String,
        property: Arc<dyn Property>,
    ) -> Self {
        Self {
            manager,
            root,
            object,
            full_path,
            property,
        }
    }

    /// The root object the path starts from.
    pub fn root(&self) -> &ObjectHandle {
        &self.root
    }

    /// The instance the property is bound to.
    pub fn object(&self) -> &ObjectHandle {
        &self.object
    }

    /// Path from the root object to this property.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// The bound property.
    pub fn property(&self) -> &Arc<dyn Property> {
        &self.property
    }

    /// Read the current value.
    pub fn get_value(&self) -> Variant {
        self.property.get(&self.object)
    }

    /// Write a new value, firing pre and post listeners around the write.
    pub fn set_value(&self, value: &Variant) -> bool {
        self.manager.notify_pre_set(self, value);
        let ok = self.property.set(&self.object, value);
        self.manager.notify_post_set(self, value);
        ok
    }

    /// Call the bound member with positional arguments.
    pub fn invoke(&self, args: &[Variant]) -> Variant {
        self.property.invoke(&self.object, args)
    }
}

// ============================================================================
// Tests
// ============================================================================
