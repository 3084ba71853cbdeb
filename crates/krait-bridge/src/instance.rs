//! Instance wrapper — one reflected view of one Python object
//!
//! A [`ScriptInstance`] ties a Python object to its [`Definition`] and
//! records where in an object graph the wrapper was first reached: a strong
//! handle to the parent wrapper, a weak handle to the root, and the full
//! property path from that root. The parent chain keeps ancestors alive as
//! long as any descendant wrapper is held, while roots are self-referential
//! and never keep themselves alive.

use std::any::Any;
use std::sync::{Arc, Weak};

use pyo3::prelude::*;

use krait_reflect::{
    Definition, ObjectHandle, ReflectedObject, WeakObjectHandle, DOT_OPERATOR, INDEX_OPEN,
};

use crate::context::BridgeContext;
use crate::error::{BridgeError, BridgeResult};

/// A Python object wrapped for the reflection system.
pub struct ScriptInstance {
    object: Py<PyAny>,
    definition: Arc<Definition>,
    parent: ObjectHandle,
    root: WeakObjectHandle,
    full_path: String,
}

impl ScriptInstance {
    /// Wrap an object, or return the wrapper it already has.
    ///
    /// `parent` is the wrapper the object was reached through (the null
    /// handle for roots) and `child_path` the path segment from that
    /// parent: an attribute name, or a bracketed index like `[3]`.
    pub fn find_or_create(
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        object: &PyAny,
        parent: &ObjectHandle,
        child_path: &str,
    ) -> BridgeResult<ObjectHandle> {
        let (definition, id) = ctx.registry().find_or_create(py, ctx, object)?;

        let existing = ctx.object_manager().get(id);
        if existing.is_valid() {
            return Ok(existing);
        }

        let parent_instance = match parent.is_valid() {
            true => Some(
                parent
                    .downcast_ref::<ScriptInstance>()
                    .ok_or(BridgeError::InvalidParent)?,
            ),
            false => None,
        };

        let mut full_path = String::new();
        let mut parent_root = None;
        if let Some(parent_instance) = parent_instance {
            debug_assert!(
                parent_instance.object.as_ptr() != object.as_ptr(),
                "object cannot be its own parent"
            );
            parent_root = Some(parent_instance.root.clone());
            full_path.push_str(&parent_instance.full_path);
            // Index segments carry their own bracket, attribute names need
            // the dot separator.
            if !full_path.is_empty()
                && !child_path.is_empty()
                && !child_path.starts_with(INDEX_OPEN)
            {
                full_path.push(DOT_OPERATOR);
            }
        }
        full_path.push_str(child_path);

        let object: Py<PyAny> = object.into_py(py);
        let parent = parent.clone();
        let instance = Arc::new_cyclic(|weak: &Weak<ScriptInstance>| {
            let root = parent_root.unwrap_or_else(|| {
                let weak: Weak<dyn ReflectedObject> = weak.clone();
                WeakObjectHandle::from_weak(weak)
            });
            ScriptInstance {
                object,
                definition,
                parent,
                root,
                full_path,
            }
        });

        let handle = ObjectHandle::new(instance);
        ctx.object_manager().register(id, &handle);
        Ok(handle)
    }

    /// The live wrapper for an object, if one exists.
    pub fn find(py: Python<'_>, ctx: &Arc<BridgeContext>, object: &PyAny) -> Option<ObjectHandle> {
        let (_, id) = ctx.registry().find(py, object)?;
        let handle = ctx.object_manager().get(id);
        handle.is_valid().then_some(handle)
    }

    /// The wrapped Python object.
    pub fn object(&self) -> &Py<PyAny> {
        &self.object
    }

    /// The definition created for this object.
    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    /// The wrapper this one was reached through; null for roots.
    pub fn parent(&self) -> &ObjectHandle {
        &self.parent
    }

    /// The root of this wrapper's object graph.
    ///
    /// For a root instance this is the instance itself. Null once the root
    /// has been dropped.
    pub fn root(&self) -> ObjectHandle {
        self.root.upgrade()
    }

    /// Property path from the root object to this one.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }
}

impl ReflectedObject for ScriptInstance {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl PartialEq for ScriptInstance {
    fn eq(&self, other: &Self) -> bool {
        self.object.as_ptr() == other.object.as_ptr()
    }
}
