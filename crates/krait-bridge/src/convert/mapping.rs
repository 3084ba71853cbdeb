//! Mapping adapter — dicts as host collections
//!
//! Keys are host values converted to their Python form. Lookup scans the
//! dict's key list with Python equality, falling back to pointer identity
//! for keys whose comparison raises, so unhashable-comparison corner cases
//! degrade instead of failing.
//!
//! Iterators snapshot the key order at creation and read values through
//! the live dict, so concurrent inserts do not shift an iterator but a
//! deleted key is an error when read.

use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use krait_reflect::{
    Collection, CollectionImpl, CollectionIter, CollectionIterImpl, GetPolicy, ObjectHandle,
    Variant,
};

use crate::context::BridgeContext;
use crate::instance::ScriptInstance;
use crate::registry::identity_eq;

use super::is_exact;

// ============================================================================
// Mapping Adapter
// ============================================================================

/// Live view of a Python dict as a host collection.
pub struct MappingAdapter {
    object: Py<PyDict>,
    handle: ObjectHandle,
    ctx: Arc<BridgeContext>,
}

impl MappingAdapter {
    pub(crate) fn new(ctx: Arc<BridgeContext>, object: &PyDict, handle: ObjectHandle) -> Self {
        Self {
            object: object.into(),
            handle,
            ctx,
        }
    }

    pub(crate) fn object(&self) -> &Py<PyDict> {
        &self.object
    }

    fn iter_at(&self, py: Python<'_>, index: usize) -> CollectionIter {
        let keys: Py<PyList> = self.object.as_ref(py).keys().into();
        CollectionIter::new(Box::new(MappingIter {
            object: self.object.clone_ref(py),
            keys,
            handle: self.handle.clone(),
            ctx: self.ctx.clone(),
            index,
        }))
    }

    /// Position of a key in the dict's current key order.
    fn find_index(&self, py: Python<'_>, key: &PyAny) -> Option<usize> {
        let keys = self.object.as_ref(py).keys();
        keys.iter().position(|candidate| identity_eq(candidate, key))
    }

    fn script_key(&self, py: Python<'_>, key: &Variant) -> Option<PyObject> {
        let script = self.ctx.converters().to_script(py, &self.ctx, key);
        if script.is_none() {
            tracing::error!("no converter accepted mapping key");
        }
        script
    }
}

impl CollectionImpl for MappingAdapter {
    fn size(&self) -> usize {
        Python::with_gil(|py| self.object.as_ref(py).len())
    }

    fn begin(&self) -> CollectionIter {
        Python::with_gil(|py| self.iter_at(py, 0))
    }

    fn end(&self) -> CollectionIter {
        Python::with_gil(|py| {
            let len = self.object.as_ref(py).len();
            self.iter_at(py, len)
        })
    }

    fn get(&self, key: &Variant, policy: GetPolicy) -> (CollectionIter, bool) {
        Python::with_gil(|py| {
            let Some(script_key) = self.script_key(py, key) else {
                return (self.end(), false);
            };
            let script_key = script_key.as_ref(py);
            let existing = self.find_index(py, script_key);
            match policy {
                GetPolicy::Existing => match existing {
                    Some(index) => (self.iter_at(py, index), false),
                    None => (self.end(), false),
                },
                GetPolicy::Auto if existing.is_some() => {
                    (self.iter_at(py, existing.unwrap_or_default()), false)
                }
                GetPolicy::New | GetPolicy::Auto => {
                    if let Err(err) = self.object.as_ref(py).set_item(script_key, py.None()) {
                        tracing::error!(error = %err, "failed to insert mapping key");
                        return (self.end(), false);
                    }
                    match self.find_index(py, script_key) {
                        Some(index) => (self.iter_at(py, index), true),
                        None => (self.end(), false),
                    }
                }
            }
        })
    }

    fn insert(&self, key: &Variant, value: &Variant) -> CollectionIter {
        let (itr, inserted) = self.get(key, GetPolicy::New);
        if inserted && !itr.set_value(value) {
            tracing::error!("failed to write inserted mapping entry");
        }
        itr
    }

    fn erase_at(&self, pos: &CollectionIter) -> CollectionIter {
        if pos.container_id() != self.container_id() {
            tracing::error!("iterator belongs to a different container");
            return self.end();
        }
        Python::with_gil(|py| {
            let dict = self.object.as_ref(py);
            let keys = dict.keys();
            let index = pos.position();
            if index >= keys.len() {
                tracing::error!(index, "erase past the end of dict");
                return self.iter_at(py, dict.len());
            }
            match keys.get_item(index) {
                Ok(key) => {
                    if let Err(err) = dict.del_item(key) {
                        tracing::error!(error = %err, "failed to erase mapping entry");
                    }
                }
                Err(err) => tracing::error!(error = %err, "failed to read dict key"),
            }
            self.iter_at(py, index)
        })
    }

    fn erase_key(&self, key: &Variant) -> usize {
        Python::with_gil(|py| {
            let Some(script_key) = self.script_key(py, key) else {
                return 0;
            };
            match self.object.as_ref(py).del_item(script_key.as_ref(py)) {
                Ok(()) => 1,
                Err(err) => {
                    tracing::error!(error = %err, "failed to erase mapping key");
                    0
                }
            }
        })
    }

    fn erase_range(&self, first: &CollectionIter, last: &CollectionIter) -> CollectionIter {
        if first.container_id() != self.container_id()
            || last.container_id() != self.container_id()
        {
            tracing::error!("iterator belongs to a different container");
            return self.end();
        }
        Python::with_gil(|py| {
            let dict = self.object.as_ref(py);
            let len = dict.len() as i64;
            let (first, last) = (first.position() as i64, last.position() as i64);
            if first < 0 || first >= len || last <= 0 || last > len || first >= last {
                tracing::error!(first, last, len, "erase range out of bounds");
                return self.end();
            }

            // Collect before deleting; deletion reorders nothing but the
            // key list is a live view.
            let keys = dict.keys();
            let doomed: Vec<PyObject> = (first as usize..last as usize)
                .filter_map(|index| keys.get_item(index).ok())
                .map(|key| key.into_py(py))
                .collect();
            for key in &doomed {
                if let Err(err) = dict.del_item(key.as_ref(py)) {
                    tracing::error!(error = %err, "failed to erase mapping entry");
                }
            }
            self.iter_at(py, first as usize)
        })
    }

    fn can_resize(&self) -> bool {
        true
    }

    fn is_mapping(&self) -> bool {
        true
    }

    fn container_id(&self) -> usize {
        self.object.as_ptr() as usize
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ============================================================================
// Mapping Iterator
// ============================================================================

struct MappingIter {
    object: Py<PyDict>,
    keys: Py<PyList>,
    handle: ObjectHandle,
    ctx: Arc<BridgeContext>,
    index: usize,
}

impl MappingIter {
    fn current_key<'py>(&'py self, py: Python<'py>) -> Option<&'py PyAny> {
        let keys = self.keys.as_ref(py);
        if self.index >= keys.len() {
            tracing::error!(index = self.index, "read past the end of dict");
            return None;
        }
        match keys.get_item(self.index) {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::error!(error = %err, "failed to read dict key");
                None
            }
        }
    }

    fn key_repr(key: &PyAny) -> String {
        key.str()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl CollectionIterImpl for MappingIter {
    fn key(&self) -> Variant {
        Python::with_gil(|py| {
            let Some(key) = self.current_key(py) else {
                return Variant::Void;
            };
            // Keys have no parent in the object graph; primitives do not
            // need one and object keys wrap as roots.
            self.ctx
                .converters()
                .to_variant(py, &self.ctx, key, &ObjectHandle::null(), &Self::key_repr(key))
                .unwrap_or(Variant::Void)
        })
    }

    fn value(&self) -> Variant {
        Python::with_gil(|py| {
            let Some(key) = self.current_key(py) else {
                return Variant::Void;
            };
            let mapping: &PyAny = self.object.as_ref(py);
            let item = match mapping.get_item(key) {
                Ok(item) => item,
                Err(err) => {
                    tracing::error!(error = %err, "failed to read mapping value");
                    return Variant::Void;
                }
            };
            let child_path = format!("[{}]", Self::key_repr(key));
            self.ctx
                .converters()
                .to_variant(py, &self.ctx, item, &self.handle, &child_path)
                .unwrap_or(Variant::Void)
        })
    }

    fn set_value(&self, value: &Variant) -> bool {
        Python::with_gil(|py| {
            let Some(key) = self.current_key(py) else {
                return false;
            };
            let Some(script) = self.ctx.converters().to_script(py, &self.ctx, value) else {
                tracing::error!("no converter accepted value");
                return false;
            };
            match self.object.as_ref(py).set_item(key, script.as_ref(py)) {
                Ok(()) => true,
                Err(err) => {
                    tracing::error!(error = %err, "failed to write mapping value");
                    false
                }
            }
        })
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn position(&self) -> usize {
        self.index
    }

    fn container_id(&self) -> usize {
        self.object.as_ptr() as usize
    }

    fn clone_impl(&self) -> Box<dyn CollectionIterImpl> {
        Python::with_gil(|py| {
            Box::new(MappingIter {
                object: self.object.clone_ref(py),
                keys: self.keys.clone_ref(py),
                handle: self.handle.clone(),
                ctx: self.ctx.clone(),
                index: self.index,
            }) as Box<dyn CollectionIterImpl>
        })
    }
}

// ============================================================================
// Converter
// ============================================================================

/// `dict` <-> keyed mapping collection.
pub struct MappingConverter;

impl super::ParentedConverter for MappingConverter {
    fn to_variant(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &PyAny,
        parent: &ObjectHandle,
        child_path: &str,
    ) -> Option<Variant> {
        if !is_exact::<PyDict>(value) {
            return None;
        }
        let dict = value.downcast::<PyDict>().ok()?;
        let handle = match ScriptInstance::find_or_create(py, ctx, value, parent, child_path) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(error = %err, "failed to wrap dict");
                return None;
            }
        };
        let adapter = MappingAdapter::new(ctx.clone(), dict, handle);
        Some(Variant::Collection(Collection::new(Arc::new(adapter))))
    }

    fn to_script(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &Variant,
    ) -> Option<PyObject> {
        let collection = value.as_collection()?;
        // A facade over one of our own dicts converts back to that dict.
        if let Some(adapter) = collection.downcast_impl::<MappingAdapter>() {
            return Some(adapter.object().clone_ref(py).into_py(py));
        }
        if !collection.is_mapping() {
            return None;
        }
        // Host-native mappings are copied into a fresh dict.
        let dict = PyDict::new(py);
        for (key, element) in collection.iter() {
            let key = ctx.converters().to_script(py, ctx, &key)?;
            let element = ctx.converters().to_script(py, ctx, &element)?;
            dict.set_item(key, element).ok()?;
        }
        Some(dict.into_py(py))
    }
}
