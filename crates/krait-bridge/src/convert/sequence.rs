//! Sequence adapters — lists and tuples as host collections
//!
//! One adapter implementation covers both Python sequence shapes; the
//! [`SequenceKind`] parameter supplies the concrete container operations
//! and whether the container can change size. Lists resize, tuples do not:
//! tuple adapters support positional reads and fail writes and erases the
//! way the container itself would.
//!
//! Keys are positions. Negative keys index from the back, Python style,
//! for lookups; erase by key takes raw non-negative positions only.

use std::marker::PhantomData;
use std::sync::Arc;

use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;
use pyo3::types::{PyList, PySlice, PyTuple};

use krait_reflect::{
    Collection, CollectionImpl, CollectionIter, CollectionIterImpl, GetPolicy, ObjectHandle,
    Variant,
};

use crate::context::BridgeContext;
use crate::instance::ScriptInstance;

use super::is_exact;

// ============================================================================
// Sequence Kinds
// ============================================================================

/// Concrete container operations behind a [`SequenceAdapter`].
pub trait SequenceKind: Send + Sync + 'static {
    /// Container type name, for diagnostics.
    const NAME: &'static str;

    /// Whether entries can be added and removed.
    const CAN_RESIZE: bool;

    /// True if `value` is exactly this container type.
    fn is_exact(value: &PyAny) -> bool;

    /// Current length.
    fn len(object: &PyAny) -> usize;

    /// Read one element.
    fn get_item(object: &PyAny, index: usize) -> PyResult<&PyAny>;

    /// Replace one element.
    fn set_item(object: &PyAny, index: usize, value: &PyAny) -> PyResult<()>;

    /// Insert before `index`.
    fn insert(object: &PyAny, index: usize, value: &PyAny) -> PyResult<()>;

    /// Insert at the back.
    fn append(object: &PyAny, value: &PyAny) -> PyResult<()>;

    /// Delete the half-open range `[first, last)`.
    fn del_range(object: &PyAny, first: usize, last: usize) -> PyResult<()>;
}

/// `list` operations.
pub struct ListKind;

impl SequenceKind for ListKind {
    const NAME: &'static str = "list";
    const CAN_RESIZE: bool = true;

    fn is_exact(value: &PyAny) -> bool {
        is_exact::<PyList>(value)
    }

    fn len(object: &PyAny) -> usize {
        object.downcast::<PyList>().map(|l| l.len()).unwrap_or(0)
    }

    fn get_item(object: &PyAny, index: usize) -> PyResult<&PyAny> {
        object.downcast::<PyList>()?.get_item(index)
    }

    fn set_item(object: &PyAny, index: usize, value: &PyAny) -> PyResult<()> {
        object.downcast::<PyList>()?.set_item(index, value)
    }

    fn insert(object: &PyAny, index: usize, value: &PyAny) -> PyResult<()> {
        object.downcast::<PyList>()?.insert(index, value)
    }

    fn append(object: &PyAny, value: &PyAny) -> PyResult<()> {
        object.downcast::<PyList>()?.append(value)
    }

    fn del_range(object: &PyAny, first: usize, last: usize) -> PyResult<()> {
        let py = object.py();
        object.del_item(PySlice::new(py, first as isize, last as isize, 1))
    }
}

/// `tuple` operations. All mutation fails with the interpreter's own
/// complaint.
pub struct TupleKind;

fn tuple_immutable() -> PyErr {
    PyTypeError::new_err("'tuple' object does not support item assignment")
}

impl SequenceKind for TupleKind {
    const NAME: &'static str = "tuple";
    const CAN_RESIZE: bool = false;

    fn is_exact(value: &PyAny) -> bool {
        is_exact::<PyTuple>(value)
    }

    fn len(object: &PyAny) -> usize {
        object.downcast::<PyTuple>().map(|t| t.len()).unwrap_or(0)
    }

    fn get_item(object: &PyAny, index: usize) -> PyResult<&PyAny> {
        object.downcast::<PyTuple>()?.get_item(index)
    }

    fn set_item(_object: &PyAny, _index: usize, _value: &PyAny) -> PyResult<()> {
        Err(tuple_immutable())
    }

    fn insert(_object: &PyAny, _index: usize, _value: &PyAny) -> PyResult<()> {
        Err(tuple_immutable())
    }

    fn append(_object: &PyAny, _value: &PyAny) -> PyResult<()> {
        Err(tuple_immutable())
    }

    fn del_range(_object: &PyAny, _first: usize, _last: usize) -> PyResult<()> {
        Err(tuple_immutable())
    }
}

// ============================================================================
// Sequence Adapter
// ============================================================================

/// Live view of a Python sequence as a host collection.
pub struct SequenceAdapter<K: SequenceKind> {
    object: PyObject,
    handle: ObjectHandle,
    ctx: Arc<BridgeContext>,
    _kind: PhantomData<K>,
}

impl<K: SequenceKind> SequenceAdapter<K> {
    pub(crate) fn new(
        py: Python<'_>,
        ctx: Arc<BridgeContext>,
        object: &PyAny,
        handle: ObjectHandle,
    ) -> Self {
        Self {
            object: object.into_py(py),
            handle,
            ctx,
            _kind: PhantomData,
        }
    }

    pub(crate) fn object(&self) -> &PyObject {
        &self.object
    }

    fn iter_at(&self, py: Python<'_>, index: usize) -> CollectionIter {
        CollectionIter::new(Box::new(SequenceIter::<K> {
            object: self.object.clone_ref(py),
            handle: self.handle.clone(),
            ctx: self.ctx.clone(),
            index,
            _kind: PhantomData,
        }))
    }

    /// Make room at a position. Out-of-range positions clamp to the ends.
    /// Returns the position of the new entry.
    fn insert_placeholder(&self, py: Python<'_>, index: i64) -> Option<usize> {
        if !K::CAN_RESIZE {
            tracing::error!("cannot insert into fixed-size {}", K::NAME);
            return None;
        }
        let object = self.object.as_ref(py);
        let len = K::len(object);
        let none = py.None();
        let result = if index <= 0 {
            K::insert(object, 0, none.as_ref(py)).map(|_| 0)
        } else if index as usize >= len {
            K::append(object, none.as_ref(py)).map(|_| len)
        } else {
            K::insert(object, index as usize, none.as_ref(py)).map(|_| index as usize)
        };
        match result {
            Ok(at) => Some(at),
            Err(err) => {
                tracing::error!(error = %err, "insert into {} failed", K::NAME);
                None
            }
        }
    }

    /// Validate an erase range against the current length.
    fn erase_bounds(&self, py: Python<'_>, first: i64, last: i64) -> Option<(usize, usize)> {
        if !K::CAN_RESIZE {
            tracing::error!("cannot erase from fixed-size {}", K::NAME);
            return None;
        }
        let len = K::len(self.object.as_ref(py)) as i64;
        if first < 0 || first >= len || last <= 0 || last > len || first >= last {
            tracing::error!(first, last, len, "erase range out of bounds");
            return None;
        }
        Some((first as usize, last as usize))
    }
}

impl<K: SequenceKind> CollectionImpl for SequenceAdapter<K> {
    fn size(&self) -> usize {
        Python::with_gil(|py| K::len(self.object.as_ref(py)))
    }

    fn begin(&self) -> CollectionIter {
        Python::with_gil(|py| self.iter_at(py, 0))
    }

    fn end(&self) -> CollectionIter {
        Python::with_gil(|py| {
            let len = K::len(self.object.as_ref(py));
            self.iter_at(py, len)
        })
    }

    fn get(&self, key: &Variant, policy: GetPolicy) -> (CollectionIter, bool) {
        let Some(mut index) = key.index() else {
            return (self.end(), false);
        };
        Python::with_gil(|py| {
            let len = K::len(self.object.as_ref(py)) as i64;
            if index < 0 {
                index += len;
            }
            let in_range = index >= 0 && index < len;
            match policy {
                GetPolicy::Existing if in_range => (self.iter_at(py, index as usize), false),
                GetPolicy::Existing => (self.iter_at(py, len as usize), false),
                GetPolicy::Auto if in_range => (self.iter_at(py, index as usize), false),
                GetPolicy::New | GetPolicy::Auto => match self.insert_placeholder(py, index) {
                    Some(at) => (self.iter_at(py, at), true),
                    None => (self.iter_at(py, len as usize), false),
                },
            }
        })
    }

    fn insert(&self, key: &Variant, value: &Variant) -> CollectionIter {
        let (itr, inserted) = self.get(key, GetPolicy::New);
        if inserted && !itr.set_value(value) {
            tracing::error!("failed to write inserted {} entry", K::NAME);
        }
        itr
    }

    fn erase_at(&self, pos: &CollectionIter) -> CollectionIter {
        if pos.container_id() != self.container_id() {
            tracing::error!("iterator belongs to a different container");
            return self.end();
        }
        let first = pos.position() as i64;
        Python::with_gil(|py| match self.erase_bounds(py, first, first + 1) {
            Some((first, last)) => {
                if let Err(err) = K::del_range(self.object.as_ref(py), first, last) {
                    tracing::error!(error = %err, "erase failed");
                }
                self.iter_at(py, first)
            }
            None => self.end(),
        })
    }

    fn erase_key(&self, key: &Variant) -> usize {
        // Raw position, no negative indexing on erase.
        let Some(index) = key.index() else {
            return 0;
        };
        Python::with_gil(|py| match self.erase_bounds(py, index, index + 1) {
            Some((first, last)) => match K::del_range(self.object.as_ref(py), first, last) {
                Ok(()) => 1,
                Err(err) => {
                    tracing::error!(error = %err, "erase failed");
                    0
                }
            },
            None => 0,
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
            match self.erase_bounds(py, first.position() as i64, last.position() as i64) {
                Some((first, last)) => {
                    if let Err(err) = K::del_range(self.object.as_ref(py), first, last) {
                        tracing::error!(error = %err, "erase failed");
                        return self.end();
                    }
                    self.iter_at(py, first)
                }
                None => self.end(),
            }
        })
    }

    fn can_resize(&self) -> bool {
        K::CAN_RESIZE
    }

    fn is_mapping(&self) -> bool {
        false
    }

    fn container_id(&self) -> usize {
        self.object.as_ptr() as usize
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ============================================================================
// Sequence Iterator
// ============================================================================

struct SequenceIter<K: SequenceKind> {
    object: PyObject,
    handle: ObjectHandle,
    ctx: Arc<BridgeContext>,
    index: usize,
    _kind: PhantomData<K>,
}

impl<K: SequenceKind> CollectionIterImpl for SequenceIter<K> {
    fn key(&self) -> Variant {
        Variant::Int(self.index as i64)
    }

    fn value(&self) -> Variant {
        Python::with_gil(|py| {
            let object = self.object.as_ref(py);
            if self.index >= K::len(object) {
                tracing::error!(index = self.index, "read past the end of {}", K::NAME);
                return Variant::Void;
            }
            let item = match K::get_item(object, self.index) {
                Ok(item) => item,
                Err(err) => {
                    tracing::error!(error = %err, "failed to read {} element", K::NAME);
                    return Variant::Void;
                }
            };
            self.ctx
                .converters()
                .to_variant(
                    py,
                    &self.ctx,
                    item,
                    &self.handle,
                    &format!("[{}]", self.index),
                )
                .unwrap_or(Variant::Void)
        })
    }

    fn set_value(&self, value: &Variant) -> bool {
        Python::with_gil(|py| {
            let object = self.object.as_ref(py);
            if self.index >= K::len(object) {
                tracing::error!(index = self.index, "write past the end of {}", K::NAME);
                return false;
            }
            let Some(script) = self.ctx.converters().to_script(py, &self.ctx, value) else {
                tracing::error!("no converter accepted value");
                return false;
            };
            match K::set_item(object, self.index, script.as_ref(py)) {
                Ok(()) => true,
                Err(err) => {
                    tracing::error!(error = %err, "failed to write {} element", K::NAME);
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
            Box::new(SequenceIter::<K> {
                object: self.object.clone_ref(py),
                handle: self.handle.clone(),
                ctx: self.ctx.clone(),
                index: self.index,
                _kind: PhantomData,
            }) as Box<dyn CollectionIterImpl>
        })
    }
}

// ============================================================================
// Converters
// ============================================================================

fn adapt<K: SequenceKind>(
    py: Python<'_>,
    ctx: &Arc<BridgeContext>,
    value: &PyAny,
    parent: &ObjectHandle,
    child_path: &str,
) -> Option<Variant> {
    let handle = match ScriptInstance::find_or_create(py, ctx, value, parent, child_path) {
        Ok(handle) => handle,
        Err(err) => {
            tracing::error!(error = %err, "failed to wrap {}", K::NAME);
            return None;
        }
    };
    let adapter = SequenceAdapter::<K>::new(py, ctx.clone(), value, handle);
    Some(Variant::Collection(Collection::new(Arc::new(adapter))))
}

/// `list` <-> resizable ordered collection.
pub struct SequenceConverter;

impl super::ParentedConverter for SequenceConverter {
    fn to_variant(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &PyAny,
        parent: &ObjectHandle,
        child_path: &str,
    ) -> Option<Variant> {
        if !ListKind::is_exact(value) {
            return None;
        }
        adapt::<ListKind>(py, ctx, value, parent, child_path)
    }

    fn to_script(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &Variant,
    ) -> Option<PyObject> {
        let collection = value.as_collection()?;
        // A facade over one of our own lists converts back to that list.
        if let Some(adapter) = collection.downcast_impl::<SequenceAdapter<ListKind>>() {
            return Some(adapter.object().clone_ref(py));
        }
        if collection.is_mapping() {
            return None;
        }
        // Host-native ordered collections are copied into a fresh list.
        let list = PyList::empty(py);
        for (_, element) in collection.iter() {
            let item = ctx.converters().to_script(py, ctx, &element)?;
            list.append(item).ok()?;
        }
        Some(list.into_py(py))
    }
}

/// `tuple` <-> fixed-size ordered collection.
pub struct TupleConverter;

impl super::ParentedConverter for TupleConverter {
    fn to_variant(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &PyAny,
        parent: &ObjectHandle,
        child_path: &str,
    ) -> Option<Variant> {
        if !TupleKind::is_exact(value) {
            return None;
        }
        adapt::<TupleKind>(py, ctx, value, parent, child_path)
    }

    fn to_script(
        &self,
        py: Python<'_>,
        _ctx: &Arc<BridgeContext>,
        value: &Variant,
    ) -> Option<PyObject> {
        let collection = value.as_collection()?;
        let adapter = collection.downcast_impl::<SequenceAdapter<TupleKind>>()?;
        Some(adapter.object().clone_ref(py))
    }
}
