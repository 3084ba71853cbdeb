//! Property wrapper — one attribute of one Python object
//!
//! A [`ScriptProperty`] reads, writes and calls a single named attribute
//! through the converter chain. Reads and writes are attempted rather than
//! validated up front; a failure is logged and reported as
//! [`Variant::Void`] or `false`, never as a host panic.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyBytes, PyDict, PyFloat, PyList, PyLong, PyString, PyTuple, PyType};
use rustc_hash::FxHasher;

use krait_reflect::{ObjectHandle, Property, TypeTag, Variant};

use crate::context::BridgeContext;

/// One named attribute of a wrapped Python object.
pub struct ScriptProperty {
    name: String,
    name_hash: u64,
    object: Py<PyAny>,
    ctx: Arc<BridgeContext>,
    // Tag of the last observed value; attributes can be rebound to any
    // type at any time.
    tag: Mutex<TypeTag>,
}

impl ScriptProperty {
    /// Bind an attribute name on an object.
    pub fn new(py: Python<'_>, ctx: Arc<BridgeContext>, name: &str, object: &PyAny) -> Self {
        let tag = object
            .getattr(name)
            .map(script_type_tag)
            .unwrap_or_default();
        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        Self {
            name: name.to_string(),
            name_hash: hasher.finish(),
            object: object.into_py(py),
            ctx,
            tag: Mutex::new(tag),
        }
    }

    fn attribute<'py>(&'py self, py: Python<'py>) -> Option<&'py PyAny> {
        match self.object.as_ref(py).getattr(self.name.as_str()) {
            Ok(attribute) => Some(attribute),
            Err(err) => {
                tracing::error!(name = %self.name, error = %err, "failed to read attribute");
                None
            }
        }
    }
}

impl Property for ScriptProperty {
    fn name(&self) -> &str {
        &self.name
    }

    fn name_hash(&self) -> u64 {
        self.name_hash
    }

    fn get(&self, handle: &ObjectHandle) -> Variant {
        Python::with_gil(|py| {
            let Some(attribute) = self.attribute(py) else {
                return Variant::Void;
            };
            *self.tag.lock() = script_type_tag(attribute);
            self.ctx
                .converters()
                .to_variant(py, &self.ctx, attribute, handle, &self.name)
                .unwrap_or(Variant::Void)
        })
    }

    fn set(&self, _handle: &ObjectHandle, value: &Variant) -> bool {
        Python::with_gil(|py| {
            let Some(script) = self.ctx.converters().to_script(py, &self.ctx, value) else {
                tracing::error!(name = %self.name, "no converter accepted value");
                return false;
            };
            let object = self.object.as_ref(py);
            match object.setattr(self.name.as_str(), script.as_ref(py)) {
                Ok(()) => {
                    *self.tag.lock() = value.tag();
                    true
                }
                Err(err) => {
                    tracing::error!(name = %self.name, error = %err, "failed to set attribute");
                    false
                }
            }
        })
    }

    fn invoke(&self, handle: &ObjectHandle, args: &[Variant]) -> Variant {
        Python::with_gil(|py| {
            let Some(attribute) = self.attribute(py) else {
                return Variant::Void;
            };
            debug_assert!(attribute.is_callable(), "invoke on non-callable attribute");

            let mut converted = Vec::with_capacity(args.len());
            for arg in args {
                match self.ctx.converters().to_script(py, &self.ctx, arg) {
                    Some(value) => converted.push(value),
                    None => {
                        tracing::error!(name = %self.name, "no converter accepted argument");
                        return Variant::Void;
                    }
                }
            }

            match attribute.call1(PyTuple::new(py, &converted)) {
                Ok(result) => self
                    .ctx
                    .converters()
                    .to_variant(py, &self.ctx, result, handle, &self.name)
                    .unwrap_or(Variant::Void),
                Err(err) => {
                    tracing::error!(name = %self.name, error = %err, "call raised");
                    Variant::Void
                }
            }
        })
    }

    fn parameter_count(&self) -> usize {
        Python::with_gil(|py| {
            let Some(attribute) = self.attribute(py) else {
                return 0;
            };
            if !attribute.is_callable() {
                return 0;
            }
            parameter_count_of(attribute)
        })
    }

    fn is_method(&self) -> bool {
        Python::with_gil(|py| {
            self.attribute(py)
                .map(|attribute| attribute.is_callable())
                .unwrap_or(false)
        })
    }

    fn hidden(&self) -> bool {
        // Python convention: a leading underscore marks internals.
        self.name.starts_with('_')
    }

    fn value_type(&self) -> TypeTag {
        *self.tag.lock()
    }
}

/// Explicit parameter count of a callable, excluding any bound `self`.
fn parameter_count_of(attribute: &PyAny) -> usize {
    // Bound methods and classmethods carry the underlying function.
    if let Ok(function) = attribute.getattr("__func__") {
        return arg_count(function).map(|n| n.saturating_sub(1)).unwrap_or(0);
    }
    // Calling a class runs its __init__, minus self. A default __init__
    // is a C slot without __code__ and takes nothing explicit.
    if attribute.downcast::<PyType>().is_ok() {
        return attribute
            .getattr("__init__")
            .ok()
            .and_then(arg_count)
            .map(|n| n.saturating_sub(1))
            .unwrap_or(0);
    }
    // Plain functions and staticmethod results.
    if let Some(count) = arg_count(attribute) {
        return count;
    }
    // Callable instances: their type's __call__, minus self.
    if let Ok(call) = attribute.getattr("__call__") {
        if let Ok(function) = call.getattr("__func__") {
            return arg_count(function).map(|n| n.saturating_sub(1)).unwrap_or(0);
        }
        return arg_count(call).map(|n| n.saturating_sub(1)).unwrap_or(0);
    }
    0
}

fn arg_count(function: &PyAny) -> Option<usize> {
    function
        .getattr("__code__")
        .ok()?
        .getattr("co_argcount")
        .ok()?
        .extract()
        .ok()
}

/// Tag describing what a Python value would convert to.
pub(crate) fn script_type_tag(value: &PyAny) -> TypeTag {
    let py = value.py();
    if value.is_none() {
        TypeTag::Void
    } else if value.get_type().is(py.get_type::<PyBool>()) {
        TypeTag::Bool
    } else if value.get_type().is(py.get_type::<PyLong>()) {
        TypeTag::Int
    } else if value.get_type().is(py.get_type::<PyFloat>()) {
        TypeTag::Double
    } else if value.get_type().is(py.get_type::<PyString>()) {
        TypeTag::String
    } else if value.get_type().is(py.get_type::<PyBytes>()) {
        TypeTag::Bytes
    } else if value.get_type().is(py.get_type::<PyList>())
        || value.get_type().is(py.get_type::<PyTuple>())
        || value.get_type().is(py.get_type::<PyDict>())
    {
        TypeTag::Collection
    } else {
        TypeTag::Object
    }
}
