//! Primitive converters
//!
//! Each converter claims exactly one Python type (exact type, never a
//! subclass) and one variant tag. Integers that do not fit the host's
//! 64-bit representation are declined here so the generic object wrapper
//! picks them up instead of truncating.

use pyo3::prelude::*;
use pyo3::types::{PyBool, PyBytes, PyFloat, PyLong, PyString};

use krait_reflect::Variant;

use super::is_exact;

/// Python `None` <-> [`Variant::Void`].
pub(crate) struct NoneConverter;

impl super::BasicConverter for NoneConverter {
    fn to_variant(&self, _py: Python<'_>, value: &PyAny) -> Option<Variant> {
        value.is_none().then_some(Variant::Void)
    }

    fn to_script(&self, py: Python<'_>, value: &Variant) -> Option<PyObject> {
        value.is_void().then(|| py.None())
    }
}

/// Python `bool` <-> [`Variant::Bool`]. Must outrank the int converter
/// because `bool` subclasses `int`.
pub(crate) struct BoolConverter;

impl super::BasicConverter for BoolConverter {
    fn to_variant(&self, _py: Python<'_>, value: &PyAny) -> Option<Variant> {
        if !is_exact::<PyBool>(value) {
            return None;
        }
        value.extract::<bool>().ok().map(Variant::Bool)
    }

    fn to_script(&self, py: Python<'_>, value: &Variant) -> Option<PyObject> {
        value.as_bool().map(|b| b.into_py(py))
    }
}

/// Python `int` <-> [`Variant::Int`].
///
/// Declines values outside the i64 range; Python integers are unbounded.
pub(crate) struct IntConverter;

impl super::BasicConverter for IntConverter {
    fn to_variant(&self, _py: Python<'_>, value: &PyAny) -> Option<Variant> {
        if !is_exact::<PyLong>(value) {
            return None;
        }
        value.extract::<i64>().ok().map(Variant::Int)
    }

    fn to_script(&self, py: Python<'_>, value: &Variant) -> Option<PyObject> {
        value.as_int().map(|i| i.into_py(py))
    }
}

/// Python `float` <-> [`Variant::Double`].
pub(crate) struct DoubleConverter;

impl super::BasicConverter for DoubleConverter {
    fn to_variant(&self, _py: Python<'_>, value: &PyAny) -> Option<Variant> {
        if !is_exact::<PyFloat>(value) {
            return None;
        }
        value.extract::<f64>().ok().map(Variant::Double)
    }

    fn to_script(&self, py: Python<'_>, value: &Variant) -> Option<PyObject> {
        match value {
            Variant::Double(d) => Some((*d).into_py(py)),
            _ => None,
        }
    }
}

/// Python `str` <-> [`Variant::String`].
pub(crate) struct StrConverter;

impl super::BasicConverter for StrConverter {
    fn to_variant(&self, _py: Python<'_>, value: &PyAny) -> Option<Variant> {
        if !is_exact::<PyString>(value) {
            return None;
        }
        value.extract::<String>().ok().map(Variant::String)
    }

    fn to_script(&self, py: Python<'_>, value: &Variant) -> Option<PyObject> {
        value.as_str().map(|s| s.into_py(py))
    }
}

/// Python `bytes` <-> [`Variant::Bytes`].
pub(crate) struct BytesConverter;

impl super::BasicConverter for BytesConverter {
    fn to_variant(&self, _py: Python<'_>, value: &PyAny) -> Option<Variant> {
        if !is_exact::<PyBytes>(value) {
            return None;
        }
        value
            .downcast::<PyBytes>()
            .ok()
            .map(|b| Variant::Bytes(b.as_bytes().to_vec()))
    }

    fn to_script(&self, py: Python<'_>, value: &Variant) -> Option<PyObject> {
        value.as_bytes().map(|b| PyBytes::new(py, b).into_py(py))
    }
}
