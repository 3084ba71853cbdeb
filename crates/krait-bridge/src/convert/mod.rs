//! Value conversion between Python and host values
//!
//! Conversion runs through an ordered chain of converters. Each converter
//! either claims a value and produces the converted form, or declines and
//! the chain moves on. Registration order matters: converters registered
//! later are consulted first, so the generic object wrapper sits at the
//! very front of the registration list and only catches what nothing else
//! claimed.
//!
//! Two tiers exist. Basic converters handle values that stand alone
//! (primitives). Parented converters handle values whose host form needs a
//! position in an object graph (containers and wrapped objects) and
//! receive the parent handle and child path for it.

use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::PyTypeInfo;

use krait_reflect::{ObjectHandle, Variant};

use crate::context::BridgeContext;

mod basic;
mod mapping;
mod object;
mod sequence;

pub use mapping::{MappingAdapter, MappingConverter};
pub use object::ObjectConverter;
pub use sequence::{ListKind, SequenceAdapter, SequenceConverter, SequenceKind, TupleConverter, TupleKind};

// ============================================================================
// Converter Traits
// ============================================================================

/// Converter for values that stand alone.
pub trait BasicConverter: Send + Sync {
    /// Convert Python to host; `None` declines.
    fn to_variant(&self, py: Python<'_>, value: &PyAny) -> Option<Variant>;

    /// Convert host to Python; `None` declines.
    fn to_script(&self, py: Python<'_>, value: &Variant) -> Option<PyObject>;
}

/// Converter for values wrapped relative to a parent object.
pub trait ParentedConverter: Send + Sync {
    /// Convert Python to host; `None` declines.
    ///
    /// `parent` is the wrapper the value was reached through and
    /// `child_path` the path segment from it.
    fn to_variant(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &PyAny,
        parent: &ObjectHandle,
        child_path: &str,
    ) -> Option<Variant>;

    /// Convert host to Python; `None` declines.
    fn to_script(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &Variant,
    ) -> Option<PyObject>;
}

// ============================================================================
// Converter Queue
// ============================================================================

/// The ordered converter chain.
///
/// Basic converters are consulted before parented ones, and within each
/// tier the most recently registered converter wins.
pub struct ConverterQueue {
    basic: Vec<Box<dyn BasicConverter>>,
    parented: Vec<Box<dyn ParentedConverter>>,
}

impl ConverterQueue {
    /// A queue loaded with the default converters.
    pub fn new() -> Self {
        let mut queue = Self {
            basic: Vec::new(),
            parented: Vec::new(),
        };
        // Reverse priority: later registrations are consulted first. The
        // generic object wrapper goes in first so it only catches what no
        // other converter claimed; None outranks everything because bool,
        // int and friends must not see it.
        queue.register_parented(Box::new(object::ObjectConverter));
        queue.register_parented(Box::new(mapping::MappingConverter));
        queue.register_parented(Box::new(sequence::SequenceConverter));
        queue.register_parented(Box::new(sequence::TupleConverter));
        queue.register_basic(Box::new(basic::BytesConverter));
        queue.register_basic(Box::new(basic::StrConverter));
        queue.register_basic(Box::new(basic::DoubleConverter));
        queue.register_basic(Box::new(basic::IntConverter));
        queue.register_basic(Box::new(basic::BoolConverter));
        queue.register_basic(Box::new(basic::NoneConverter));
        queue
    }

    /// Add a basic converter at the front of the search order.
    pub fn register_basic(&mut self, converter: Box<dyn BasicConverter>) {
        self.basic.push(converter);
    }

    /// Add a parented converter at the front of the search order.
    pub fn register_parented(&mut self, converter: Box<dyn ParentedConverter>) {
        self.parented.push(converter);
    }

    /// Convert a Python value to a host value.
    pub fn to_variant(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &PyAny,
        parent: &ObjectHandle,
        child_path: &str,
    ) -> Option<Variant> {
        for converter in self.basic.iter().rev() {
            if let Some(variant) = converter.to_variant(py, value) {
                return Some(variant);
            }
        }
        for converter in self.parented.iter().rev() {
            if let Some(variant) = converter.to_variant(py, ctx, value, parent, child_path) {
                return Some(variant);
            }
        }
        None
    }

    /// Convert a host value to a Python value.
    pub fn to_script(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &Variant,
    ) -> Option<PyObject> {
        for converter in self.basic.iter().rev() {
            if let Some(object) = converter.to_script(py, value) {
                return Some(object);
            }
        }
        for converter in self.parented.iter().rev() {
            if let Some(object) = converter.to_script(py, ctx, value) {
                return Some(object);
            }
        }
        None
    }
}

impl Default for ConverterQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact type check, ignoring subclasses.
///
/// Conversion must not flatten subclasses of builtins: a subclass can
/// carry attributes and behavior of its own, so it wraps as an object.
pub(crate) fn is_exact<T: PyTypeInfo>(value: &PyAny) -> bool {
    let py = value.py();
    value.get_type().is(py.get_type::<T>())
}
