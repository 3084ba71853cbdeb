//! Generic object converter
//!
//! The fallback for anything no other converter claimed: wraps the Python
//! object as a reflected instance and hands back an object-handle variant.
//! In the other direction it unwraps handles that came from this bridge;
//! host objects with no Python form are declined.

use std::sync::Arc;

use pyo3::prelude::*;

use krait_reflect::{ObjectHandle, Variant};

use crate::context::BridgeContext;
use crate::instance::ScriptInstance;

/// Wraps arbitrary Python objects as reflected instances.
pub struct ObjectConverter;

impl super::ParentedConverter for ObjectConverter {
    fn to_variant(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        value: &PyAny,
        parent: &ObjectHandle,
        child_path: &str,
    ) -> Option<Variant> {
        match ScriptInstance::find_or_create(py, ctx, value, parent, child_path) {
            Ok(handle) => Some(Variant::Object(handle)),
            Err(err) => {
                tracing::error!(error = %err, "failed to wrap object");
                None
            }
        }
    }

    fn to_script(
        &self,
        py: Python<'_>,
        _ctx: &Arc<BridgeContext>,
        value: &Variant,
    ) -> Option<PyObject> {
        let handle = value.as_object()?;
        let instance = handle.downcast_ref::<ScriptInstance>()?;
        Some(instance.object().clone_ref(py))
    }
}
