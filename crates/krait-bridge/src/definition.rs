//! Definition details for Python objects
//!
//! A [`ScriptDefinitionDetails`] enumerates the members of one Python
//! object as reflection properties. Enumeration is live: every call walks
//! `dir()` again, so members added or removed at runtime show up without
//! re-wrapping.

use std::sync::Arc;

use pyo3::prelude::*;

use krait_reflect::{
    Definition, DefinitionDetails, DefinitionHelper, ObjectHandle, Property,
};

use crate::context::BridgeContext;
use crate::hooks;
use crate::instance::ScriptInstance;
use crate::property::ScriptProperty;

// ============================================================================
// Script Definition Details
// ============================================================================

/// Live member enumeration for one Python object.
pub struct ScriptDefinitionDetails {
    name: String,
    object: Py<PyAny>,
    ctx: Arc<BridgeContext>,
}

impl ScriptDefinitionDetails {
    /// Build details for an object and install its mutation hook.
    pub(crate) fn new(py: Python<'_>, ctx: Arc<BridgeContext>, object: &PyAny) -> Arc<Self> {
        hooks::attach(py, &ctx, object);
        Arc::new(Self {
            name: generate_name(object),
            object: object.into_py(py),
            ctx,
        })
    }
}

impl DefinitionDetails for ScriptDefinitionDetails {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> Vec<Arc<dyn Property>> {
        Python::with_gil(|py| {
            let object = self.object.as_ref(py);
            let mut properties: Vec<Arc<dyn Property>> = Vec::new();
            for entry in object.dir() {
                let Ok(name) = entry.extract::<String>() else {
                    continue;
                };
                // dir() can list descriptors that raise on access.
                if !object.hasattr(name.as_str()).unwrap_or(false) {
                    continue;
                }
                properties.push(Arc::new(ScriptProperty::new(
                    py,
                    self.ctx.clone(),
                    &name,
                    object,
                )));
            }
            properties
        })
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn Property>> {
        Python::with_gil(|py| {
            let object = self.object.as_ref(py);
            if !object.hasattr(name).unwrap_or(false) {
                return None;
            }
            Some(Arc::new(ScriptProperty::new(py, self.ctx.clone(), name, object)) as _)
        })
    }
}

impl Drop for ScriptDefinitionDetails {
    fn drop(&mut self) {
        Python::with_gil(|py| {
            hooks::detach(py, &self.ctx, self.object.as_ref(py));
        });
    }
}

/// Unique definition name for an object.
///
/// Python has no per-instance class names, so the object address is folded
/// in to keep per-object definitions distinct.
fn generate_name(object: &PyAny) -> String {
    let ty = object.get_type();
    let module = ty
        .getattr("__module__")
        .ok()
        .and_then(|m| m.extract::<String>().ok())
        .unwrap_or_else(|| "builtins".to_string());
    let qualname = ty
        .getattr("__qualname__")
        .ok()
        .and_then(|q| q.extract::<String>().ok())
        .unwrap_or_else(|| "object".to_string());
    format!(
        "python.{}.{}.{:x}",
        module,
        qualname,
        object.as_ptr() as usize
    )
}

// ============================================================================
// Script Definition Helper
// ============================================================================

/// Resolves definitions for handles that wrap Python instances.
///
/// Registered with the host definition manager by the bridge context.
pub struct ScriptDefinitionHelper;

impl DefinitionHelper for ScriptDefinitionHelper {
    fn definition_of(&self, handle: &ObjectHandle) -> Option<Arc<Definition>> {
        handle
            .downcast_ref::<ScriptInstance>()
            .map(|instance| instance.definition().clone())
    }
}
