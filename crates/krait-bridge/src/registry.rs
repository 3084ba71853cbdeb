//! Definition registry — identity-stable definitions for Python objects
//!
//! Every wrapped Python object gets exactly one [`Definition`] and one
//! [`ObjectId`] for as long as anything holds the definition. The mapping
//! lives on the object itself where possible: a small stamp instance is
//! attached under the `__reflection_definition__` attribute, holding the
//! definition weakly so the registry never extends its lifetime.
//!
//! Objects that reject attribute writes (builtin containers, slotted
//! classes) and type objects (stamping a class would leak the stamp to its
//! instances) fall back to a registry-side table keyed by Python equality,
//! with pointer identity as the tiebreak when comparison itself raises.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use pyo3::prelude::*;
use pyo3::types::PyType;

use krait_reflect::{Definition, DefinitionManager, ObjectId};

use crate::context::BridgeContext;
use crate::definition::ScriptDefinitionDetails;
use crate::error::BridgeResult;

/// Attribute under which stamps are stored on wrapped instances.
pub const STAMP_ATTR: &str = "__reflection_definition__";

// ============================================================================
// Definition Stamp
// ============================================================================

/// Marker attached to a wrapped Python instance.
///
/// Holds the definition weakly; a stamp that outlives its definition is
/// stale and gets replaced on the next wrap.
#[pyclass(module = "_krait")]
pub(crate) struct DefinitionStamp {
    definition: Weak<Definition>,
    id: ObjectId,
}

// ============================================================================
// Registry
// ============================================================================

struct FallbackEntry {
    object: PyObject,
    definition: Weak<Definition>,
    id: ObjectId,
}

/// Per-object definition bookkeeping for one bridge.
pub struct DefinitionRegistry {
    definition_manager: Arc<DefinitionManager>,
    fallback: Mutex<Vec<FallbackEntry>>,
}

impl DefinitionRegistry {
    pub(crate) fn new(definition_manager: Arc<DefinitionManager>) -> Self {
        Self {
            definition_manager,
            fallback: Mutex::new(Vec::new()),
        }
    }

    /// Find the definition for an object, creating and registering one if
    /// none is alive.
    pub fn find_or_create(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        object: &PyAny,
    ) -> BridgeResult<(Arc<Definition>, ObjectId)> {
        if let Some(found) = self.find(py, object) {
            return Ok(found);
        }

        // Probe whether a stamp can live on the object. The placeholder is
        // also what keeps listener hooks quiet while the real stamp is
        // being built.
        let is_type = object.downcast::<PyType>().is_ok();
        let can_attach = !is_type && object.setattr(STAMP_ATTR, py.None()).is_ok();

        let (definition, id) = self.create_definition(py, ctx, object);
        let name = definition.name().to_string();
        let manager = self.definition_manager.clone();
        let object_manager = ctx.object_manager().clone();
        let owned: PyObject = object.into_py(py);

        if can_attach {
            let stamp = Py::new(
                py,
                DefinitionStamp {
                    definition: Arc::downgrade(&definition),
                    id,
                },
            )?;
            object.setattr(STAMP_ATTR, stamp)?;
            definition.set_cleanup(move || {
                Python::with_gil(|py| {
                    if let Err(err) = owned.as_ref(py).delattr(STAMP_ATTR) {
                        tracing::trace!(error = %err, "stamp already removed");
                    }
                });
                manager.deregister_definition(&name);
                object_manager.deregister(id);
            });
        } else {
            let key_ptr = object.as_ptr() as usize;
            {
                let mut table = self.fallback.lock();
                table.retain(|entry| entry.definition.upgrade().is_some());
                table.push(FallbackEntry {
                    object: owned,
                    definition: Arc::downgrade(&definition),
                    id,
                });
            }
            let ctx_weak = Arc::downgrade(ctx);
            definition.set_cleanup(move || {
                if let Some(ctx) = ctx_weak.upgrade() {
                    ctx.registry().remove_fallback(key_ptr);
                }
                manager.deregister_definition(&name);
                object_manager.deregister(id);
            });
        }

        Ok((definition, id))
    }

    /// Find the live definition and id for an object, if it has one.
    pub fn find(&self, py: Python<'_>, object: &PyAny) -> Option<(Arc<Definition>, ObjectId)> {
        if let Ok(attr) = object.getattr(STAMP_ATTR) {
            if let Ok(stamp) = attr.extract::<PyRef<DefinitionStamp>>() {
                let definition = stamp.definition.upgrade()?;
                return Some((definition, stamp.id));
            }
            // The creation placeholder: the definition is mid-build.
            if attr.is_none() {
                return None;
            }
        }

        let table = self.fallback.lock();
        for entry in table.iter() {
            if identity_eq(object, entry.object.as_ref(py)) {
                // Dead entries are skipped here and pruned on the next create.
                if let Some(definition) = entry.definition.upgrade() {
                    return Some((definition, entry.id));
                }
            }
        }
        None
    }

    /// The id of an already-wrapped object.
    ///
    /// Asking for an object that was never wrapped is a caller bug.
    pub fn id(&self, py: Python<'_>, object: &PyAny) -> ObjectId {
        match self.find(py, object) {
            Some((_, id)) => id,
            None => {
                debug_assert!(false, "object was never assigned a definition");
                ObjectId::INVALID
            }
        }
    }

    fn create_definition(
        &self,
        py: Python<'_>,
        ctx: &Arc<BridgeContext>,
        object: &PyAny,
    ) -> (Arc<Definition>, ObjectId) {
        let details = ScriptDefinitionDetails::new(py, ctx.clone(), object);
        let definition = Definition::new(details);
        self.definition_manager.register_definition(&definition);
        (definition, ObjectId::generate())
    }

    fn remove_fallback(&self, key_ptr: usize) {
        self.fallback.lock().retain(|entry| {
            entry.object.as_ptr() as usize != key_ptr || entry.definition.upgrade().is_some()
        });
    }

    /// Number of objects currently tracked through the fallback table.
    pub fn fallback_len(&self) -> usize {
        self.fallback.lock().len()
    }
}

/// Python `==` with pointer identity as the error fallback.
///
/// Objects whose comparison raises are treated as equal only to themselves.
pub(crate) fn identity_eq(a: &PyAny, b: &PyAny) -> bool {
    if a.as_ptr() == b.as_ptr() {
        return true;
    }
    match a.eq(b) {
        Ok(equal) => equal,
        Err(err) => {
            tracing::trace!(error = %err, "comparison raised, falling back to identity");
            false
        }
    }
}
