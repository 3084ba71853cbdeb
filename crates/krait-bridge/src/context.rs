//! Bridge context — ownership root of the Python bridge
//!
//! A [`BridgeContext`] wires the bridge into the host: it resolves the
//! definition and object managers from the host's service locator, owns the
//! definition registry, the converter chain and the hook bookkeeping, and
//! registers the bridge's definition helper and reentrancy guard with the
//! definition manager.
//!
//! Everything a wrapped object needs reaches it through a shared
//! `Arc<BridgeContext>`; dropping the last definition never outlives the
//! context because instances and definition details hold it strongly.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use pyo3::prelude::*;

use krait_reflect::{
    DefinitionHelper, DefinitionManager, ObjectHandle, ObjectManager, PropertyAccessorListener,
    Services, Variant,
};

use crate::convert::ConverterQueue;
use crate::definition::ScriptDefinitionHelper;
use crate::error::{BridgeError, BridgeResult};
use crate::hooks::{self, HookGuard, HookTable};
use crate::instance::ScriptInstance;
use crate::registry::DefinitionRegistry;

/// Shared state of one live bridge.
pub struct BridgeContext {
    definition_manager: Arc<DefinitionManager>,
    object_manager: Arc<ObjectManager>,
    registry: DefinitionRegistry,
    converters: ConverterQueue,
    hook_guard: Arc<HookGuard>,
    hook_table: Mutex<HookTable>,
    helper: Arc<ScriptDefinitionHelper>,
}

impl BridgeContext {
    /// Create a context over explicit managers.
    pub fn new(
        definition_manager: Arc<DefinitionManager>,
        object_manager: Arc<ObjectManager>,
    ) -> Arc<Self> {
        let ctx = Arc::new(Self {
            registry: DefinitionRegistry::new(definition_manager.clone()),
            converters: ConverterQueue::new(),
            hook_guard: Arc::new(HookGuard::new()),
            hook_table: Mutex::new(HookTable::default()),
            helper: Arc::new(ScriptDefinitionHelper),
            definition_manager,
            object_manager,
        });

        let guard: Arc<dyn PropertyAccessorListener> = ctx.hook_guard.clone();
        ctx.definition_manager.register_listener(&guard);
        let helper: Arc<dyn DefinitionHelper> = ctx.helper.clone();
        ctx.definition_manager.register_helper(helper);
        ctx
    }

    /// Create a context from the host's service locator.
    ///
    /// Requires a [`DefinitionManager`] and an [`ObjectManager`] to be
    /// registered.
    pub fn from_services(services: &Services) -> BridgeResult<Arc<Self>> {
        let definition_manager = services
            .get::<DefinitionManager>()
            .ok_or(BridgeError::MissingService("DefinitionManager"))?;
        let object_manager = services
            .get::<ObjectManager>()
            .ok_or(BridgeError::MissingService("ObjectManager"))?;
        Ok(Self::new(definition_manager, object_manager))
    }

    /// Tear the bridge down: remove every installed `__setattr__` hook and
    /// deregister from the definition manager.
    ///
    /// Wrapped objects that are still alive keep working but no longer
    /// produce script-side mutation events.
    pub fn shutdown(&self) {
        Python::with_gil(|py| hooks::detach_all(py, self));
        let guard: Arc<dyn PropertyAccessorListener> = self.hook_guard.clone();
        self.definition_manager.deregister_listener(&guard);
        let helper: Arc<dyn DefinitionHelper> = self.helper.clone();
        self.definition_manager.deregister_helper(&helper);
    }

    /// Wrap a Python object as a root reflected object.
    ///
    /// The returned handle is identity-stable: wrapping the same object
    /// again returns the same handle while any copy of it is alive.
    pub fn wrap(self: &Arc<Self>, py: Python<'_>, object: &PyAny) -> BridgeResult<ObjectHandle> {
        ScriptInstance::find_or_create(py, self, object, &ObjectHandle::null(), "")
    }

    /// Convert a Python value to a host value, wrapping objects and
    /// containers as children of `parent`.
    pub fn to_variant(
        self: &Arc<Self>,
        py: Python<'_>,
        object: &PyAny,
        parent: &ObjectHandle,
        child_path: &str,
    ) -> BridgeResult<Variant> {
        self.converters
            .to_variant(py, self, object, parent, child_path)
            .ok_or_else(|| BridgeError::Conversion(object.to_string()))
    }

    /// Convert a host value to a Python value.
    pub fn to_script(self: &Arc<Self>, py: Python<'_>, value: &Variant) -> BridgeResult<PyObject> {
        self.converters
            .to_script(py, self, value)
            .ok_or_else(|| BridgeError::Conversion(format!("{value:?}")))
    }

    /// The host definition manager.
    pub fn definition_manager(&self) -> &Arc<DefinitionManager> {
        &self.definition_manager
    }

    /// The host object manager.
    pub fn object_manager(&self) -> &Arc<ObjectManager> {
        &self.object_manager
    }

    /// The bridge's definition registry.
    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// The bridge's converter chain.
    pub fn converters(&self) -> &ConverterQueue {
        &self.converters
    }

    /// The reentrancy guard for mutation hooks.
    pub(crate) fn hook_guard(&self) -> &HookGuard {
        &self.hook_guard
    }

    /// Lock the hook bookkeeping table.
    pub(crate) fn hook_table(&self) -> MutexGuard<'_, HookTable> {
        self.hook_table.lock()
    }
}
