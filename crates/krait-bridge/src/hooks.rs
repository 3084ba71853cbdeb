//! Mutation listener hooks
//!
//! To observe assignments made by Python code itself (`obj.name = value`
//! inside a script), the bridge patches `__setattr__` on the type of every
//! wrapped instance. The patched function notifies the host's property
//! listeners and then delegates to the type's original `__setattr__`, so
//! Python semantics are unchanged.
//!
//! Hooks are reference-counted per type: the first wrapped instance of a
//! type installs the hook, the last definition of that type to die removes
//! it and restores the original attribute. Types that reject attribute
//! writes (builtin containers and most C types) are left unhooked and
//! simply produce no script-side mutation events.
//!
//! Host-originated writes already notify listeners from
//! [`PropertyAccessor::set_value`](krait_reflect::PropertyAccessor); a
//! reentrancy flag keeps the patched `__setattr__` from notifying a second
//! time on that path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;
use pyo3::types::{PyCFunction, PyDict, PyTuple, PyType};
use rustc_hash::FxHashMap;

use krait_reflect::{Property, PropertyAccessor, PropertyAccessorListener, Variant};

use crate::context::BridgeContext;
use crate::instance::ScriptInstance;
use crate::property::ScriptProperty;

// ============================================================================
// Reentrancy Guard
// ============================================================================

/// Tracks host-originated writes so the interception hook does not notify
/// listeners a second time.
///
/// Registered as a [`PropertyAccessorListener`] by the bridge context; the
/// counter is raised by the pre notification and lowered by the post one.
#[derive(Default)]
pub struct HookGuard {
    entered: AtomicUsize,
}

impl HookGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True while a host-originated write is in flight.
    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::Acquire) > 0
    }
}

impl PropertyAccessorListener for HookGuard {
    fn pre_set_value(&self, _accessor: &PropertyAccessor, _value: &Variant) {
        self.entered.fetch_add(1, Ordering::AcqRel);
    }

    fn post_set_value(&self, _accessor: &PropertyAccessor, _value: &Variant) {
        let previous = self.entered.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "unbalanced hook guard");
    }
}

// ============================================================================
// Hook Table
// ============================================================================

/// Bookkeeping for one patched type.
pub(crate) struct HookEntry {
    /// Number of live definitions whose instances share this type.
    count: usize,
    /// Resolved `__setattr__` captured before patching, for delegation.
    original: PyObject,
    /// The type's own `__dict__` entry before patching, if it had one.
    /// `None` means the attribute must be deleted on restore so the
    /// inherited slot becomes visible again.
    own: Option<PyObject>,
    /// The patched type.
    ty: Py<PyType>,
}

pub(crate) type HookTable = FxHashMap<usize, HookEntry>;

/// The type whose `__setattr__` is patched when hooking `object`.
///
/// Hooking a class object patches that class itself, so its instances
/// report mutation events. Hooking an instance patches its type.
fn hooked_type(object: &PyAny) -> &PyType {
    match object.downcast::<PyType>() {
        Ok(ty) => ty,
        Err(_) => object.get_type(),
    }
}

// ============================================================================
// Attach / Detach
// ============================================================================

/// Install (or reference) the mutation hook for the type of `object`.
///
/// Failures are not errors: a type that rejects the patch is logged and
/// skipped, and wrapped instances of it simply produce no script-side
/// events.
pub(crate) fn attach(py: Python<'_>, ctx: &Arc<BridgeContext>, object: &PyAny) {
    let ty = hooked_type(object);
    let key = ty.as_ptr() as usize;

    {
        let mut table = ctx.hook_table();
        if let Some(entry) = table.get_mut(&key) {
            entry.count += 1;
            return;
        }
    }

    let original: PyObject = match ty.getattr("__setattr__") {
        Ok(attr) => attr.into_py(py),
        Err(err) => {
            tracing::debug!(error = %err, "type has no __setattr__, not hooking");
            return;
        }
    };
    let own: Option<PyObject> = ty
        .getattr("__dict__")
        .ok()
        .and_then(|d| d.get_item("__setattr__").ok())
        .map(|v| v.into_py(py));

    let wrapper = match make_wrapper(py, ctx, &original) {
        Ok(wrapper) => wrapper,
        Err(err) => {
            tracing::debug!(error = %err, "failed to build setattr hook");
            return;
        }
    };
    if let Err(err) = ty.setattr("__setattr__", wrapper) {
        // Builtin and extension types commonly reject this.
        tracing::debug!(ty = %ty, error = %err, "type does not support listener hooks");
        return;
    }

    ctx.hook_table().insert(
        key,
        HookEntry {
            count: 1,
            original,
            own,
            ty: ty.into(),
        },
    );
}

/// Release one reference to the hook for the type of `object`, restoring
/// the original `__setattr__` when the last reference goes away.
///
/// Types that never accepted the hook have no table entry and detach is a
/// no-op for them.
pub(crate) fn detach(py: Python<'_>, ctx: &BridgeContext, object: &PyAny) {
    let ty = hooked_type(object);
    let key = ty.as_ptr() as usize;

    let entry = {
        let mut table = ctx.hook_table();
        let Some(mut entry) = table.remove(&key) else {
            tracing::trace!(ty = %ty, "detach on unhooked type");
            return;
        };
        entry.count -= 1;
        if entry.count > 0 {
            table.insert(key, entry);
            return;
        }
        entry
    };

    restore(py, &entry);
}

/// Forcibly remove every installed hook. Called on bridge shutdown.
pub(crate) fn detach_all(py: Python<'_>, ctx: &BridgeContext) {
    let entries: Vec<HookEntry> = {
        let mut table = ctx.hook_table();
        table.drain().map(|(_, entry)| entry).collect()
    };
    for entry in &entries {
        restore(py, entry);
    }
}

fn restore(py: Python<'_>, entry: &HookEntry) {
    let ty = entry.ty.as_ref(py);
    let result = match &entry.own {
        Some(own) => ty.setattr("__setattr__", own.as_ref(py)),
        None => ty.delattr("__setattr__"),
    };
    if let Err(err) = result {
        tracing::error!(ty = %ty, error = %err, "failed to restore __setattr__");
    }
}

// ============================================================================
// Interception
// ============================================================================

// A PyCFunction is not a descriptor, so assigning one to `__setattr__`
// would never bind `self`. The callback is wrapped in a Python-level
// function instead.
const MAKE_HOOK_SOURCE: &str = r#"
def make_hook(callback):
    def __setattr__(self, name, value):
        callback(self, name, value)
    return __setattr__
"#;

fn make_hook(py: Python<'_>) -> PyResult<&PyAny> {
    static MAKE_HOOK: OnceCell<Py<PyAny>> = OnceCell::new();
    let function = MAKE_HOOK.get_or_try_init(|| -> PyResult<Py<PyAny>> {
        let module = PyModule::from_code(py, MAKE_HOOK_SOURCE, "_krait_hooks.py", "_krait_hooks")?;
        Ok(module.getattr("make_hook")?.into_py(py))
    })?;
    Ok(function.as_ref(py))
}

fn make_wrapper<'py>(
    py: Python<'py>,
    ctx: &Arc<BridgeContext>,
    original: &PyObject,
) -> PyResult<&'py PyAny> {
    // The closure holds the context weakly; a hook that outlives the bridge
    // degrades to plain delegation.
    let ctx = Arc::downgrade(ctx);
    let original = original.clone_ref(py);
    let callback = PyCFunction::new_closure(
        py,
        None,
        None,
        move |args: &PyTuple, _kwargs: Option<&PyDict>| -> PyResult<PyObject> {
            let py = args.py();
            intercept_setattr(py, &ctx, &original, args)?;
            Ok(py.None())
        },
    )?;
    make_hook(py)?.call1((callback,))
}

fn intercept_setattr(
    py: Python<'_>,
    ctx: &Weak<BridgeContext>,
    original: &PyObject,
    args: &PyTuple,
) -> PyResult<()> {
    if args.len() != 3 {
        return Err(PyTypeError::new_err(
            "__setattr__ expects (self, name, value)",
        ));
    }
    let slf = args.get_item(0)?;
    let name = args.get_item(1)?;
    let value = args.get_item(2)?;

    let delegate = || -> PyResult<()> {
        original.call1(py, (slf, name, value))?;
        Ok(())
    };

    let Some(ctx) = ctx.upgrade() else {
        return delegate();
    };
    // Host-originated writes have already notified from the accessor.
    if ctx.hook_guard().entered() {
        return delegate();
    }
    // Only instances that are already wrapped produce events.
    let Some(handle) = ScriptInstance::find(py, &ctx, slf) else {
        return delegate();
    };
    let Ok(name_str) = name.extract::<String>() else {
        return delegate();
    };
    let Some(instance) = handle.downcast_ref::<ScriptInstance>() else {
        return delegate();
    };

    let root = instance.root();
    let mut full_path = instance.full_path().to_string();
    if !full_path.is_empty() {
        full_path.push(krait_reflect::DOT_OPERATOR);
    }
    full_path.push_str(&name_str);

    let property: Arc<dyn Property> =
        Arc::new(ScriptProperty::new(py, ctx.clone(), &name_str, slf));
    let accessor = PropertyAccessor::new(
        ctx.definition_manager().clone(),
        root,
        handle.clone(),
        full_path,
        property,
    );
    let variant = ctx
        .converters()
        .to_variant(py, &ctx, value, &handle, &name_str)
        .unwrap_or(Variant::Void);

    ctx.definition_manager().notify_pre_set(&accessor, &variant);
    let result = delegate();
    ctx.definition_manager()
        .notify_post_set(&accessor, &variant);
    result
}
