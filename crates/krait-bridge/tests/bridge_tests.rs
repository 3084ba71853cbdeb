//! Integration tests for wrapping, identity and property access
//!
//! Tests cover:
//! - Identity-stable wrapping and definition registration
//! - Wrapper lifetime (weak registries, cleanup on drop)
//! - Parent/root tracking and full property paths
//! - Property reads, writes, calls and parameter counts

use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::types::PyDict;

use krait_bridge::{BridgeContext, ScriptInstance};
use krait_reflect::{
    DefinitionManager, ObjectHandle, ObjectManager, Services, TypeTag, Variant,
};

fn services() -> Services {
    let services = Services::new();
    services.register(Arc::new(DefinitionManager::new()));
    services.register(Arc::new(ObjectManager::new()));
    services
}

fn fixture<'py>(py: Python<'py>, name: &str, code: &str) -> &'py PyAny {
    let file = format!("{name}.py");
    PyModule::from_code(py, code, &file, name)
        .unwrap()
        .getattr("obj")
        .unwrap()
}

const HOLDER: &str = r#"
class Leaf:
    def __init__(self, name):
        self.name = name

class Holder:
    def __init__(self):
        self.items = [Leaf('a'), Leaf('b'), Leaf('c')]
        self.count = 3

obj = Holder()
"#;

#[test]
fn test_wrap_is_identity_stable() {
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    Python::with_gil(|py| {
        let obj = fixture(py, "bridge_identity", "class A:\n    pass\nobj = A()\n");
        let first = ctx.wrap(py, obj).unwrap();
        let second = ctx.wrap(py, obj).unwrap();
        assert_eq!(first, second);

        let a = first.downcast_ref::<ScriptInstance>().unwrap();
        let b = second.downcast_ref::<ScriptInstance>().unwrap();
        assert!(Arc::ptr_eq(a.definition(), b.definition()));
    });
}

#[test]
fn test_definition_registered_and_resolved() {
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    let manager = services.get::<DefinitionManager>().unwrap();
    Python::with_gil(|py| {
        let obj = fixture(py, "bridge_registered", "class B:\n    pass\nobj = B()\n");
        let handle = ctx.wrap(py, obj).unwrap();

        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();
        let name = instance.definition().name().to_string();
        assert!(name.starts_with("python.bridge_registered.B."));
        assert!(manager.get_definition(&name).is_some());

        // The bridge's helper resolves definitions from plain handles.
        let resolved = manager.definition_of(&handle).unwrap();
        assert!(Arc::ptr_eq(&resolved, instance.definition()));
    });
}

#[test]
fn test_wrapper_cleanup_on_drop() {
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    let manager = services.get::<DefinitionManager>().unwrap();
    let name = Python::with_gil(|py| {
        let obj = fixture(py, "bridge_cleanup", "class C:\n    pass\nobj = C()\n");
        let handle = ctx.wrap(py, obj).unwrap();
        handle
            .downcast_ref::<ScriptInstance>()
            .unwrap()
            .definition()
            .name()
            .to_string()
    });
    // The handle is gone; the definition deregistered itself.
    assert!(manager.get_definition(&name).is_none());

    Python::with_gil(|py| {
        let module = py.import("bridge_cleanup").unwrap();
        let obj = module.getattr("obj").unwrap();
        // The stamp went with it, so finding the wrapper fails.
        assert!(ScriptInstance::find(py, &ctx, obj).is_none());
        // Re-wrapping starts a fresh definition.
        let handle = ctx.wrap(py, obj).unwrap();
        assert!(handle.is_valid());
    });
}

#[test]
fn test_fallback_entries_released_on_drop() {
    // Objects that cannot carry a stamp are tracked in the registry's
    // fallback table; the entry goes away with the last wrapper.
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    Python::with_gil(|py| {
        assert_eq!(ctx.registry().fallback_len(), 0);
        let value = py.eval("(1, 2, 3)", None, None).unwrap();
        let variant = ctx
            .to_variant(py, value, &ObjectHandle::null(), "data")
            .unwrap();
        assert!(variant.as_collection().is_some());
        assert_eq!(ctx.registry().fallback_len(), 1);

        drop(variant);
        assert_eq!(ctx.registry().fallback_len(), 0);
    });
}

#[test]
fn test_full_paths_through_object_graph() {
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    Python::with_gil(|py| {
        let obj = fixture(py, "bridge_paths", HOLDER);
        let root = ctx.wrap(py, obj).unwrap();
        let root_instance = root.downcast_ref::<ScriptInstance>().unwrap();
        assert_eq!(root_instance.full_path(), "");
        assert_eq!(root_instance.root(), root);
        assert_eq!(*root_instance.parent(), ObjectHandle::null());

        let items = root_instance
            .definition()
            .lookup("items")
            .unwrap()
            .get(&root);
        let items = items.as_collection().unwrap().clone();

        // The list wrapper sits at "items" under the root.
        let (element, _) = items.get(&Variant::Int(1), krait_reflect::GetPolicy::Existing);
        let leaf = element.value();
        let leaf_handle = leaf.as_object().unwrap();
        let leaf_instance = leaf_handle.downcast_ref::<ScriptInstance>().unwrap();
        assert_eq!(leaf_instance.full_path(), "items[1]");
        assert_eq!(leaf_instance.root(), root);

        // The element's parent is the list wrapper, which keeps the chain
        // to the root alive.
        let parent = leaf_instance.parent();
        let parent_instance = parent.downcast_ref::<ScriptInstance>().unwrap();
        assert_eq!(parent_instance.full_path(), "items");

        // One level further down.
        let name = leaf_instance
            .definition()
            .lookup("name")
            .unwrap()
            .get(leaf_handle);
        assert_eq!(name, Variant::from("b"));
    });
}

#[test]
fn test_property_read_write() {
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    Python::with_gil(|py| {
        let obj = fixture(py, "bridge_rw", HOLDER);
        let handle = ctx.wrap(py, obj).unwrap();
        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();
        let count = instance.definition().lookup("count").unwrap();

        assert_eq!(count.get(&handle), Variant::Int(3));
        assert_eq!(count.value_type(), TypeTag::Int);
        assert!(!count.read_only());
        assert!(!count.hidden());
        assert!(!count.is_method());

        assert!(count.set(&handle, &Variant::Int(10)));
        assert_eq!(count.get(&handle), Variant::Int(10));
        let raw: i64 = obj.getattr("count").unwrap().extract().unwrap();
        assert_eq!(raw, 10);

        // Rebinding to a different type is allowed and tracked.
        assert!(count.set(&handle, &Variant::from("ten")));
        assert_eq!(count.value_type(), TypeTag::String);
        assert_eq!(count.get(&handle), Variant::from("ten"));
    });
}

#[test]
fn test_missing_property_lookup() {
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    Python::with_gil(|py| {
        let obj = fixture(py, "bridge_missing", "class D:\n    pass\nobj = D()\n");
        let handle = ctx.wrap(py, obj).unwrap();
        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();
        assert!(instance.definition().lookup("no_such_attr").is_none());
    });
}

#[test]
fn test_property_enumeration() {
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    Python::with_gil(|py| {
        let obj = fixture(py, "bridge_enum", HOLDER);
        let handle = ctx.wrap(py, obj).unwrap();
        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();
        let properties = instance.definition().properties();
        let names: Vec<&str> = properties.iter().map(|p| p.name()).collect();
        assert!(names.contains(&"items"));
        assert!(names.contains(&"count"));
        // Dunder members are enumerated but flagged hidden.
        let init = properties.iter().find(|p| p.name() == "__init__").unwrap();
        assert!(init.hidden());
    });
}

const CALLABLES: &str = r#"
class Worker:
    def __init__(self, tag, factor):
        self.factor = factor

    def scale(self, value):
        return value * self.factor

    @staticmethod
    def fixed(a, b):
        return a + b

    @classmethod
    def describe(cls, detail):
        return detail

class Plain:
    pass

class Dialer:
    def __call__(self, number):
        return number

obj = Worker('w', 2)
plain = Plain()
dialer = Dialer()
"#;

#[test]
fn test_invoke_and_parameter_counts() {
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    Python::with_gil(|py| {
        let module =
            PyModule::from_code(py, CALLABLES, "bridge_calls.py", "bridge_calls").unwrap();
        let obj = module.getattr("obj").unwrap();
        let handle = ctx.wrap(py, obj).unwrap();
        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();
        let definition = instance.definition().clone();

        // Bound method: self is excluded from the count.
        let scale = definition.lookup("scale").unwrap();
        assert!(scale.is_method());
        assert_eq!(scale.parameter_count(), 1);
        assert_eq!(scale.invoke(&handle, &[Variant::Int(21)]), Variant::Int(42));

        // Static method: no implicit parameter.
        let fixed = definition.lookup("fixed").unwrap();
        assert_eq!(fixed.parameter_count(), 2);
        assert_eq!(
            fixed.invoke(&handle, &[Variant::Int(1), Variant::Int(2)]),
            Variant::Int(3)
        );

        // Class method: cls is excluded.
        let describe = definition.lookup("describe").unwrap();
        assert_eq!(describe.parameter_count(), 1);
        assert_eq!(
            describe.invoke(&handle, &[Variant::from("x")]),
            Variant::from("x")
        );

        // A call that raises reports no value.
        assert_eq!(scale.invoke(&handle, &[]), Variant::Void);
    });
}

#[test]
fn test_class_and_callable_parameter_counts() {
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    Python::with_gil(|py| {
        let module =
            PyModule::from_code(py, CALLABLES, "bridge_calls2.py", "bridge_calls2").unwrap();
        let handle = ctx.wrap(py, module).unwrap();
        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();
        let definition = instance.definition().clone();

        // Calling a class runs __init__ without self.
        let worker = definition.lookup("Worker").unwrap();
        assert_eq!(worker.parameter_count(), 2);

        // A class with the default __init__ takes nothing.
        let plain = definition.lookup("Plain").unwrap();
        assert_eq!(plain.parameter_count(), 0);

        // Callable instance: its type's __call__ without self.
        let dialer = definition.lookup("dialer").unwrap();
        assert!(dialer.is_method());
        assert_eq!(dialer.parameter_count(), 1);
    });
}

#[test]
fn test_script_set_of_unknown_name_via_run() {
    // Attributes created at runtime become visible to lookup immediately.
    let services = services();
    let ctx = BridgeContext::from_services(&services).unwrap();
    Python::with_gil(|py| {
        let obj = fixture(py, "bridge_dynamic", "class E:\n    pass\nobj = E()\n");
        let handle = ctx.wrap(py, obj).unwrap();
        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();
        assert!(instance.definition().lookup("fresh").is_none());

        let locals = PyDict::new(py);
        locals.set_item("obj", obj).unwrap();
        py.run("obj.fresh = 'new'", None, Some(locals)).unwrap();

        let fresh = instance.definition().lookup("fresh").unwrap();
        assert_eq!(fresh.get(&handle), Variant::from("new"));
    });
}
