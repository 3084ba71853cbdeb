//! Integration tests for mutation listener hooks
//!
//! Tests cover:
//! - Script-originated assignments notifying host listeners exactly once
//! - Host-originated writes notifying exactly once despite the hook
//! - Full paths in events for nested wrappers
//! - Hook installation and restoration over the wrapper lifecycle

use std::sync::Arc;

use parking_lot::Mutex;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use krait_bridge::{BridgeContext, ScriptInstance};
use krait_reflect::{
    DefinitionManager, GetPolicy, ObjectHandle, ObjectManager, PropertyAccessor,
    PropertyAccessorListener, Variant,
};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(&'static str, String)>>,
}

impl Recorder {
    fn take(&self) -> Vec<(&'static str, String)> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl PropertyAccessorListener for Recorder {
    fn pre_set_value(&self, accessor: &PropertyAccessor, _value: &Variant) {
        self.events
            .lock()
            .push(("pre", accessor.full_path().to_string()));
    }

    fn post_set_value(&self, accessor: &PropertyAccessor, _value: &Variant) {
        self.events
            .lock()
            .push(("post", accessor.full_path().to_string()));
    }
}

struct Fixture {
    manager: Arc<DefinitionManager>,
    ctx: Arc<BridgeContext>,
    recorder: Arc<Recorder>,
    _listener: Arc<dyn PropertyAccessorListener>,
}

fn fixture() -> Fixture {
    let manager = Arc::new(DefinitionManager::new());
    let ctx = BridgeContext::new(manager.clone(), Arc::new(ObjectManager::new()));
    let recorder = Arc::new(Recorder::default());
    let listener: Arc<dyn PropertyAccessorListener> = recorder.clone();
    manager.register_listener(&listener);
    Fixture {
        manager,
        ctx,
        recorder,
        _listener: listener,
    }
}

fn load<'py>(py: Python<'py>, name: &str, code: &str) -> &'py PyModule {
    let file = format!("{name}.py");
    PyModule::from_code(py, code, &file, name).unwrap()
}

#[test]
fn test_script_assignment_fires_listeners_once() {
    let f = fixture();
    Python::with_gil(|py| {
        let module = load(
            py,
            "hooks_script",
            "class A:\n    def __init__(self):\n        self.value = 0\nobj = A()\n",
        );
        let obj = module.getattr("obj").unwrap();
        let handle = f.ctx.wrap(py, obj).unwrap();

        let locals = PyDict::new(py);
        locals.set_item("obj", obj).unwrap();
        py.run("obj.value = 42", None, Some(locals)).unwrap();

        assert_eq!(
            f.recorder.take(),
            vec![("pre", "value".to_string()), ("post", "value".to_string())]
        );

        // The assignment itself went through unchanged.
        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();
        let value = instance.definition().lookup("value").unwrap();
        assert_eq!(value.get(&handle), Variant::Int(42));
    });
}

#[test]
fn test_host_write_fires_listeners_once() {
    let f = fixture();
    Python::with_gil(|py| {
        let module = load(
            py,
            "hooks_host",
            "class B:\n    def __init__(self):\n        self.count = 1\nobj = B()\n",
        );
        let obj = module.getattr("obj").unwrap();
        let handle = f.ctx.wrap(py, obj).unwrap();
        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();

        let accessor = instance
            .definition()
            .bind(
                &f.manager,
                handle.clone(),
                handle.clone(),
                "count".to_string(),
                "count",
            )
            .unwrap();
        assert!(accessor.set_value(&Variant::Int(9)));

        // One pre and one post, even though the write also passed through
        // the installed hook.
        assert_eq!(
            f.recorder.take(),
            vec![("pre", "count".to_string()), ("post", "count".to_string())]
        );
        let raw: i64 = obj.getattr("count").unwrap().extract().unwrap();
        assert_eq!(raw, 9);
    });
}

#[test]
fn test_unwrapped_instance_fires_nothing() {
    let f = fixture();
    Python::with_gil(|py| {
        let module = load(
            py,
            "hooks_unwrapped",
            "class C:\n    def __init__(self):\n        self.value = 0\nobj = C()\nother = C()\n",
        );
        let obj = module.getattr("obj").unwrap();
        let _handle = f.ctx.wrap(py, obj).unwrap();

        // Same class, so the hook sees the assignment, but the instance
        // was never wrapped.
        let locals = PyDict::new(py);
        locals
            .set_item("other", module.getattr("other").unwrap())
            .unwrap();
        py.run("other.value = 7", None, Some(locals)).unwrap();

        assert!(f.recorder.take().is_empty());
    });
}

#[test]
fn test_nested_wrapper_paths_in_events() {
    let f = fixture();
    Python::with_gil(|py| {
        let module = load(
            py,
            "hooks_nested",
            r#"
class Leaf:
    def __init__(self):
        self.name = 'a'

class Holder:
    def __init__(self):
        self.items = [Leaf()]

obj = Holder()
"#,
        );
        let obj = module.getattr("obj").unwrap();
        let root = f.ctx.wrap(py, obj).unwrap();
        let root_instance = root.downcast_ref::<ScriptInstance>().unwrap();

        // Reach the element so its wrapper exists with path "items[0]".
        let items = root_instance
            .definition()
            .lookup("items")
            .unwrap()
            .get(&root);
        let (element, _) = items
            .as_collection()
            .unwrap()
            .get(&Variant::Int(0), GetPolicy::Existing);
        let leaf = element.value();
        f.recorder.take();

        let locals = PyDict::new(py);
        locals.set_item("obj", obj).unwrap();
        py.run("obj.items[0].name = 'z'", None, Some(locals)).unwrap();

        assert_eq!(
            f.recorder.take(),
            vec![
                ("pre", "items[0].name".to_string()),
                ("post", "items[0].name".to_string())
            ]
        );
        drop(leaf);
    });
}

#[test]
fn test_hook_installed_and_restored() {
    let f = fixture();
    Python::with_gil(|py| {
        let module = load(
            py,
            "hooks_restore",
            "class D:\n    def __init__(self):\n        self.value = 0\nobj = D()\n",
        );
        let obj = module.getattr("obj").unwrap();
        let hooked = |py: Python<'_>| -> bool {
            let locals = PyDict::new(py);
            locals.set_item("obj", module.getattr("obj").unwrap()).unwrap();
            py.eval("'__setattr__' in type(obj).__dict__", None, Some(locals))
                .unwrap()
                .extract()
                .unwrap()
        };

        assert!(!hooked(py));
        {
            let _handle = f.ctx.wrap(py, obj).unwrap();
            assert!(hooked(py));
        }
        // Every wrapper is gone; the class is back to its original shape.
        assert!(!hooked(py));

        let locals = PyDict::new(py);
        locals.set_item("obj", obj).unwrap();
        py.run("obj.value = 3", None, Some(locals)).unwrap();
        assert!(f.recorder.take().is_empty());
    });
}

#[test]
fn test_types_that_refuse_the_patch_detach_quietly() {
    // Builtin container types reject the __setattr__ patch. Wrapping one
    // still works; the type is left untouched, and dropping the last
    // wrapper detaches a type that was never hooked without complaint.
    let f = fixture();
    Python::with_gil(|py| {
        let value = py.eval("[1, 2, 3]", None, None).unwrap();
        let variant = f
            .ctx
            .to_variant(py, value, &ObjectHandle::null(), "data")
            .unwrap();
        assert!(variant.as_collection().is_some());

        let hooked = |py: Python<'_>| -> bool {
            py.eval("'__setattr__' in list.__dict__", None, None)
                .unwrap()
                .extract()
                .unwrap()
        };
        assert!(!hooked(py));
        drop(variant);
        assert!(!hooked(py));
        assert!(f.recorder.take().is_empty());
    });
}

#[test]
fn test_shutdown_removes_hooks() {
    let f = fixture();
    Python::with_gil(|py| {
        let module = load(
            py,
            "hooks_shutdown",
            "class E:\n    def __init__(self):\n        self.value = 0\nobj = E()\n",
        );
        let obj = module.getattr("obj").unwrap();
        let handle = f.ctx.wrap(py, obj).unwrap();

        f.ctx.shutdown();

        // The wrapper still works for reads and writes.
        let instance = handle.downcast_ref::<ScriptInstance>().unwrap();
        let value = instance.definition().lookup("value").unwrap();
        assert!(value.set(&handle, &Variant::Int(5)));
        assert_eq!(value.get(&handle), Variant::Int(5));

        // But script assignments no longer notify.
        let locals = PyDict::new(py);
        locals.set_item("obj", obj).unwrap();
        py.run("obj.value = 6", None, Some(locals)).unwrap();
        assert!(f.recorder.take().is_empty());
    });
}
