//! Integration tests for the value converter chain
//!
//! Tests cover:
//! - Primitive round trips (None, bool, int, float, str, bytes)
//! - Exact-type matching (subclasses of builtins wrap as objects)
//! - Integer overflow falling through to the object wrapper
//! - Host-to-Python conversion of every variant shape

use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::types::{PyBool, PyBytes, PyFloat, PyLong, PyString};

use krait_bridge::BridgeContext;
use krait_reflect::{DefinitionManager, ObjectHandle, ObjectManager, TypeTag, Variant};

fn bridge() -> Arc<BridgeContext> {
    BridgeContext::new(
        Arc::new(DefinitionManager::new()),
        Arc::new(ObjectManager::new()),
    )
}

fn eval_variant(ctx: &Arc<BridgeContext>, expression: &str) -> Variant {
    Python::with_gil(|py| {
        let value = py.eval(expression, None, None).unwrap();
        ctx.to_variant(py, value, &ObjectHandle::null(), "value")
            .unwrap()
    })
}

#[test]
fn test_none_round_trip() {
    let ctx = bridge();
    assert_eq!(eval_variant(&ctx, "None"), Variant::Void);

    Python::with_gil(|py| {
        let script = ctx.to_script(py, &Variant::Void).unwrap();
        assert!(script.as_ref(py).is_none());
    });
}

#[test]
fn test_bool_round_trip() {
    let ctx = bridge();
    assert_eq!(eval_variant(&ctx, "True"), Variant::Bool(true));
    assert_eq!(eval_variant(&ctx, "False"), Variant::Bool(false));

    Python::with_gil(|py| {
        let script = ctx.to_script(py, &Variant::Bool(true)).unwrap();
        // Exactly bool, not an int that happens to be 1.
        assert!(script.as_ref(py).get_type().is(py.get_type::<PyBool>()));
        assert!(script.as_ref(py).extract::<bool>().unwrap());
    });
}

#[test]
fn test_int_round_trip() {
    let ctx = bridge();
    assert_eq!(eval_variant(&ctx, "0"), Variant::Int(0));
    assert_eq!(eval_variant(&ctx, "-17"), Variant::Int(-17));
    assert_eq!(
        eval_variant(&ctx, "9223372036854775807"),
        Variant::Int(i64::MAX)
    );
    assert_eq!(
        eval_variant(&ctx, "-9223372036854775808"),
        Variant::Int(i64::MIN)
    );

    Python::with_gil(|py| {
        let script = ctx.to_script(py, &Variant::Int(42)).unwrap();
        assert!(script.as_ref(py).get_type().is(py.get_type::<PyLong>()));
        assert_eq!(script.as_ref(py).extract::<i64>().unwrap(), 42);
    });
}

#[test]
fn test_oversized_int_wraps_as_object() {
    // Python integers are unbounded; one that does not fit i64 must wrap
    // as a generic object instead of truncating.
    let ctx = bridge();
    let variant = eval_variant(&ctx, "1 << 100");
    assert_eq!(variant.tag(), TypeTag::Object);
}

#[test]
fn test_float_round_trip() {
    let ctx = bridge();
    assert_eq!(eval_variant(&ctx, "1.5"), Variant::Double(1.5));
    assert_eq!(eval_variant(&ctx, "-0.25"), Variant::Double(-0.25));

    Python::with_gil(|py| {
        let script = ctx.to_script(py, &Variant::Double(2.75)).unwrap();
        assert!(script.as_ref(py).get_type().is(py.get_type::<PyFloat>()));
        assert_eq!(script.as_ref(py).extract::<f64>().unwrap(), 2.75);
    });
}

#[test]
fn test_str_round_trip() {
    let ctx = bridge();
    assert_eq!(eval_variant(&ctx, "'hello'"), Variant::from("hello"));
    assert_eq!(eval_variant(&ctx, "'\\u03c0 = pi'"), Variant::from("π = pi"));
    assert_eq!(eval_variant(&ctx, "''"), Variant::from(""));

    Python::with_gil(|py| {
        let script = ctx.to_script(py, &Variant::from("κράτος")).unwrap();
        assert!(script.as_ref(py).get_type().is(py.get_type::<PyString>()));
        assert_eq!(script.as_ref(py).extract::<String>().unwrap(), "κράτος");
    });
}

#[test]
fn test_bytes_round_trip() {
    let ctx = bridge();
    assert_eq!(
        eval_variant(&ctx, "b'\\x00\\x01\\xff'"),
        Variant::Bytes(vec![0, 1, 255])
    );

    Python::with_gil(|py| {
        let script = ctx.to_script(py, &Variant::Bytes(vec![7, 8])).unwrap();
        assert!(script.as_ref(py).get_type().is(py.get_type::<PyBytes>()));
        let bytes: &PyBytes = script.as_ref(py).downcast().unwrap();
        assert_eq!(bytes.as_bytes(), &[7, 8]);
    });
}

#[test]
fn test_builtin_subclass_wraps_as_object() {
    // A subclass can carry behavior of its own; flattening it to the base
    // primitive would lose that.
    let ctx = bridge();
    Python::with_gil(|py| {
        let module = PyModule::from_code(
            py,
            "class Flagged(int):\n    note = 'special'\nvalue = Flagged(5)\n",
            "convert_fixture.py",
            "convert_fixture",
        )
        .unwrap();
        let value = module.getattr("value").unwrap();
        let variant = ctx
            .to_variant(py, value, &ObjectHandle::null(), "value")
            .unwrap();
        assert_eq!(variant.tag(), TypeTag::Object);
    });
}

#[test]
fn test_object_converts_back_to_same_object() {
    let ctx = bridge();
    Python::with_gil(|py| {
        let module = PyModule::from_code(
            py,
            "class Thing:\n    pass\nthing = Thing()\n",
            "convert_identity.py",
            "convert_identity",
        )
        .unwrap();
        let thing = module.getattr("thing").unwrap();
        let variant = ctx
            .to_variant(py, thing, &ObjectHandle::null(), "thing")
            .unwrap();
        assert_eq!(variant.tag(), TypeTag::Object);

        let script = ctx.to_script(py, &variant).unwrap();
        assert!(script.as_ref(py).is(thing));
    });
}
