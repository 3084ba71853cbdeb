//! Krait Python bridge
//!
//! Exposes live objects of an embedded Python interpreter through the
//! reflection contracts in `krait-reflect`. Host code wraps a Python object
//! into an [`ObjectHandle`](krait_reflect::ObjectHandle) and from then on
//! reads, writes, calls and iterates it through generic host values, never
//! touching the interpreter directly.
//!
//! The bridge guarantees:
//!
//! - **Identity-stable wrapping** — wrapping the same Python object twice
//!   yields the same handle and the same definition while either is alive.
//! - **Live views** — collection facades and properties read through to the
//!   interpreter at access time; nothing is copied or snapshotted.
//! - **Symmetric mutation events** — writes from the host and assignments
//!   made by Python code both fire the host's property listeners exactly
//!   once, with the wrapper's full path from its root object.
//!
//! Entry point is [`BridgeContext`], constructed over the host's
//! [`Services`](krait_reflect::Services).
//!
//! All Python access happens under the GIL via `pyo3`; bridge types are
//! `Send + Sync` and may be used from any thread.

#![warn(missing_docs)]

pub mod context;
pub mod convert;
pub mod definition;
pub mod error;
pub mod hooks;
pub mod instance;
pub mod property;
pub mod registry;

pub use context::BridgeContext;
pub use convert::{BasicConverter, ConverterQueue, ParentedConverter};
pub use definition::{ScriptDefinitionDetails, ScriptDefinitionHelper};
pub use error::{BridgeError, BridgeResult};
pub use instance::ScriptInstance;
pub use property::ScriptProperty;
pub use registry::DefinitionRegistry;
