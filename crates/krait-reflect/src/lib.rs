//! Krait reflection contracts
//!
//! This crate provides the host-side reflection model that language bridges
//! plug into: a generic tagged value ([`Variant`]), a uniform collection
//! protocol ([`Collection`]), identity-bearing object handles
//! ([`ObjectHandle`]), class definitions with named properties
//! ([`Definition`]), property accessors that fire mutation listeners
//! ([`PropertyAccessor`]) and a service locator ([`Services`]).
//!
//! It knows nothing about any concrete scripting language. Bridges such as
//! `krait-bridge` implement the traits defined here over their foreign object
//! model.

#![warn(missing_docs)]

pub mod accessor;
pub mod collection;
pub mod definition;
pub mod error;
pub mod object;
pub mod services;
pub mod variant;

pub use accessor::{PropertyAccessor, PropertyAccessorListener};
pub use collection::{Collection, CollectionImpl, CollectionIter, CollectionIterImpl, GetPolicy};
pub use definition::{
    Definition, DefinitionDetails, DefinitionHelper, DefinitionManager, Property, DOT_OPERATOR,
    INDEX_OPEN,
};
pub use error::ReflectError;
pub use object::{ObjectHandle, ObjectId, ObjectManager, ReflectedObject, WeakObjectHandle};
pub use services::Services;
pub use variant::{TypeTag, Variant};
