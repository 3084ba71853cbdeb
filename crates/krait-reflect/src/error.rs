//! Reflection error types

/// Errors produced by the reflection layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReflectError {
    /// A property lookup by name found nothing on the definition.
    #[error("No property named '{0}' on definition '{1}'")]
    NoSuchProperty(String, String),

    /// An operation required a live object behind a handle.
    #[error("Object handle is no longer valid")]
    InvalidHandle,

    /// No definition could be resolved for a handle.
    #[error("No definition registered for object")]
    NoDefinition,
}
