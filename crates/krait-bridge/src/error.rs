//! Bridge error types

/// Errors produced by the Python bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// An operation inside the interpreter raised.
    #[error("Python error: {0}")]
    Python(#[from] pyo3::PyErr),

    /// No converter in the chain accepted a value.
    #[error("No converter accepted value: {0}")]
    Conversion(String),

    /// A required host service was not registered before bridge startup.
    #[error("Required service not registered: {0}")]
    MissingService(&'static str),

    /// A parent handle did not wrap a bridged Python instance.
    #[error("Parent handle does not wrap a bridged instance")]
    InvalidParent,
}

/// Bridge result alias.
pub type BridgeResult<T> = Result<T, BridgeError>;
