//! Variant — the generic value exchanged across reflection boundaries
//!
//! A `Variant` is a tagged union of the primitive shapes the host
//! understands plus two reference shapes: a wrapped object handle and a
//! collection facade. Primitives compare structurally; reference shapes
//! compare by identity of the thing they point at.

use crate::collection::Collection;
use crate::object::ObjectHandle;

// ============================================================================
// Type Tag
// ============================================================================

/// Discriminant of a [`Variant`] without its payload.
///
/// Properties report the tag of their last observed value so host UIs can
/// pick an editor before reading the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeTag {
    /// No value.
    #[default]
    Void,
    /// Boolean.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// Double-precision float.
    Double,
    /// Unicode text.
    String,
    /// Raw byte string.
    Bytes,
    /// Wrapped foreign object.
    Object,
    /// Collection facade over a foreign container.
    Collection,
}

// ============================================================================
// Variant
// ============================================================================

/// Generic host value.
#[derive(Debug, Clone, Default)]
pub enum Variant {
    /// Absence of a value (foreign `None`, failed reads).
    #[default]
    Void,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Double(f64),
    /// Unicode text.
    String(String),
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// Handle to a wrapped foreign object.
    Object(ObjectHandle),
    /// Facade over a foreign container.
    Collection(Collection),
}

impl Variant {
    /// The tag of this value.
    pub fn tag(&self) -> TypeTag {
        match self {
            Variant::Void => TypeTag::Void,
            Variant::Bool(_) => TypeTag::Bool,
            Variant::Int(_) => TypeTag::Int,
            Variant::Double(_) => TypeTag::Double,
            Variant::String(_) => TypeTag::String,
            Variant::Bytes(_) => TypeTag::Bytes,
            Variant::Object(_) => TypeTag::Object,
            Variant::Collection(_) => TypeTag::Collection,
        }
    }

    /// True if this holds no value.
    pub fn is_void(&self) -> bool {
        matches!(self, Variant::Void)
    }

    /// Get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64. Integers widen losslessly enough for display purposes.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Variant::Double(d) => Some(*d),
            Variant::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Variant::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get as object handle.
    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Variant::Object(h) => Some(h),
            _ => None,
        }
    }

    /// Get as collection facade.
    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Variant::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Interpret this value as a sequence index.
    ///
    /// Only integers qualify; anything else is not a positional key.
    pub fn index(&self) -> Option<i64> {
        self.as_int()
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Variant::Void, Variant::Void) => true,
            (Variant::Bool(a), Variant::Bool(b)) => a == b,
            (Variant::Int(a), Variant::Int(b)) => a == b,
            (Variant::Double(a), Variant::Double(b)) => a == b,
            (Variant::String(a), Variant::String(b)) => a == b,
            (Variant::Bytes(a), Variant::Bytes(b)) => a == b,
            // Reference shapes compare by identity, not content.
            (Variant::Object(a), Variant::Object(b)) => a == b,
            (Variant::Collection(a), Variant::Collection(b)) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Bool(b)
    }
}

impl From<i64> for Variant {
    fn from(i: i64) -> Self {
        Variant::Int(i)
    }
}

impl From<f64> for Variant {
    fn from(d: f64) -> Self {
        Variant::Double(d)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(s.to_string())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::String(s)
    }
}

impl From<Vec<u8>> for Variant {
    fn from(b: Vec<u8>) -> Self {
        Variant::Bytes(b)
    }
}

impl From<ObjectHandle> for Variant {
    fn from(h: ObjectHandle) -> Self {
        Variant::Object(h)
    }
}

impl From<Collection> for Variant {
    fn from(c: Collection) -> Self {
        Variant::Collection(c)
    }
}

// ============================================================================
// Tests
// ============================================================================
