//! Collection facade over foreign containers
//!
//! A [`Collection`] adapts some foreign container (a script list, tuple or
//! mapping, or a host-native container) to one uniform keyed protocol.
//! Iteration is positional: a [`CollectionIter`] tracks a logical position
//! in the container and yields key/value pairs through the adapter.
//!
//! Adapters never copy container contents. Every read and write goes back
//! to the underlying container at call time, so a facade observes external
//! mutation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::variant::Variant;

// ============================================================================
// Get Policy
// ============================================================================

/// Lookup behavior for [`Collection::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetPolicy {
    /// Find an existing entry only; never modify the container.
    Existing,
    /// Insert a new entry for the key, default-initialized.
    New,
    /// Find if present, insert otherwise.
    Auto,
}

// ============================================================================
// Iterator Protocol
// ============================================================================

/// Adapter-side implementation of a collection iterator.
pub trait CollectionIterImpl: Send + Sync {
    /// Key at the current position.
    fn key(&self) -> Variant;

    /// Value at the current position.
    ///
    /// Past-the-end reads report an error and yield [`Variant::Void`].
    fn value(&self) -> Variant;

    /// Write through to the current position. False on failure.
    fn set_value(&self, value: &Variant) -> bool;

    /// Step forward one position.
    fn advance(&mut self);

    /// Logical position within the container.
    fn position(&self) -> usize;

    /// Identity of the underlying container, for iterator comparison.
    fn container_id(&self) -> usize;

    /// Clone behind the trait object.
    fn clone_impl(&self) -> Box<dyn CollectionIterImpl>;
}

/// Positional iterator over a [`Collection`].
///
/// Two iterators compare equal when they point into the same underlying
/// container at the same logical position.
pub struct CollectionIter {
    imp: Box<dyn CollectionIterImpl>,
}

impl CollectionIter {
    /// Wrap an adapter iterator.
    pub fn new(imp: Box<dyn CollectionIterImpl>) -> Self {
        Self { imp }
    }

    /// Key at the current position.
    pub fn key(&self) -> Variant {
        self.imp.key()
    }

    /// Value at the current position.
    pub fn value(&self) -> Variant {
        self.imp.value()
    }

    /// Write through to the current position.
    pub fn set_value(&self, value: &Variant) -> bool {
        self.imp.set_value(value)
    }

    /// Step forward one position.
    pub fn advance(&mut self) {
        self.imp.advance();
    }

    /// Logical position within the container.
    pub fn position(&self) -> usize {
        self.imp.position()
    }

    /// Identity of the underlying container.
    pub fn container_id(&self) -> usize {
        self.imp.container_id()
    }
}

impl Clone for CollectionIter {
    fn clone(&self) -> Self {
        Self {
            imp: self.imp.clone_impl(),
        }
    }
}

impl PartialEq for CollectionIter {
    fn eq(&self, other: &Self) -> bool {
        self.container_id() == other.container_id() && self.position() == other.position()
    }
}

impl Eq for CollectionIter {}

impl fmt::Debug for CollectionIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CollectionIter(container={:#x}, position={})",
            self.container_id(),
            self.position()
        )
    }
}

// ============================================================================
// Collection Protocol
// ============================================================================

/// Adapter-side implementation of a collection.
pub trait CollectionImpl: Send + Sync {
    /// Number of entries.
    fn size(&self) -> usize;

    /// Iterator at the first entry.
    fn begin(&self) -> CollectionIter;

    /// Iterator one past the last entry.
    fn end(&self) -> CollectionIter;

    /// Look up a key under a [`GetPolicy`].
    ///
    /// Returns the resulting iterator and whether an entry was inserted.
    /// Failed lookups return the end iterator and false.
    fn get(&self, key: &Variant, policy: GetPolicy) -> (CollectionIter, bool);

    /// Insert a value under a key; end iterator on failure.
    fn insert(&self, key: &Variant, value: &Variant) -> CollectionIter;

    /// Erase the entry at an iterator position.
    ///
    /// Returns an iterator at the entry that followed the erased one.
    fn erase_at(&self, pos: &CollectionIter) -> CollectionIter;

    /// Erase by key. Returns the number of entries removed.
    fn erase_key(&self, key: &Variant) -> usize;

    /// Erase the half-open range `[first, last)`.
    ///
    /// Returns an iterator at the entry that followed the erased range.
    fn erase_range(&self, first: &CollectionIter, last: &CollectionIter) -> CollectionIter;

    /// True if entries can be added and removed.
    fn can_resize(&self) -> bool;

    /// True for keyed mappings, false for positional sequences.
    fn is_mapping(&self) -> bool;

    /// Identity of the underlying container.
    fn container_id(&self) -> usize;

    /// Downcast support for adapter-aware code.
    fn as_any(&self) -> &dyn Any;
}

/// Shared facade over a foreign container.
///
/// Cheap to clone; clones share the same adapter and compare equal.
#[derive(Clone)]
pub struct Collection {
    imp: Arc<dyn CollectionImpl>,
}

impl Collection {
    /// Wrap an adapter.
    pub fn new(imp: Arc<dyn CollectionImpl>) -> Self {
        Self { imp }
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.imp.size()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Iterator at the first entry.
    pub fn begin(&self) -> CollectionIter {
        self.imp.begin()
    }

    /// Iterator one past the last entry.
    pub fn end(&self) -> CollectionIter {
        self.imp.end()
    }

    /// Look up a key under a [`GetPolicy`].
    pub fn get(&self, key: &Variant, policy: GetPolicy) -> (CollectionIter, bool) {
        self.imp.get(key, policy)
    }

    /// Insert a value under a key; end iterator on failure.
    pub fn insert(&self, key: &Variant, value: &Variant) -> CollectionIter {
        self.imp.insert(key, value)
    }

    /// Erase the entry at an iterator position.
    pub fn erase_at(&self, pos: &CollectionIter) -> CollectionIter {
        self.imp.erase_at(pos)
    }

    /// Erase by key. Returns the number of entries removed.
    pub fn erase_key(&self, key: &Variant) -> usize {
        self.imp.erase_key(key)
    }

    /// Erase the half-open range `[first, last)`.
    pub fn erase_range(&self, first: &CollectionIter, last: &CollectionIter) -> CollectionIter {
        self.imp.erase_range(first, last)
    }

    /// True if entries can be added and removed.
    pub fn can_resize(&self) -> bool {
        self.imp.can_resize()
    }

    /// True for keyed mappings, false for positional sequences.
    pub fn is_mapping(&self) -> bool {
        self.imp.is_mapping()
    }

    /// Borrow the adapter as a concrete type.
    pub fn downcast_impl<T: CollectionImpl + 'static>(&self) -> Option<&T> {
        self.imp.as_any().downcast_ref::<T>()
    }

    /// Iterate key/value pairs from the current container state.
    pub fn iter(&self) -> CollectionPairs {
        CollectionPairs {
            current: self.begin(),
            end: self.end(),
        }
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        // Facades are equal when they adapt the same underlying container.
        self.imp.container_id() == other.imp.container_id()
    }
}

impl Eq for Collection {}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Collection(container={:#x}, size={})",
            self.imp.container_id(),
            self.size()
        )
    }
}

/// Rust iterator over a collection's key/value pairs.
pub struct CollectionPairs {
    current: CollectionIter,
    end: CollectionIter,
}

impl Iterator for CollectionPairs {
    type Item = (Variant, Variant);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == self.end {
            return None;
        }
        let pair = (self.current.key(), self.current.value());
        self.current.advance();
        Some(pair)
    }
}

// ============================================================================
// Tests
// ============================================================================
