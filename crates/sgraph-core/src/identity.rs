#![forbid(unsafe_code)]

//! Identity handles for external objects.
//!
//! Content objects and visual handles are opaque to the scene. The viewer
//! only needs to compare them, so both are wrapped in an [`Identity`] whose
//! equality and hash are the address of the shared allocation. Two handles
//! are equal iff they were cloned from the same [`Identity::new`] call,
//! regardless of the wrapped value.

use std::any::{Any, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;

/// Marker for content-object handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {}

/// Marker for visual handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualKind {}

/// Handle to a model object bound to a content part.
pub type ContentRef = Identity<ContentKind>;

/// Handle to the toolkit visual controlled by a part.
pub type VisualRef = Identity<VisualKind>;

struct Slot {
    type_name: &'static str,
    value: Box<dyn Any>,
}

/// Reference-counted identity handle.
pub struct Identity<K> {
    slot: Rc<Slot>,
    _kind: PhantomData<K>,
}

impl<K> Identity<K> {
    /// Wrap a value in a fresh identity.
    #[must_use]
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            slot: Rc::new(Slot {
                type_name: type_name::<T>(),
                value: Box::new(value),
            }),
            _kind: PhantomData,
        }
    }

    /// Borrow the wrapped value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.slot.value.downcast_ref::<T>()
    }

    /// Type name of the wrapped value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.slot.type_name
    }

    /// Stable address used for identity comparisons.
    #[must_use]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.slot) as *const () as usize
    }

    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

// Manual impls: `K` is a marker and never needs to satisfy these bounds.
impl<K> Clone for Identity<K> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
            _kind: PhantomData,
        }
    }
}

impl<K> PartialEq for Identity<K> {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl<K> Eq for Identity<K> {}

impl<K> Hash for Identity<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<K> fmt::Debug for Identity<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.slot.type_name, self.addr())
    }
}
