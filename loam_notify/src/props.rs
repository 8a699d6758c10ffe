// Copyright 2025 the Loam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event property storage.
//!
//! [`PropSet`] is the string-keyed payload bundle every event clone carries;
//! [`PropValue`] is the type-erased clonable value stored under each key.
//! Key-only notifications store the flag value `true`.

use alloc::boxed::Box;
use core::any::{Any, TypeId};
use core::fmt;

use hashbrown::HashMap;

/// A type-erased event property value.
///
/// Wraps a value of any `'static + Clone` type on the heap together with its
/// type information for later downcasting.
///
/// # Example
///
/// ```rust
/// use loam_notify::PropValue;
///
/// let value = PropValue::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&42));
/// assert_eq!(value.downcast_ref::<f64>(), None);
/// ```
pub struct PropValue {
    inner: Box<dyn ErasedProp>,
    type_id: TypeId,
}

impl PropValue {
    /// Creates an erased value from a concrete value.
    #[must_use]
    pub fn new<T: Clone + 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            inner: Box::new(value),
        }
    }

    /// Returns the [`TypeId`] of the contained value.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns `true` if the contained value is of type `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Attempts to downcast to a reference of type `T`.
    ///
    /// Returns `None` if the contained value is not of type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if self.is::<T>() {
            self.inner.as_any().downcast_ref()
        } else {
            None
        }
    }
}

impl Clone for PropValue {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_boxed(),
            type_id: self.type_id,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropValue")
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

/// Trait object for type-erased values that can be cloned.
trait ErasedProp: Any {
    fn as_any(&self) -> &dyn Any;
    fn clone_boxed(&self) -> Box<dyn ErasedProp>;
}

impl<T: Clone + 'static> ErasedProp for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn ErasedProp> {
        Box::new(self.clone())
    }
}

/// A string-keyed bundle of event properties.
///
/// Keys are `&'static str`: an event vocabulary is a fixed set of names known
/// at compile time, so there is no reason to allocate for them. Values are
/// [`PropValue`]s; a key-only marker is stored as the flag value `true`, so
/// key presence and flag presence are the same question.
///
/// # Example
///
/// ```rust
/// use loam_notify::PropSet;
///
/// let props = PropSet::new()
///     .with("path", "wiki/Welcome")
///     .with("revision", 3_u64);
///
/// assert!(props.has_key("path"));
/// assert_eq!(props.get_as::<u64>("revision"), Some(&3));
/// assert!(props.has_any_key(["revision", "deleted"]));
/// assert!(!props.has_key("deleted"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct PropSet {
    entries: HashMap<&'static str, PropValue>,
}

impl PropSet {
    /// Creates an empty property bundle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Inserts a value under `key`, consuming and returning `self`.
    ///
    /// This is the chaining form of [`insert`](Self::insert), convenient for
    /// building a bundle in one expression.
    #[must_use]
    pub fn with<T: Clone + 'static>(mut self, key: &'static str, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a value under `key`, returning the displaced value if the key
    /// was already present.
    pub fn insert<T: Clone + 'static>(&mut self, key: &'static str, value: T) -> Option<PropValue> {
        self.entries.insert(key, PropValue::new(value))
    }

    /// Inserts an already-erased value under `key`.
    pub fn insert_value(&mut self, key: &'static str, value: PropValue) -> Option<PropValue> {
        self.entries.insert(key, value)
    }

    /// Marks `key` as present by storing the flag value `true`.
    pub fn set_flag(&mut self, key: &'static str) {
        self.entries.insert(key, PropValue::new(true));
    }

    /// Returns the erased value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    /// Returns the value stored under `key`, downcast to `T`.
    ///
    /// Returns `None` if the key is absent or the stored value is not a `T`.
    #[must_use]
    pub fn get_as<T: 'static>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(PropValue::downcast_ref)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    #[inline]
    pub fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns `true` if any of `keys` is present.
    #[must_use]
    pub fn has_any_key<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> bool {
        keys.into_iter().any(|key| self.has_key(key))
    }

    /// Moves every entry of `other` into `self`, overwriting duplicates.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the bundle holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Iterates over `(key, value)` pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PropValue)> + '_ {
        self.entries.iter().map(|(key, value)| (*key, value))
    }
}
