// Copyright 2025 the Loam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The listener roster.
//!
//! [`ListenerRegistry`] keeps the ordered list of listener handles behind a
//! source. Handles are weak by default, so subscribing never extends a
//! listener's lifetime; strong handles are available for observers nothing
//! else keeps alive. Removal is deferred while a traversal is in flight and
//! settled once the roster is idle again.

use alloc::rc::{Rc, Weak};

use core::fmt;

use smallvec::SmallVec;

use crate::listener::Listener;

/// Inline capacity for roster entries.
///
/// Most sources have a handful of listeners, so this keeps subscription and
/// dispatch free of heap allocation in the common case.
const INLINE_ENTRIES: usize = 4;

/// One roster slot.
///
/// `Cleared` is the tombstone left behind when a listener is unsubscribed
/// while a traversal is active; it keeps later indices stable until the
/// deferred prune runs.
enum ListenerEntry<S> {
    Strong(Rc<dyn Listener<S>>),
    Weak(Weak<dyn Listener<S>>),
    Cleared,
}

/// An ordered roster of listener handles with deferred pruning.
///
/// Entries are appended in subscription order and never reorder; dispatch
/// walks them by index. While one or more traversals are active, entries are
/// only ever cleared in place, never removed, so concurrent (re-entrant)
/// walks keep seeing a stable sequence. Dead weak handles and cleared slots
/// are dropped by [`prune_dead`](Self::prune_dead), which runs automatically
/// when the last traversal ends with pruning flagged.
///
/// Listener identity is the `Rc` allocation address, so the same listener
/// can be unsubscribed through any clone of its `Rc`.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use loam_notify::{Event, Listener, ListenerError, ListenerRegistry};
///
/// struct Probe;
/// impl Listener<u32> for Probe {
///     fn notify(&self, _event: &Event<u32>) -> Result<(), ListenerError> {
///         Ok(())
///     }
/// }
///
/// let mut roster = ListenerRegistry::<u32>::new();
/// let probe = Rc::new(Probe);
///
/// roster.subscribe(probe.clone());
/// assert!(roster.contains(&*probe));
///
/// // Weak by default: dropping the listener empties the roster on prune.
/// drop(probe);
/// roster.prune_dead();
/// assert!(roster.is_empty());
/// ```
pub struct ListenerRegistry<S> {
    entries: SmallVec<[ListenerEntry<S>; INLINE_ENTRIES]>,
    /// Number of traversals currently walking the roster.
    active_traversals: usize,
    /// Set when a dead or cleared entry was seen while the roster was busy.
    needs_prune: bool,
}

impl<S> ListenerRegistry<S> {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: SmallVec::new(),
            active_traversals: 0,
            needs_prune: false,
        }
    }

    /// Appends a weak handle to `listener`.
    ///
    /// The roster does not keep the listener alive: once the last `Rc` clone
    /// outside the roster is dropped, the entry goes dead and is skipped by
    /// dispatch until the next prune removes it.
    ///
    /// Subscribing the same listener twice is not prevented; it will be
    /// notified once per entry.
    pub fn subscribe(&mut self, listener: Rc<dyn Listener<S>>) {
        self.entries.push(ListenerEntry::Weak(Rc::downgrade(&listener)));
    }

    /// Appends an owning handle to `listener`.
    ///
    /// The roster keeps the listener alive until it is unsubscribed or the
    /// roster itself is dropped.
    pub fn subscribe_strong(&mut self, listener: Rc<dyn Listener<S>>) {
        self.entries.push(ListenerEntry::Strong(listener));
    }

    /// Removes the first entry whose listener is identical to `listener`.
    ///
    /// Identity means the same `Rc` allocation, for both weak and strong
    /// handles. While a traversal is active the entry is cleared in place and
    /// physically removed by the deferred prune; otherwise it is removed
    /// immediately. Returns `false` without complaint if the listener is not
    /// subscribed.
    pub fn unsubscribe(&mut self, listener: &dyn Listener<S>) -> bool {
        let target = listener_addr(listener);
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry_addr(entry) == Some(target))
        else {
            return false;
        };

        if self.active_traversals > 0 {
            self.entries[index] = ListenerEntry::Cleared;
            self.needs_prune = true;
        } else {
            self.entries.remove(index);
        }
        true
    }

    /// Returns `true` if `listener` is currently subscribed.
    ///
    /// Cleared and dead entries do not count.
    #[must_use]
    pub fn contains(&self, listener: &dyn Listener<S>) -> bool {
        let target = listener_addr(listener);
        self.entries
            .iter()
            .any(|entry| entry_addr(entry) == Some(target))
    }

    /// Marks the start of one traversal of the roster.
    ///
    /// Traversals nest; each `begin_traversal` must be balanced by one
    /// [`end_traversal`](Self::end_traversal). While the count is non-zero
    /// the entry sequence is stable.
    pub fn begin_traversal(&mut self) {
        self.active_traversals += 1;
    }

    /// Marks the end of one traversal.
    ///
    /// When the last active traversal ends and pruning was flagged, dead and
    /// cleared entries are dropped. An unbalanced call with no active
    /// traversal is tolerated and does nothing.
    pub fn end_traversal(&mut self) {
        if self.active_traversals == 0 {
            return;
        }
        self.active_traversals -= 1;
        if self.active_traversals == 0 && self.needs_prune {
            self.prune_now();
        }
    }

    /// Resolves the entry at `index` to a live listener.
    ///
    /// Returns `None` for an out-of-range index, a cleared slot, or a weak
    /// handle whose listener has been dropped; the latter two flag the roster
    /// for pruning without disturbing the sequence.
    pub fn resolve(&mut self, index: usize) -> Option<Rc<dyn Listener<S>>> {
        match self.entries.get(index)? {
            ListenerEntry::Strong(listener) => Some(listener.clone()),
            ListenerEntry::Weak(weak) => match weak.upgrade() {
                Some(listener) => Some(listener),
                None => {
                    self.needs_prune = true;
                    None
                }
            },
            ListenerEntry::Cleared => {
                self.needs_prune = true;
                None
            }
        }
    }

    /// Drops dead weak handles and cleared slots.
    ///
    /// Physical removal is only safe while no traversal is active; when
    /// called mid-traversal this just flags the roster so the prune runs as
    /// soon as the last traversal ends.
    pub fn prune_dead(&mut self) {
        if self.active_traversals > 0 {
            self.needs_prune = true;
            return;
        }
        self.prune_now();
    }

    /// Returns the raw roster length.
    ///
    /// Dead weak handles and cleared slots still count until pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the roster holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune_now(&mut self) {
        self.entries.retain(|entry| match entry {
            ListenerEntry::Strong(_) => true,
            ListenerEntry::Weak(weak) => weak.strong_count() > 0,
            ListenerEntry::Cleared => false,
        });
        self.needs_prune = false;
    }
}

impl<S> Default for ListenerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for ListenerRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.entries.len())
            .field("active_traversals", &self.active_traversals)
            .field("needs_prune", &self.needs_prune)
            .finish_non_exhaustive()
    }
}

/// Address of the listener value itself, with the vtable half stripped.
///
/// Comparing full `*const dyn Listener` pointers would also compare vtable
/// pointers, which are not unique across codegen units; the data half alone
/// identifies the `Rc` allocation.
fn listener_addr<S>(listener: &dyn Listener<S>) -> *const () {
    core::ptr::from_ref(listener).cast()
}

/// Address a roster entry currently resolves to, if it is live.
fn entry_addr<S>(entry: &ListenerEntry<S>) -> Option<*const ()> {
    match entry {
        ListenerEntry::Strong(listener) => Some(Rc::as_ptr(listener).cast()),
        ListenerEntry::Weak(weak) => (weak.strong_count() > 0).then(|| weak.as_ptr().cast()),
        ListenerEntry::Cleared => None,
    }
}
