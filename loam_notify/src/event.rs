// Copyright 2025 the Loam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Events, clone semantics, and the dispatch protocol.
//!
//! An original [`Event`] is the long-lived handle a source hands out: it owns
//! the shared listener roster and acts as a factory for clones. Every actual
//! notification travels as a clone, which carries its own property snapshot
//! and a provenance link to the event it was cloned from while sharing the
//! original's roster.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::listener::{Listener, ListenerError};
use crate::props::{PropSet, PropValue};
use crate::registry::ListenerRegistry;

/// Error returned when a clone-only operation is invoked on an original
/// event.
///
/// Originals are factories and roster handles; only clones carry payload and
/// can be dispatched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidStateError {
    operation: &'static str,
}

impl InvalidStateError {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self { operation }
    }

    /// The name of the rejected operation.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl fmt::Display for InvalidStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` requires an event clone; an original only manages the roster",
            self.operation
        )
    }
}

impl core::error::Error for InvalidStateError {}

/// Error returned by [`Event::dispatch`] and the `fire_*` helpers.
#[derive(Debug)]
pub enum DispatchError {
    /// The event was an original, not a clone.
    InvalidState(InvalidStateError),
    /// A listener failed; the remainder of the pass was abandoned.
    Listener(ListenerError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState(error) => error.fmt(f),
            Self::Listener(error) => write!(f, "listener failed during dispatch: {error}"),
        }
    }
}

impl core::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::InvalidState(error) => Some(error),
            Self::Listener(error) => Some(error.as_ref()),
        }
    }
}

impl From<InvalidStateError> for DispatchError {
    fn from(error: InvalidStateError) -> Self {
        Self::InvalidState(error)
    }
}

/// A notification travelling from a source to its listeners.
///
/// Events come in two roles with one type:
///
/// - An **original** is created once per [`EventSource`](crate::EventSource)
///   and lives as long as its owner. It holds the shared
///   [`ListenerRegistry`] and an empty property bundle; subscribing and
///   unsubscribing go through it. Payload mutation and dispatch are rejected
///   with [`InvalidStateError`].
/// - A **clone** is produced by [`create_clone`](Self::create_clone) (or the
///   `clone_with_*` helpers) for each notification. It shares the roster,
///   inherits the source identity, snapshots the properties of the event it
///   was cloned from, and records that event as its
///   [`parent`](Self::parent). Clones accept payload and can be dispatched,
///   re-entrantly if needed.
///
/// Two clones never share payload: mutating one is invisible to the other
/// and to the original.
///
/// # Example
///
/// ```rust
/// use loam_notify::EventSource;
///
/// let source = EventSource::new(3_u32);
///
/// let mut saved = source.event().create_clone();
/// saved.put("path", "wiki/Welcome").unwrap();
/// saved.add_keys(["saved"]).unwrap();
///
/// assert!(saved.is_clone());
/// assert_eq!(saved.source(), Some(3));
/// assert_eq!(saved.get_as::<&str>("path"), Some(&"wiki/Welcome"));
///
/// // The original never carries payload and refuses to dispatch itself.
/// assert!(source.event().props().is_empty());
/// assert!(source.event().dispatch(None).is_err());
/// ```
pub struct Event<S> {
    registry: Rc<RefCell<ListenerRegistry<S>>>,
    source: Option<S>,
    props: PropSet,
    /// Snapshot of the event this one was cloned from; `None` marks an
    /// original.
    parent: Option<Box<Event<S>>>,
    /// Index of the roster entry currently being notified, if any.
    active_listener: Cell<Option<usize>>,
}

impl<S: Copy> Event<S> {
    pub(crate) fn new(source: Option<S>) -> Self {
        Self {
            registry: Rc::new(RefCell::new(ListenerRegistry::new())),
            source,
            props: PropSet::new(),
            parent: None,
            active_listener: Cell::new(None),
        }
    }

    // ===== Role and provenance =====

    /// Returns `true` if this event is a clone rather than an original.
    #[must_use]
    #[inline]
    pub fn is_clone(&self) -> bool {
        self.parent.is_some()
    }

    /// The identity of the object this event speaks for.
    #[must_use]
    #[inline]
    pub fn source(&self) -> Option<S> {
        self.source
    }

    /// Overrides the source identity.
    ///
    /// Used by republishing layers that forward an event under their own
    /// name; the [`parent`](Self::parent) chain still leads back to the
    /// identity the event originally carried.
    pub fn set_source(&mut self, source: S) {
        self.source = Some(source);
    }

    /// The snapshot of the event this one was cloned from.
    ///
    /// `None` for originals. The snapshot was taken at clone time and is for
    /// provenance queries only; dispatching it again dispatches a stale view.
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.parent.as_deref()
    }

    /// While a dispatch is delivering to a listener, the index of that
    /// listener's roster entry.
    ///
    /// `None` outside dispatch. This is the hook a future per-listener
    /// opt-out would build on; nothing in the crate consumes it yet.
    #[must_use]
    pub fn active_listener_index(&self) -> Option<usize> {
        self.active_listener.get()
    }

    // ===== Cloning =====

    /// Produces a dispatchable clone of this event.
    ///
    /// The clone shares the roster, inherits the source identity, copies
    /// this event's properties (empty when cloning an original), and records
    /// a snapshot of this event as its parent.
    #[must_use]
    pub fn create_clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
            source: self.source,
            props: self.props.clone(),
            parent: Some(Box::new(self.clone())),
            active_listener: Cell::new(None),
        }
    }

    /// Clones this event and merges `props` into the clone's payload.
    #[must_use]
    pub fn clone_with_props(&self, props: PropSet) -> Self {
        let mut clone = self.create_clone();
        clone.props.merge(props);
        clone
    }

    /// Clones this event and sets each of `keys` as a flag on the clone.
    #[must_use]
    pub fn clone_with_keys(&self, keys: impl IntoIterator<Item = &'static str>) -> Self {
        let mut clone = self.create_clone();
        for key in keys {
            clone.props.set_flag(key);
        }
        clone
    }

    // ===== Payload (clones only) =====

    /// Stores `value` under `key`.
    ///
    /// Fails on an original. Returns `&mut Self` so puts chain with `?`.
    pub fn put<T: Clone + 'static>(
        &mut self,
        key: &'static str,
        value: T,
    ) -> Result<&mut Self, InvalidStateError> {
        if !self.is_clone() {
            return Err(InvalidStateError::new("put"));
        }
        self.props.insert(key, value);
        Ok(self)
    }

    /// Merges `props` into the payload. Fails on an original.
    pub fn add_props(&mut self, props: PropSet) -> Result<&mut Self, InvalidStateError> {
        if !self.is_clone() {
            return Err(InvalidStateError::new("add_props"));
        }
        self.props.merge(props);
        Ok(self)
    }

    /// Sets each of `keys` as a flag on the payload. Fails on an original.
    pub fn add_keys(
        &mut self,
        keys: impl IntoIterator<Item = &'static str>,
    ) -> Result<&mut Self, InvalidStateError> {
        if !self.is_clone() {
            return Err(InvalidStateError::new("add_keys"));
        }
        for key in keys {
            self.props.set_flag(key);
        }
        Ok(self)
    }

    // ===== Payload queries =====

    /// The property bundle carried by this event.
    #[must_use]
    #[inline]
    pub fn props(&self) -> &PropSet {
        &self.props
    }

    /// Returns the erased value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    /// Returns the value stored under `key`, downcast to `T`.
    #[must_use]
    pub fn get_as<T: 'static>(&self, key: &str) -> Option<&T> {
        self.props.get_as(key)
    }

    /// Returns `true` if `key` is present on this event.
    #[must_use]
    #[inline]
    pub fn has_key(&self, key: &str) -> bool {
        self.props.has_key(key)
    }

    /// Returns `true` if any of `keys` is present on this event.
    #[must_use]
    pub fn has_any_key<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> bool {
        self.props.has_any_key(keys)
    }

    // ===== Roster =====

    /// Appends a weak subscription for `listener` to the shared roster.
    pub fn subscribe(&self, listener: Rc<dyn Listener<S>>) {
        self.registry.borrow_mut().subscribe(listener);
    }

    /// Appends an owning subscription for `listener` to the shared roster.
    pub fn subscribe_strong(&self, listener: Rc<dyn Listener<S>>) {
        self.registry.borrow_mut().subscribe_strong(listener);
    }

    /// Removes `listener` from the shared roster; `false` if absent.
    pub fn unsubscribe(&self, listener: &dyn Listener<S>) -> bool {
        self.registry.borrow_mut().unsubscribe(listener)
    }

    /// Returns `true` if `listener` is subscribed on the shared roster.
    #[must_use]
    pub fn has_listener(&self, listener: &dyn Listener<S>) -> bool {
        self.registry.borrow().contains(listener)
    }

    /// A handle to the shared roster.
    #[must_use]
    pub fn registry(&self) -> Rc<RefCell<ListenerRegistry<S>>> {
        Rc::clone(&self.registry)
    }

    /// Replaces the roster this event dispatches to.
    ///
    /// This is how a republishing source delivers a forwarded clone to its
    /// own listeners instead of the upstream ones. It affects only this
    /// event, never the roster the clone was created with.
    pub fn set_registry(&mut self, registry: Rc<RefCell<ListenerRegistry<S>>>) {
        self.registry = registry;
    }

    // ===== Dispatch =====

    /// Delivers this event to `first` (if given) and then to every live
    /// roster entry, in subscription order.
    ///
    /// Only clones dispatch; an original fails with
    /// [`DispatchError::InvalidState`]. The priority listener runs before
    /// the roster walk and regardless of whether it is subscribed; if it is,
    /// it is notified again in roster position.
    ///
    /// The walk re-reads the roster length every step, so a listener
    /// subscribed mid-pass is still reached, and entries that die mid-pass
    /// are skipped. The first listener error abandons the remaining
    /// listeners for this event and is returned as
    /// [`DispatchError::Listener`]; the traversal guard is released either
    /// way, so deferred roster cleanup still runs.
    pub fn dispatch(&self, first: Option<&dyn Listener<S>>) -> Result<(), DispatchError> {
        if !self.is_clone() {
            return Err(DispatchError::InvalidState(InvalidStateError::new(
                "dispatch",
            )));
        }

        if let Some(first) = first {
            first.notify(self).map_err(DispatchError::Listener)?;
        }

        self.registry.borrow_mut().begin_traversal();
        let result = self.notify_roster();
        self.registry.borrow_mut().end_traversal();
        result
    }

    /// The guarded index walk. Never holds a roster borrow across a
    /// listener call, which is what makes re-entrant dispatch and
    /// mid-dispatch (un)subscription safe.
    fn notify_roster(&self) -> Result<(), DispatchError> {
        let mut index = 0;
        loop {
            let len = self.registry.borrow().len();
            if index >= len {
                return Ok(());
            }

            let listener = self.registry.borrow_mut().resolve(index);
            if let Some(listener) = listener {
                self.active_listener.set(Some(index));
                let outcome = listener.notify(self);
                self.active_listener.set(None);
                outcome.map_err(DispatchError::Listener)?;
            }
            index += 1;
        }
    }
}

impl<S: Copy> Clone for Event<S> {
    /// Structural snapshot: same role, source, payload, parent chain, and
    /// roster handle. For the notification protocol use
    /// [`create_clone`](Self::create_clone), which produces a child instead.
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
            source: self.source,
            props: self.props.clone(),
            parent: self.parent.clone(),
            active_listener: Cell::new(None),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Event<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("source", &self.source)
            .field("props", &self.props)
            .field("is_clone", &self.parent.is_some())
            .field("active_listener", &self.active_listener.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::rc::Rc;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    struct Tally {
        label: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Listener<u32> for Tally {
        fn notify(&self, _event: &Event<u32>) -> Result<(), ListenerError> {
            self.log.borrow_mut().push(self.label);
            Ok(())
        }
    }

    fn original() -> Event<u32> {
        Event::new(Some(1))
    }

    #[test]
    fn original_is_not_a_clone() {
        let event = original();
        assert!(!event.is_clone());
        assert!(event.parent().is_none());
        assert_eq!(event.source(), Some(1));
    }

    #[test]
    fn create_clone_links_parent_and_shares_roster() {
        let event = original();
        let clone = event.create_clone();

        assert!(clone.is_clone());
        assert_eq!(clone.source(), Some(1));
        assert!(Rc::ptr_eq(&event.registry(), &clone.registry()));

        let parent = clone.parent().unwrap();
        assert!(!parent.is_clone());
        assert_eq!(parent.source(), Some(1));
    }

    #[test]
    fn clone_of_clone_carries_payload_forward() {
        let event = original();
        let mut first = event.create_clone();
        first.put("path", "a").unwrap();

        let second = first.create_clone();
        assert_eq!(second.get_as::<&str>("path"), Some(&"a"));
        assert!(second.parent().unwrap().is_clone());
        assert!(second.parent().unwrap().parent().is_some());
    }

    #[test]
    fn payload_is_isolated_between_clones() {
        let event = original();
        let mut a = event.clone_with_keys(["left"]);
        let b = event.clone_with_keys(["right"]);

        a.put("only-a", 1_u8).unwrap();

        assert!(a.has_key("left"));
        assert!(!a.has_key("right"));
        assert!(b.has_key("right"));
        assert!(!b.has_key("only-a"));
        assert!(event.props().is_empty());
    }

    #[test]
    fn originals_reject_payload_and_dispatch() {
        let mut event = original();

        let error = event.put("k", 1_u8).unwrap_err();
        assert_eq!(error.operation(), "put");
        assert!(error.to_string().contains("requires an event clone"));

        assert!(event.add_keys(["k"]).is_err());
        assert!(event.add_props(PropSet::new()).is_err());

        match event.dispatch(None) {
            Err(DispatchError::InvalidState(error)) => {
                assert_eq!(error.operation(), "dispatch");
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn puts_chain() {
        let event = original();
        let mut clone = event.create_clone();
        clone
            .put("a", 1_u8)
            .unwrap()
            .put("b", 2_u8)
            .unwrap()
            .add_keys(["c"])
            .unwrap();
        assert_eq!(clone.props().len(), 3);
    }

    #[test]
    fn clone_with_props_merges() {
        let event = original();
        let clone = event.clone_with_props(PropSet::new().with("n", 5_i64));
        assert_eq!(clone.get_as::<i64>("n"), Some(&5));
    }

    #[test]
    fn dispatch_notifies_in_subscription_order() {
        let event = original();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::new(Tally {
            label: "a",
            log: log.clone(),
        });
        let b = Rc::new(Tally {
            label: "b",
            log: log.clone(),
        });
        event.subscribe(a.clone());
        event.subscribe(b.clone());

        event.create_clone().dispatch(None).unwrap();
        assert_eq!(*log.borrow(), ["a", "b"]);
    }

    #[test]
    fn priority_listener_runs_before_roster() {
        let event = original();
        let log = Rc::new(RefCell::new(Vec::new()));

        let roster = Rc::new(Tally {
            label: "roster",
            log: log.clone(),
        });
        event.subscribe(roster.clone());

        let first = Tally {
            label: "first",
            log: log.clone(),
        };
        event.create_clone().dispatch(Some(&first)).unwrap();
        assert_eq!(*log.borrow(), ["first", "roster"]);
    }

    #[test]
    fn subscribed_priority_listener_is_notified_twice() {
        let event = original();
        let log = Rc::new(RefCell::new(Vec::new()));

        let both = Rc::new(Tally {
            label: "x",
            log: log.clone(),
        });
        event.subscribe(both.clone());

        event.create_clone().dispatch(Some(&*both)).unwrap();
        assert_eq!(*log.borrow(), ["x", "x"]);
    }

    #[test]
    fn failed_priority_listener_skips_the_roster() {
        let event = original();
        let log = Rc::new(RefCell::new(Vec::new()));

        let roster = Rc::new(Tally {
            label: "roster",
            log: log.clone(),
        });
        event.subscribe(roster.clone());

        let failing = |_event: &Event<u32>| -> Result<(), ListenerError> {
            Err("priority failed".into())
        };
        let result = event.create_clone().dispatch(Some(&failing));

        assert!(matches!(result, Err(DispatchError::Listener(_))));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn dead_weak_listener_is_skipped_and_pruned() {
        let event = original();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::new(Tally {
            label: "a",
            log: log.clone(),
        });
        let b = Rc::new(Tally {
            label: "b",
            log: log.clone(),
        });
        event.subscribe(a.clone());
        event.subscribe(b.clone());
        drop(a);

        event.create_clone().dispatch(None).unwrap();
        assert_eq!(*log.borrow(), ["b"]);

        // The dead entry was pruned when the traversal ended.
        assert_eq!(event.registry().borrow().len(), 1);
    }

    #[test]
    fn active_listener_index_is_visible_during_notification() {
        let event = original();
        let seen = Rc::new(Cell::new(None));

        let seen_in = seen.clone();
        let probe: Rc<dyn Listener<u32>> =
            Rc::new(move |event: &Event<u32>| -> Result<(), ListenerError> {
                seen_in.set(event.active_listener_index());
                Ok(())
            });
        event.subscribe(probe.clone());

        let clone = event.create_clone();
        assert_eq!(clone.active_listener_index(), None);
        clone.dispatch(None).unwrap();

        assert_eq!(seen.get(), Some(0));
        assert_eq!(clone.active_listener_index(), None);
    }

    #[test]
    fn listener_error_reports_and_aborts() {
        let event = original();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::new(Tally {
            label: "a",
            log: log.clone(),
        });
        let failing: Rc<dyn Listener<u32>> =
            Rc::new(|_event: &Event<u32>| -> Result<(), ListenerError> {
                Err("boom".into())
            });
        let c = Rc::new(Tally {
            label: "c",
            log: log.clone(),
        });
        event.subscribe(a.clone());
        event.subscribe(failing.clone());
        event.subscribe(c.clone());

        let error = event.create_clone().dispatch(None).unwrap_err();
        assert!(error.to_string().contains("boom"));
        assert!(core::error::Error::source(&error).is_some());
        assert_eq!(*log.borrow(), ["a"]);

        // The guard was released, so once the failing listener is gone the
        // next dispatch reaches everyone after it.
        drop(failing);
        log.borrow_mut().clear();
        event.create_clone().dispatch(None).unwrap();
        assert_eq!(*log.borrow(), ["a", "c"]);
    }

    #[test]
    fn set_registry_redirects_dispatch() {
        let upstream = original();
        let log = Rc::new(RefCell::new(Vec::new()));

        let up_listener = Rc::new(Tally {
            label: "up",
            log: log.clone(),
        });
        upstream.subscribe(up_listener.clone());

        let own = Event::<u32>::new(Some(2));
        let own_listener = Rc::new(Tally {
            label: "own",
            log: log.clone(),
        });
        own.subscribe(own_listener.clone());

        let mut forwarded = upstream.create_clone();
        forwarded.set_source(2);
        forwarded.set_registry(own.registry());
        forwarded.dispatch(None).unwrap();

        assert_eq!(*log.borrow(), ["own"]);
        assert_eq!(forwarded.source(), Some(2));
        assert_eq!(forwarded.parent().unwrap().source(), Some(1));
    }

    #[test]
    fn error_types_display() {
        let invalid = InvalidStateError::new("dispatch");
        assert!(format!("{invalid}").contains("dispatch"));

        let error: DispatchError = invalid.into();
        assert!(matches!(error, DispatchError::InvalidState(_)));

        let listener_error = DispatchError::Listener("bad".into());
        assert!(format!("{listener_error}").contains("bad"));
    }
}
