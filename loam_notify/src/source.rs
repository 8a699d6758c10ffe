// Copyright 2025 the Loam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-owner event sources.
//!
//! [`EventSource`] is the facade an object embeds to publish events: it
//! lazily owns the original [`Event`] (and with it the listener roster) and
//! offers the fire-and-subscribe surface. [`EventHost`] is the one-method
//! trait a collaborator implements to expose its source; everything else
//! comes from the blanket [`EventHostExt`].

use alloc::rc::Rc;
use core::cell::OnceCell;

use crate::event::{DispatchError, Event};
use crate::listener::Listener;
use crate::props::PropSet;

/// A publishing endpoint with one identity and one listener roster.
///
/// The source's original event, and with it the roster, is created on first
/// use; an object that never publishes and never gains a listener costs one
/// `OnceCell` and nothing else.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use loam_notify::{Event, EventSource, Listener, ListenerError, PropSet};
///
/// let page = EventSource::new(11_u32);
///
/// let probe: Rc<dyn Listener<u32>> =
///     Rc::new(|event: &Event<u32>| -> Result<(), ListenerError> {
///         assert_eq!(event.get_as::<u64>("revision"), Some(&4));
///         Ok(())
///     });
/// page.subscribe(probe.clone());
///
/// let sent = page
///     .fire_with_props(PropSet::new().with("revision", 4_u64), None)
///     .unwrap();
/// assert_eq!(sent.source(), Some(11));
/// ```
#[derive(Debug)]
pub struct EventSource<S> {
    id: S,
    original: OnceCell<Event<S>>,
}

impl<S: Copy> EventSource<S> {
    /// Creates a source that publishes under the identity `id`.
    #[must_use]
    pub const fn new(id: S) -> Self {
        Self {
            id,
            original: OnceCell::new(),
        }
    }

    /// The identity this source publishes under.
    #[must_use]
    #[inline]
    pub fn id(&self) -> S {
        self.id
    }

    /// The original event, created on first use.
    pub fn event(&self) -> &Event<S> {
        self.original.get_or_init(|| Event::new(Some(self.id)))
    }

    /// Drops the original event and its roster.
    ///
    /// Strong subscriptions held only by the roster are released; clones of
    /// the old original keep the old roster alive among themselves but are
    /// disconnected from this source. The next use starts over with an empty
    /// roster.
    pub fn reset(&mut self) {
        self.original.take();
    }

    /// Fires a clone carrying `props`, returning the dispatched clone.
    ///
    /// `first` is the priority listener: it is notified before the roster,
    /// whether or not it is subscribed.
    pub fn fire_with_props(
        &self,
        props: PropSet,
        first: Option<&dyn Listener<S>>,
    ) -> Result<Event<S>, DispatchError> {
        let clone = self.event().clone_with_props(props);
        clone.dispatch(first)?;
        Ok(clone)
    }

    /// Fires a clone with each of `keys` set as a flag, returning the
    /// dispatched clone.
    pub fn fire_with_keys(
        &self,
        keys: impl IntoIterator<Item = &'static str>,
        first: Option<&dyn Listener<S>>,
    ) -> Result<Event<S>, DispatchError> {
        let clone = self.event().clone_with_keys(keys);
        clone.dispatch(first)?;
        Ok(clone)
    }

    /// Appends a weak subscription for `listener`.
    pub fn subscribe(&self, listener: Rc<dyn Listener<S>>) {
        self.event().subscribe(listener);
    }

    /// Appends an owning subscription for `listener`.
    pub fn subscribe_strong(&self, listener: Rc<dyn Listener<S>>) {
        self.event().subscribe_strong(listener);
    }

    /// Removes `listener`; `false` if it was not subscribed.
    pub fn unsubscribe(&self, listener: &dyn Listener<S>) -> bool {
        self.event().unsubscribe(listener)
    }

    /// Returns `true` if `listener` is subscribed.
    #[must_use]
    pub fn has_listener(&self, listener: &dyn Listener<S>) -> bool {
        self.event().has_listener(listener)
    }
}

impl<S: Copy> EventHost<S> for EventSource<S> {
    fn event_source(&self) -> &EventSource<S> {
        self
    }
}

/// An object that owns an [`EventSource`].
///
/// Implementing this single method buys the whole publishing surface via
/// [`EventHostExt`].
///
/// # Example
///
/// ```rust
/// use loam_notify::{EventHost, EventHostExt, EventSource};
///
/// struct Document {
///     events: EventSource<u32>,
/// }
///
/// impl EventHost<u32> for Document {
///     fn event_source(&self) -> &EventSource<u32> {
///         &self.events
///     }
/// }
///
/// let doc = Document {
///     events: EventSource::new(5),
/// };
/// let sent = doc.fire_with_keys(["reloaded"], None).unwrap();
/// assert!(sent.has_key("reloaded"));
/// ```
pub trait EventHost<S: Copy> {
    /// The source this object publishes through.
    fn event_source(&self) -> &EventSource<S>;
}

/// Publishing and subscription conveniences for every [`EventHost`].
pub trait EventHostExt<S: Copy>: EventHost<S> {
    /// Fires a clone carrying `props`; see [`EventSource::fire_with_props`].
    fn fire_with_props(
        &self,
        props: PropSet,
        first: Option<&dyn Listener<S>>,
    ) -> Result<Event<S>, DispatchError> {
        self.event_source().fire_with_props(props, first)
    }

    /// Fires a clone flagging `keys`; see [`EventSource::fire_with_keys`].
    fn fire_with_keys(
        &self,
        keys: impl IntoIterator<Item = &'static str>,
        first: Option<&dyn Listener<S>>,
    ) -> Result<Event<S>, DispatchError> {
        self.event_source().fire_with_keys(keys, first)
    }

    /// Appends a weak subscription for `listener`.
    fn subscribe(&self, listener: Rc<dyn Listener<S>>) {
        self.event_source().subscribe(listener);
    }

    /// Appends an owning subscription for `listener`.
    fn subscribe_strong(&self, listener: Rc<dyn Listener<S>>) {
        self.event_source().subscribe_strong(listener);
    }

    /// Removes `listener`; `false` if it was not subscribed.
    fn unsubscribe(&self, listener: &dyn Listener<S>) -> bool {
        self.event_source().unsubscribe(listener)
    }

    /// Returns `true` if `listener` is subscribed.
    fn has_listener(&self, listener: &dyn Listener<S>) -> bool {
        self.event_source().has_listener(listener)
    }
}

// Blanket implementation for all EventHost types
impl<S: Copy, T: EventHost<S>> EventHostExt<S> for T {}
