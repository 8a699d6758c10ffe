// Copyright 2025 the Loam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Republishing sources.
//!
//! A [`ResendingSource`] watches any number of upstream sources and forwards
//! every event they dispatch to its own listeners, under its own identity.
//! Downstream observers subscribe once and follow a whole family of sources
//! without tracking membership changes themselves.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::event::Event;
use crate::listener::{Listener, ListenerError};
use crate::registry::ListenerRegistry;
use crate::source::{EventHost, EventSource};

/// An event source that republishes everything its watched sources dispatch.
///
/// The resender subscribes itself weakly to each watched source, so watching
/// never keeps it alive; when the last external `Rc` drops, the upstream
/// entries go dead and are pruned on their next dispatch. Forwarded events
/// keep the upstream payload, carry the resender's identity as their
/// [`source`](Event::source), and lead back to the upstream identity through
/// [`parent`](Event::parent).
///
/// It is an [`EventHost`], so the usual publishing surface
/// ([`EventHostExt`](crate::EventHostExt)) applies to it as well.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use loam_notify::{
///     Event, EventHostExt, EventSource, Listener, ListenerError, ResendingSource,
/// };
///
/// let chapter = EventSource::new(1_u32);
/// let appendix = EventSource::new(2_u32);
///
/// let book = ResendingSource::new(100_u32);
/// book.set_watched_sources([&chapter, &appendix]);
///
/// let probe: Rc<dyn Listener<u32>> =
///     Rc::new(|event: &Event<u32>| -> Result<(), ListenerError> {
///         assert_eq!(event.source(), Some(100));
///         assert!(event.has_key("edited"));
///         Ok(())
///     });
/// book.subscribe_strong(probe);
///
/// chapter.fire_with_keys(["edited"], None).unwrap();
/// appendix.fire_with_keys(["edited"], None).unwrap();
/// ```
pub struct ResendingSource<S> {
    source: EventSource<S>,
    /// Roster handles of the currently watched sources, kept so a later
    /// watch-list change can unsubscribe from each of them.
    watched: RefCell<Vec<Rc<RefCell<ListenerRegistry<S>>>>>,
}

impl<S: Copy + 'static> ResendingSource<S> {
    /// Creates a resender publishing under the identity `id`.
    ///
    /// Returned behind `Rc` because the resender registers itself as a
    /// listener on the sources it watches.
    #[must_use]
    pub fn new(id: S) -> Rc<Self> {
        Rc::new(Self {
            source: EventSource::new(id),
            watched: RefCell::new(Vec::new()),
        })
    }

    /// The identity forwarded events are published under.
    #[must_use]
    #[inline]
    pub fn id(&self) -> S {
        self.source.id()
    }

    /// The number of sources currently watched.
    #[must_use]
    pub fn watched_count(&self) -> usize {
        self.watched.borrow().len()
    }

    /// Replaces the set of watched sources.
    ///
    /// The resender first unsubscribes from every previously watched source,
    /// then subscribes weakly to each new one, so no upstream ever notifies
    /// it twice and no stale watch lingers. An empty iterator stops watching
    /// altogether.
    pub fn set_watched_sources<'u, I>(self: &Rc<Self>, sources: I)
    where
        I: IntoIterator<Item = &'u EventSource<S>>,
    {
        let mut watched = self.watched.borrow_mut();
        for registry in watched.drain(..) {
            registry.borrow_mut().unsubscribe(&**self);
        }
        let this: Rc<dyn Listener<S>> = self.clone();
        for upstream in sources {
            let registry = upstream.event().registry();
            registry.borrow_mut().subscribe(Rc::clone(&this));
            watched.push(registry);
        }
    }
}

impl<S: Copy> EventHost<S> for ResendingSource<S> {
    fn event_source(&self) -> &EventSource<S> {
        &self.source
    }
}

impl<S: Copy + 'static> Listener<S> for ResendingSource<S> {
    /// Forwards an upstream event: clone it, stamp it with this resender's
    /// identity, point it at this resender's roster, and dispatch.
    fn notify(&self, event: &Event<S>) -> Result<(), ListenerError> {
        let mut resent = event.create_clone();
        resent.set_source(self.source.id());
        resent.set_registry(self.source.event().registry());
        resent.dispatch(None)?;
        Ok(())
    }
}

impl<S: fmt::Debug> fmt::Debug for ResendingSource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResendingSource")
            .field("source", &self.source)
            .field("watched", &self.watched.borrow().len())
            .finish_non_exhaustive()
    }
}
