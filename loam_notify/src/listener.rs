// Copyright 2025 the Loam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The listener contract.
//!
//! Anything that wants to observe dispatched events implements [`Listener`].
//! Listeners live behind `Rc` and are registered with a
//! [`ListenerRegistry`](crate::ListenerRegistry), weakly by default; delivery
//! happens synchronously on the dispatching thread.

use alloc::boxed::Box;

use crate::event::Event;

/// The error type a listener may raise from [`Listener::notify`].
///
/// Dispatch never catches, retries, or swallows these: the first failing
/// listener aborts the remainder of the pass and the error surfaces to the
/// dispatching caller as
/// [`DispatchError::Listener`](crate::DispatchError::Listener).
pub type ListenerError = Box<dyn core::error::Error>;

/// An observer of dispatched events.
///
/// `S` is the application-chosen source identity type carried by
/// [`Event::source`]. Listeners are invoked one at a time, in subscription
/// order, on the thread that dispatches. A listener is free to fire further
/// dispatches or to change subscriptions from inside
/// [`notify`](Self::notify); both are re-entrancy-safe.
///
/// Closures of the right shape implement `Listener` directly, which keeps
/// one-off observers lightweight:
///
/// ```rust
/// use std::rc::Rc;
/// use loam_notify::{Event, EventSource, Listener, ListenerError};
///
/// let doc = EventSource::new(7_u32);
/// let probe: Rc<dyn Listener<u32>> =
///     Rc::new(|event: &Event<u32>| -> Result<(), ListenerError> {
///         assert_eq!(event.source(), Some(7));
///         assert!(event.has_key("changed"));
///         Ok(())
///     });
/// doc.subscribe_strong(probe);
/// doc.fire_with_keys(["changed"], None).unwrap();
/// ```
pub trait Listener<S> {
    /// Called once per event delivered to this listener.
    fn notify(&self, event: &Event<S>) -> Result<(), ListenerError>;
}

impl<S, F> Listener<S> for F
where
    F: Fn(&Event<S>) -> Result<(), ListenerError>,
{
    #[inline]
    fn notify(&self, event: &Event<S>) -> Result<(), ListenerError> {
        self(event)
    }
}
