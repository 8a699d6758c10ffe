// Copyright 2025 the Loam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loam Notify: in-process publish/subscribe event dispatch.
//!
//! This crate is the notification backbone for a single-threaded application
//! core: objects publish events about themselves, observers subscribe to the
//! objects they care about, and delivery is synchronous, ordered, and
//! re-entrancy-safe. There are no topics, queues, or cross-process delivery
//! guarantees; this is object-to-listener fan-out with listener lifetimes
//! handled for you.
//!
//! The core types:
//!
//! - [`EventSource`] is the publishing endpoint an object embeds. It owns
//!   the listener roster and is created lazily on first use. Objects expose
//!   theirs through [`EventHost`] and get the full surface from
//!   [`EventHostExt`].
//! - [`Event`] is the notification itself. The source holds one long-lived
//!   *original*; every published notification is a *clone* carrying its own
//!   property snapshot (a [`PropSet`]) while sharing the original's roster.
//! - [`Listener`] is the observer contract. Closures of the right shape
//!   implement it directly.
//! - [`ListenerRegistry`] is the ordered roster of weak-by-default listener
//!   handles, with cleanup deferred while a dispatch is walking it.
//! - [`ResendingSource`] republishes everything a set of watched sources
//!   dispatches, under its own identity.
//! - [`KeyedDispatchSink`] and [`RecordingSink`] are listener adapters: one
//!   routes by property key, the other records deliveries.
//!
//! ## Minimal example
//!
//! ```rust
//! use std::rc::Rc;
//! use loam_notify::{Event, EventSource, Listener, ListenerError, PropSet};
//!
//! // Sources publish under an application-chosen `Copy` identity.
//! let page = EventSource::new(17_u32);
//!
//! let probe: Rc<dyn Listener<u32>> =
//!     Rc::new(|event: &Event<u32>| -> Result<(), ListenerError> {
//!         if event.has_key("saved") {
//!             assert_eq!(event.get_as::<&str>("path"), Some(&"wiki/Welcome"));
//!         }
//!         Ok(())
//!     });
//!
//! // Weak by default: the roster never keeps a listener alive.
//! page.subscribe(probe.clone());
//!
//! page.fire_with_props(
//!     PropSet::new().with("path", "wiki/Welcome").with("saved", true),
//!     None,
//! )
//! .unwrap();
//!
//! // Dropping the listener is all the cleanup there is; the dead entry is
//! // skipped and pruned by the next dispatch.
//! drop(probe);
//! page.fire_with_keys(["saved"], None).unwrap();
//! assert!(page.event().registry().borrow().is_empty());
//! ```
//!
//! ## Clones carry the payload
//!
//! An original event never carries properties; it is a factory and a roster
//! handle. Each `fire_*` call clones it, fills the clone, and dispatches the
//! clone, so overlapping notifications never share mutable payload and a
//! listener can keep a received event as an immutable record. A clone's
//! [`parent`](Event::parent) links back to a snapshot of the event it was
//! cloned from, which is how forwarded events keep their provenance.
//!
//! ## Re-entrancy
//!
//! Listeners run synchronously on the dispatching thread and are free to
//! fire further events or to change subscriptions, including on the roster
//! currently being walked. A listener subscribed mid-pass is reached by that
//! same pass; one unsubscribed mid-pass stops being notified immediately,
//! and its slot is compacted once the roster is idle again.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. Everything is single-threaded by
//! construction (`Rc`, `RefCell`), so the types are `!Send` and `!Sync`.

#![no_std]

extern crate alloc;

mod event;
mod listener;
mod props;
mod registry;
mod resend;
mod sink;
mod source;

pub use event::{DispatchError, Event, InvalidStateError};
pub use listener::{Listener, ListenerError};
pub use props::{PropSet, PropValue};
pub use registry::ListenerRegistry;
pub use resend::ResendingSource;
pub use sink::{EventRecord, KeyHandler, KeyedDispatchSink, RecordingSink};
pub use source::{EventHost, EventHostExt, EventSource};
