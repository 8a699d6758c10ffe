// Copyright 2025 the Loam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listener adapters.
//!
//! [`KeyedDispatchSink`] routes events to handlers by property key, saving
//! observers the boilerplate of probing an event for each key they care
//! about. [`RecordingSink`] is the observer for tests and diagnosis: it logs
//! what it is delivered instead of acting on it.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::event::Event;
use crate::listener::{Listener, ListenerError};

/// A handler invoked by [`KeyedDispatchSink`] when its key is present.
///
/// Deliberately not `Send + Sync`: dispatch is a single-threaded protocol
/// and handlers routinely capture `Rc` state.
pub type KeyHandler<S> = Box<dyn Fn(&Event<S>) -> Result<(), ListenerError>>;

/// A listener that routes events to handlers keyed by property name.
///
/// The table is ordered: on every delivered event, each entry whose key is
/// present on the event runs, in the order the entries were added. The same
/// key may appear in several entries; all of them run. A handler error stops
/// the remaining entries for that event and propagates to the dispatcher.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use loam_notify::{EventSource, KeyedDispatchSink};
///
/// let hits = Rc::new(RefCell::new(Vec::new()));
///
/// let on_saved = hits.clone();
/// let on_renamed = hits.clone();
/// let sink = Rc::new(
///     KeyedDispatchSink::new()
///         .on("saved", move |_event| {
///             on_saved.borrow_mut().push("saved");
///             Ok(())
///         })
///         .on("renamed", move |_event| {
///             on_renamed.borrow_mut().push("renamed");
///             Ok(())
///         }),
/// );
///
/// let source = EventSource::new(1_u32);
/// source.subscribe_strong(sink);
///
/// source.fire_with_keys(["renamed"], None).unwrap();
/// source.fire_with_keys(["saved", "renamed"], None).unwrap();
///
/// // Table order within one event, delivery order across events.
/// assert_eq!(*hits.borrow(), ["renamed", "saved", "renamed"]);
/// ```
pub struct KeyedDispatchSink<S> {
    table: Vec<(&'static str, KeyHandler<S>)>,
}

impl<S: Copy> KeyedDispatchSink<S> {
    /// Creates a sink with an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { table: Vec::new() }
    }

    /// Appends a table entry mapping `key` to `handler`, consuming and
    /// returning `self`.
    #[must_use]
    pub fn on<F>(mut self, key: &'static str, handler: F) -> Self
    where
        F: Fn(&Event<S>) -> Result<(), ListenerError> + 'static,
    {
        self.table.push((key, Box::new(handler)));
        self
    }

    /// Returns the number of table entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<S: Copy> Default for KeyedDispatchSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Copy> Listener<S> for KeyedDispatchSink<S> {
    fn notify(&self, event: &Event<S>) -> Result<(), ListenerError> {
        for (key, handler) in &self.table {
            if event.has_key(key) {
                handler(event)?;
            }
        }
        Ok(())
    }
}

impl<S> fmt::Debug for KeyedDispatchSink<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&'static str> = self.table.iter().map(|(key, _)| *key).collect();
        f.debug_struct("KeyedDispatchSink")
            .field("keys", &keys)
            .finish_non_exhaustive()
    }
}

/// What [`RecordingSink`] remembers about one delivered event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord<S> {
    /// The source identity the event carried.
    pub source: Option<S>,
    /// The event's property keys, sorted for stable comparison.
    pub keys: Vec<&'static str>,
}

/// A listener that records every event it is delivered.
///
/// Each delivery appends an [`EventRecord`] holding the event's source and
/// its sorted key set. The label tells several sinks apart when a test
/// watches more than one roster.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use loam_notify::{EventSource, RecordingSink};
///
/// let source = EventSource::new(4_u32);
/// let sink = Rc::new(RecordingSink::new("audit"));
/// source.subscribe_strong(sink.clone());
///
/// source.fire_with_keys(["deleted", "archived"], None).unwrap();
///
/// let records = sink.take_records();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].source, Some(4));
/// assert_eq!(records[0].keys, ["archived", "deleted"]);
/// assert!(sink.is_empty());
/// ```
pub struct RecordingSink<S> {
    label: &'static str,
    records: RefCell<Vec<EventRecord<S>>>,
}

impl<S: Copy> RecordingSink<S> {
    /// Creates a sink labeled `label` with no records.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            records: RefCell::new(Vec::new()),
        }
    }

    /// The label given at construction.
    #[must_use]
    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// A copy of the records accumulated so far, in delivery order.
    #[must_use]
    pub fn records(&self) -> Vec<EventRecord<S>> {
        self.records.borrow().clone()
    }

    /// Takes the accumulated records, leaving the sink empty.
    pub fn take_records(&self) -> Vec<EventRecord<S>> {
        self.records.take()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl<S: Copy> Listener<S> for RecordingSink<S> {
    fn notify(&self, event: &Event<S>) -> Result<(), ListenerError> {
        let mut keys: Vec<&'static str> = event.props().keys().collect();
        keys.sort_unstable();
        self.records.borrow_mut().push(EventRecord {
            source: event.source(),
            keys,
        });
        Ok(())
    }
}

impl<S: fmt::Debug> fmt::Debug for RecordingSink<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSink")
            .field("label", &self.label)
            .field("records", &self.records.borrow().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::string::ToString;

    use crate::source::EventSource;

    #[test]
    fn keyed_sink_runs_matching_entries_in_table_order() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = log.clone();
        let second = log.clone();
        let third = log.clone();
        let sink = Rc::new(
            KeyedDispatchSink::new()
                .on("a", move |_event| {
                    first.borrow_mut().push("a1");
                    Ok(())
                })
                .on("b", move |_event| {
                    second.borrow_mut().push("b");
                    Ok(())
                })
                .on("a", move |_event| {
                    third.borrow_mut().push("a2");
                    Ok(())
                }),
        );
        assert_eq!(sink.len(), 3);

        let source = EventSource::new(1_u32);
        source.subscribe_strong(sink.clone());

        source.fire_with_keys(["a"], None).unwrap();
        assert_eq!(*log.borrow(), ["a1", "a2"]);

        log.borrow_mut().clear();
        source.fire_with_keys(["b", "a"], None).unwrap();
        assert_eq!(*log.borrow(), ["a1", "b", "a2"]);
    }

    #[test]
    fn keyed_sink_ignores_unknown_keys() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let entry = log.clone();
        let sink = Rc::new(KeyedDispatchSink::new().on("known", move |_event| {
            entry.borrow_mut().push(());
            Ok(())
        }));

        let source = EventSource::new(1_u32);
        source.subscribe_strong(sink);
        source.fire_with_keys(["unknown"], None).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn keyed_sink_handler_error_stops_later_entries() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = log.clone();
        let third = log.clone();
        let sink = Rc::new(
            KeyedDispatchSink::new()
                .on("k", move |_event| {
                    first.borrow_mut().push("first");
                    Ok(())
                })
                .on("k", |_event| Err("handler failed".into()))
                .on("k", move |_event| {
                    third.borrow_mut().push("third");
                    Ok(())
                }),
        );

        let source = EventSource::new(1_u32);
        source.subscribe_strong(sink);

        let error = source.fire_with_keys(["k"], None).unwrap_err();
        assert!(error.to_string().contains("handler failed"));
        assert_eq!(*log.borrow(), ["first"]);
    }

    #[test]
    fn keyed_sink_handler_reads_payload() {
        let seen = Rc::new(core::cell::Cell::new(0_u64));
        let seen_in = seen.clone();
        let sink = Rc::new(KeyedDispatchSink::new().on("revision", move |event| {
            seen_in.set(*event.get_as::<u64>("revision").ok_or("missing revision")?);
            Ok(())
        }));

        let source = EventSource::new(1_u32);
        source.subscribe_strong(sink);
        source
            .fire_with_props(crate::PropSet::new().with("revision", 9_u64), None)
            .unwrap();
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn recording_sink_captures_source_and_sorted_keys() {
        let source = EventSource::new(7_u32);
        let sink = Rc::new(RecordingSink::new("probe"));
        source.subscribe_strong(sink.clone());

        source.fire_with_keys(["b", "a"], None).unwrap();
        source.fire_with_keys(["c"], None).unwrap();

        assert_eq!(sink.label(), "probe");
        assert_eq!(sink.len(), 2);

        let records = sink.records();
        assert_eq!(records[0].keys, ["a", "b"]);
        assert_eq!(records[1].keys, ["c"]);
        assert!(records.iter().all(|record| record.source == Some(7)));

        // records() copies, take_records() drains.
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.take_records().len(), 2);
        assert!(sink.is_empty());
    }
}
