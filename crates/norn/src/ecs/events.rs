//! # Events — Double-Buffered Message Queues
//!
//! [`Events<T>`] is a broadcast queue with a one-frame delay. Sending appends
//! to the **current** buffer; reading always goes through the **previous**
//! buffer. Once per frame [`Events::update`] swaps them:
//!
//! ```text
//! frame N:   send(a), send(b)      -> current = [a, b], previous = []
//!            iter()                -> nothing (a, b not yet visible)
//! update:                          -> previous = [a, b], current = []
//! frame N+1: iter()                -> [a, b]
//! update:                          -> previous = [], a and b are gone
//! ```
//!
//! An event is therefore invisible the frame it is sent, visible for exactly
//! one frame after the next update, then dropped. Consumers that must not
//! miss events across uneven system orderings use an [`EventReader`], which
//! remembers the id of the last event it saw; several readers consume the
//! same `Events<T>` independently without interfering.
//!
//! The queue is deliberately not a channel: there is one logical thread, the
//! double buffer is the only cross-frame handoff, and dropping unread events
//! after one frame bounds memory without any consumer coordination.

use super::change_detection::Tick;

/// One sent event with its bookkeeping.
#[derive(Debug, Clone)]
pub struct EventInstance<T> {
    /// Monotonic id, unique within one `Events<T>`.
    pub id: u64,
    pub payload: T,
    /// The world tick at which the event was sent.
    pub sent_at: Tick,
}

/// Double-buffered event queue for payloads of type `T`.
///
/// Typically stored as a world resource and pumped once per frame by
/// [`App::add_event`](crate::app::App::add_event).
pub struct Events<T> {
    current: Vec<EventInstance<T>>,
    previous: Vec<EventInstance<T>>,
    next_id: u64,
    /// Tick of the most recent `update`, stamped onto events sent since.
    last_update: Tick,
}

impl<T> Default for Events<T> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            previous: Vec::new(),
            next_id: 0,
            last_update: Tick::ZERO,
        }
    }
}

impl<T> Events<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the current buffer. It becomes readable after the
    /// next [`update`](Self::update).
    pub fn send(&mut self, payload: T) {
        let id = self.next_id;
        self.next_id += 1;
        self.current.push(EventInstance {
            id,
            payload,
            sent_at: self.last_update,
        });
    }

    /// Send several events, preserving order.
    pub fn send_batch(&mut self, payloads: impl IntoIterator<Item = T>) {
        for payload in payloads {
            self.send(payload);
        }
    }

    /// Swap buffers: everything sent since the last update becomes readable,
    /// and whatever was readable is dropped.
    pub fn update(&mut self, tick: Tick) {
        std::mem::swap(&mut self.previous, &mut self.current);
        self.current.clear();
        self.last_update = tick;
    }

    /// Drop everything, both readable and pending. Ids keep counting up so
    /// existing readers stay consistent.
    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
    }

    /// Iterate the readable (previous) buffer. For per-consumer cursors use
    /// an [`EventReader`] instead.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.previous.iter().map(|e| &e.payload)
    }

    /// Readable events with their ids and send ticks.
    pub fn iter_instances(&self) -> impl Iterator<Item = &EventInstance<T>> {
        self.previous.iter()
    }

    /// Number of readable events.
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    /// Highest id in the readable buffer, if any.
    fn newest_readable_id(&self) -> Option<u64> {
        self.previous.last().map(|e| e.id)
    }
}

/// Per-consumer cursor over an [`Events<T>`].
///
/// Holds only the id of the last event it consumed, so cloning a world's
/// events or keeping many readers is cheap. A fresh reader starts before the
/// first event ever sent and will see whatever is currently readable.
pub struct EventReader<T> {
    /// Id of the newest event this reader has yielded, or `None` if it has
    /// consumed nothing yet.
    last_seen: Option<u64>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Default for EventReader<T> {
    fn default() -> Self {
        Self {
            last_seen: None,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> EventReader<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield the readable events this reader has not consumed yet, marking
    /// them consumed.
    pub fn iter<'a>(&mut self, events: &'a Events<T>) -> impl Iterator<Item = &'a T> + use<'a, T> {
        let cutoff = self.last_seen;
        // Everything readable is consumed by the time the iterator is handed
        // out; the cursor only ever moves forward.
        if let Some(newest) = events.newest_readable_id() {
            self.last_seen = Some(self.last_seen.map_or(newest, |seen| seen.max(newest)));
        }
        events
            .previous
            .iter()
            .filter(move |e| cutoff.is_none_or(|seen| e.id > seen))
            .map(|e| &e.payload)
    }

    /// Look at unread events without consuming them.
    pub fn peek<'a>(&self, events: &'a Events<T>) -> impl Iterator<Item = &'a T> + use<'a, T> {
        let cutoff = self.last_seen;
        events
            .previous
            .iter()
            .filter(move |e| cutoff.is_none_or(|seen| e.id > seen))
            .map(|e| &e.payload)
    }

    /// Whether any readable event is still unread by this reader.
    pub fn has_unread(&self, events: &Events<T>) -> bool {
        self.peek(events).next().is_some()
    }
}
