use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::state::GeometryMode;

pub const DEFAULT_CAPACITY: usize = 100;

/// Shared sink; a debug overlay may hold a clone and read snapshots.
pub type DiagnosticsHandle = Arc<Mutex<MorphDiagnostics>>;

/// Fixed-capacity FIFO; once full the oldest entry is overwritten.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    capacity: usize,
    cursor: usize,
    filled: bool,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            filled: false,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.filled {
            self.buffer[self.cursor] = value;
        } else {
            self.buffer.push(value);
        }
        self.cursor = (self.cursor + 1) % self.capacity;
        if self.cursor == 0 {
            self.filled = true;
        }
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        if !self.filled {
            return self.buffer.clone();
        }
        let mut data = Vec::with_capacity(self.capacity);
        data.extend_from_slice(&self.buffer[self.cursor..]);
        data.extend_from_slice(&self.buffer[..self.cursor]);
        data
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.filled = false;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MorphEvent {
    pub source: String,
    pub progress: f32,
    pub level: usize,
    pub geometry_mode: GeometryMode,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrequencyEvent {
    pub mode: String,
    pub subdivision_level: f64,
    pub panel_index: usize,
    pub tet_division: u64,
    pub tet_size: u64,
    pub cents: f64,
    pub discrete_level: u32,
    pub fractional_level: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DiagnosticEvent {
    Morph(MorphEvent),
    Frequency(FrequencyEvent),
}

#[derive(Clone, Debug)]
struct Sequenced<T> {
    seq: u64,
    event: T,
}

/// Append-only event sink, bounded per category.
#[derive(Clone, Debug)]
pub struct MorphDiagnostics {
    morph: RingBuffer<Sequenced<MorphEvent>>,
    frequency: RingBuffer<Sequenced<FrequencyEvent>>,
    next_seq: u64,
}

impl Default for MorphDiagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MorphDiagnostics {
    pub fn new(capacity: usize) -> Self {
        Self {
            morph: RingBuffer::new(capacity),
            frequency: RingBuffer::new(capacity),
            next_seq: 0,
        }
    }

    pub fn shared(capacity: usize) -> DiagnosticsHandle {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    pub fn record(&mut self, event: DiagnosticEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        match event {
            DiagnosticEvent::Morph(event) => self.morph.push(Sequenced { seq, event }),
            DiagnosticEvent::Frequency(event) => self.frequency.push(Sequenced { seq, event }),
        }
    }

    /// Copy of every retained event, in recording order.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        let mut merged: Vec<(u64, DiagnosticEvent)> = self
            .morph
            .snapshot()
            .into_iter()
            .map(|s| (s.seq, DiagnosticEvent::Morph(s.event)))
            .chain(
                self.frequency
                    .snapshot()
                    .into_iter()
                    .map(|s| (s.seq, DiagnosticEvent::Frequency(s.event))),
            )
            .collect();
        merged.sort_by_key(|(seq, _)| *seq);
        merged.into_iter().map(|(_, event)| event).collect()
    }

    pub fn morph_events(&self) -> Vec<MorphEvent> {
        self.morph.snapshot().into_iter().map(|s| s.event).collect()
    }

    pub fn frequency_events(&self) -> Vec<FrequencyEvent> {
        self.frequency
            .snapshot()
            .into_iter()
            .map(|s| s.event)
            .collect()
    }

    pub fn clear(&mut self) {
        self.morph.clear();
        self.frequency.clear();
    }
}

/// Records through a shared handle. A poisoned lock drops the event.
pub fn record(handle: &DiagnosticsHandle, event: DiagnosticEvent) {
    if let Ok(mut guard) = handle.lock() {
        guard.record(event);
    }
}

/// Copy of the retained events; empty if the lock is poisoned.
pub fn snapshot(handle: &DiagnosticsHandle) -> Vec<DiagnosticEvent> {
    handle.lock().map(|guard| guard.events()).unwrap_or_default()
}
