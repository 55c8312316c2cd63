//! In-memory recorder.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Event, Recorder};
use crate::engine::SimulationResult;
use crate::error::Result;
use crate::history::PairingRecord;

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Event>,
    pairings: Vec<PairingRecord>,
    result: Option<SimulationResult>,
}

/// Recorder that keeps everything in memory.
///
/// Clones share storage, so a handle kept by the caller sees what the
/// simulation recorded through its own copy.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRecorder {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every event, in order.
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Events matching a predicate.
    pub fn events_where(&self, pred: impl Fn(&Event) -> bool) -> Vec<Event> {
        self.lock().events.iter().filter(|e| pred(e)).cloned().collect()
    }

    /// Closed pairings, in order.
    pub fn pairings(&self) -> Vec<PairingRecord> {
        self.lock().pairings.clone()
    }

    /// Final result, once finalized.
    pub fn result(&self) -> Option<SimulationResult> {
        self.lock().result.clone()
    }
}

impl Recorder for MemoryRecorder {
    fn record(&mut self, event: &Event) -> Result<()> {
        self.lock().events.push(event.clone());
        Ok(())
    }

    fn pairing_completed(&mut self, pairing: &PairingRecord) -> Result<()> {
        self.lock().pairings.push(pairing.clone());
        Ok(())
    }

    fn finalize(&mut self, result: &SimulationResult) -> Result<()> {
        self.lock().result = Some(result.clone());
        Ok(())
    }
}
