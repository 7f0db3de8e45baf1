//! # Status Board
//!
//! A passive set of labelled text lines describing what the tracker is doing. Anything can add a
//! label and keep its id to update it later. The board is presentation only; nothing reads it back
//! to make decisions.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, MutexGuard,
};
use std::time::Duration;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Identifier of a label on the board.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(u64);

#[derive(Debug, Default)]
pub struct StatusBoard {
    labels: Mutex<BTreeMap<LabelId, String>>,
    next_id: AtomicU64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new label, lines are shown in the order they were added.
    pub fn add_label<S: Into<String>>(&self, text: S) -> LabelId {
        let id = LabelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, text.into());
        id
    }

    /// Change the text of a label. Returns false if the label doesn't exist.
    pub fn set_label<S: Into<String>>(&self, id: LabelId, text: S) -> bool {
        match self.lock().get_mut(&id) {
            Some(t) => {
                *t = text.into();
                true
            }
            None => false,
        }
    }

    pub fn remove_label(&self, id: LabelId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn label(&self, id: LabelId) -> Option<String> {
        self.lock().get(&id).cloned()
    }

    /// All current lines in order.
    pub fn lines(&self) -> Vec<String> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The board as a single block of text.
    pub fn render(&self) -> String {
        self.lines().join("\n")
    }

    fn lock(&self) -> MutexGuard<BTreeMap<LabelId, String>> {
        match self.labels.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Frames per second given a number of frames counted over an interval.
pub fn frame_rate(frames: u64, interval: Duration) -> f64 {
    let secs = interval.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}
