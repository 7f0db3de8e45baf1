//! # Shared Tracking State
//!
//! The tracking state is the only structure shared between the video pipeline and the
//! controller. The detector writes the latest bounding box of the actuator into it, and the
//! controller reads it at its own cadence.
//!
//! Two flags qualify the box:
//!
//! - `valid` - the latest detector run found a plausible match.
//! - `fresh` - the box has been updated since the controller last consumed it.
//!
//! A box is only actionable when both flags are set. Consuming a box clears `fresh` until the
//! next detector update.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An axis aligned bounding box in post-transform pixel space.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// Thread safe tracking state.
#[derive(Debug, Default)]
pub struct TrackingState {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    bbox: BoundingBox,
    fresh: bool,
    valid: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BoundingBox {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        )
    }

    /// Return the box with every edge multiplied by `scale`.
    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            left: self.left * scale,
            top: self.top * scale,
            right: self.right * scale,
            bottom: self.bottom * scale,
        }
    }
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a new box, marking it both valid and fresh.
    pub fn update(&self, bbox: BoundingBox) {
        let mut inner = self.lock();
        inner.bbox = bbox;
        inner.valid = true;
        inner.fresh = true;
    }

    /// Mark the current box as not valid.
    ///
    /// The box itself and the freshness flag are left untouched.
    pub fn invalidate(&self) {
        self.lock().valid = false;
    }

    /// Return the current box and its validity, clearing the freshness flag.
    pub fn read_and_consume(&self) -> (BoundingBox, bool) {
        let mut inner = self.lock();
        inner.fresh = false;
        (inner.bbox, inner.valid)
    }

    /// Atomically check that the box is actionable and consume it if it is.
    ///
    /// Returns `None` without consuming anything if the box is stale or invalid.
    pub fn take_actionable(&self) -> Option<BoundingBox> {
        let mut inner = self.lock();
        if inner.fresh && inner.valid {
            inner.fresh = false;
            Some(inner.bbox)
        } else {
            None
        }
    }

    /// Read the freshness flag without consuming it.
    pub fn peek_fresh(&self) -> bool {
        self.lock().fresh
    }

    pub fn is_valid(&self) -> bool {
        self.lock().valid
    }

    /// Read the current box without affecting either flag.
    pub fn peek(&self) -> BoundingBox {
        self.lock().bbox
    }

    /// Get the lock, recovering the data if a writer panicked. Every write leaves the state
    /// consistent so poisoning carries no information here.
    fn lock(&self) -> MutexGuard<Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_flags() {
        let ts = TrackingState::new();

        // Initially nothing is actionable
        assert!(!ts.peek_fresh());
        assert!(!ts.is_valid());
        assert!(ts.take_actionable().is_none());

        let b = BoundingBox::new(10.0, 20.0, 30.0, 60.0);
        ts.update(b);
        assert!(ts.peek_fresh());
        assert!(ts.is_valid());

        // Peeking doesn't consume
        assert!(ts.peek_fresh());
        assert_eq!(ts.peek(), b);

        let (read, valid) = ts.read_and_consume();
        assert_eq!(read, b);
        assert!(valid);
        assert!(!ts.peek_fresh());
        assert!(ts.take_actionable().is_none());

        // Fresh but invalid is not actionable
        ts.update(b);
        ts.invalidate();
        assert!(ts.peek_fresh());
        assert!(ts.take_actionable().is_none());
        assert!(ts.peek_fresh());

        ts.update(b);
        assert_eq!(ts.take_actionable(), Some(b));
        assert!(!ts.peek_fresh());
    }

    #[test]
    fn test_bbox() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 60.0);
        assert_eq!(b.center(), Vector2::new(20.0, 40.0));
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 40.0);
        assert_eq!(b.scaled(0.5), BoundingBox::new(5.0, 10.0, 15.0, 30.0));
    }

    #[test]
    fn test_no_torn_reads() {
        let ts = Arc::new(TrackingState::new());
        let writer_ts = ts.clone();

        // Writer always writes boxes whose edges are all equal, so a torn read would show up as
        // mismatched edges
        let writer = thread::spawn(move || {
            for i in 0..2000 {
                let v = i as f64;
                writer_ts.update(BoundingBox::new(v, v, v, v));
            }
        });

        for _ in 0..2000 {
            let (b, _) = ts.read_and_consume();
            assert_eq!(b.left, b.top);
            assert_eq!(b.left, b.right);
            assert_eq!(b.left, b.bottom);
        }

        writer.join().unwrap();
    }
}
