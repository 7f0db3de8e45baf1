//! # Competition State
//!
//! Holds the planned path and the shared tracking state. A single instance is created by the
//! executable and handed to everything which needs it.
//!
//! Path points are stored in path space (raw camera pixels). Points coming from the screen, such
//! as clicks or pathfinder output on the displayed frame, are converted using the current view
//! scale at the moment they are added.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use nalgebra::Vector2;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cam::{tracking::TrackingState, view::ViewScale};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CompState {
    path: RwLock<Vec<Vector2<f64>>>,

    tracking: Arc<TrackingState>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CompState {
    pub fn new(tracking: Arc<TrackingState>) -> Self {
        Self {
            path: RwLock::new(Vec::new()),
            tracking,
        }
    }

    pub fn tracking(&self) -> &Arc<TrackingState> {
        &self.tracking
    }

    /// A copy of the current path.
    pub fn path(&self) -> Vec<Vector2<f64>> {
        self.read().clone()
    }

    pub fn path_len(&self) -> usize {
        self.read().len()
    }

    pub fn append_path(&self, point: Vector2<f64>) {
        self.write().push(point);
    }

    pub fn clear_path(&self) {
        self.write().clear();
    }

    /// Replace the whole path. Readers see either the old path or the new one, never a mix.
    pub fn set_path(&self, points: Vec<Vector2<f64>>) {
        let mut path = self.write();
        path.clear();
        path.extend(points);
        debug!("Path set with {} points", path.len());
    }

    /// Replace the path with points given in screen pixels.
    pub fn set_path_from_pixels(&self, pixels: &[Vector2<f64>], view: &ViewScale) {
        let scale = view.combined();
        self.set_path(pixels.iter().map(|p| p / scale).collect());
    }

    /// Append a point clicked on the screen.
    pub fn add_path_point(&self, screen: Vector2<f64>, view: &ViewScale) {
        self.append_path(view.screen_to_path(&screen));
    }

    fn read(&self) -> RwLockReadGuard<Vec<Vector2<f64>>> {
        match self.path.read() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<Vec<Vector2<f64>>> {
        match self.path.write() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn test_path_editing() {
        let cs = CompState::default();
        assert_eq!(cs.path_len(), 0);

        cs.append_path(Vector2::new(1.0, 2.0));
        cs.append_path(Vector2::new(3.0, 4.0));
        assert_eq!(cs.path(), vec![Vector2::new(1.0, 2.0), Vector2::new(3.0, 4.0)]);

        cs.set_path(vec![Vector2::new(9.0, 9.0)]);
        assert_eq!(cs.path(), vec![Vector2::new(9.0, 9.0)]);

        cs.clear_path();
        assert!(cs.path().is_empty());
    }

    #[test]
    fn test_screen_points() {
        let cs = CompState::default();
        let view = ViewScale::fixed(2.0, 0.5);
        let view2 = ViewScale::fixed(2.0, 2.0);

        cs.add_path_point(Vector2::new(10.0, 20.0), &view);
        assert_eq!(cs.path(), vec![Vector2::new(10.0, 20.0)]);

        cs.set_path_from_pixels(&[Vector2::new(40.0, 8.0), Vector2::new(4.0, 4.0)], &view2);
        assert_eq!(cs.path(), vec![Vector2::new(10.0, 2.0), Vector2::new(1.0, 1.0)]);
    }

    #[test]
    fn test_bulk_replace_is_atomic() {
        let cs = Arc::new(CompState::default());
        let writer_cs = cs.clone();

        let a: Vec<_> = (0..50).map(|i| Vector2::new(i as f64, 0.0)).collect();
        let b: Vec<_> = (0..80).map(|i| Vector2::new(i as f64, 1.0)).collect();
        let (wa, wb) = (a.clone(), b.clone());

        let writer = thread::spawn(move || {
            for i in 0..500 {
                writer_cs.set_path(if i % 2 == 0 { wa.clone() } else { wb.clone() });
            }
        });

        for _ in 0..500 {
            let p = cs.path();
            assert!(p.is_empty() || p == a || p == b);
        }

        writer.join().unwrap();
    }
}
