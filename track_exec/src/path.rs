//! # Path files
//!
//! Paths are stored as CSV files with an `x,y` header and one point per row.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, Deserialize)]
struct PathRecord {
    x: f64,
    y: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathLoadError {
    #[error("Could not open the path file: {0}")]
    OpenError(csv::Error),

    #[error("Invalid point on line {0}: {1}")]
    InvalidRecord(u64, csv::Error),

    #[error("Point {0} of the path is not finite")]
    NonFinitePoint(usize),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load a path from a CSV file.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Vector2<f64>>, PathLoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .map_err(PathLoadError::OpenError)?;

    read_points(reader)
}

/// Parse a path from any CSV reader.
pub fn from_reader<R: Read>(rdr: R) -> Result<Vec<Vector2<f64>>, PathLoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(rdr);

    read_points(reader)
}

fn read_points<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Vector2<f64>>, PathLoadError> {
    let mut points = Vec::new();

    for result in reader.deserialize::<PathRecord>() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            PathLoadError::InvalidRecord(line, e)
        })?;

        if !record.x.is_finite() || !record.y.is_finite() {
            return Err(PathLoadError::NonFinitePoint(points.len()));
        }

        points.push(Vector2::new(record.x, record.y));
    }

    Ok(points)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_reader() {
        let csv = "x,y\n# start\n10, 20\n30.5,40\n";
        let points = from_reader(csv.as_bytes()).unwrap();
        assert_eq!(points, vec![Vector2::new(10.0, 20.0), Vector2::new(30.5, 40.0)]);

        // Header only is an empty path
        assert!(from_reader("x,y\n".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_bad_rows() {
        assert!(matches!(
            from_reader("x,y\n1,2\nthree,4\n".as_bytes()),
            Err(PathLoadError::InvalidRecord(_, _))
        ));
        assert!(matches!(
            from_reader("x,y\n1,2\n1,NaN\n".as_bytes()),
            Err(PathLoadError::NonFinitePoint(1))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_csv("/nonexistent/path.csv"),
            Err(PathLoadError::OpenError(_))
        ));
    }
}
