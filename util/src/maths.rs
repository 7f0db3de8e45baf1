//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use num_traits::Float;

/// Return the foot of the perpendicular dropped from `point` onto the infinite line passing
/// through `line_start` and `line_end`.
///
/// If the two line points coincide there is no line, and `line_start` is returned.
pub fn perp_intersect(
    point: &Vector2<f64>,
    line_start: &Vector2<f64>,
    line_end: &Vector2<f64>,
) -> Vector2<f64> {
    let dir = line_end - line_start;
    let len_sq = dir.norm_squared();

    if len_sq <= std::f64::EPSILON {
        return *line_start;
    }

    let t = (point - line_start).dot(&dir) / len_sq;
    line_start + dir * t
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle in degrees into the range [0, 360).
pub fn wrap_deg<T>(angle_deg: T) -> T
where
    T: Float,
{
    let full = T::from(360.0).unwrap_or_else(T::zero);
    let wrapped = rem_euclid(angle_deg, full);

    // Round-off can land exactly on the upper bound
    if wrapped >= full {
        T::zero()
    } else {
        wrapped
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_perp_intersect() {
        // Point above a horizontal line drops straight down
        let foot = perp_intersect(
            &Vector2::new(0.0, 50.0),
            &Vector2::new(0.0, 0.0),
            &Vector2::new(100.0, 0.0),
        );
        assert_eq!(foot, Vector2::new(0.0, 0.0));

        // Diagonal line, the foot of (2, 0) on y = x is (1, 1)
        let foot = perp_intersect(
            &Vector2::new(2.0, 0.0),
            &Vector2::new(0.0, 0.0),
            &Vector2::new(10.0, 10.0),
        );
        assert!((foot - Vector2::new(1.0, 1.0)).norm() < 1e-9);

        // The line is infinite, so points beyond the end still project onto it
        let foot = perp_intersect(
            &Vector2::new(150.0, -20.0),
            &Vector2::new(0.0, 0.0),
            &Vector2::new(100.0, 0.0),
        );
        assert_eq!(foot, Vector2::new(150.0, 0.0));

        // Degenerate line
        let foot = perp_intersect(
            &Vector2::new(3.0, 4.0),
            &Vector2::new(1.0, 1.0),
            &Vector2::new(1.0, 1.0),
        );
        assert_eq!(foot, Vector2::new(1.0, 1.0));
    }

    #[test]
    fn test_wrap_deg() {
        assert_eq!(wrap_deg(370f64), 10f64);
        assert_eq!(wrap_deg(-90f64), 270f64);
        assert_eq!(wrap_deg(360f64), 0f64);
        assert_eq!(wrap_deg(45f64), 45f64);
    }
}
