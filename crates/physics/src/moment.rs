//! Moments of inertia for the basic shapes, about the body's origin.

use glam::DVec2;

/// Solid box of `width` x `height` centered on the body.
pub fn moment_for_box(mass: f64, width: f64, height: f64) -> f64 {
    mass * (width * width + height * height) / 12.0
}

/// Hollow circle (ring) between `inner_radius` and `outer_radius`, whose
/// center sits at `offset` from the body.
pub fn moment_for_circle(mass: f64, inner_radius: f64, outer_radius: f64, offset: DVec2) -> f64 {
    mass * (0.5 * (inner_radius * inner_radius + outer_radius * outer_radius)
        + offset.length_squared())
}

/// Thin rod from `a` to `b`.
pub fn moment_for_segment(mass: f64, a: DVec2, b: DVec2) -> f64 {
    let center = (a + b) * 0.5;
    mass * (a.distance_squared(b) / 12.0 + center.length_squared())
}

/// Solid polygon with vertices shifted by `offset`. Winding may be either
/// direction. Degenerate polygons (zero area) yield 0.
pub fn moment_for_poly(mass: f64, verts: &[DVec2], offset: DVec2) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, v) in verts.iter().enumerate() {
        let v1 = *v + offset;
        let v2 = verts[(i + 1) % verts.len()] + offset;
        let cross = v2.perp_dot(v1);
        numerator += cross * (v1.dot(v1) + v1.dot(v2) + v2.dot(v2));
        denominator += cross;
    }
    if denominator == 0.0 {
        return 0.0;
    }
    mass * numerator / (6.0 * denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poly_box_matches_box_formula() {
        let verts = [
            DVec2::new(-2.0, -1.0),
            DVec2::new(-2.0, 1.0),
            DVec2::new(2.0, 1.0),
            DVec2::new(2.0, -1.0),
        ];
        let poly = moment_for_poly(3.0, &verts, DVec2::ZERO);
        let boxed = moment_for_box(3.0, 4.0, 2.0);
        assert!((poly - boxed).abs() < 1e-9);
    }

    #[test]
    fn poly_winding_does_not_matter() {
        let mut verts = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(0.0, 10.0),
        ];
        let a = moment_for_poly(1.0, &verts, DVec2::ZERO);
        verts.reverse();
        let b = moment_for_poly(1.0, &verts, DVec2::ZERO);
        assert!(a > 0.0);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn circle_offset_uses_parallel_axis() {
        let centered = moment_for_circle(2.0, 0.0, 5.0, DVec2::ZERO);
        assert!((centered - 25.0).abs() < 1e-12);
        let shifted = moment_for_circle(2.0, 0.0, 5.0, DVec2::new(3.0, 4.0));
        assert!((shifted - (centered + 2.0 * 25.0)).abs() < 1e-12);
    }

    #[test]
    fn centered_segment_is_rod() {
        let m = moment_for_segment(6.0, DVec2::new(-5.0, 0.0), DVec2::new(5.0, 0.0));
        assert!((m - 50.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_poly_is_zero() {
        let line = [DVec2::ZERO, DVec2::X, DVec2::new(2.0, 0.0)];
        assert_eq!(moment_for_poly(1.0, &line, DVec2::ZERO), 0.0);
    }
}
