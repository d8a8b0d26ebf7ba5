//! Combined spatial-temporal trajectory dissimilarity (the BS2000 metric).
//!
//! Used by the `bs2000` matching method to fill the pairwise distance matrix
//! between two track collections.

use crate::constants::{Degree, Hours, Meter, FILLVAL, KM2M};
use crate::geo::great_circle;

/// Dissimilarity of two full trajectories, in kilometres.
///
/// The score is a symmetrised, time-penalised point-set distance: for each record
/// of one trajectory, the closest record of the other is found under the combined
/// cost `sqrt(d² + (β·Δt)²)` with `d` the great-circle separation in km and `Δt`
/// the time offset in hours; the metric is the mean of those minima, averaged over
/// both directions:
///
/// ```text
/// cost(p, Q) = min over q in Q of sqrt(d_gc(p, q)² + (β·Δt(p, q))²)
/// D(A, B)    = ½ · (mean over p in A of cost(p, B) + mean over q in B of cost(q, A))
/// ```
///
/// `beta` converts one hour of temporal offset into kilometres, so it acts as a
/// characteristic propagation speed: larger `beta` penalizes time misalignment more
/// strongly relative to spatial separation.
///
/// Arguments
/// ---------
/// * `x1`, `y1`, `t1`: lon (deg), lat (deg) and time (hours) arrays of the first trajectory
/// * `x2`, `y2`, `t2`: same for the second trajectory
/// * `beta`: km of penalty per hour of time offset
/// * `r_planet`: radius of the planet in metres
///
/// Return
/// ------
/// * A non-negative, symmetric, always finite score. Trajectories with disjoint
///   time spans simply produce a large (but finite) value through the `β·Δt` term;
///   there is no infinity/NaN escape. Zero iff the trajectories carry identical
///   positions at identical times.
pub fn distance_metric(
    x1: &[Degree],
    y1: &[Degree],
    t1: &[Hours],
    x2: &[Degree],
    y2: &[Degree],
    t2: &[Hours],
    beta: f64,
    r_planet: Meter,
) -> f64 {
    if x1.is_empty() || x2.is_empty() {
        // Degenerate input: keep the sentinel so callers never mistake it for a match.
        return FILLVAL;
    }
    0.5 * (one_sided(x1, y1, t1, x2, y2, t2, beta, r_planet)
        + one_sided(x2, y2, t2, x1, y1, t1, beta, r_planet))
}

/// Mean over the records of trajectory A of the combined-cost distance to the
/// closest record of trajectory B.
#[allow(clippy::too_many_arguments)]
fn one_sided(
    xa: &[Degree],
    ya: &[Degree],
    ta: &[Hours],
    xb: &[Degree],
    yb: &[Degree],
    tb: &[Hours],
    beta: f64,
    r_planet: Meter,
) -> f64 {
    let mut acc = 0.0;
    for i in 0..xa.len() {
        let mut best = f64::INFINITY;
        for j in 0..xb.len() {
            let d_km = great_circle(xa[i], ya[i], xb[j], yb[j], r_planet) / KM2M;
            let dt_h = ta[i] - tb[j];
            let cost = (d_km * d_km + (beta * dt_h) * (beta * dt_h)).sqrt();
            if cost < best {
                best = cost;
            }
        }
        acc += best;
    }
    acc / xa.len() as f64
}

#[cfg(test)]
mod metric_test {
    use super::*;
    use crate::constants::EARTH_RADIUS;

    const BETA: f64 = 100.0;

    #[test]
    fn test_identical_trajectories_have_zero_distance() {
        let x = [0.0, 1.0, 2.0];
        let y = [60.0, 60.5, 61.0];
        let t = [0.0, 3.0, 6.0];
        let d = distance_metric(&x, &y, &t, &x, &y, &t, BETA, EARTH_RADIUS);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_symmetry() {
        let (x1, y1, t1) = ([0.0, 1.0], [60.0, 61.0], [0.0, 3.0]);
        let (x2, y2, t2) = ([5.0, 6.0, 7.0], [58.0, 58.5, 59.0], [1.0, 4.0, 7.0]);
        let ab = distance_metric(&x1, &y1, &t1, &x2, &y2, &t2, BETA, EARTH_RADIUS);
        let ba = distance_metric(&x2, &y2, &t2, &x1, &y1, &t1, BETA, EARTH_RADIUS);
        assert!((ab - ba).abs() < 1e-12);
        assert!(ab > 0.0);
    }

    #[test]
    fn test_beta_scales_temporal_penalty() {
        // Same positions, pure time shift: distance must grow with beta.
        let x = [0.0, 1.0];
        let y = [60.0, 60.0];
        let t1 = [0.0, 3.0];
        let t2 = [12.0, 15.0];
        let weak = distance_metric(&x, &y, &t1, &x, &y, &t2, 10.0, EARTH_RADIUS);
        let strong = distance_metric(&x, &y, &t1, &x, &y, &t2, 200.0, EARTH_RADIUS);
        assert!(strong > weak);
    }

    #[test]
    fn test_disjoint_time_spans_are_finite() {
        let x = [0.0];
        let y = [60.0];
        let far_future = [1e6];
        let now = [0.0];
        let d = distance_metric(&x, &y, &now, &x, &y, &far_future, BETA, EARTH_RADIUS);
        assert!(d.is_finite());
        assert!(d > 1e6);
    }

    #[test]
    fn test_different_lengths_are_well_defined() {
        let d = distance_metric(
            &[0.0, 1.0, 2.0, 3.0],
            &[60.0, 60.0, 60.0, 60.0],
            &[0.0, 3.0, 6.0, 9.0],
            &[0.5],
            &[60.2],
            &[3.0],
            BETA,
            EARTH_RADIUS,
        );
        assert!(d.is_finite());
        assert!(d >= 0.0);
    }
}
