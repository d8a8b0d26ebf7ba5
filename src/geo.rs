//! Spherical geometry primitives: great-circle distance, grid cell bounds/centres
//! and spherical cell areas for a longitude-latitude grid.

use nalgebra::DMatrix;

use crate::constants::{Degree, Meter};
use crate::stormtrack_errors::StormtrackError;

/// Great-circle distance between two points on a sphere, in metres.
///
/// Uses the haversine form of the spherical law of cosines, which is numerically
/// stable both for nearly coincident and for nearly antipodal points.
///
/// Arguments
/// ---------
/// * `lon1`, `lat1`: first point, in degrees
/// * `lon2`, `lat2`: second point, in degrees
/// * `r_planet`: radius of the planet, in metres
///
/// Return
/// ------
/// * Distance along the sphere surface, in metres. Symmetric in its two points and
///   zero exactly when they coincide (modulo longitude wrap).
pub fn great_circle(
    lon1: Degree,
    lat1: Degree,
    lon2: Degree,
    lat2: Degree,
    r_planet: Meter,
) -> Meter {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let half_dphi = 0.5 * (phi2 - phi1);
    let half_dlam = 0.5 * (lon2 - lon1).to_radians();

    let h = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlam.sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal pairs; asin would then NaN.
    let c = 2.0 * h.sqrt().clamp(0.0, 1.0).asin();
    r_planet * c
}

/// Derive the N+1 cell boundaries from N monotonic cell-centre coordinates.
///
/// Inner boundaries are midpoints between adjacent centres; the two end boundaries
/// are linearly extrapolated from the first and last centre spacing.
///
/// Arguments
/// ---------
/// * `centres`: at least two monotonically increasing (or decreasing) coordinates
///
/// Return
/// ------
/// * `Ok(bounds)` with `bounds.len() == centres.len() + 1`
/// * `Err(StormtrackError::Argument)` if fewer than two centres are given
pub fn cell_bounds(centres: &[f64]) -> Result<Vec<f64>, StormtrackError> {
    if centres.len() < 2 {
        return Err(StormtrackError::Argument(format!(
            "cell_bounds needs at least 2 centre coordinates, got {}",
            centres.len()
        )));
    }
    let n = centres.len();
    let mut bounds = Vec::with_capacity(n + 1);
    bounds.push(centres[0] - 0.5 * (centres[1] - centres[0]));
    for w in centres.windows(2) {
        bounds.push(0.5 * (w[0] + w[1]));
    }
    bounds.push(centres[n - 1] + 0.5 * (centres[n - 1] - centres[n - 2]));
    Ok(bounds)
}

/// Derive the N-1 cell centres from N cell-boundary coordinates by midpoint
/// interpolation. Inverse companion of [`cell_bounds`].
pub fn cell_centres(bounds: &[f64]) -> Result<Vec<f64>, StormtrackError> {
    if bounds.len() < 2 {
        return Err(StormtrackError::Argument(format!(
            "cell_centres needs at least 2 boundary coordinates, got {}",
            bounds.len()
        )));
    }
    Ok(bounds.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect())
}

/// Spherical area of every cell of a lon-lat grid given by its boundaries, in m².
///
/// Each cell area is the spherical-cap sector `r² · Δλ · (sin φ₂ − sin φ₁)`, i.e. the
/// exact cos-latitude band weighting rather than a flat-plane approximation.
///
/// Arguments
/// ---------
/// * `lon_bounds`: longitude boundaries of shape (M+1,), degrees
/// * `lat_bounds`: latitude boundaries of shape (N+1,), degrees
/// * `r_planet`: radius of the planet, in metres
///
/// Return
/// ------
/// * `Ok(areas)` of shape (N, M), latitude-major like the density fields
pub fn grid_cell_areas(
    lon_bounds: &[Degree],
    lat_bounds: &[Degree],
    r_planet: Meter,
) -> Result<DMatrix<f64>, StormtrackError> {
    if lon_bounds.len() < 2 || lat_bounds.len() < 2 {
        return Err(StormtrackError::Argument(
            "grid_cell_areas needs at least 2 boundaries along each axis".to_string(),
        ));
    }
    let nlat = lat_bounds.len() - 1;
    let nlon = lon_bounds.len() - 1;
    let mut areas = DMatrix::zeros(nlat, nlon);
    for i in 0..nlat {
        let band = (lat_bounds[i + 1].to_radians().sin() - lat_bounds[i].to_radians().sin()).abs();
        for j in 0..nlon {
            let dlam = (lon_bounds[j + 1] - lon_bounds[j]).to_radians().abs();
            areas[(i, j)] = r_planet * r_planet * dlam * band;
        }
    }
    Ok(areas)
}
