//! Gridded density fields of track activity on an arbitrary lon-lat grid.
//!
//! Four point-selection semantics ([`DensityBy`]), two aggregation strategies
//! ([`DensityMethod`]) and optional spherical-area normalization. Genesis and
//! lysis densities can exclude tracks born/dying on a configured month-day, to
//! suppress spurious births and deaths caused by the tracking period starting or
//! ending mid-dataset.

use itertools::Itertools;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, Kilometer, LabelMap, Meter, TrackId, EARTH_RADIUS, KM2M};
use crate::geo::{cell_bounds, cell_centres, great_circle, grid_cell_areas};
use crate::stormtrack_errors::StormtrackError;
use crate::trackrun::{Subset, TrackRun};

/// Which records of the selected tracks enter the density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityBy {
    /// Every record of every track.
    Point,
    /// Each track at most once per cell or radius disc.
    Track,
    /// First record of every track, minus the exclusion window.
    Genesis,
    /// Last record of every track, minus the exclusion window.
    Lysis,
}

impl std::str::FromStr for DensityBy {
    type Err = StormtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "point" => Ok(DensityBy::Point),
            "track" => Ok(DensityBy::Track),
            "genesis" => Ok(DensityBy::Genesis),
            "lysis" => Ok(DensityBy::Lysis),
            other => Err(StormtrackError::Argument(format!(
                "by={other} should be one of point|track|genesis|lysis"
            ))),
        }
    }
}

impl std::fmt::Display for DensityBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DensityBy::Point => "point",
            DensityBy::Track => "track",
            DensityBy::Genesis => "genesis",
            DensityBy::Lysis => "lysis",
        };
        write!(f, "{s}")
    }
}

/// Aggregation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityMethod {
    /// Occupancy count of the 2-D bin containing each point.
    Cell,
    /// Count of points within a fixed great-circle distance of each grid node.
    Radius,
}

impl std::str::FromStr for DensityMethod {
    type Err = StormtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cell" => Ok(DensityMethod::Cell),
            "radius" => Ok(DensityMethod::Radius),
            other => Err(StormtrackError::Argument(format!(
                "method={other} should be one of cell|radius"
            ))),
        }
    }
}

impl std::fmt::Display for DensityMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DensityMethod::Cell => "cell",
            DensityMethod::Radius => "radius",
        };
        write!(f, "{s}")
    }
}

/// Month-day window used to exclude tracks starting/ending exactly on the
/// tracking period boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u8,
    pub day: u8,
}

impl MonthDay {
    pub fn new(month: u8, day: u8) -> Self {
        Self { month, day }
    }

    fn matches(&self, epoch: hifitime::Epoch) -> bool {
        let (_, month, day, ..) = epoch.to_gregorian_utc();
        month == self.month && day == self.day
    }
}

/// Tuning parameters of the density engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityOptions {
    pub by: DensityBy,
    pub method: DensityMethod,
    /// `radius` only: disc radius in km (default ≈ 2° on Earth).
    pub dist_km: Kilometer,
    /// Genesis exclusion window; `None` disables it.
    pub exclude_first: Option<MonthDay>,
    /// Lysis exclusion window; `None` disables it.
    pub exclude_last: Option<MonthDay>,
    /// Input coordinate arrays are cell centres (`true`) or boundaries (`false`).
    pub grid_centres: bool,
    /// Normalize by true spherical cell area to counts per km².
    pub weight_by_area: bool,
    /// Radius of the planet in metres.
    pub r_planet: Meter,
}

impl Default for DensityOptions {
    fn default() -> Self {
        Self {
            by: DensityBy::Point,
            method: DensityMethod::Cell,
            dist_km: 222.0,
            exclude_first: Some(MonthDay::new(10, 1)),
            exclude_last: Some(MonthDay::new(4, 30)),
            grid_centres: true,
            weight_by_area: true,
            r_planet: EARTH_RADIUS,
        }
    }
}

/// A computed density field with its grid coordinates and provenance metadata.
#[derive(Debug, Clone)]
pub struct DensityField {
    /// Density values of shape (nlat, nlon), latitude-major.
    pub values: DMatrix<f64>,
    /// Longitude cell centres, degrees east.
    pub lon: Vec<Degree>,
    /// Latitude cell centres, degrees north.
    pub lat: Vec<Degree>,
    /// Physical units: `"1"`, `"per <area> km2"` or `"km-2"`.
    pub units: String,
    /// Subset the field was computed for.
    pub subset: String,
    pub by: DensityBy,
    pub method: DensityMethod,
}

impl TrackRun {
    /// Compute a density field of the subset's tracks on the given lon-lat grid.
    ///
    /// Grid handling: with `opts.grid_centres` the 1-D input arrays are bin
    /// centres and boundaries are derived by midpoint interpolation; otherwise the
    /// inputs are boundaries and the output coordinates are the derived centres.
    ///
    /// Arguments
    /// ---------
    /// * `lon1d`: longitude coordinates of shape (M,) or (M+1,), degrees
    /// * `lat1d`: latitude coordinates of shape (N,) or (N+1,), degrees
    /// * `subset`: category selection on this run; an empty subset yields an
    ///   all-zero field
    /// * `opts`: point selection, aggregation and normalization parameters
    ///
    /// Return
    /// ------
    /// * `Err(StormtrackError::Grid)` for non-ascending boundaries under cell
    ///   aggregation (checked before any accumulation); selection errors as in
    ///   [`TrackRun::select`]; otherwise the field of shape (N, M).
    ///
    /// See also
    /// --------
    /// * [`TrackRun::density_per_category`] — label-keyed dispatch over all categories.
    pub fn density(
        &self,
        lon1d: &[Degree],
        lat1d: &[Degree],
        subset: &Subset,
        opts: &DensityOptions,
    ) -> Result<DensityField, StormtrackError> {
        let (lon_bounds, lat_bounds, lon_centres, lat_centres) = if opts.grid_centres {
            (
                cell_bounds(lon1d)?,
                cell_bounds(lat1d)?,
                lon1d.to_vec(),
                lat1d.to_vec(),
            )
        } else {
            (
                lon1d.to_vec(),
                lat1d.to_vec(),
                cell_centres(lon1d)?,
                cell_centres(lat1d)?,
            )
        };

        if opts.method == DensityMethod::Cell {
            ensure_ascending(&lon_bounds, "longitude")?;
            ensure_ascending(&lat_bounds, "latitude")?;
        }

        let ids = self.select(subset)?;
        let selected = self.selected_points(&ids, opts);

        let nlat = lat_centres.len();
        let nlon = lon_centres.len();
        let mut values = DMatrix::zeros(nlat, nlon);

        let mut units = match opts.method {
            DensityMethod::Cell => {
                accumulate_cell(&mut values, &lon_bounds, &lat_bounds, &selected, opts.by);
                "1".to_string()
            }
            DensityMethod::Radius => {
                accumulate_radius(&mut values, &lon_centres, &lat_centres, &selected, opts);
                let disc_area = std::f64::consts::PI * opts.dist_km * opts.dist_km;
                format!("per {} km2", disc_area.round())
            }
        };

        if opts.weight_by_area {
            let areas = grid_cell_areas(&lon_bounds, &lat_bounds, opts.r_planet)?;
            for i in 0..nlat {
                for j in 0..nlon {
                    values[(i, j)] = values[(i, j)] / areas[(i, j)] * KM2M * KM2M;
                }
            }
            units = "km-2".to_string();
        }

        Ok(DensityField {
            values,
            lon: lon_centres,
            lat: lat_centres,
            units,
            subset: subset.label(),
            by: opts.by,
            method: opts.method,
        })
    }

    /// Run [`TrackRun::density`] once per known category label and collect the
    /// fields in a label-keyed map. The explicit, one-level counterpart of calling
    /// the density engine "without a subset" on a categorised run.
    pub fn density_per_category(
        &self,
        lon1d: &[Degree],
        lat1d: &[Degree],
        opts: &DensityOptions,
    ) -> Result<LabelMap<DensityField>, StormtrackError> {
        if !self.is_categorised() {
            return Err(StormtrackError::NotCategorised);
        }
        let mut result = LabelMap::default();
        for label in self.cat_labels() {
            let field = self.density(lon1d, lat1d, &Subset::from(label.clone()), opts)?;
            result.insert(label, field);
        }
        Ok(result)
    }

    /// Flatten the subset's tracks into the `(track id, lon, lat)` points the
    /// aggregation methods consume, honouring the `by` semantics and the
    /// genesis/lysis exclusion windows. Ordered by ascending track id.
    fn selected_points(
        &self,
        ids: &[TrackId],
        opts: &DensityOptions,
    ) -> Vec<(TrackId, Degree, Degree)> {
        let mut selected = Vec::new();
        for &id in ids {
            let track = &self.tracks()[id];
            match opts.by {
                DensityBy::Point | DensityBy::Track => {
                    selected.extend(track.points().iter().map(|p| (id, p.lon, p.lat)));
                }
                DensityBy::Genesis => {
                    let first = track.first();
                    let excluded = opts
                        .exclude_first
                        .is_some_and(|window| window.matches(first.time));
                    if !excluded {
                        selected.push((id, first.lon, first.lat));
                    }
                }
                DensityBy::Lysis => {
                    let last = track.last();
                    let excluded = opts
                        .exclude_last
                        .is_some_and(|window| window.matches(last.time));
                    if !excluded {
                        selected.push((id, last.lon, last.lat));
                    }
                }
            }
        }
        selected
    }
}

/// Fail on a boundary array that is not strictly ascending.
fn ensure_ascending(bounds: &[f64], axis: &'static str) -> Result<(), StormtrackError> {
    if bounds.windows(2).any(|w| w[1] <= w[0]) {
        return Err(StormtrackError::Grid { axis });
    }
    Ok(())
}

/// Index of the bin containing `v`, under the convention `[b_j, b_{j+1})` with the
/// topmost boundary inclusive. `None` for points outside the grid.
fn bin_index(bounds: &[f64], v: f64) -> Option<usize> {
    let n = bounds.len();
    if v < bounds[0] || v > bounds[n - 1] {
        return None;
    }
    let idx = bounds.partition_point(|&b| b <= v);
    Some((idx - 1).min(n - 2))
}

/// Bin-occupancy aggregation. With `by = track`, a track increments a given cell
/// at most once however many of its records land there.
fn accumulate_cell(
    values: &mut DMatrix<f64>,
    lon_bounds: &[f64],
    lat_bounds: &[f64],
    selected: &[(TrackId, Degree, Degree)],
    by: DensityBy,
) {
    if by == DensityBy::Track {
        for (_, chunk) in &selected.iter().chunk_by(|(id, _, _)| *id) {
            let cells: Vec<(usize, usize)> = chunk
                .filter_map(|&(_, lon, lat)| {
                    Some((bin_index(lat_bounds, lat)?, bin_index(lon_bounds, lon)?))
                })
                .unique()
                .collect();
            for (i, j) in cells {
                values[(i, j)] += 1.0;
            }
        }
    } else {
        for &(_, lon, lat) in selected {
            if let (Some(i), Some(j)) = (bin_index(lat_bounds, lat), bin_index(lon_bounds, lon)) {
                values[(i, j)] += 1.0;
            }
        }
    }
}

/// Disc-kernel aggregation: every grid node counts the points (or distinct
/// tracks) within `dist_km` of it.
fn accumulate_radius(
    values: &mut DMatrix<f64>,
    lon_centres: &[f64],
    lat_centres: &[f64],
    selected: &[(TrackId, Degree, Degree)],
    opts: &DensityOptions,
) {
    let radius_m = opts.dist_km * KM2M;
    for (i, &node_lat) in lat_centres.iter().enumerate() {
        for (j, &node_lon) in lon_centres.iter().enumerate() {
            let mut count = 0.0;
            if opts.by == DensityBy::Track {
                // `selected` is ordered by track id, so one flag per id suffices.
                let mut counted_id: Option<TrackId> = None;
                for &(id, lon, lat) in selected {
                    if counted_id == Some(id) {
                        continue;
                    }
                    if great_circle(lon, lat, node_lon, node_lat, opts.r_planet) < radius_m {
                        count += 1.0;
                        counted_id = Some(id);
                    }
                }
            } else {
                for &(_, lon, lat) in selected {
                    if great_circle(lon, lat, node_lon, node_lat, opts.r_planet) < radius_m {
                        count += 1.0;
                    }
                }
            }
            values[(i, j)] = count;
        }
    }
}
