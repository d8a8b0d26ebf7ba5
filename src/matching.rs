//! Track-to-track matching between a run and an independent source.
//!
//! Three interchangeable algorithms, selected by [`MatchMethod`]:
//!
//! * `intersection` — exact time alignment plus a proximity/lifetime criterion;
//!   greedy, first qualifying candidate wins.
//! * `simple` — interpolation-based alignment; per other-track, the candidate with
//!   the largest within-radius sample count wins.
//! * `bs2000` — mutual nearest neighbours under the combined spatial-temporal
//!   trajectory metric of [`crate::metric`].
//!
//! Candidate enumeration order is ascending track id on both sides. For the two
//! greedy methods this order is observable in the output when several candidates
//! qualify, so it is part of the contract, not an accident.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::constants::{Kilometer, LabelMap, Meter, TrackId, EARTH_RADIUS, FILLVAL, KM2M};
use crate::geo::great_circle;
use crate::metric::distance_metric;
use crate::progress::Progress;
use crate::stormtrack_errors::StormtrackError;
use crate::track::{Track, TrackPoint};
use crate::trackrun::{Subset, TrackRun};

/// A matched `(self track id, other track id)` pair.
pub type MatchPair = (TrackId, TrackId);

/// Matching algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Intersection,
    Simple,
    Bs2000,
}

impl std::str::FromStr for MatchMethod {
    type Err = StormtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intersection" => Ok(MatchMethod::Intersection),
            "simple" => Ok(MatchMethod::Simple),
            "bs2000" => Ok(MatchMethod::Bs2000),
            other => Err(StormtrackError::Argument(format!(
                "unknown method: {other}, expected one of intersection|simple|bs2000"
            ))),
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchMethod::Intersection => "intersection",
            MatchMethod::Simple => "simple",
            MatchMethod::Bs2000 => "bs2000",
        };
        write!(f, "{s}")
    }
}

/// Direction of the interpolation performed by the `simple` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolateTo {
    /// Interpolate the self track's positions onto the other track's timestamps.
    Other,
    /// Interpolate the other track's positions onto the self track's timestamps.
    SelfTrack,
}

impl std::str::FromStr for InterpolateTo {
    type Err = StormtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "other" => Ok(InterpolateTo::Other),
            "self" => Ok(InterpolateTo::SelfTrack),
            other => Err(StormtrackError::Argument(format!(
                "interpolate_to={other} should be one of other|self"
            ))),
        }
    }
}

/// Tuning parameters shared by the three matching algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOptions {
    pub method: MatchMethod,
    /// `simple` only: direction of the time interpolation.
    pub interpolate_to: InterpolateTo,
    /// `intersection`/`simple`: proximity radius between matched vortices, km.
    pub thresh_dist_km: Kilometer,
    /// `intersection`/`simple`: fraction of a vortex lifetime (or sample count)
    /// used as the alignment threshold.
    pub time_frac: f64,
    /// `bs2000` only: km of metric penalty per hour of temporal offset
    /// (a characteristic steering speed).
    pub beta: f64,
    /// Radius of the planet in metres.
    pub r_planet: Meter,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            method: MatchMethod::Simple,
            interpolate_to: InterpolateTo::Other,
            thresh_dist_km: 250.0,
            time_frac: 0.5,
            beta: 100.0,
            r_planet: EARTH_RADIUS,
        }
    }
}

/// The collection the self run is matched against: another run, or a plain list
/// of tracks from some external source. Other shapes are unrepresentable.
#[derive(Clone, Copy)]
pub enum MatchTarget<'a> {
    Run(&'a TrackRun),
    List(&'a [Track]),
}

impl<'a> MatchTarget<'a> {
    fn tracks(&self) -> &'a [Track] {
        match self {
            MatchTarget::Run(run) => run.tracks(),
            MatchTarget::List(tracks) => tracks,
        }
    }
}

impl<'a> From<&'a TrackRun> for MatchTarget<'a> {
    fn from(run: &'a TrackRun) -> Self {
        MatchTarget::Run(run)
    }
}

impl<'a> From<&'a [Track]> for MatchTarget<'a> {
    fn from(tracks: &'a [Track]) -> Self {
        MatchTarget::List(tracks)
    }
}

impl<'a> From<&'a Vec<Track>> for MatchTarget<'a> {
    fn from(tracks: &'a Vec<Track>) -> Self {
        MatchTarget::List(tracks.as_slice())
    }
}

impl TrackRun {
    /// Match the tracks of a subset of this run against another collection.
    ///
    /// The subset restricts this run only; `others` always contributes all of its
    /// tracks. An empty subset or an empty other collection yields an empty pair
    /// list, never an error.
    ///
    /// Arguments
    /// ---------
    /// * `others`: the other collection (a run or a plain track list)
    /// * `subset`: category selection on this run
    /// * `opts`: algorithm and tuning parameters
    ///
    /// Return
    /// ------
    /// * Matched `(self id, other id)` pairs, ordered by the enumeration order of
    ///   the algorithm (ascending self id for `intersection`/`bs2000`, ascending
    ///   other id for `simple`).
    ///
    /// See also
    /// --------
    /// * [`TrackRun::match_tracks_per_category`] — label-keyed dispatch over all categories.
    /// * [`TrackRun::bs2000_distance_matrix`] — the raw matrix behind `bs2000`.
    pub fn match_tracks<'a>(
        &self,
        others: impl Into<MatchTarget<'a>>,
        subset: &Subset,
        opts: &MatchOptions,
    ) -> Result<Vec<MatchPair>, StormtrackError> {
        let others = others.into().tracks();
        let sub_ids = self.select(subset)?;
        if sub_ids.is_empty() || others.is_empty() {
            return Ok(Vec::new());
        }
        Ok(match opts.method {
            MatchMethod::Intersection => self.match_intersection(&sub_ids, others, opts),
            MatchMethod::Simple => self.match_simple(&sub_ids, others, opts),
            MatchMethod::Bs2000 => {
                let matrix = bs2000_matrix(self, &sub_ids, others, opts.beta, opts.r_planet);
                mutual_nearest_pairs(&matrix, &sub_ids)
            }
        })
    }

    /// Run [`TrackRun::match_tracks`] once per known category label and collect the
    /// results in a label-keyed map. The explicit, one-level counterpart of
    /// calling the matcher "without a subset" on a categorised run.
    pub fn match_tracks_per_category<'a>(
        &self,
        others: impl Into<MatchTarget<'a>>,
        opts: &MatchOptions,
    ) -> Result<LabelMap<Vec<MatchPair>>, StormtrackError> {
        if !self.is_categorised() {
            return Err(StormtrackError::NotCategorised);
        }
        let others = others.into();
        let mut result = LabelMap::default();
        for label in self.cat_labels() {
            let pairs = self.match_tracks(others, &Subset::from(label.clone()), opts)?;
            result.insert(label, pairs);
        }
        Ok(result)
    }

    /// Full pairwise trajectory distance matrix used by the `bs2000` method.
    ///
    /// Rows follow the subset's tracks in ascending id order, columns the other
    /// collection's tracks. Entries start at the [`FILLVAL`] sentinel; a sentinel
    /// can never be mistaken for a computed zero distance.
    pub fn bs2000_distance_matrix<'a>(
        &self,
        others: impl Into<MatchTarget<'a>>,
        subset: &Subset,
        beta: f64,
        r_planet: Meter,
    ) -> Result<DMatrix<f64>, StormtrackError> {
        let others = others.into().tracks();
        let sub_ids = self.select(subset)?;
        Ok(bs2000_matrix(self, &sub_ids, others, beta, r_planet))
    }

    /// Greedy exact-time matching: the first other track satisfying both the
    /// alignment and the proximity criterion claims the self track.
    fn match_intersection(
        &self,
        sub_ids: &[TrackId],
        others: &[Track],
        opts: &MatchOptions,
    ) -> Vec<MatchPair> {
        let mut pairs = Vec::new();
        let pbar = Progress::new(sub_ids.len());
        for &i in sub_ids {
            let ct = &self.tracks()[i];
            for (j, other) in others.iter().enumerate() {
                let aligned = aligned_records(ct, other);
                if aligned.is_empty() {
                    continue;
                }
                // Spacing of the aligned samples; a single aligned pair falls back
                // to the run's own time step.
                let step_h = if aligned.len() > 1 {
                    let (a, b) = (
                        aligned[aligned.len() - 2].0.time,
                        aligned[aligned.len() - 1].0.time,
                    );
                    (b - a).to_unit(hifitime::Unit::Hour)
                } else {
                    self.tstep_h().unwrap_or(0.0)
                };
                let time_thresh_h = opts.time_frac * other.lifetime_h();
                let n_close = aligned
                    .iter()
                    .filter(|(a, b)| {
                        great_circle(a.lon, a.lat, b.lon, b.lat, opts.r_planet)
                            < opts.thresh_dist_km * KM2M
                    })
                    .count();
                if aligned.len() as f64 * step_h > time_thresh_h
                    && n_close as f64 * step_h > time_thresh_h
                {
                    pairs.push((i, j));
                    break;
                }
            }
            pbar.tick();
        }
        pbar.finish();
        pairs
    }

    /// Interpolation-based matching: for each other track, the self candidate with
    /// the most within-radius aligned samples wins; ties go to the
    /// later-enumerated (larger id) candidate via the stable sort below.
    fn match_simple(
        &self,
        sub_ids: &[TrackId],
        others: &[Track],
        opts: &MatchOptions,
    ) -> Vec<MatchPair> {
        let mut pairs = Vec::new();
        let pbar = Progress::new(others.len());
        for (j, other) in others.iter().enumerate() {
            let mut candidates: Vec<(TrackId, usize)> = Vec::new();
            for &i in sub_ids {
                let ct = &self.tracks()[i];
                let (donor, target) = match opts.interpolate_to {
                    InterpolateTo::Other => (ct, other),
                    InterpolateTo::SelfTrack => (other, ct),
                };
                if let Some(n_within) = within_radius_count(donor, target, opts) {
                    if (n_within as f64) > opts.time_frac * target.len() as f64 {
                        candidates.push((i, n_within));
                    }
                }
            }
            // Stable sort by count: equal counts keep ascending-id order, so the
            // last element is the largest-count candidate, ties to the larger id.
            candidates.sort_by_key(|&(_, count)| count);
            if let Some(&(winner, _)) = candidates.last() {
                pairs.push((winner, j));
            }
            pbar.tick();
        }
        pbar.finish();
        pairs
    }
}

/// Exactly time-aligned record pairs of two time-ordered tracks (two-pointer merge).
fn aligned_records<'a>(a: &'a Track, b: &'a Track) -> Vec<(&'a TrackPoint, &'a TrackPoint)> {
    let (pa, pb) = (a.points(), b.points());
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < pa.len() && j < pb.len() {
        let (ta, tb) = (pa[i].time, pb[j].time);
        if ta == tb {
            out.push((&pa[i], &pb[j]));
            i += 1;
            j += 1;
        } else if ta < tb {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Number of target records whose donor-interpolated counterpart lies within the
/// proximity radius. `None` when the two time spans do not overlap.
///
/// Interpolated samples outside the donor's span are discarded; each surviving
/// sample is compared against the target record *at the same timestamp*.
fn within_radius_count(donor: &Track, target: &Track, opts: &MatchOptions) -> Option<usize> {
    let overlap_start = if donor.first().time > target.first().time {
        donor.first().time
    } else {
        target.first().time
    };
    let overlap_end = if donor.last().time < target.last().time {
        donor.last().time
    } else {
        target.last().time
    };
    if (overlap_end - overlap_start).to_unit(hifitime::Unit::Hour) <= 0.0 {
        return None;
    }
    let mut n_within = 0;
    for tp in target.points() {
        if let Some((lon, lat)) = donor.interp_lonlat(tp.time) {
            if great_circle(lon, lat, tp.lon, tp.lat, opts.r_planet) < opts.thresh_dist_km * KM2M {
                n_within += 1;
            }
        }
    }
    Some(n_within)
}

/// Fill the N×M matrix of trajectory distances between the subset's tracks (rows)
/// and the other collection's tracks (columns).
fn bs2000_matrix(
    run: &TrackRun,
    sub_ids: &[TrackId],
    others: &[Track],
    beta: f64,
    r_planet: Meter,
) -> DMatrix<f64> {
    let mut matrix = DMatrix::from_element(sub_ids.len(), others.len(), FILLVAL);
    let coords = |t: &Track| {
        let lon: Vec<f64> = t.points().iter().map(|p| p.lon).collect();
        let lat: Vec<f64> = t.points().iter().map(|p| p.lat).collect();
        (lon, lat, t.times_h())
    };
    let other_coords: Vec<_> = others.iter().map(coords).collect();

    let pbar = Progress::new(sub_ids.len());
    for (row, &i) in sub_ids.iter().enumerate() {
        let (x1, y1, t1) = coords(&run.tracks()[i]);
        for (col, (x2, y2, t2)) in other_coords.iter().enumerate() {
            matrix[(row, col)] = distance_metric(&x1, &y1, &t1, x2, y2, t2, beta, r_planet);
        }
        pbar.tick();
    }
    pbar.finish();
    matrix
}

/// Mutual-nearest-neighbour pairs of a distance matrix.
///
/// A pair `(row, col)` is kept iff `col` minimizes its row **and** `row` minimizes
/// its column; rows with no mutual partner produce no pair. Sentinel-only rows or
/// columns never match.
fn mutual_nearest_pairs(matrix: &DMatrix<f64>, sub_ids: &[TrackId]) -> Vec<MatchPair> {
    let (nrows, ncols) = matrix.shape();
    let row_argmin: Vec<Option<usize>> = (0..nrows)
        .map(|r| argmin((0..ncols).map(|c| matrix[(r, c)])))
        .collect();
    let col_argmin: Vec<Option<usize>> = (0..ncols)
        .map(|c| argmin((0..nrows).map(|r| matrix[(r, c)])))
        .collect();

    let mut pairs = Vec::new();
    for (r, best_col) in row_argmin.iter().enumerate() {
        if let Some(c) = *best_col {
            if col_argmin[c] == Some(r) && matrix[(r, c)] < FILLVAL {
                pairs.push((sub_ids[r], c));
            }
        }
    }
    pairs
}

fn argmin(values: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, v) in values.enumerate() {
        if best.is_none_or(|(_, b)| v < b) {
            best = Some((idx, v));
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod matching_test {
    use super::*;
    use hifitime::Epoch;

    fn epoch(h: u8) -> Epoch {
        Epoch::from_gregorian_utc(2019, 2, 1, h, 0, 0, 0)
    }

    fn straight_track(lon0: f64, lat0: f64, start_h: u8, n: usize) -> Track {
        let coords: Vec<(f64, f64, Epoch)> = (0..n)
            .map(|k| (lon0 + k as f64, lat0, epoch(start_h + 3 * k as u8)))
            .collect();
        Track::from_lonlat_times(&coords).unwrap()
    }

    #[test]
    fn test_aligned_records_two_pointer() {
        let a = straight_track(0.0, 60.0, 0, 4); // 0, 3, 6, 9 h
        let b = straight_track(0.5, 60.0, 3, 4); // 3, 6, 9, 12 h
        let aligned = aligned_records(&a, &b);
        assert_eq!(aligned.len(), 3);
        assert_eq!(aligned[0].0.time, epoch(3));
        assert_eq!(aligned[2].1.time, epoch(9));
    }

    #[test]
    fn test_method_strings() {
        assert_eq!("bs2000".parse::<MatchMethod>().unwrap(), MatchMethod::Bs2000);
        assert!(matches!(
            "nearest".parse::<MatchMethod>(),
            Err(StormtrackError::Argument(_))
        ));
        assert!(matches!(
            "sideways".parse::<InterpolateTo>(),
            Err(StormtrackError::Argument(_))
        ));
    }

    #[test]
    fn test_mutual_nearest_pairs_property() {
        // Row 0 and column 1 prefer each other; row 1's favourite (column 1) does
        // not reciprocate, so row 1 stays unmatched.
        let matrix = DMatrix::from_row_slice(2, 2, &[5.0, 1.0, 4.0, 3.0]);
        let pairs = mutual_nearest_pairs(&matrix, &[0, 1]);
        assert_eq!(pairs, vec![(0, 1)]);
        for &(i, j) in &pairs {
            let row_best = argmin((0..2).map(|c| matrix[(i, c)])).unwrap();
            let col_best = argmin((0..2).map(|r| matrix[(r, j)])).unwrap();
            assert_eq!(row_best, j);
            assert_eq!(col_best, i);
        }
    }

    #[test]
    fn test_sentinel_rows_never_match() {
        let matrix = DMatrix::from_element(2, 2, crate::constants::FILLVAL);
        assert!(mutual_nearest_pairs(&matrix, &[0, 1]).is_empty());
    }
}
