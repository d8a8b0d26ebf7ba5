//! The results of one tracking experiment: an ordered collection of tracks with an
//! optional category table.
//!
//! A [`TrackRun`] is an immutable snapshot as far as the matching and density
//! engines are concerned: combining two runs ([`TrackRun::concat`]) or slicing one
//! in time ([`TrackRun::time_slice`]) produces a **new** run with a contiguous,
//! zero-based track id sequence, rather than mutating shared state. Categorisation
//! ([`TrackRun::classify`], [`TrackRun::categorise_by_percentile`]) populates the
//! category table that the matching and density engines use for subset dispatch.

use hifitime::Epoch;
use itertools::Itertools;

use crate::categories::{chained_labels, CatCondition, CategoryTable, CAT_SEP};
use crate::constants::{Degree, Hours, TrackId, TrackPoints};
use crate::progress::Progress;
use crate::stormtrack_errors::StormtrackError;
use crate::track::{Track, TrackPoint};

/// Selection of tracks to operate on: everything, or the intersection of one or
/// more category labels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Subset {
    /// All tracks of the run.
    #[default]
    All,
    /// Tracks carrying every one of the given labels.
    Cats(Vec<String>),
}

impl Subset {
    /// Human-readable name of the subset, used in result metadata.
    pub fn label(&self) -> String {
        match self {
            Subset::All => "all".to_string(),
            Subset::Cats(labels) => labels.join(","),
        }
    }
}

impl From<&str> for Subset {
    fn from(label: &str) -> Self {
        Subset::Cats(vec![label.to_string()])
    }
}

impl From<String> for Subset {
    fn from(label: String) -> Self {
        Subset::Cats(vec![label])
    }
}

impl From<Vec<String>> for Subset {
    fn from(labels: Vec<String>) -> Self {
        Subset::Cats(labels)
    }
}

/// Math operator used by [`TrackRun::categorise_by_percentile`] to compare a
/// per-track value against the percentile threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentileOper {
    Lt,
    Le,
    Gt,
    Ge,
}

impl PercentileOper {
    fn apply(self, value: f64, thresh: f64) -> bool {
        match self {
            PercentileOper::Lt => value < thresh,
            PercentileOper::Le => value <= thresh,
            PercentileOper::Gt => value > thresh,
            PercentileOper::Ge => value >= thresh,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            PercentileOper::Lt => "lt",
            PercentileOper::Le => "le",
            PercentileOper::Gt => "gt",
            PercentileOper::Ge => "ge",
        }
    }
}

impl std::str::FromStr for PercentileOper {
    type Err = StormtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lt" => Ok(PercentileOper::Lt),
            "le" => Ok(PercentileOper::Le),
            "gt" => Ok(PercentileOper::Gt),
            "ge" => Ok(PercentileOper::Ge),
            other => Err(StormtrackError::Argument(format!(
                "oper={other} should be one of lt|le|gt|ge"
            ))),
        }
    }
}

/// Ordered collection of tracks from one tracking run, keyed by position.
#[derive(Debug, Clone, Default)]
pub struct TrackRun {
    tracks: Vec<Track>,
    cats: Option<CategoryTable>,
    tstep_h: Option<Hours>,
}

impl TrackRun {
    /// An empty run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an ordered list of tracks; the position in the list becomes the track id.
    ///
    /// The run's sampling interval is taken from the first track with at least two
    /// records.
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        let tstep_h = tracks.iter().find_map(|t| t.tstep_h());
        Self {
            tracks,
            cats: None,
            tstep_h,
        }
    }

    /// Build a run from flat parallel arrays sharing one id column, the shape in
    /// which upstream loaders usually hand over tracking output.
    ///
    /// Records are grouped by `track_id` (groups ordered by ascending id) and each
    /// group must already be in strictly increasing time order.
    ///
    /// Arguments
    /// ---------
    /// * `track_id`: per-record track identifier (opaque; only grouping matters)
    /// * `lon`, `lat`: positions in degrees
    /// * `time`: absolute record timestamps
    ///
    /// Return
    /// ------
    /// * `Err(StormtrackError::Argument)` on mismatched array lengths;
    ///   per-track invariant violations surface as the corresponding track errors.
    pub fn from_batch(
        track_id: &[u32],
        lon: &[Degree],
        lat: &[Degree],
        time: &[Epoch],
    ) -> Result<Self, StormtrackError> {
        if track_id.len() != lon.len() || lon.len() != lat.len() || lat.len() != time.len() {
            return Err(StormtrackError::Argument(format!(
                "batch arrays must have equal lengths, got id={}, lon={}, lat={}, time={}",
                track_id.len(),
                lon.len(),
                lat.len(),
                time.len()
            )));
        }
        let mut grouped: std::collections::BTreeMap<u32, TrackPoints> =
            std::collections::BTreeMap::new();
        for (((&id, &x), &y), &t) in track_id.iter().zip(lon).zip(lat).zip(time) {
            grouped
                .entry(id)
                .or_default()
                .push(TrackPoint::new(x, y, t));
        }
        let tracks = grouped
            .into_values()
            .map(Track::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_tracks(tracks))
    }

    /// Number of tracks in the run.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// All tracks, in id order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// One track by id.
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id)
    }

    /// Sampling interval in hours, if any track had two or more records.
    pub fn tstep_h(&self) -> Option<Hours> {
        self.tstep_h
    }

    /// Whether a category table has been populated.
    pub fn is_categorised(&self) -> bool {
        self.cats.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Known category labels, in classification order.
    pub fn cat_labels(&self) -> Vec<String> {
        self.cats
            .as_ref()
            .map(|c| c.labels().to_vec())
            .unwrap_or_default()
    }

    /// Track ids belonging to a subset, ascending.
    ///
    /// `Subset::All` never fails; label selection on an uncategorised (non-empty)
    /// run fails with [`StormtrackError::NotCategorised`], and an unknown label
    /// with [`StormtrackError::Select`].
    pub fn select(&self, subset: &Subset) -> Result<Vec<TrackId>, StormtrackError> {
        if self.tracks.is_empty() {
            return Ok(Vec::new());
        }
        match subset {
            Subset::All => Ok((0..self.tracks.len()).collect()),
            Subset::Cats(labels) => {
                let cats = self.cats.as_ref().ok_or(StormtrackError::NotCategorised)?;
                cats.select_ids(labels)
            }
        }
    }

    /// Number of tracks in a subset.
    pub fn size(&self, subset: &Subset) -> Result<usize, StormtrackError> {
        Ok(self.select(subset)?.len())
    }

    /// Concatenate two runs into a new one, re-indexing track ids to a contiguous
    /// zero-based sequence and merging category tables (missing flags default to
    /// `false`).
    ///
    /// Consumes both runs: combination is an owned-value operation, never an
    /// in-place mutation visible to concurrent readers of either input.
    ///
    /// Return
    /// ------
    /// * `Err(StormtrackError::Concatenation)` when the two runs disagree on
    ///   categorisation metadata (both non-empty, only one categorised, or
    ///   different inclusive flags) or on the sampling interval.
    pub fn concat(self, other: TrackRun) -> Result<TrackRun, StormtrackError> {
        if !self.tracks.is_empty() && !other.tracks.is_empty() {
            if self.is_categorised() != other.is_categorised() {
                return Err(StormtrackError::Concatenation(
                    "categorisation metadata differs between the two runs".to_string(),
                ));
            }
            let inc_a = self.cats.as_ref().map(|c| c.is_inclusive());
            let inc_b = other.cats.as_ref().map(|c| c.is_inclusive());
            if let (Some(a), Some(b)) = (inc_a, inc_b) {
                if a != b {
                    return Err(StormtrackError::Concatenation(
                        "inclusive-category flags differ between the two runs".to_string(),
                    ));
                }
            }
        }
        let tstep_h = match (self.tstep_h, other.tstep_h) {
            (Some(a), Some(b)) if a != b => {
                return Err(StormtrackError::Concatenation(format!(
                    "different time steps: {a} h vs {b} h"
                )))
            }
            (a, b) => a.or(b),
        };

        let n_a = self.tracks.len();
        let n_b = other.tracks.len();
        let cats = CategoryTable::concat(self.cats.as_ref(), other.cats.as_ref(), n_a, n_b);

        let mut tracks = self.tracks;
        tracks.extend(other.tracks);
        Ok(TrackRun {
            tracks,
            cats,
            tstep_h,
        })
    }

    /// New run containing only the records inside `[start, end]` (both inclusive,
    /// either side optional).
    ///
    /// Tracks left without records are dropped and ids re-indexed; category rows
    /// follow the surviving tracks.
    pub fn time_slice(&self, start: Option<Epoch>, end: Option<Epoch>) -> TrackRun {
        if start.is_none() && end.is_none() {
            return self.clone();
        }
        let mut kept_ids = Vec::new();
        let mut tracks = Vec::new();
        for (id, track) in self.tracks.iter().enumerate() {
            let points: TrackPoints = track
                .points()
                .iter()
                .filter(|p| start.is_none_or(|s| p.time >= s) && end.is_none_or(|e| p.time <= e))
                .cloned()
                .collect();
            if let Ok(track) = Track::new(points) {
                kept_ids.push(id);
                tracks.push(track);
            }
        }
        let cats = self.cats.as_ref().map(|c| c.filter_rows(&kept_ids));
        TrackRun {
            tracks,
            cats,
            tstep_h: self.tstep_h,
        }
    }

    /// Categorise the tracks of the run.
    ///
    /// Conditions are evaluated in order; a track carries a label when **all** of
    /// that condition's predicates hold. With `inclusive`, each condition is a
    /// refinement of the previous one: the previous label's result is folded in as
    /// an implicit extra predicate and stored label names are chained with `|`.
    ///
    /// Arguments
    /// ---------
    /// * `conditions`: ordered `(label, predicates)` pairs; `"all"` is reserved
    /// * `inclusive`: nest each category inside the previous one
    /// * `clear`: drop any existing categories first
    pub fn classify(
        &mut self,
        conditions: Vec<CatCondition>,
        inclusive: bool,
        clear: bool,
    ) -> Result<(), StormtrackError> {
        if clear {
            self.cats = None;
        }
        let raw: Vec<String> = conditions.iter().map(|c| c.label.clone()).collect();
        let labels = chained_labels(&raw, inclusive)?;

        let n = self.tracks.len();
        let mut columns: Vec<Vec<bool>> = vec![vec![false; n]; conditions.len()];

        let pbar = Progress::new(n);
        for (id, track) in self.tracks.iter().enumerate() {
            let mut prev_flag = true;
            for (icond, cond) in conditions.iter().enumerate() {
                let mut flag = if inclusive { prev_flag } else { true };
                for pred in &cond.predicates {
                    flag = flag && pred(track);
                }
                columns[icond][id] = flag;
                if inclusive {
                    prev_flag = flag;
                }
            }
            pbar.tick();
        }
        pbar.finish();

        let table = self.cats.get_or_insert_with(|| CategoryTable::new(inclusive));
        table.set_inclusive(inclusive);
        for (label, flags) in labels.into_iter().zip(columns) {
            table.push_column(label, flags);
        }
        Ok(())
    }

    /// Add one category holding the tracks whose per-track metric lies beyond a
    /// percentile threshold of the subset's distribution.
    ///
    /// The stored label is `"{by_label}__{oper}__{perc}pc"`, suffixed with
    /// `"|{subset}"` when a subset is given, e.g. `"max_vort__ge__95pc|pmc"`.
    /// An empty subset adds no category.
    ///
    /// Arguments
    /// ---------
    /// * `by_label`: name of the quantity, used only to compose the label
    /// * `metric`: per-track value the percentile is taken over
    /// * `subset`: subset whose distribution defines the threshold
    /// * `perc`: percentile in `[0, 100]` (linear interpolation between ranks)
    /// * `oper`: comparison against the threshold, one of `lt|le|gt|ge`
    pub fn categorise_by_percentile(
        &mut self,
        by_label: &str,
        metric: impl Fn(&Track) -> f64,
        subset: &Subset,
        perc: f64,
        oper: PercentileOper,
    ) -> Result<(), StormtrackError> {
        if !(0.0..=100.0).contains(&perc) {
            return Err(StormtrackError::Argument(format!(
                "perc={perc} should be within [0, 100]"
            )));
        }
        let ids = self.select(subset)?;
        if ids.is_empty() {
            return Ok(());
        }
        let values: Vec<f64> = ids.iter().map(|&id| metric(&self.tracks[id])).collect();
        let thresh = percentile(&values, perc);

        let mut flags = vec![false; self.tracks.len()];
        for (&id, &v) in ids.iter().zip(&values) {
            flags[id] = oper.apply(v, thresh);
        }

        let mut label = format!("{by_label}__{}__{perc}pc", oper.as_str());
        if let Subset::Cats(_) = subset {
            label.push(CAT_SEP);
            label.push_str(&subset.label());
        }
        self.cats
            .get_or_insert_with(|| CategoryTable::new(false))
            .push_column(label, flags);
        Ok(())
    }

    /// Rename one category label.
    pub fn rename_cat(&mut self, old: &str, new: &str) -> Result<(), StormtrackError> {
        self.cats
            .as_mut()
            .ok_or(StormtrackError::NotCategorised)?
            .rename(old, new)
    }

    /// Drop categories.
    ///
    /// With no `subset`, the whole table is removed. With a label, that column is
    /// dropped; under inclusive chaining every label containing it (i.e. its
    /// children) is dropped too. `inclusive`, when given, overrides the table's own
    /// flag for this call.
    pub fn clear_categories(
        &mut self,
        subset: Option<&str>,
        inclusive: Option<bool>,
    ) -> Result<(), StormtrackError> {
        match subset {
            None => {
                self.cats = None;
                Ok(())
            }
            Some(label) => {
                let table = self.cats.as_mut().ok_or(StormtrackError::NotCategorised)?;
                let inc = inclusive.unwrap_or(table.is_inclusive());
                if inc {
                    table.drop_containing(label);
                } else {
                    table.drop_label(label)?;
                }
                if table.is_empty() {
                    self.cats = None;
                }
                Ok(())
            }
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// `values` need not be sorted; `q` is in percent.
fn percentile(values: &[f64], q: f64) -> f64 {
    let sorted: Vec<f64> = values.iter().copied().sorted_by(f64::total_cmp).collect();
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let w = rank - lo as f64;
    sorted[lo] + w * (sorted[hi] - sorted[lo])
}
