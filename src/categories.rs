//! Category (subset) bookkeeping for a track run.
//!
//! A category is a named boolean partition over track ids. Labels may be declared
//! *inclusive*, in which case each label in a classification is a refinement of the
//! previous one and stored label names are chained with [`CAT_SEP`]
//! (e.g. `"strong|pmc"` for a `strong` category nested inside `pmc`).

use crate::constants::TrackId;
use crate::stormtrack_errors::StormtrackError;
use crate::track::Track;

/// Separator used when composing inclusive category label names.
pub const CAT_SEP: char = '|';

/// Reserved label meaning "every track"; never a valid category name.
pub const ALL_LABEL: &str = "all";

/// Per-track boolean predicate used by [`TrackRun::classify`](crate::trackrun::TrackRun::classify).
pub type TrackPredicate = Box<dyn Fn(&Track) -> bool>;

/// One classification condition: a label and the predicates (combined with AND)
/// a track must satisfy to carry that label.
pub struct CatCondition {
    pub label: String,
    pub predicates: Vec<TrackPredicate>,
}

impl CatCondition {
    pub fn new(label: impl Into<String>, predicates: Vec<TrackPredicate>) -> Self {
        Self {
            label: label.into(),
            predicates,
        }
    }
}

/// Boolean membership table: one ordered column of per-track flags per label.
///
/// Column length always equals the number of tracks of the owning run; the table is
/// rebuilt (not patched) whenever two runs are concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTable {
    labels: Vec<String>,
    columns: Vec<Vec<bool>>,
    inclusive: bool,
}

impl CategoryTable {
    pub(crate) fn new(inclusive: bool) -> Self {
        Self {
            labels: Vec::new(),
            columns: Vec::new(),
            inclusive,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub(crate) fn set_inclusive(&mut self, inclusive: bool) {
        self.inclusive = inclusive;
    }

    /// Append one label column. Column length is the caller's responsibility.
    pub(crate) fn push_column(&mut self, label: String, flags: Vec<bool>) {
        self.labels.push(label);
        self.columns.push(flags);
    }

    fn index_of(&self, label: &str) -> Result<usize, StormtrackError> {
        self.labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| StormtrackError::Select {
                label: label.to_string(),
                known: self.labels.join(", "),
            })
    }

    /// Membership column of one label.
    pub fn column(&self, label: &str) -> Result<&[bool], StormtrackError> {
        Ok(&self.columns[self.index_of(label)?])
    }

    /// AND-combined membership of several labels, as one flag per track id.
    pub fn membership(&self, labels: &[String]) -> Result<Vec<bool>, StormtrackError> {
        let mut selected: Option<Vec<bool>> = None;
        for label in labels {
            let col = self.column(label)?;
            selected = Some(match selected {
                None => col.to_vec(),
                Some(prev) => prev.iter().zip(col).map(|(a, b)| *a && *b).collect(),
            });
        }
        Ok(selected.unwrap_or_default())
    }

    /// Track ids carrying all the given labels, in ascending order.
    pub fn select_ids(&self, labels: &[String]) -> Result<Vec<TrackId>, StormtrackError> {
        Ok(self
            .membership(labels)?
            .into_iter()
            .enumerate()
            .filter_map(|(id, m)| m.then_some(id))
            .collect())
    }

    /// Rename one label, keeping its column.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), StormtrackError> {
        let idx = self.index_of(old)?;
        self.labels[idx] = new.to_string();
        Ok(())
    }

    /// Drop the column with exactly this label.
    pub fn drop_label(&mut self, label: &str) -> Result<(), StormtrackError> {
        let idx = self.index_of(label)?;
        self.labels.remove(idx);
        self.columns.remove(idx);
        Ok(())
    }

    /// Drop every column whose label contains `part` (inclusive chains carry their
    /// parent's name, so dropping a parent destroys its children too).
    pub fn drop_containing(&mut self, part: &str) {
        let keep: Vec<bool> = self.labels.iter().map(|l| !l.contains(part)).collect();
        let mut it = keep.iter();
        self.labels.retain(|_| *it.next().unwrap());
        let mut it = keep.iter();
        self.columns.retain(|_| *it.next().unwrap());
    }

    /// Keep only the rows of the given track ids, in the given order.
    pub(crate) fn filter_rows(&self, ids: &[TrackId]) -> Self {
        Self {
            labels: self.labels.clone(),
            columns: self
                .columns
                .iter()
                .map(|col| ids.iter().map(|&id| col[id]).collect())
                .collect(),
            inclusive: self.inclusive,
        }
    }

    /// Merge two tables row-wise for a concatenated run of `n_a + n_b` tracks.
    ///
    /// Labels are unioned in first-then-second order; flags missing on either side
    /// default to `false`.
    pub(crate) fn concat(
        a: Option<&CategoryTable>,
        b: Option<&CategoryTable>,
        n_a: usize,
        n_b: usize,
    ) -> Option<Self> {
        if a.is_none() && b.is_none() {
            return None;
        }
        let inclusive = a.or(b).map(|t| t.inclusive).unwrap_or(false);
        let mut merged = CategoryTable::new(inclusive);
        if let Some(t) = a {
            for (label, col) in t.labels.iter().zip(&t.columns) {
                let mut flags = col.clone();
                flags.resize(n_a + n_b, false);
                merged.push_column(label.clone(), flags);
            }
        }
        if let Some(t) = b {
            for (label, col) in t.labels.iter().zip(&t.columns) {
                match merged.labels.iter().position(|l| l == label) {
                    Some(idx) => {
                        for (i, &flag) in col.iter().enumerate() {
                            merged.columns[idx][n_a + i] = flag;
                        }
                    }
                    None => {
                        let mut flags = vec![false; n_a + n_b];
                        flags[n_a..n_a + col.len()].copy_from_slice(col);
                        merged.push_column(label.clone(), flags);
                    }
                }
            }
        }
        Some(merged)
    }
}

/// Compose the stored label names of a classification.
///
/// Non-inclusive labels are stored verbatim; inclusive labels are chained with the
/// raw names of all preceding conditions, most recent first (`"c|b|a"`).
pub(crate) fn chained_labels(
    raw: &[String],
    inclusive: bool,
) -> Result<Vec<String>, StormtrackError> {
    if let Some(bad) = raw.iter().find(|l| l.as_str() == ALL_LABEL) {
        return Err(StormtrackError::Argument(format!(
            "'{bad}' is not a permitted category label"
        )));
    }
    if !inclusive {
        return Ok(raw.to_vec());
    }
    Ok(raw
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let mut name = label.clone();
            for prev in raw[..i].iter().rev() {
                name.push(CAT_SEP);
                name.push_str(prev);
            }
            name
        })
        .collect())
}
