//! Track records and single-track containers.
//!
//! A [`TrackPoint`] is one record produced by an upstream tracking algorithm:
//! a longitude/latitude position, an absolute timestamp and an open set of named
//! scalar attributes (vorticity, pressure, ...). A [`Track`] is the time-ordered,
//! non-empty sequence of records of one tracked entity, with a handful of derived
//! per-track quantities used by categorisation and matching.

use hifitime::{Epoch, Unit};

use crate::constants::{
    AttrMap, Degree, Hours, Kilometer, TrackPoints, EARTH_RADIUS, KM2M, SECONDS_PER_HOUR,
};
use crate::geo::great_circle;
use crate::stormtrack_errors::StormtrackError;

/// One record of a tracked vortex: position, time and named scalar attributes.
///
/// Immutable once produced; the core algorithms only ever read it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    /// Longitude in degrees. Any wrap convention is accepted as long as it is
    /// used consistently within a collection.
    pub lon: Degree,
    /// Latitude in degrees.
    pub lat: Degree,
    /// Absolute timestamp of the record.
    pub time: Epoch,
    /// Open set of named scalar attributes (e.g. "vo", "slp").
    pub attrs: AttrMap,
}

impl TrackPoint {
    /// Build a record without attributes.
    pub fn new(lon: Degree, lat: Degree, time: Epoch) -> Self {
        Self {
            lon,
            lat,
            time,
            attrs: AttrMap::default(),
        }
    }

    /// Attach one named attribute, builder style.
    pub fn with_attr(mut self, name: &str, value: f64) -> Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    /// Look up a named attribute.
    pub fn attr(&self, name: &str) -> Option<f64> {
        self.attrs.get(name).copied()
    }
}

/// Time-ordered sequence of records for one tracked entity.
///
/// Invariants, enforced by [`Track::new`]:
/// * at least one record,
/// * record times strictly increasing (no two records share a timestamp).
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    points: TrackPoints,
}

impl Track {
    /// Validate and wrap a sequence of records.
    ///
    /// Return
    /// ------
    /// * `Err(StormtrackError::EmptyTrack)` if `points` is empty
    /// * `Err(StormtrackError::NonMonotonicTimes)` if times are not strictly increasing
    pub fn new(points: TrackPoints) -> Result<Self, StormtrackError> {
        if points.is_empty() {
            return Err(StormtrackError::EmptyTrack);
        }
        if points.windows(2).any(|w| w[1].time <= w[0].time) {
            return Err(StormtrackError::NonMonotonicTimes);
        }
        Ok(Self { points })
    }

    /// Convenience constructor from `(lon, lat, time)` triples.
    pub fn from_lonlat_times(coords: &[(Degree, Degree, Epoch)]) -> Result<Self, StormtrackError> {
        Self::new(
            coords
                .iter()
                .map(|&(lon, lat, time)| TrackPoint::new(lon, lat, time))
                .collect(),
        )
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// A track is never empty; kept for API symmetry with slice containers.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Genesis record (first in time).
    pub fn first(&self) -> &TrackPoint {
        &self.points[0]
    }

    /// Lysis record (last in time).
    pub fn last(&self) -> &TrackPoint {
        &self.points[self.points.len() - 1]
    }

    /// Lifetime of the track in hours (zero for a single-record track).
    pub fn lifetime_h(&self) -> Hours {
        (self.last().time - self.first().time).to_unit(Unit::Hour)
    }

    /// Sampling interval in hours, taken from the spacing of the last two records.
    ///
    /// `None` for a single-record track.
    pub fn tstep_h(&self) -> Option<Hours> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        Some((self.points[n - 1].time - self.points[n - 2].time).to_unit(Unit::Hour))
    }

    /// Great-circle distance between genesis and lysis, in kilometres.
    pub fn gen_lys_dist_km(&self) -> Kilometer {
        let (a, b) = (self.first(), self.last());
        great_circle(a.lon, a.lat, b.lon, b.lat, EARTH_RADIUS) / KM2M
    }

    /// Along-track distance summed over consecutive records, in kilometres.
    pub fn total_dist_km(&self) -> Kilometer {
        self.points
            .windows(2)
            .map(|w| great_circle(w[0].lon, w[0].lat, w[1].lon, w[1].lat, EARTH_RADIUS) / KM2M)
            .sum()
    }

    /// Mean propagation speed in km/h (`None` for a single-record track).
    pub fn mean_speed_kmh(&self) -> Option<f64> {
        let lifetime = self.lifetime_h();
        (lifetime > 0.0).then(|| self.total_dist_km() / lifetime)
    }

    /// Maximum of a named attribute over the track, ignoring records without it.
    pub fn max_attr(&self, name: &str) -> Option<f64> {
        self.points
            .iter()
            .filter_map(|p| p.attr(name))
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// Minimum of a named attribute over the track, ignoring records without it.
    pub fn min_attr(&self, name: &str) -> Option<f64> {
        self.points
            .iter()
            .filter_map(|p| p.attr(name))
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
    }

    /// Record times as absolute hours (TAI), the numeric time axis used by the
    /// trajectory distance metric.
    pub fn times_h(&self) -> Vec<Hours> {
        self.points
            .iter()
            .map(|p| p.time.to_tai_seconds() / SECONDS_PER_HOUR)
            .collect()
    }

    /// Longitude/latitude of the track linearly interpolated at an arbitrary epoch.
    ///
    /// Return
    /// ------
    /// * `None` when `at` falls outside the track's time span (no extrapolation)
    /// * `Some((lon, lat))` otherwise; exact record positions at record times
    pub fn interp_lonlat(&self, at: Epoch) -> Option<(Degree, Degree)> {
        let pts = &self.points;
        if at < pts[0].time || at > pts[pts.len() - 1].time {
            return None;
        }
        // First record strictly after `at`; `at` lies in [pts[k-1], pts[k]].
        let k = pts.partition_point(|p| p.time <= at);
        if k == pts.len() {
            let p = &pts[k - 1];
            return Some((p.lon, p.lat));
        }
        let p0 = &pts[k - 1];
        let p1 = &pts[k];
        let w = (at - p0.time).to_unit(Unit::Second) / (p1.time - p0.time).to_unit(Unit::Second);
        Some((p0.lon + w * (p1.lon - p0.lon), p0.lat + w * (p1.lat - p0.lat)))
    }
}
