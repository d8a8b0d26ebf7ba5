//! # Constants and type definitions for stormtrack
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common
//! type definitions** used throughout the `stormtrack` library. It also defines the container
//! types used to organize track records.
//!
//! ## Overview
//!
//! - Geophysical constants (planet radius, unit conversions)
//! - Core type aliases used across the crate
//! - Container types for storing track points and per-record attributes
//!
//! These definitions are used by all main modules, including track matching and the density
//! engine.

use crate::track::TrackPoint;
use ahash::RandomState;
use smallvec::SmallVec;
use std::collections::HashMap;

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// Mean Earth radius in metres (IUGG)
pub const EARTH_RADIUS: f64 = 6_371_009.0;

/// Kilometres → metres
pub const KM2M: f64 = 1_000.0;

/// Number of seconds in one hour
pub const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Sentinel for "not computed" entries in distance matrices.
///
/// Large enough that an uncomputed entry can never win an argmin comparison
/// against a real trajectory distance, and never mistaken for a silent zero.
pub const FILLVAL: f64 = 9.0e20;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Distance in kilometres
pub type Kilometer = f64;
/// Distance in metres
pub type Meter = f64;
/// Duration in hours
pub type Hours = f64;

/// Identifier of a track within a [`TrackRun`](crate::trackrun::TrackRun).
///
/// Track ids are the position of the track in the run, so they always form a
/// contiguous zero-based sequence, re-established whenever two runs are combined.
pub type TrackId = usize;

/// Named scalar attributes attached to a single track record (vorticity, pressure, ...).
pub type AttrMap = HashMap<String, f64, RandomState>;

/// A small, inline-optimized container for the records of a single track.
pub type TrackPoints = SmallVec<[TrackPoint; 8]>;

/// Map from category label to a per-category result.
pub type LabelMap<T> = HashMap<String, T, RandomState>;
