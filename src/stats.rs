//! Seasonal binning of track counts.

use itertools::Itertools;

use crate::trackrun::TrackRun;

/// Count tracks per calendar month. A track spanning several months is counted
/// once in each month it visits, so the bins can sum to more than the number of
/// tracks.
pub fn bin_count_tracks_by_month(run: &TrackRun) -> [u32; 12] {
    let mut counter = [0u32; 12];
    for track in run.tracks() {
        let months: Vec<u8> = track
            .points()
            .iter()
            .map(|p| {
                let (_, month, ..) = p.time.to_gregorian_utc();
                month
            })
            .unique()
            .collect();
        for m in months {
            counter[usize::from(m) - 1] += 1;
        }
    }
    counter
}

/// Count tracks per extended winter season. A track belongs to the winter
/// starting in `start_year + i` when it ends in the second half of that year, or
/// when it ends by June and starts in the following year.
pub fn bin_count_tracks_by_winter(run: &TrackRun, start_year: i32, n_winters: usize) -> Vec<u32> {
    let mut counter = vec![0u32; n_winters];
    for track in run.tracks() {
        let (first_year, ..) = track.first().time.to_gregorian_utc();
        let (last_year, last_month, ..) = track.last().time.to_gregorian_utc();
        for (i, slot) in counter.iter_mut().enumerate() {
            let winter_year = start_year + i as i32;
            let hit = if last_month <= 6 {
                first_year == winter_year + 1
            } else {
                last_year == winter_year
            };
            if hit {
                *slot += 1;
            }
        }
    }
    counter
}
