use hifitime::Epoch;

use stormtrack::track::Track;
use stormtrack::trackrun::TrackRun;

pub fn epoch(year: i32, month: u8, day: u8, hour: u8) -> Epoch {
    Epoch::from_gregorian_utc(year, month, day, hour, 0, 0, 0)
}

/// A track moving east at one degree per 3-hourly record.
pub fn straight_track(lon0: f64, lat0: f64, start: Epoch, n: usize) -> Track {
    let coords: Vec<(f64, f64, Epoch)> = (0..n)
        .map(|k| {
            (
                lon0 + k as f64,
                lat0,
                start + hifitime::Duration::from_hours(3.0 * k as f64),
            )
        })
        .collect();
    Track::from_lonlat_times(&coords).unwrap()
}

/// Two well-separated tracks sharing the same 3-hourly time axis.
pub fn two_track_run(start: Epoch) -> TrackRun {
    TrackRun::from_tracks(vec![
        straight_track(0.0, 60.0, start, 5),
        straight_track(40.0, 75.0, start, 5),
    ])
}
