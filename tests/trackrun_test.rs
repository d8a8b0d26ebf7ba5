use hifitime::Epoch;

use stormtrack::categories::CatCondition;
use stormtrack::stats::{bin_count_tracks_by_month, bin_count_tracks_by_winter};
use stormtrack::stormtrack_errors::StormtrackError;
use stormtrack::track::Track;
use stormtrack::trackrun::{PercentileOper, Subset, TrackRun};

mod common;
use common::{epoch, straight_track, two_track_run};

#[test]
fn test_from_batch_roundtrip() {
    let ids = [12_u32, 12, 12, 30, 30];
    let lon = [0.0, 1.0, 2.0, 40.0, 41.0];
    let lat = [60.0, 60.0, 60.0, 75.0, 75.0];
    let time: Vec<Epoch> = [
        epoch(2019, 1, 1, 0),
        epoch(2019, 1, 1, 3),
        epoch(2019, 1, 1, 6),
        epoch(2019, 1, 1, 0),
        epoch(2019, 1, 1, 3),
    ]
    .to_vec();
    let run = TrackRun::from_batch(&ids, &lon, &lat, &time).unwrap();
    assert_eq!(run.len(), 2);
    assert_eq!(run.tstep_h(), Some(3.0));
    assert_eq!(run.track(0).unwrap().len(), 3);
    assert_eq!(run.track(1).unwrap().first().lon, 40.0);
}

#[test]
fn test_concat_of_categorised_runs() {
    let condition = || {
        vec![CatCondition::new(
            "southern",
            vec![Box::new(|t: &Track| t.first().lat < 70.0) as Box<dyn Fn(&Track) -> bool>],
        )]
    };
    let mut a = two_track_run(epoch(2019, 1, 1, 0));
    a.classify(condition(), false, true).unwrap();
    let mut b = two_track_run(epoch(2019, 2, 1, 0));
    b.classify(condition(), false, true).unwrap();

    let merged = a.concat(b).unwrap();
    assert_eq!(merged.len(), 4);
    // category flags follow their tracks across the re-indexing
    assert_eq!(
        merged.select(&Subset::from("southern")).unwrap(),
        vec![0, 2]
    );
}

#[test]
fn test_concat_with_empty_run_keeps_categories() {
    let mut a = two_track_run(epoch(2019, 1, 1, 0));
    a.classify(
        vec![CatCondition::new("pmc", vec![Box::new(|_t: &Track| true)])],
        false,
        true,
    )
    .unwrap();
    let merged = a.concat(TrackRun::new()).unwrap();
    assert_eq!(merged.len(), 2);
    assert!(merged.is_categorised());
}

#[test]
fn test_time_slice_then_select() {
    let mut run = TrackRun::from_tracks(vec![
        straight_track(0.0, 60.0, epoch(2019, 1, 1, 0), 5),
        straight_track(40.0, 75.0, epoch(2019, 1, 10, 0), 5),
    ]);
    run.classify(
        vec![CatCondition::new(
            "northern",
            vec![Box::new(|t: &Track| t.first().lat > 70.0)],
        )],
        false,
        true,
    )
    .unwrap();

    let sliced = run.time_slice(Some(epoch(2019, 1, 9, 0)), None);
    assert_eq!(sliced.len(), 1);
    // the surviving track kept its category flag under the new id 0
    assert_eq!(sliced.select(&Subset::from("northern")).unwrap(), vec![0]);
}

#[test]
fn test_percentile_category_on_subset() {
    let mut run = TrackRun::from_tracks(vec![
        straight_track(0.0, 60.0, epoch(2019, 1, 1, 0), 2),
        straight_track(10.0, 60.0, epoch(2019, 1, 2, 0), 5),
        straight_track(40.0, 75.0, epoch(2019, 1, 3, 0), 8),
    ]);
    run.classify(
        vec![CatCondition::new(
            "southern",
            vec![Box::new(|t: &Track| t.first().lat < 70.0)],
        )],
        false,
        true,
    )
    .unwrap();
    run.categorise_by_percentile(
        "lifetime",
        |t| t.lifetime_h(),
        &Subset::from("southern"),
        50.0,
        PercentileOper::Ge,
    )
    .unwrap();

    let label = "lifetime__ge__50pc|southern";
    assert!(run.cat_labels().contains(&label.to_string()));
    // the threshold comes from the southern tracks only (3 h and 12 h, median 7.5 h)
    assert_eq!(run.select(&Subset::from(label)).unwrap(), vec![1]);

    // intersection of several labels
    assert_eq!(
        run.select(&Subset::from(vec![
            "southern".to_string(),
            label.to_string()
        ]))
        .unwrap(),
        vec![1]
    );
}

#[test]
fn test_percentile_rejects_out_of_range() {
    let mut run = two_track_run(epoch(2019, 1, 1, 0));
    let err = run
        .categorise_by_percentile(
            "lifetime",
            |t| t.lifetime_h(),
            &Subset::All,
            120.0,
            PercentileOper::Gt,
        )
        .unwrap_err();
    assert!(matches!(err, StormtrackError::Argument(_)));
}

#[test]
fn test_seasonal_binning() {
    let run = TrackRun::from_tracks(vec![
        straight_track(0.0, 60.0, epoch(2018, 12, 30, 18), 5), // Dec 30 .. Dec 31
        straight_track(5.0, 62.0, epoch(2019, 2, 10, 0), 5),
        straight_track(10.0, 64.0, epoch(2019, 12, 5, 0), 5),
    ]);
    let monthly = bin_count_tracks_by_month(&run);
    assert_eq!(monthly[11], 2); // both December tracks
    assert_eq!(monthly[1], 1);

    let winters = bin_count_tracks_by_winter(&run, 2018, 2);
    assert_eq!(winters, vec![2, 1]);
}
