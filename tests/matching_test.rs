use stormtrack::categories::CatCondition;
use stormtrack::matching::{InterpolateTo, MatchMethod, MatchOptions};
use stormtrack::stormtrack_errors::StormtrackError;
use stormtrack::track::Track;
use stormtrack::trackrun::{Subset, TrackRun};

mod common;
use common::{epoch, straight_track, two_track_run};

#[test]
fn test_simple_matches_identical_collections() {
    let start = epoch(2019, 1, 1, 0);
    let run = two_track_run(start);
    let others: Vec<Track> = run.tracks().to_vec();

    let opts = MatchOptions {
        method: MatchMethod::Simple,
        thresh_dist_km: 500.0,
        ..Default::default()
    };
    let pairs = run.match_tracks(&others, &Subset::All, &opts).unwrap();
    // each of the two well-separated tracks finds exactly its twin
    assert_eq!(pairs, vec![(0, 0), (1, 1)]);
}

#[test]
fn test_simple_interpolate_to_self() {
    let start = epoch(2019, 1, 1, 0);
    let run = two_track_run(start);
    let others: Vec<Track> = run.tracks().to_vec();

    let opts = MatchOptions {
        method: MatchMethod::Simple,
        interpolate_to: InterpolateTo::SelfTrack,
        thresh_dist_km: 500.0,
        ..Default::default()
    };
    let pairs = run.match_tracks(&others, &Subset::All, &opts).unwrap();
    assert_eq!(pairs, vec![(0, 0), (1, 1)]);
}

#[test]
fn test_simple_equal_counts_go_to_the_larger_id() {
    let start = epoch(2019, 1, 1, 0);
    // two indistinguishable self candidates for the same other track
    let run = TrackRun::from_tracks(vec![
        straight_track(0.0, 60.0, start, 5),
        straight_track(0.0, 60.0, start, 5),
    ]);
    let others = vec![straight_track(0.0, 60.0, start, 5)];

    let opts = MatchOptions {
        method: MatchMethod::Simple,
        thresh_dist_km: 500.0,
        ..Default::default()
    };
    let pairs = run.match_tracks(&others, &Subset::All, &opts).unwrap();
    assert_eq!(pairs, vec![(1, 0)]);
}

#[test]
fn test_intersection_single_aligned_pair_uses_run_tstep() {
    let start = epoch(2019, 1, 1, 0);
    let run = TrackRun::from_tracks(vec![straight_track(0.0, 60.0, start, 3)]);
    // a single-record other coincident with the self track's second record
    let others = vec![straight_track(1.0, 60.0, epoch(2019, 1, 1, 3), 1)];

    let opts = MatchOptions {
        method: MatchMethod::Intersection,
        thresh_dist_km: 250.0,
        ..Default::default()
    };
    // one aligned pair, zero other-lifetime threshold; the aligned spacing comes
    // from the run's 3-hourly sampling interval
    let pairs = run.match_tracks(&others, &Subset::All, &opts).unwrap();
    assert_eq!(pairs, vec![(0, 0)]);
}

#[test]
fn test_intersection_zero_distance_threshold_matches_nothing() {
    let start = epoch(2019, 1, 1, 0);
    let run = two_track_run(start);
    let others: Vec<Track> = run.tracks().to_vec();

    let opts = MatchOptions {
        method: MatchMethod::Intersection,
        thresh_dist_km: 0.0,
        ..Default::default()
    };
    let pairs = run.match_tracks(&others, &Subset::All, &opts).unwrap();
    assert!(pairs.is_empty());
}

#[test]
fn test_intersection_matches_identical_collections() {
    let start = epoch(2019, 1, 1, 0);
    let run = two_track_run(start);
    let others: Vec<Track> = run.tracks().to_vec();

    let opts = MatchOptions {
        method: MatchMethod::Intersection,
        thresh_dist_km: 250.0,
        ..Default::default()
    };
    let pairs = run.match_tracks(&others, &Subset::All, &opts).unwrap();
    assert_eq!(pairs, vec![(0, 0), (1, 1)]);
}

#[test]
fn test_bs2000_mutual_nearest_on_identical_collections() {
    let start = epoch(2019, 1, 1, 0);
    let run = two_track_run(start);
    let others: Vec<Track> = run.tracks().to_vec();

    let opts = MatchOptions {
        method: MatchMethod::Bs2000,
        ..Default::default()
    };
    let pairs = run.match_tracks(&others, &Subset::All, &opts).unwrap();
    assert_eq!(pairs, vec![(0, 0), (1, 1)]);

    // the matrix behind it has zero diagonal and positive off-diagonal entries
    let matrix = run
        .bs2000_distance_matrix(&others, &Subset::All, opts.beta, opts.r_planet)
        .unwrap();
    assert_eq!(matrix.shape(), (2, 2));
    assert_eq!(matrix[(0, 0)], 0.0);
    assert_eq!(matrix[(1, 1)], 0.0);
    assert!(matrix[(0, 1)] > 0.0);
    assert!(matrix[(1, 0)] > 0.0);
}

#[test]
fn test_empty_inputs_yield_empty_pairs() {
    let start = epoch(2019, 1, 1, 0);
    let run = two_track_run(start);
    let no_tracks: Vec<Track> = Vec::new();
    let empty_run = TrackRun::new();

    for method in [
        MatchMethod::Intersection,
        MatchMethod::Simple,
        MatchMethod::Bs2000,
    ] {
        let opts = MatchOptions {
            method,
            ..Default::default()
        };
        assert!(run
            .match_tracks(&no_tracks, &Subset::All, &opts)
            .unwrap()
            .is_empty());
        assert!(empty_run
            .match_tracks(run.tracks(), &Subset::All, &opts)
            .unwrap()
            .is_empty());
        // empty run: even a label subset selects nothing instead of failing
        assert!(empty_run
            .match_tracks(run.tracks(), &Subset::from("pmc"), &opts)
            .unwrap()
            .is_empty());
    }
}

#[test]
fn test_subset_restricts_self_side_only() {
    let start = epoch(2019, 1, 1, 0);
    let mut run = two_track_run(start);
    run.classify(
        vec![CatCondition::new(
            "northern",
            vec![Box::new(|t: &Track| t.first().lat > 70.0)],
        )],
        false,
        true,
    )
    .unwrap();
    let others: Vec<Track> = run.tracks().to_vec();

    let opts = MatchOptions {
        method: MatchMethod::Simple,
        thresh_dist_km: 500.0,
        ..Default::default()
    };
    // only track 1 is in the subset, but both others remain candidates
    let pairs = run
        .match_tracks(&others, &Subset::from("northern"), &opts)
        .unwrap();
    assert_eq!(pairs, vec![(1, 1)]);
}

#[test]
fn test_uncategorised_label_subset_fails() {
    let start = epoch(2019, 1, 1, 0);
    let run = two_track_run(start);
    let others: Vec<Track> = run.tracks().to_vec();
    let err = run
        .match_tracks(&others, &Subset::from("pmc"), &MatchOptions::default())
        .unwrap_err();
    assert_eq!(err, StormtrackError::NotCategorised);
}

#[test]
fn test_match_per_category() {
    let start = epoch(2019, 1, 1, 0);
    let mut run = two_track_run(start);
    run.classify(
        vec![
            CatCondition::new("southern", vec![Box::new(|t: &Track| t.first().lat < 70.0)]),
            CatCondition::new("northern", vec![Box::new(|t: &Track| t.first().lat > 70.0)]),
        ],
        false,
        true,
    )
    .unwrap();
    let others: Vec<Track> = run.tracks().to_vec();

    let opts = MatchOptions {
        method: MatchMethod::Simple,
        thresh_dist_km: 500.0,
        ..Default::default()
    };
    let by_label = run.match_tracks_per_category(&others, &opts).unwrap();
    assert_eq!(by_label.len(), 2);
    assert_eq!(by_label["southern"], vec![(0, 0)]);
    assert_eq!(by_label["northern"], vec![(1, 1)]);

    let uncategorised = two_track_run(start);
    assert_eq!(
        uncategorised.match_tracks_per_category(&others, &opts),
        Err(StormtrackError::NotCategorised)
    );
}

#[test]
fn test_shifted_track_still_matches_within_threshold() {
    let start = epoch(2019, 1, 1, 0);
    let run = TrackRun::from_tracks(vec![straight_track(0.0, 60.0, start, 5)]);
    // same path shifted a quarter degree north, about 28 km
    let others = vec![straight_track(0.0, 60.25, start, 5)];

    let opts = MatchOptions {
        method: MatchMethod::Simple,
        thresh_dist_km: 100.0,
        ..Default::default()
    };
    assert_eq!(
        run.match_tracks(&others, &Subset::All, &opts).unwrap(),
        vec![(0, 0)]
    );

    let opts = MatchOptions {
        method: MatchMethod::Simple,
        thresh_dist_km: 10.0,
        ..Default::default()
    };
    assert!(run
        .match_tracks(&others, &Subset::All, &opts)
        .unwrap()
        .is_empty());
}
