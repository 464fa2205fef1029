mod common;

use common::{config, init_tracing, media, samples, toy_model, Probe};
use compass_core::cache::ledger::Progress;
use compass_core::configuration::ConfigurationBuilder;
use compass_core::engine::{EngineError, PenaltyEngine};
use compass_core::io::media::MediaConstraints;
use compass_core::io::selection::{ReactionSelection, SelectionError};
use compass_core::orchestrator::SampleState;
use compass_core::penalty::{PenaltyResult, UnsolvedReason};

#[test]
fn run_scores_every_reaction() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let engine = PenaltyEngine::new(toy_model(), media(), config(2), dir.path()).unwrap();
    let samples = samples(3);
    let report = engine.run(&samples).unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
    for sample in &samples {
        assert!(matches!(
            report.state(&sample.id),
            Some(SampleState::Complete { attempts: 1 })
        ));
        assert!(engine.cache().has(&sample.id));
    }
    let matrix = &report.matrix;
    assert_eq!(matrix.reactions().len(), 7);
    assert_eq!(
        matrix.get("R4_forward", "cell 0"),
        Some(PenaltyResult::Unsolved(UnsolvedReason::Blocked))
    );
    assert_eq!(
        matrix.get("R5_forward", "cell 1"),
        Some(PenaltyResult::Unsolved(UnsolvedReason::Blocked))
    );
    // more R2 expression makes R2 cheaper
    let low = matrix.get("R2_forward", "cell 0").unwrap().value().unwrap();
    let high = matrix.get("R2_forward", "cell 2").unwrap().value().unwrap();
    assert!(high < low);

    let mut tsv = Vec::new();
    matrix.write_tsv(&mut tsv).unwrap();
    let tsv = String::from_utf8(tsv).unwrap();
    assert!(tsv.starts_with("reaction\tcell 0\tcell 1\tcell 2\n"));
    assert!(tsv.contains("R4_forward\tNA\tNA\tNA\n"));
}

#[test]
fn rerun_with_intact_cache_is_identical_and_solves_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let samples = samples(3);
    let first = {
        let engine = PenaltyEngine::new(toy_model(), media(), config(2), dir.path()).unwrap();
        engine.run(&samples).unwrap()
    };

    let probe = Probe::default();
    let engine =
        PenaltyEngine::with_solver_factory(toy_model(), media(), config(2), dir.path(), probe.factory())
            .unwrap();
    // only the feasibility check, reference fluxes come from the cache
    assert_eq!(probe.solves(), 1);
    let second = engine.run(&samples).unwrap();
    assert_eq!(probe.solves(), 1);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.processed, 0);
    assert_eq!(first.matrix, second.matrix);
    for sample in &samples {
        assert_eq!(
            second.state(&sample.id),
            Some(&SampleState::Complete { attempts: 0 })
        );
    }
}

#[test]
fn interrupted_run_only_processes_remaining_samples() {
    init_tracing();
    let samples = samples(5);
    let reference = {
        let dir = tempfile::tempdir().unwrap();
        let engine = PenaltyEngine::new(toy_model(), media(), config(2), dir.path()).unwrap();
        engine.run(&samples).unwrap()
    };

    let dir = tempfile::tempdir().unwrap();
    {
        let engine = PenaltyEngine::new(toy_model(), media(), config(2), dir.path()).unwrap();
        engine.run(&samples[..2]).unwrap();
        // a third sample was mid-way when the process was killed
        let cache = engine.cache();
        cache.mark_in_progress(&samples[2].id).unwrap();
        cache
            .store(&samples[2].id, "R2_forward", &PenaltyResult::Penalty(-1.))
            .unwrap();
    }

    let engine = PenaltyEngine::new(toy_model(), media(), config(2), dir.path()).unwrap();
    assert_eq!(engine.cache().progress(&samples[2].id), Progress::InProgress);
    let resumed = engine.run(&samples).unwrap();
    assert_eq!(resumed.skipped, 2);
    assert_eq!(resumed.processed, 3);
    assert_eq!(resumed.matrix, reference.matrix);
    assert_eq!(engine.cache().progress(&samples[2].id), Progress::Complete);
}

#[test]
fn changed_media_does_not_reuse_results() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let samples = samples(2);
    let old = PenaltyEngine::new(toy_model(), media(), config(1), dir.path()).unwrap();
    old.run(&samples).unwrap();

    let richer = MediaConstraints::new("richer_uptake").with_bound("R1", 0., 20.);
    let engine = PenaltyEngine::new(toy_model(), richer, config(1), dir.path()).unwrap();
    assert!(!engine.cache().fingerprint_matches(old.cache().fingerprint()));
    assert!(!engine.cache().has(&samples[0].id));
    let report = engine.run(&samples).unwrap();
    assert_eq!(report.skipped, 0);
    assert_eq!(report.processed, 2);
    assert_eq!(engine.cache().purge_stale().unwrap(), 1);
    assert!(!old.cache().directory().exists());
}

#[test]
fn selected_reactions_are_computed_without_completing_sample() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let samples = samples(2);
    let engine = PenaltyEngine::new(toy_model(), media(), config(1), dir.path()).unwrap();
    let selection =
        ReactionSelection::parse("cell 0,R2_forward,R3_forward\n".as_bytes()).unwrap();
    let report = engine.run_selected(&samples, &selection).unwrap();
    assert_eq!(report.processed, 2);
    assert!(report.matrix.get("R2_forward", "cell 0").is_some());
    assert!(report.matrix.get("R1_forward", "cell 0").is_none());
    assert!(report.matrix.get("R1_forward", "cell 1").is_some());
    assert!(!engine.cache().has("cell 0"));
    assert!(engine.cache().has("cell 1"));
    assert_eq!(engine.cache().progress("cell 0"), Progress::NotStarted);

    // already stored selections are not recomputed
    let again = engine.run_selected(&samples, &selection).unwrap();
    assert_eq!(again.skipped, 2);

    let full = engine.run(&samples).unwrap();
    assert_eq!(full.processed, 1);
    assert!(engine.cache().has("cell 0"));
}

#[test]
fn configuration_errors_stop_before_any_sample() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let starved = MediaConstraints::new("starved")
        .with_bound("R1", 0., 0.)
        .with_bound("R3", 1., 1000.);
    assert!(matches!(
        PenaltyEngine::new(toy_model(), starved, config(1), dir.path()),
        Err(EngineError::InfeasibleBaseProblem(_))
    ));

    let unknown = MediaConstraints::new("unknown").with_bound("EX_missing", 0., 1.);
    assert!(matches!(
        PenaltyEngine::new(toy_model(), unknown, config(1), dir.path()),
        Err(EngineError::Network(_))
    ));

    let bad_fraction = ConfigurationBuilder::default()
        .optimality_fraction(1.5)
        .build()
        .unwrap();
    assert!(matches!(
        PenaltyEngine::new(toy_model(), media(), bad_fraction, dir.path()),
        Err(EngineError::Configuration(_))
    ));

    let engine = PenaltyEngine::new(toy_model(), media(), config(1), dir.path()).unwrap();
    let selection = ReactionSelection::parse("cell 0,R9_forward".as_bytes()).unwrap();
    assert!(matches!(
        engine.run_selected(&samples(1), &selection),
        Err(EngineError::Selection(_))
    ));
    // a listed sample with nothing selected is not silently reported complete
    let empty = ReactionSelection::parse("cell 0\n".as_bytes()).unwrap();
    assert!(matches!(
        engine.run_selected(&samples(1), &empty),
        Err(EngineError::Selection(SelectionError::NoReactions(sample))) if sample == "cell 0"
    ));
    let mut duplicated = samples(1);
    duplicated.extend(samples(1));
    assert!(matches!(
        engine.run(&duplicated),
        Err(EngineError::DuplicateSample(_))
    ));
}
