use std::thread;

use isomc_core::{AccumulatedReading, IsoError, RngHandle};
use isomc_mcmc::{run_blocks, BlockSession, BlockStatus, RunOutcome, SamplerConfig, SyntheticBlockSpec};

fn spec(block_id: u32) -> SyntheticBlockSpec {
    SyntheticBlockSpec {
        block_id,
        ..SyntheticBlockSpec::default()
    }
}

fn session_for(block_id: u32, iterations: usize) -> BlockSession {
    let block = spec(block_id)
        .generate(&mut RngHandle::from_seed(u64::from(block_id)))
        .unwrap();
    let config = SamplerConfig {
        iterations,
        burn_in: iterations / 4,
        ..SamplerConfig::default()
    };
    BlockSession::new(block, config).unwrap()
}

#[test]
fn statistics_are_refused_before_completion() {
    let session = session_for(1, 50);
    let method = spec(1).analysis_method().unwrap();
    let err = session.statistics(&method).unwrap_err();
    assert!(matches!(err, IsoError::Ensemble(_)));
    assert_eq!(err.info().code, "block-not-complete");
}

#[test]
fn skip_before_start_cancels_without_sampling() {
    let mut session = session_for(2, 50);
    session.handle().set_status(BlockStatus::Skip);
    let summary = session.run().unwrap();

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(summary.iterations, 0);
    assert!(session.ensemble().is_empty());
    assert!(!session.handle().is_complete());
    assert_eq!(session.handle().status(), BlockStatus::Skip);
    let method = spec(2).analysis_method().unwrap();
    assert!(session.statistics(&method).is_err());
}

#[test]
fn skip_during_run_stops_at_an_iteration_boundary() {
    let mut session = session_for(3, 1_000_000);
    let handle = session.handle();
    let summary = thread::scope(|scope| {
        scope.spawn(|| {
            while handle.iterations() < 25 {
                thread::yield_now();
            }
            handle.set_status(BlockStatus::Skip);
        });
        session.run().unwrap()
    });

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert!(summary.iterations >= 25);
    assert!(summary.iterations < 1_000_000);
    assert_eq!(session.ensemble().len(), summary.iterations);
    assert_eq!(session.handle().iterations(), summary.iterations);
    assert!(!session.handle().is_complete());
    assert!(session
        .log_lines()
        .iter()
        .any(|line| line.contains("Cancelled")));
}

#[test]
fn completed_block_moves_to_show_and_reset_returns_to_run() {
    let mut session = session_for(4, 40);
    session.run().unwrap();
    assert_eq!(session.handle().status(), BlockStatus::Show);
    assert!(session.log_lines().iter().any(|line| line.contains("initial estimate")));

    session.reset();
    assert_eq!(session.handle().status(), BlockStatus::Run);
    assert!(session.log_lines().is_empty());
}

#[test]
fn parallel_blocks_are_isolated_and_ordered() {
    let solo = session_for(6, 150).run().unwrap();

    let mut broken = session_for(5, 150);
    let mut block = broken.block().clone();
    for reading in &mut block.onpeak_photomultiplier {
        *reading = AccumulatedReading::photomultiplier(
            reading.isotope.unwrap_or(0),
            reading.time_index,
            -1.0,
        );
    }
    broken = BlockSession::new(block, broken.config().clone()).unwrap();

    let mut sessions = vec![broken, session_for(6, 150), session_for(7, 150)];
    let results = run_blocks(&mut sessions);

    assert_eq!(results.len(), 3);
    let err = results[0].as_ref().unwrap_err();
    assert!(matches!(err, IsoError::Numerical(_)));
    assert_eq!(err.info().code, "non-positive-mean");
    assert!(sessions[0].log_lines().iter().any(|line| line.contains("failed")));

    let sixth = results[1].as_ref().unwrap();
    assert_eq!(sixth.block_id, 6);
    assert_eq!(sixth.ensemble_hash, solo.ensemble_hash);
    assert_eq!(results[2].as_ref().unwrap().block_id, 7);
}

#[test]
fn weights_only_on_missing_log_ratios_are_rejected() {
    let single = SyntheticBlockSpec {
        abundances: vec![1.0],
        ..spec(8)
    };
    let block = single.generate(&mut RngHandle::from_seed(8)).unwrap();
    let mut config = SamplerConfig::default();
    config.operation_weights.baseline = 0.0;
    config.operation_weights.gain = 0.0;
    config.operation_weights.noise = 0.0;
    config.operation_weights.intensity = 0.0;
    assert!(config.validate().is_ok());

    let err = BlockSession::new(block.clone(), config.clone()).unwrap_err();
    assert!(matches!(err, IsoError::Config(_)));
    assert_eq!(err.info().code, "no-applicable-operation");

    config.operation_weights.gain = 1.0;
    assert!(BlockSession::new(block, config).is_ok());
}
