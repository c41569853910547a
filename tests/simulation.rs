//! Whole simulations on tokio's paused clock: timers fire in virtual time.

use lamport_mutex_sim::{log, JitterSpec, ProcessState, SimConfig, Simulation};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config(processes: u32, seed: u64) -> SimConfig {
    SimConfig {
        processes,
        seed,
        request_interval_ms: 200,
        request_probability: 0.5,
        internal_event: JitterSpec::new(100, 50),
        usage: JitterSpec::new(100, 50),
        initial_usage: JitterSpec::new(100, 25),
        delivery: JitterSpec::new(20, 10),
        observer_capacity: 5,
        bootstrap_holder: true,
        json: false,
        run_for_ms: Some(20_000),
    }
}

#[tokio::test(start_paused = true)]
async fn three_processes_take_turns_safely() {
    log::set_level(log::Level::Error);
    let report = Simulation::new(config(3, 17))
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_safe());
    assert!(report.failures.is_empty());
    assert!(report.bootstrap_holder.is_some());
    assert!(report.observer.grants > 3, "only {} grants", report.observer.grants);
    assert_eq!(report.observer.clock_regressions, 0);
    assert_eq!(report.observer.latest.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn ten_processes_without_a_bootstrap_holder() {
    log::set_level(log::Level::Error);
    let config = SimConfig {
        bootstrap_holder: false,
        ..config(10, 3)
    };
    let report = Simulation::new(config)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_safe());
    assert!(report.failures.is_empty());
    assert_eq!(report.bootstrap_holder, None);
    assert!(report.observer.grants > 0);
    assert_eq!(report.observer.clock_regressions, 0);
}

#[tokio::test(start_paused = true)]
async fn a_single_process_serves_itself() {
    log::set_level(log::Level::Error);
    let config = SimConfig {
        bootstrap_holder: false,
        request_probability: 1.0,
        ..config(1, 5)
    };
    let report = Simulation::new(config)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_safe());
    assert!(report.observer.grants > 10);
}

#[tokio::test(start_paused = true)]
async fn external_shutdown_stops_every_process() {
    log::set_level(log::Level::Error);
    let shutdown = CancellationToken::new();
    let config = SimConfig {
        run_for_ms: None,
        ..config(4, 99)
    };

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let report = Simulation::new(config).unwrap().run(shutdown).await.unwrap();

    assert!(report.is_safe());
    assert!(report.failures.is_empty());
    let holders = report
        .observer
        .latest
        .values()
        .filter(|n| n.state == ProcessState::Holding)
        .count();
    assert!(holders <= 1);
}

#[test]
fn invalid_configs_are_refused() {
    let config = SimConfig {
        processes: 0,
        ..SimConfig::default()
    };
    assert!(Simulation::new(config).is_err());
}
