//! A single event loop driven by hand through its inbox.

use lamport_mutex_sim::{
    log,
    peer::{Peer, Workload},
    Courier, Directory, JitterSpec, Kind, Observer, Process, ProcessId, ProtocolError,
    ProcessState, Sequencer, SimConfig,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Workload whose timers never fire within a test.
fn idle() -> Workload {
    Workload::from(&SimConfig {
        request_interval_ms: 3_600_000,
        request_probability: 0.0,
        internal_event: JitterSpec::new(3_600_000, 0),
        ..SimConfig::default()
    })
}

#[tokio::test(start_paused = true)]
async fn internal_message_on_the_wire_stops_the_peer_with_an_error() {
    log::set_level(log::Level::Error);
    let (directory, mut inboxes) = Directory::build(2, 4);
    let directory = Arc::new(directory);
    let (_, inbox) = inboxes.remove(0);

    let (observer, watch) = Observer::new(2, 4, false);
    let observer = tokio::spawn(observer.run());
    let (courier, outbox) = Courier::new(ProcessId(0), directory.clone(), JitterSpec::new(0, 0), 1);
    let shutdown = CancellationToken::new();
    tokio::spawn(courier.run(shutdown.clone()));

    let process = Process::new(ProcessId(0), directory.ids());
    let peer = Peer::new(process, inbox, outbox, watch, idle(), 2);
    let handle = tokio::spawn(peer.run(shutdown.clone()));

    let internal = Sequencer::new().stamp(ProcessId(1), 3, Kind::Internal);
    directory.send(ProcessId(0), internal).await.unwrap();

    assert_eq!(
        handle.await.unwrap(),
        Err(ProtocolError::UnexpectedKind {
            process: ProcessId(0),
            kind: "Internal",
        })
    );

    // the failed peer closed its inbox on the way out
    let ack = Sequencer::new().stamp(ProcessId(1), 4, Kind::Ack);
    assert!(directory.send(ProcessId(0), ack).await.is_err());

    shutdown.cancel();
    let report = observer.await.unwrap();
    assert_eq!(report.latest[&ProcessId(0)].state, ProcessState::Free);
}

#[tokio::test(start_paused = true)]
async fn a_request_is_acked_through_the_courier() {
    log::set_level(log::Level::Error);
    let (directory, mut inboxes) = Directory::build(2, 4);
    let directory = Arc::new(directory);
    let (_, inbox) = inboxes.remove(0);
    let (_, mut other) = inboxes.remove(0);

    let (observer, watch) = Observer::new(2, 4, false);
    tokio::spawn(observer.run());
    let (courier, outbox) = Courier::new(ProcessId(0), directory.clone(), JitterSpec::new(5, 0), 1);
    let shutdown = CancellationToken::new();
    tokio::spawn(courier.run(shutdown.clone()));

    let process = Process::new(ProcessId(0), directory.ids());
    let peer = Peer::new(process, inbox, outbox, watch, idle(), 2);
    let handle = tokio::spawn(peer.run(shutdown.clone()));

    let request = Sequencer::new().stamp(ProcessId(1), 6, Kind::Request);
    directory.send(ProcessId(0), request).await.unwrap();

    let ack = tokio::time::timeout(Duration::from_secs(1), other.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ack.origin, ProcessId(0));
    assert_eq!(ack.kind, Kind::Ack);
    assert_eq!(ack.time, 7);

    shutdown.cancel();
    assert_eq!(handle.await.unwrap(), Ok(()));
}
