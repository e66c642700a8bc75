use super::*;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use shared::{
    domain::{SendDescriptor, Severity},
    protocol::EventName,
};
use tokio::sync::Notify;

use crate::{
    backend::ReadySignal,
    error::ValidationError,
    local::{LocalDropZone, LocalEventHub},
};

#[derive(Default)]
struct FakeBackend {
    calls: Mutex<Vec<String>>,
    receive_stop: Notify,
    fail_start: bool,
    fail_send: Option<String>,
    hold_send: bool,
    send_gate: Notify,
    picked: Vec<String>,
    downtime: AtomicBool,
}

impl FakeBackend {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("calls").push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl TransferBackend for FakeBackend {
    async fn start_receive(&self, ready: ReadySignal) -> Result<()> {
        self.record("start_receive");
        if self.fail_start {
            return Err(anyhow!("address already in use"));
        }
        ready.notify();
        self.receive_stop.notified().await;
        Ok(())
    }

    async fn stop_receive(&self) -> Result<()> {
        self.record("stop_receive");
        self.receive_stop.notify_waiters();
        Ok(())
    }

    async fn send_files(&self, descriptor: SendDescriptor) -> Result<()> {
        self.record(format!(
            "send {}:{} tcp={} {:?}",
            descriptor.address, descriptor.port, descriptor.tcp, descriptor.paths
        ));
        if self.hold_send {
            self.send_gate.notified().await;
        }
        match &self.fail_send {
            Some(err) => Err(anyhow!(err.clone())),
            None => Ok(()),
        }
    }

    async fn select_files(&self) -> Result<Vec<String>> {
        self.record("select_files");
        Ok(self.picked.clone())
    }

    fn set_downtime_simulation(&self, enabled: bool) {
        self.downtime.store(enabled, Ordering::SeqCst);
    }
}

struct Harness {
    orch: Orchestrator,
    backend: Arc<FakeBackend>,
    hub: Arc<LocalEventHub>,
    zone: Arc<LocalDropZone>,
}

impl Harness {
    fn new(backend: FakeBackend) -> Self {
        let backend = Arc::new(backend);
        let hub = Arc::new(LocalEventHub::new());
        let zone = Arc::new(LocalDropZone::new());
        let orch = Orchestrator::new(
            Settings::default(),
            backend.clone(),
            hub.clone(),
            zone.clone(),
        )
        .expect("orchestrator");
        Self {
            orch,
            backend,
            hub,
            zone,
        }
    }

    /// Lets spawned command tasks and timers run, then handles what they posted.
    async fn settle(&mut self) {
        for _ in 0..8 {
            tokio::task::yield_now().await;
            self.orch.process_pending();
        }
    }

    fn emit(&self, name: EventName, payload: serde_json::Value) {
        assert_eq!(self.hub.emit_event(name, payload), 1);
    }

    fn ready_to_send(&mut self) {
        self.orch
            .apply(UiCommand::AddFiles(vec!["/a.txt".into()]))
            .expect("add files");
        self.orch
            .apply(UiCommand::SetDestination(Destination::new("127.0.0.1", "8080")))
            .expect("destination");
    }

    fn notification_texts(&self) -> Vec<(Severity, String)> {
        self.orch
            .notifications()
            .iter()
            .map(|record| (record.severity, record.text.clone()))
            .collect()
    }
}

#[tokio::test]
async fn receive_mode_starts_a_single_loop() {
    let mut h = Harness::new(FakeBackend::default());

    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("start receive");
    assert_eq!(h.orch.state(), SessionState::Starting);
    assert_eq!(
        h.orch.apply(UiCommand::SetMode(TransferMode::Receive)),
        Err(SessionError::TransitionInFlight(SessionState::Starting))
    );

    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Active);

    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("already receiving");
    h.settle().await;
    assert_eq!(h.backend.count("start_receive"), 1);
    assert_eq!(h.orch.state(), SessionState::Active);
}

#[tokio::test]
async fn mode_changes_are_rejected_while_stopping() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive");
    h.settle().await;

    h.orch
        .apply(UiCommand::SetMode(TransferMode::Transmit))
        .expect("transmit");
    assert_eq!(h.orch.state(), SessionState::Stopping);
    assert_eq!(
        h.orch.apply(UiCommand::SetMode(TransferMode::Receive)),
        Err(SessionError::TransitionInFlight(SessionState::Stopping))
    );

    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Idle);
    assert_eq!(h.orch.session().mode(), TransferMode::Transmit);
    assert!(!h.orch.session().is_receive_loop_running());
    assert_eq!(h.backend.calls(), ["start_receive", "stop_receive"]);
}

#[tokio::test]
async fn receive_can_restart_after_stop() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive");
    h.settle().await;
    h.orch
        .apply(UiCommand::SetMode(TransferMode::Transmit))
        .expect("transmit");
    h.settle().await;

    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive again");
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Active);
    assert_eq!(h.backend.count("start_receive"), 2);
}

#[tokio::test]
async fn failed_start_falls_back_to_idle() {
    let mut h = Harness::new(FakeBackend {
        fail_start: true,
        ..FakeBackend::default()
    });

    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive");
    h.settle().await;

    assert_eq!(h.orch.state(), SessionState::Idle);
    assert!(!h.orch.session().is_receive_loop_running());
    assert_eq!(h.orch.session().mode(), TransferMode::Receive);
}

#[tokio::test]
async fn mode_switch_clears_the_file_selection() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::AddFiles(vec!["/a".into()]))
        .expect("add");
    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive");
    assert!(h.orch.session().files().is_empty());
}

#[tokio::test]
async fn send_with_empty_destination_issues_no_command() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::AddFiles(vec!["/a.txt".into()]))
        .expect("add");
    let before = h.orch.snapshot();

    assert_eq!(
        h.orch.apply(UiCommand::Send),
        Err(SessionError::Validation(ValidationError::EmptyAddress))
    );
    h.settle().await;

    assert!(h.backend.calls().is_empty());
    assert_eq!(h.orch.snapshot(), before);
    assert!(h.orch.notifications().is_empty());
}

#[tokio::test]
async fn send_preconditions_are_checked_locally() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::SetDestination(Destination::new("  ", "8080")))
        .expect("destination");
    h.orch
        .apply(UiCommand::AddFiles(vec!["/a".into()]))
        .expect("add");
    assert_eq!(
        h.orch.apply(UiCommand::Send),
        Err(SessionError::Validation(ValidationError::EmptyAddress))
    );

    h.orch
        .apply(UiCommand::SetDestination(Destination::new("10.0.0.2", "")))
        .expect("destination");
    assert_eq!(
        h.orch.apply(UiCommand::Send),
        Err(SessionError::Validation(ValidationError::EmptyPort))
    );

    h.orch
        .apply(UiCommand::SetDestination(Destination::new("10.0.0.2", "9000")))
        .expect("destination");
    h.orch.apply(UiCommand::ClearFiles).expect("clear");
    assert_eq!(
        h.orch.apply(UiCommand::Send),
        Err(SessionError::Validation(ValidationError::NoFiles))
    );

    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive");
    h.settle().await;
    h.orch
        .apply(UiCommand::AddFiles(vec!["/a".into()]))
        .expect("add");
    assert_eq!(
        h.orch.apply(UiCommand::Send),
        Err(SessionError::Validation(ValidationError::WrongMode(
            TransferMode::Receive
        )))
    );
    assert_eq!(h.backend.count("send"), 0);
}

#[tokio::test]
async fn successful_send_clears_files_and_returns_to_idle() {
    let mut h = Harness::new(FakeBackend::default());
    h.ready_to_send();
    h.orch
        .apply(UiCommand::SetProtocol(TransportProtocol::Udp))
        .expect("udp");

    h.orch.apply(UiCommand::Send).expect("send");
    assert_eq!(h.orch.state(), SessionState::Sending);
    assert_eq!(
        h.orch.apply(UiCommand::SetProtocol(TransportProtocol::Tcp)),
        Err(SessionError::ProtocolLocked)
    );
    assert_eq!(
        h.orch.apply(UiCommand::Send),
        Err(SessionError::Validation(ValidationError::NotIdle(
            SessionState::Sending
        )))
    );

    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Idle);
    assert!(h.orch.session().files().is_empty());
    assert_eq!(
        h.backend.calls(),
        [r#"send 127.0.0.1:8080 tcp=false ["/a.txt"]"#]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_send_reverts_to_idle_after_the_completion_delay() {
    let mut h = Harness::new(FakeBackend {
        fail_send: Some("connection refused".into()),
        ..FakeBackend::default()
    });
    h.ready_to_send();

    h.orch.apply(UiCommand::Send).expect("send");
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Error);
    assert_eq!(h.orch.session().files().len(), 1);
    assert!(h.orch.notifications().is_empty());

    tokio::time::sleep(Duration::from_millis(1999)).await;
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Error);

    tokio::time::sleep(Duration::from_millis(2)).await;
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn client_error_ends_an_in_flight_send() {
    let mut h = Harness::new(FakeBackend {
        hold_send: true,
        ..FakeBackend::default()
    });
    h.ready_to_send();
    h.orch.apply(UiCommand::Send).expect("send");
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Sending);

    h.emit(EventName::ClientError, json!("No se pudo conectar"));
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Error);
    assert_eq!(
        h.notification_texts(),
        [(Severity::Error, "No se pudo conectar".to_string())]
    );

    tokio::time::sleep(Duration::from_millis(2001)).await;
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Idle);

    // The send resolving late belongs to a finished attempt.
    h.backend.send_gate.notify_one();
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Idle);
    assert_eq!(h.orch.session().files().len(), 1);
}

#[tokio::test]
async fn transmit_progress_reports_percentage() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(
        EventName::SendingFileStart,
        json!({ "fileName": "a", "currentFile": 1, "totalFiles": 2 }),
    );
    h.emit(
        EventName::SendingFileProgress,
        json!({ "sent": 50, "total": 100 }),
    );
    h.settle().await;

    let progress = h.orch.progress().expect("progress visible");
    assert_eq!(progress.file_name, "a");
    assert_eq!((progress.current_file_index, progress.total_files), (1, 2));
    assert_eq!(progress.percentage, 50.0);
    assert_eq!(progress.retransmission_count, None);
}

#[tokio::test]
async fn reported_retransmissions_are_surfaced() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(
        EventName::SendingFileStart,
        json!({ "fileName": "a", "currentFile": 1, "totalFiles": 1 }),
    );
    h.emit(
        EventName::SendingFileProgress,
        json!({ "sent": 10, "total": 100, "retransmissions": 4 }),
    );
    h.settle().await;
    assert_eq!(
        h.orch.progress().expect("progress").retransmission_count,
        Some(4)
    );
}

#[tokio::test]
async fn stale_generations_are_discarded() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(
        EventName::SendingFileStart,
        json!({ "fileName": "second", "currentFile": 2, "totalFiles": 2, "generation": 2 }),
    );
    h.emit(
        EventName::SendingFileProgress,
        json!({ "sent": 30, "total": 100, "generation": 2 }),
    );
    h.emit(
        EventName::SendingFileStart,
        json!({ "fileName": "first", "currentFile": 1, "totalFiles": 2, "generation": 1 }),
    );
    h.emit(
        EventName::SendingFileProgress,
        json!({ "sent": 90, "total": 100, "generation": 1 }),
    );
    h.settle().await;

    let progress = h.orch.progress().expect("progress");
    assert_eq!(progress.file_name, "second");
    assert_eq!(progress.percentage, 30.0);
}

#[tokio::test(start_paused = true)]
async fn receive_scenario_notifies_and_hides_progress_after_the_delay() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive");
    h.settle().await;

    h.emit(EventName::ReceptionStarted, json!("x.bin"));
    h.settle().await;
    assert!(h.orch.progress().is_none());

    h.emit(
        EventName::ReceivingFileProgress,
        json!({ "received": 512, "total": 1024 }),
    );
    h.emit(EventName::ReceptionFinished, json!("done"));
    h.settle().await;

    assert_eq!(
        h.notification_texts(),
        [
            (Severity::Info, "Receiving file: x.bin...".to_string()),
            (Severity::Success, "done".to_string()),
        ]
    );
    assert_eq!(h.orch.progress().expect("visible").percentage, 50.0);

    tokio::time::sleep(Duration::from_millis(1999)).await;
    h.settle().await;
    assert!(h.orch.progress().is_some());

    tokio::time::sleep(Duration::from_millis(2)).await;
    h.settle().await;
    assert!(h.orch.progress().is_none());
    assert_eq!(h.orch.notifications().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn a_new_transfer_cancels_the_pending_hide() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(
        EventName::SendingFileStart,
        json!({ "fileName": "a", "currentFile": 1, "totalFiles": 1 }),
    );
    h.emit(EventName::ReceptionFinished, json!("sent"));
    h.settle().await;

    tokio::time::sleep(Duration::from_millis(1000)).await;
    h.emit(
        EventName::SendingFileStart,
        json!({ "fileName": "b", "currentFile": 1, "totalFiles": 1 }),
    );
    h.settle().await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    h.settle().await;
    assert_eq!(h.orch.progress().expect("still visible").file_name, "b");
}

#[tokio::test(start_paused = true)]
async fn notifications_expire_after_the_ttl() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(EventName::ServerError, json!("listener failed"));
    h.settle().await;
    assert_eq!(h.orch.notifications().len(), 1);

    tokio::time::sleep(Duration::from_millis(4999)).await;
    h.settle().await;
    assert_eq!(h.orch.notifications().len(), 1);

    tokio::time::sleep(Duration::from_millis(2)).await;
    h.settle().await;
    assert!(h.orch.notifications().is_empty());
}

#[tokio::test]
async fn dismissed_notifications_disappear_immediately() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(EventName::ServerError, json!("oops"));
    h.settle().await;
    let id = h.orch.notifications()[0].id;

    h.orch
        .apply(UiCommand::DismissNotification(id))
        .expect("dismiss");
    h.orch
        .apply(UiCommand::DismissNotification(id))
        .expect("dismiss twice");
    assert!(h.orch.notifications().is_empty());
}

#[tokio::test]
async fn malformed_payloads_are_dropped() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(
        EventName::SendingFileStart,
        json!({ "fileName": "a", "currentFile": 1, "totalFiles": 1 }),
    );
    h.emit(EventName::SendingFileProgress, json!({ "sent": "lots" }));
    h.emit(EventName::ReceptionStarted, json!({ "unexpected": true }));
    h.emit(
        EventName::SendingFileProgress,
        json!({ "sent": 1, "total": 4 }),
    );
    h.settle().await;

    assert_eq!(h.orch.progress().expect("progress").percentage, 25.0);
    assert!(h.orch.notifications().is_empty());
}

#[tokio::test]
async fn dropped_and_picked_files_merge_without_duplicates() {
    let mut h = Harness::new(FakeBackend {
        picked: vec!["/b".into(), "/c".into()],
        ..FakeBackend::default()
    });

    assert_eq!(h.zone.drop_paths(["/a", "/a", "/b"]), 1);
    h.settle().await;
    h.orch.apply(UiCommand::PickFiles).expect("pick");
    h.settle().await;

    assert_eq!(h.orch.session().files().paths(), ["/a", "/b", "/c"]);
    assert_eq!(h.backend.count("select_files"), 1);
}

#[tokio::test]
async fn downtime_simulation_is_forwarded() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::SetDowntimeSimulation(true))
        .expect("downtime");
    assert!(h.backend.downtime.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_every_subscription_and_timer() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive");
    h.settle().await;
    h.emit(EventName::ServerError, json!("bye"));
    h.settle().await;
    assert_eq!(h.hub.subscriber_count(), 1);
    assert_eq!(h.zone.registration_count(), 1);

    h.orch.shutdown();
    h.orch.shutdown();

    assert_eq!(h.hub.subscriber_count(), 0);
    assert_eq!(h.zone.registration_count(), 0);
    assert!(h.orch.notifications().is_empty());
    assert!(h.orch.is_disposed());
    assert_eq!(
        h.orch.apply(UiCommand::ClearFiles),
        Err(SessionError::Disposed)
    );
    assert_eq!(h.hub.emit_event(EventName::ServerError, json!("late")), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.orch.process_pending(), 0);
}

#[tokio::test]
async fn disposing_one_session_leaves_other_subscribers_alone() {
    let hub = Arc::new(LocalEventHub::new());
    let zone = Arc::new(LocalDropZone::new());
    let build = || {
        Orchestrator::new(
            Settings::default(),
            Arc::new(FakeBackend::default()),
            hub.clone(),
            zone.clone(),
        )
        .expect("orchestrator")
    };
    let first = build();
    let mut second = build();
    assert_eq!(hub.subscriber_count(), 2);

    drop(first);
    assert_eq!(hub.subscriber_count(), 1);
    assert_eq!(zone.registration_count(), 1);

    assert_eq!(hub.emit_event(EventName::ServerError, json!("still here")), 1);
    second.process_pending();
    assert_eq!(second.notifications().len(), 1);
}

#[tokio::test]
async fn snapshots_are_published_to_observers() {
    let mut h = Harness::new(FakeBackend::default());
    let mut view = h.orch.subscribe();
    assert!(!view.has_changed().expect("open"));

    h.orch
        .apply(UiCommand::AddFiles(vec!["/a".into()]))
        .expect("add");
    assert!(view.has_changed().expect("open"));
    assert_eq!(view.borrow_and_update().files, ["/a"]);

    h.orch
        .apply(UiCommand::AddFiles(vec!["/a".into()]))
        .expect("duplicate add");
    assert!(!view.has_changed().expect("open"));
}

#[tokio::test]
async fn handle_reports_full_and_closed_queues() {
    let settings = Settings {
        command_queue: 1,
        ..Settings::default()
    };
    let (handle, rx) = OrchestratorHandle::channel(&settings);

    handle.dispatch(UiCommand::ClearFiles).expect("first");
    assert_eq!(
        handle.dispatch(UiCommand::ClearFiles),
        Err(DispatchError::QueueFull)
    );
    drop(rx);
    assert_eq!(
        handle.dispatch(UiCommand::ClearFiles),
        Err(DispatchError::Disconnected)
    );
}

#[tokio::test]
async fn run_loop_processes_commands_until_the_handle_is_dropped() {
    let backend = Arc::new(FakeBackend::default());
    let hub = Arc::new(LocalEventHub::new());
    let settings = Settings::default();
    let (handle, rx) = OrchestratorHandle::channel(&settings);
    let orch = Orchestrator::new(
        settings,
        backend.clone(),
        hub.clone(),
        Arc::new(LocalDropZone::new()),
    )
    .expect("orchestrator");
    let mut view = orch.subscribe();
    let task = tokio::spawn(orch.run(rx));

    handle
        .dispatch(UiCommand::AddFiles(vec!["/report.pdf".into()]))
        .expect("add");
    handle
        .dispatch(UiCommand::SetDestination(Destination::new("10.0.0.2", "8080")))
        .expect("destination");
    handle.dispatch(UiCommand::Send).expect("send");

    view.wait_for(|snapshot| {
        snapshot.destination.address == "10.0.0.2"
            && snapshot.files.is_empty()
            && snapshot.state == SessionState::Idle
    })
    .await
    .expect("send completes");

    drop(handle);
    task.await.expect("loop exits");
    assert_eq!(backend.count("send 10.0.0.2:8080"), 1);
    assert_eq!(hub.subscriber_count(), 0);
}

#[tokio::test]
async fn tick_handles_one_item_at_a_time() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(EventName::ServerError, json!("one"));
    h.emit(EventName::ServerError, json!("two"));

    assert!(h.orch.tick().await);
    assert_eq!(h.orch.notifications().len(), 1);
    assert!(h.orch.tick().await);
    assert_eq!(h.orch.notifications().len(), 2);

    h.orch.shutdown();
    assert!(!h.orch.tick().await);
}

#[tokio::test]
async fn missing_backend_never_leaves_idle_for_long() {
    let hub = Arc::new(LocalEventHub::new());
    let mut orch = Orchestrator::new(
        Settings::default(),
        Arc::new(crate::backend::MissingTransferBackend),
        hub,
        Arc::new(crate::event_bridge::MissingDropZone),
    )
    .expect("orchestrator");

    orch.apply(UiCommand::SetMode(TransferMode::Receive)).expect("receive");
    for _ in 0..8 {
        tokio::task::yield_now().await;
        orch.process_pending();
    }
    assert_eq!(orch.state(), SessionState::Idle);
    assert!(!orch.session().is_receive_loop_running());
}

#[tokio::test(start_paused = true)]
async fn server_error_while_starting_reverts_through_error() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive");
    h.emit(EventName::ServerError, json!("address already in use"));
    h.orch.process_pending();

    assert_eq!(h.orch.state(), SessionState::Error);
    assert!(!h.orch.session().is_receive_loop_running());

    tokio::time::sleep(Duration::from_millis(2001)).await;
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Idle);
    assert_eq!(h.orch.session().mode(), TransferMode::Receive);
}

#[tokio::test]
async fn server_error_while_active_only_notifies() {
    let mut h = Harness::new(FakeBackend::default());
    h.orch
        .apply(UiCommand::SetMode(TransferMode::Receive))
        .expect("receive");
    h.settle().await;

    h.emit(EventName::ServerError, json!("checksum mismatch in x.bin"));
    h.settle().await;
    assert_eq!(h.orch.state(), SessionState::Active);
    assert_eq!(h.orch.notifications().len(), 1);
}

#[tokio::test]
async fn stamped_send_after_an_unstamped_reception_is_tracked() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(EventName::ReceptionStarted, json!("x.bin"));
    h.emit(
        EventName::SendingFileStart,
        json!({ "fileName": "a", "currentFile": 1, "totalFiles": 1, "generation": 1 }),
    );
    h.emit(
        EventName::SendingFileProgress,
        json!({ "sent": 50, "total": 100, "generation": 1 }),
    );
    h.settle().await;

    let progress = h.orch.progress().expect("send progress visible");
    assert_eq!(progress.file_name, "a");
    assert_eq!(progress.percentage, 50.0);
}

#[tokio::test]
async fn maximal_generation_stamp_keeps_the_loop_alive() {
    let mut h = Harness::new(FakeBackend::default());
    h.emit(
        EventName::SendingFileStart,
        json!({ "fileName": "a", "currentFile": 1, "totalFiles": 1, "generation": u64::MAX }),
    );
    h.emit(EventName::ReceptionStarted, json!("x.bin"));
    h.emit(
        EventName::ReceivingFileProgress,
        json!({ "received": 1, "total": 4 }),
    );
    h.settle().await;

    let progress = h.orch.progress().expect("receive progress visible");
    assert_eq!(progress.file_name, "x.bin");
    assert_eq!(progress.percentage, 25.0);
}
