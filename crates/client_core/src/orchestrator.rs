use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use shared::domain::{Destination, TransferMode, TransportProtocol};
use tokio::sync::{
    mpsc::{self, error::TrySendError, UnboundedReceiver},
    watch,
};
use tracing::{debug, info, warn};

use crate::{
    backend::TransferBackend,
    config::Settings,
    error::SessionError,
    event_bridge::{route, DropZone, EventBridge, EventSource, Inbound, Routes},
    notifications::{NotificationId, NotificationQueue, NotificationRecord},
    progress::{ProgressAggregator, ProgressView},
    session::{SessionController, SessionState},
    timers::TimerSet,
};

pub(crate) enum LoopSignal {
    NotificationExpired(NotificationId),
    HideProgress { generation: u64 },
    RevertToIdle { epoch: u64 },
    ReceiveReady { epoch: u64 },
    ReceiveEnded { epoch: u64, result: Result<()> },
    StopFinished { epoch: u64, result: Result<()> },
    SendFinished { epoch: u64, result: Result<()> },
    FilesPicked(Result<Vec<String>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    SetMode(TransferMode),
    SetProtocol(TransportProtocol),
    SetDestination(Destination),
    AddFiles(Vec<String>),
    ClearFiles,
    PickFiles,
    Send,
    DismissNotification(NotificationId),
    SetDowntimeSimulation(bool),
}

impl UiCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetMode(_) => "set_mode",
            Self::SetProtocol(_) => "set_protocol",
            Self::SetDestination(_) => "set_destination",
            Self::AddFiles(_) => "add_files",
            Self::ClearFiles => "clear_files",
            Self::PickFiles => "pick_files",
            Self::Send => "send",
            Self::DismissNotification(_) => "dismiss_notification",
            Self::SetDowntimeSimulation(_) => "set_downtime_simulation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub mode: TransferMode,
    pub protocol: TransportProtocol,
    pub destination: Destination,
    pub state: SessionState,
    pub files: Vec<String>,
    pub progress: Option<ProgressView>,
    pub notifications: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("UI command queue is full; please retry")]
    QueueFull,
    #[error("orchestrator loop has stopped")]
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<UiCommand>,
}

impl OrchestratorHandle {
    pub fn channel(settings: &Settings) -> (Self, mpsc::Receiver<UiCommand>) {
        let (tx, rx) = mpsc::channel(settings.command_queue.max(1));
        (Self { tx }, rx)
    }

    pub fn dispatch(&self, command: UiCommand) -> Result<(), DispatchError> {
        let name = command.name();
        match self.tx.try_send(command) {
            Ok(()) => {
                debug!(command = name, "queued ui command");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(DispatchError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(DispatchError::Disconnected),
        }
    }
}

pub struct Orchestrator {
    settings: Settings,
    session: SessionController,
    progress: ProgressAggregator,
    notifications: NotificationQueue,
    hide_timers: TimerSet<u64, LoopSignal>,
    bridge: EventBridge,
    signals: UnboundedReceiver<LoopSignal>,
    published: watch::Sender<SessionSnapshot>,
    disposed: bool,
}

impl Orchestrator {
    /// Builds the session and attaches the event bridge. Must be called from
    /// within a tokio runtime.
    pub fn new(
        settings: Settings,
        backend: Arc<dyn TransferBackend>,
        events: Arc<dyn EventSource>,
        drop_zone: Arc<dyn DropZone>,
    ) -> Result<Self> {
        let bridge = EventBridge::attach(events, drop_zone)?;
        let (signal_tx, signals) = mpsc::unbounded_channel();

        let session = SessionController::new(
            backend,
            signal_tx.clone(),
            settings.completion_delay,
            Destination::new("", settings.default_port.clone()),
        );
        let notifications = NotificationQueue::new(settings.notification_ttl, signal_tx.clone());
        let hide_timers = TimerSet::new(signal_tx);

        let mut orchestrator = Self {
            settings,
            session,
            progress: ProgressAggregator::new(),
            notifications,
            hide_timers,
            bridge,
            signals,
            published: watch::channel(empty_snapshot()).0,
            disposed: false,
        };
        orchestrator.publish();
        Ok(orchestrator)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn progress(&self) -> Option<ProgressView> {
        self.progress.view()
    }

    pub fn notifications(&self) -> &[NotificationRecord] {
        self.notifications.records()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.session.mode(),
            protocol: self.session.protocol(),
            destination: self.session.destination().clone(),
            state: self.session.state(),
            files: self.session.files().paths().to_vec(),
            progress: self.progress.view(),
            notifications: self.notifications.records().to_vec(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.published.subscribe()
    }

    pub fn apply(&mut self, command: UiCommand) -> Result<(), SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        debug!(command = command.name(), "applying ui command");

        let result = match command {
            UiCommand::SetMode(mode) => self.session.set_mode(mode),
            UiCommand::SetProtocol(protocol) => self.session.set_protocol(protocol),
            UiCommand::SetDestination(destination) => {
                self.session.set_destination(destination);
                Ok(())
            }
            UiCommand::AddFiles(paths) => {
                self.session.add_files(paths);
                Ok(())
            }
            UiCommand::ClearFiles => {
                self.session.clear_files();
                Ok(())
            }
            UiCommand::PickFiles => {
                self.session.pick_files();
                Ok(())
            }
            UiCommand::Send => self.session.send().map(|_| ()),
            UiCommand::DismissNotification(id) => {
                self.notifications.dismiss(id);
                Ok(())
            }
            UiCommand::SetDowntimeSimulation(enabled) => {
                self.session.set_downtime_simulation(enabled);
                Ok(())
            }
        };

        self.publish();
        result
    }

    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while !self.disposed {
            if let Ok(signal) = self.signals.try_recv() {
                self.handle_signal(signal);
            } else if let Some(inbound) = self.bridge.try_next() {
                self.handle_inbound(inbound);
            } else {
                break;
            }
            handled += 1;
        }
        handled
    }

    pub async fn tick(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        tokio::select! {
            biased;
            Some(signal) = self.signals.recv() => {
                self.handle_signal(signal);
                true
            }
            Some(inbound) = self.bridge.next() => {
                self.handle_inbound(inbound);
                true
            }
            else => false,
        }
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<UiCommand>) {
        info!("orchestrator loop started");
        loop {
            tokio::select! {
                biased;
                Some(signal) = self.signals.recv() => self.handle_signal(signal),
                Some(inbound) = self.bridge.next() => self.handle_inbound(inbound),
                command = commands.recv() => match command {
                    Some(command) => {
                        let name = command.name();
                        if let Err(err) = self.apply(command) {
                            warn!(command = name, "ui command rejected: {err}");
                        }
                    }
                    None => break,
                },
            }
        }
        self.shutdown();
        info!("orchestrator loop stopped");
    }

    pub fn shutdown(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.bridge.dispose();
        self.hide_timers.cancel_all();
        self.notifications.clear();
        self.session.shutdown();
        while self.signals.try_recv().is_ok() {}
        debug!("orchestrator disposed");
    }

    fn handle_signal(&mut self, signal: LoopSignal) {
        if self.disposed {
            return;
        }
        match signal {
            LoopSignal::NotificationExpired(id) => {
                self.notifications.expire(id);
            }
            LoopSignal::HideProgress { generation } => {
                self.hide_timers.fired(&generation);
                self.progress.hide(generation);
            }
            other => self.session.handle_signal(other),
        }
        self.publish();
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        if self.disposed {
            return;
        }
        match inbound {
            Inbound::Event(event) => {
                let mut routes = Routes {
                    progress: &mut self.progress,
                    notifications: &mut self.notifications,
                    session: &mut self.session,
                    hide_timers: &mut self.hide_timers,
                    completion_delay: self.settings.completion_delay,
                };
                route(event, &mut routes);
            }
            Inbound::Dropped(paths) => {
                let added = self.session.add_files(paths);
                debug!(added, "dropped files merged");
            }
        }
        self.publish();
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.published.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn empty_snapshot() -> SessionSnapshot {
    SessionSnapshot {
        mode: TransferMode::default(),
        protocol: TransportProtocol::default(),
        destination: Destination::default(),
        state: SessionState::Idle,
        files: Vec::new(),
        progress: None,
        notifications: Vec::new(),
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
