use std::{sync::Arc, time::Duration};

use anyhow::Result;
use serde::Serialize;
use shared::domain::{Destination, SendDescriptor, TransferMode, TransportProtocol};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    backend::{ReadySignal, TransferBackend},
    error::{SessionError, ValidationError},
    files::FileSelectionSet,
    orchestrator::LoopSignal,
    timers::TimerSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
    Sending,
    Error,
}

impl SessionState {
    pub fn is_transitioning(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping | Self::Sending)
    }
}

struct ReceiveLoop {
    epoch: u64,
    task: JoinHandle<()>,
}

pub struct SessionController {
    backend: Arc<dyn TransferBackend>,
    signals: UnboundedSender<LoopSignal>,
    completion_delay: Duration,
    state: SessionState,
    mode: TransferMode,
    protocol: TransportProtocol,
    destination: Destination,
    files: FileSelectionSet,
    epoch: u64,
    receive_loop: Option<ReceiveLoop>,
    command_task: Option<JoinHandle<()>>,
    picker_task: Option<JoinHandle<()>>,
    revert: TimerSet<u64, LoopSignal>,
}

impl SessionController {
    pub(crate) fn new(
        backend: Arc<dyn TransferBackend>,
        signals: UnboundedSender<LoopSignal>,
        completion_delay: Duration,
        destination: Destination,
    ) -> Self {
        Self {
            backend,
            revert: TimerSet::new(signals.clone()),
            signals,
            completion_delay,
            state: SessionState::Idle,
            mode: TransferMode::Transmit,
            protocol: TransportProtocol::Tcp,
            destination,
            files: FileSelectionSet::new(),
            epoch: 0,
            receive_loop: None,
            command_task: None,
            picker_task: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn protocol(&self) -> TransportProtocol {
        self.protocol
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn files(&self) -> &FileSelectionSet {
        &self.files
    }

    pub fn is_receive_loop_running(&self) -> bool {
        self.receive_loop.is_some()
    }

    pub fn set_mode(&mut self, target: TransferMode) -> Result<(), SessionError> {
        if self.state.is_transitioning() {
            debug!(state = ?self.state, ?target, "rejecting mode change while a transition is in flight");
            return Err(SessionError::TransitionInFlight(self.state));
        }

        match target {
            TransferMode::Receive => {
                if self.mode != TransferMode::Receive {
                    self.mode = TransferMode::Receive;
                    self.files.clear();
                }
                if self.receive_loop.is_none() {
                    self.start_receive();
                }
            }
            TransferMode::Transmit => {
                if self.mode == TransferMode::Transmit {
                    return Ok(());
                }
                self.mode = TransferMode::Transmit;
                self.files.clear();
                self.stop_receive();
            }
        }
        Ok(())
    }

    pub fn set_protocol(&mut self, protocol: TransportProtocol) -> Result<(), SessionError> {
        if self.state == SessionState::Sending {
            return Err(SessionError::ProtocolLocked);
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_destination(&mut self, destination: Destination) {
        self.destination = destination;
    }

    pub fn add_files<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.files.add(paths)
    }

    pub fn clear_files(&mut self) {
        self.files.clear();
    }

    pub fn pick_files(&mut self) {
        if self
            .picker_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            debug!("file picker already open");
            return;
        }
        let backend = Arc::clone(&self.backend);
        let signals = self.signals.clone();
        self.picker_task = Some(tokio::spawn(async move {
            let result = backend.select_files().await;
            let _ = signals.send(LoopSignal::FilesPicked(result));
        }));
    }

    pub fn set_downtime_simulation(&self, enabled: bool) {
        info!(enabled, "downtime simulation toggled");
        self.backend.set_downtime_simulation(enabled);
    }

    pub fn validate_send(&self) -> Result<SendDescriptor, ValidationError> {
        if self.mode != TransferMode::Transmit {
            return Err(ValidationError::WrongMode(self.mode));
        }
        if self.state != SessionState::Idle {
            return Err(ValidationError::NotIdle(self.state));
        }
        if !self.destination.has_address() {
            return Err(ValidationError::EmptyAddress);
        }
        if !self.destination.has_port() {
            return Err(ValidationError::EmptyPort);
        }
        if self.files.is_empty() {
            return Err(ValidationError::NoFiles);
        }

        Ok(SendDescriptor {
            address: self.destination.address.trim().to_string(),
            port: self.destination.port.trim().to_string(),
            tcp: self.protocol.is_tcp(),
            paths: self.files.paths().to_vec(),
        })
    }

    pub fn send(&mut self) -> Result<SendDescriptor, SessionError> {
        let descriptor = self.validate_send()?;
        let epoch = self.next_epoch();
        self.state = SessionState::Sending;
        info!(
            epoch,
            address = %descriptor.address,
            port = %descriptor.port,
            protocol = %descriptor.protocol(),
            files = descriptor.paths.len(),
            "session: sending files"
        );

        let backend = Arc::clone(&self.backend);
        let signals = self.signals.clone();
        let request = descriptor.clone();
        self.replace_command_task(tokio::spawn(async move {
            let result = backend.send_files(request).await;
            let _ = signals.send(LoopSignal::SendFinished { epoch, result });
        }));
        Ok(descriptor)
    }

    pub fn on_transport_error(&mut self) {
        if self.state == SessionState::Sending {
            warn!(epoch = self.epoch, "session: transport error while sending");
            self.enter_error();
        }
    }

    pub fn on_listener_error(&mut self) {
        if self.state == SessionState::Starting {
            warn!(epoch = self.epoch, "session: listener failed while starting");
            if let Some(receive_loop) = self.receive_loop.take() {
                receive_loop.task.abort();
            }
            self.enter_error();
        }
    }

    pub(crate) fn handle_signal(&mut self, signal: LoopSignal) {
        match signal {
            LoopSignal::ReceiveReady { epoch } => {
                if epoch == self.epoch && self.state == SessionState::Starting {
                    info!(epoch, "session: receive loop active");
                    self.state = SessionState::Active;
                }
            }
            LoopSignal::ReceiveEnded { epoch, result } => self.on_receive_ended(epoch, result),
            LoopSignal::StopFinished { epoch, result } => self.on_stop_finished(epoch, result),
            LoopSignal::SendFinished { epoch, result } => self.on_send_finished(epoch, result),
            LoopSignal::RevertToIdle { epoch } => {
                self.revert.fired(&epoch);
                if epoch == self.epoch && self.state == SessionState::Error {
                    info!(epoch, "session: error cleared");
                    self.state = SessionState::Idle;
                }
            }
            LoopSignal::FilesPicked(result) => {
                self.picker_task = None;
                match result {
                    Ok(paths) => {
                        let added = self.files.add(paths);
                        debug!(added, total = self.files.len(), "picked files merged");
                    }
                    Err(err) => warn!("file picker failed: {err:#}"),
                }
            }
            LoopSignal::NotificationExpired(_) | LoopSignal::HideProgress { .. } => {}
        }
    }

    pub(crate) fn shutdown(&mut self) {
        self.revert.cancel_all();
        if let Some(receive_loop) = self.receive_loop.take() {
            receive_loop.task.abort();
        }
        if let Some(task) = self.command_task.take() {
            task.abort();
        }
        if let Some(task) = self.picker_task.take() {
            task.abort();
        }
    }

    fn start_receive(&mut self) {
        self.revert.cancel_all();
        let epoch = self.next_epoch();
        self.state = SessionState::Starting;
        info!(epoch, "session: starting receive loop");

        let backend = Arc::clone(&self.backend);
        let signals = self.signals.clone();
        let task = tokio::spawn(async move {
            let (ready, ready_rx) = ReadySignal::new();
            let ready_signals = signals.clone();
            let watch_ready = async move {
                if ready_rx.await.is_ok() {
                    let _ = ready_signals.send(LoopSignal::ReceiveReady { epoch });
                }
            };
            let (result, ()) = tokio::join!(backend.start_receive(ready), watch_ready);
            let _ = signals.send(LoopSignal::ReceiveEnded { epoch, result });
        });
        self.receive_loop = Some(ReceiveLoop { epoch, task });
    }

    fn stop_receive(&mut self) {
        let epoch = self.next_epoch();
        self.state = SessionState::Stopping;
        info!(epoch, "session: stopping receive loop");

        let backend = Arc::clone(&self.backend);
        let signals = self.signals.clone();
        self.replace_command_task(tokio::spawn(async move {
            let result = backend.stop_receive().await;
            let _ = signals.send(LoopSignal::StopFinished { epoch, result });
        }));
    }

    fn on_receive_ended(&mut self, epoch: u64, result: Result<()>) {
        if self
            .receive_loop
            .as_ref()
            .is_some_and(|receive_loop| receive_loop.epoch == epoch)
        {
            self.receive_loop = None;
        }
        if let Err(err) = &result {
            warn!(epoch, "receive loop failed: {err:#}");
        }
        if epoch == self.epoch
            && matches!(self.state, SessionState::Starting | SessionState::Active)
        {
            info!(epoch, "session: receive loop ended");
            self.state = SessionState::Idle;
        }
    }

    fn on_stop_finished(&mut self, epoch: u64, result: Result<()>) {
        if epoch != self.epoch || self.state != SessionState::Stopping {
            debug!(epoch, "ignoring superseded stop acknowledgment");
            return;
        }
        self.command_task = None;
        if let Err(err) = result {
            warn!(epoch, "stop command failed: {err:#}");
        }
        if let Some(receive_loop) = self.receive_loop.take() {
            receive_loop.task.abort();
        }
        info!(epoch, "session: receive loop stopped");
        self.state = SessionState::Idle;
    }

    fn on_send_finished(&mut self, epoch: u64, result: Result<()>) {
        if epoch != self.epoch {
            debug!(epoch, "ignoring superseded send completion");
            return;
        }
        self.command_task = None;
        if self.state != SessionState::Sending {
            return;
        }
        match result {
            Ok(()) => {
                info!(epoch, files = self.files.len(), "session: send completed");
                self.files.clear();
                self.state = SessionState::Idle;
            }
            Err(err) => {
                warn!(epoch, "send command failed: {err:#}");
                self.enter_error();
            }
        }
    }

    fn enter_error(&mut self) {
        self.state = SessionState::Error;
        self.revert.cancel_all();
        self.revert.schedule(
            self.epoch,
            self.completion_delay,
            LoopSignal::RevertToIdle { epoch: self.epoch },
        );
    }

    fn replace_command_task(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.command_task.replace(task) {
            previous.abort();
        }
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }
}
