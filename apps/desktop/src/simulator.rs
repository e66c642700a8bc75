use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use client_core::{LocalEventHub, ReadySignal, TransferBackend};
use serde_json::json;
use shared::{domain::SendDescriptor, protocol::EventName};
use tokio::{sync::Notify, time::sleep};
use tracing::{debug, info};

const CHUNK_SIZE: u64 = 256 * 1024;
const CHUNKS_PER_FILE: u64 = 4;

pub struct SimulatedBackend {
    hub: Arc<LocalEventHub>,
    chunk_delay: Duration,
    incoming: Vec<String>,
    downtime: AtomicBool,
    generation: AtomicU64,
    stop: Notify,
}

impl SimulatedBackend {
    pub fn new(hub: Arc<LocalEventHub>, chunk_delay: Duration, incoming: Vec<String>) -> Self {
        Self {
            hub,
            chunk_delay,
            incoming,
            downtime: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            stop: Notify::new(),
        }
    }

    fn is_down(&self) -> bool {
        self.downtime.load(Ordering::SeqCst)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn receive_one(&self, file_name: &str) {
        let total = CHUNK_SIZE * CHUNKS_PER_FILE;
        self.hub.emit_event(EventName::ReceptionStarted, json!(file_name));
        for chunk in 1..=CHUNKS_PER_FILE {
            sleep(self.chunk_delay).await;
            self.hub.emit_event(
                EventName::ReceivingFileProgress,
                json!({ "received": chunk * CHUNK_SIZE, "total": total }),
            );
        }
        self.hub.emit_event(
            EventName::ReceptionFinished,
            json!(format!("{file_name} received successfully")),
        );
    }
}

#[async_trait]
impl TransferBackend for SimulatedBackend {
    async fn start_receive(&self, ready: ReadySignal) -> Result<()> {
        if self.is_down() {
            self.hub
                .emit_event(EventName::ServerError, json!("could not bind the listener"));
            bail!("listener unavailable while downtime is simulated");
        }
        ready.notify();
        info!(files = self.incoming.len(), "simulated listener ready");

        let stopped = self.stop.notified();
        tokio::pin!(stopped);
        for file_name in &self.incoming {
            tokio::select! {
                _ = &mut stopped => return Ok(()),
                _ = self.receive_one(file_name) => {}
            }
        }
        stopped.await;
        Ok(())
    }

    async fn stop_receive(&self) -> Result<()> {
        debug!("simulated listener stopping");
        self.stop.notify_waiters();
        Ok(())
    }

    async fn send_files(&self, descriptor: SendDescriptor) -> Result<()> {
        let target = format!("{}:{}", descriptor.address, descriptor.port);
        if self.is_down() {
            let message = format!("Could not connect to {target}");
            self.hub.emit_event(EventName::ClientError, json!(message));
            bail!(message);
        }

        let total_files = descriptor.paths.len();
        let total = CHUNK_SIZE * CHUNKS_PER_FILE;
        for (index, path) in descriptor.paths.iter().enumerate() {
            let generation = self.next_generation();
            let file_name = Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());
            self.hub.emit_event(
                EventName::SendingFileStart,
                json!({
                    "fileName": file_name,
                    "currentFile": index + 1,
                    "totalFiles": total_files,
                    "generation": generation,
                }),
            );

            let mut retransmissions = 0u32;
            for chunk in 1..=CHUNKS_PER_FILE {
                sleep(self.chunk_delay).await;
                let mut update = json!({
                    "sent": chunk * CHUNK_SIZE,
                    "total": total,
                    "generation": generation,
                });
                if !descriptor.tcp {
                    // Every other datagram window needs one resend.
                    retransmissions += u32::from(chunk % 2 == 0);
                    update["retransmissions"] = json!(retransmissions);
                }
                self.hub.emit_event(EventName::SendingFileProgress, update);
            }
        }

        self.hub.emit_event(
            EventName::ReceptionFinished,
            json!(format!("All files sent to {target}")),
        );
        Ok(())
    }

    async fn select_files(&self) -> Result<Vec<String>> {
        bail!("no interactive file picker in the command line driver")
    }

    fn set_downtime_simulation(&self, enabled: bool) {
        self.downtime.store(enabled, Ordering::SeqCst);
    }
}
