use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::SendDescriptor;
use tokio::sync::oneshot;

/// Handed to [`TransferBackend::start_receive`]; notified once the receive
/// loop is listening. Dropping it unnotified means the start failed.
#[derive(Debug)]
pub struct ReadySignal(oneshot::Sender<()>);

impl ReadySignal {
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    pub fn notify(self) {
        let _ = self.0.send(());
    }
}

#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// Runs the receive loop; resolves when it terminates, normally or by stop.
    async fn start_receive(&self, ready: ReadySignal) -> Result<()>;
    async fn stop_receive(&self) -> Result<()>;
    async fn send_files(&self, descriptor: SendDescriptor) -> Result<()>;
    async fn select_files(&self) -> Result<Vec<String>>;
    fn set_downtime_simulation(&self, enabled: bool);
}

pub struct MissingTransferBackend;

#[async_trait]
impl TransferBackend for MissingTransferBackend {
    async fn start_receive(&self, _ready: ReadySignal) -> Result<()> {
        Err(anyhow!("transfer backend is unavailable"))
    }

    async fn stop_receive(&self) -> Result<()> {
        Ok(())
    }

    async fn send_files(&self, descriptor: SendDescriptor) -> Result<()> {
        Err(anyhow!(
            "transfer backend is unavailable; cannot send to {}:{}",
            descriptor.address,
            descriptor.port
        ))
    }

    async fn select_files(&self) -> Result<Vec<String>> {
        Err(anyhow!("file picker is unavailable"))
    }

    fn set_downtime_simulation(&self, _enabled: bool) {}
}
