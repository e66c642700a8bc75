//! Client-side transfer session orchestrator.

pub mod backend;
pub mod config;
pub mod error;
pub mod event_bridge;
pub mod files;
pub mod local;
pub mod notifications;
pub mod orchestrator;
pub mod progress;
pub mod session;
mod timers;

pub use backend::{MissingTransferBackend, ReadySignal, TransferBackend};
pub use config::{load_settings, Settings};
pub use error::{SessionError, ValidationError};
pub use event_bridge::{
    DropRegistration, DropZone, EventBridge, EventSource, Inbound, MissingDropZone, Subscription,
};
pub use files::FileSelectionSet;
pub use local::{LocalDropZone, LocalEventHub};
pub use notifications::{NotificationId, NotificationQueue, NotificationRecord};
pub use orchestrator::{DispatchError, Orchestrator, OrchestratorHandle, SessionSnapshot, UiCommand};
pub use progress::{ProgressAggregator, ProgressRecord, ProgressView};
pub use session::{SessionController, SessionState};
