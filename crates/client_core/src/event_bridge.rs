use std::{sync::Arc, time::Duration};

use anyhow::Result;
use shared::{
    domain::{DropTargetId, Severity, SubscriptionId},
    protocol::{BackendEvent, EventName, RawEvent},
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::{
    notifications::NotificationQueue,
    orchestrator::LoopSignal,
    progress::{Applied, ProgressAggregator},
    session::SessionController,
    timers::TimerSet,
};

pub struct Subscription {
    pub id: SubscriptionId,
    pub events: UnboundedReceiver<RawEvent>,
}

pub trait EventSource: Send + Sync {
    fn subscribe(&self, names: &[EventName]) -> Result<Subscription>;
    fn unsubscribe(&self, id: SubscriptionId);
}

pub struct DropRegistration {
    pub id: DropTargetId,
    pub drops: UnboundedReceiver<Vec<String>>,
}

pub trait DropZone: Send + Sync {
    fn register(&self) -> Result<DropRegistration>;
    fn unregister(&self, id: DropTargetId);
}

pub struct MissingDropZone;

impl DropZone for MissingDropZone {
    fn register(&self) -> Result<DropRegistration> {
        let (_, drops) = tokio::sync::mpsc::unbounded_channel();
        Ok(DropRegistration {
            id: DropTargetId(0),
            drops,
        })
    }

    fn unregister(&self, _id: DropTargetId) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Event(BackendEvent),
    Dropped(Vec<String>),
}

pub struct EventBridge {
    source: Arc<dyn EventSource>,
    drop_zone: Arc<dyn DropZone>,
    subscription: Option<Subscription>,
    drop_target: Option<DropRegistration>,
}

impl EventBridge {
    pub fn attach(source: Arc<dyn EventSource>, drop_zone: Arc<dyn DropZone>) -> Result<Self> {
        let subscription = source.subscribe(&EventName::ALL)?;
        let drop_target = match drop_zone.register() {
            Ok(drop_target) => drop_target,
            Err(err) => {
                source.unsubscribe(subscription.id);
                return Err(err);
            }
        };
        info!(
            subscription = subscription.id.0,
            drop_target = drop_target.id.0,
            "event bridge attached"
        );

        Ok(Self {
            source,
            drop_zone,
            subscription: Some(subscription),
            drop_target: Some(drop_target),
        })
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn try_next(&mut self) -> Option<Inbound> {
        if let Some(subscription) = self.subscription.as_mut() {
            while let Ok(raw) = subscription.events.try_recv() {
                if let Some(event) = validate(&raw) {
                    return Some(Inbound::Event(event));
                }
            }
        }
        let drop_target = self.drop_target.as_mut()?;
        drop_target.drops.try_recv().ok().map(Inbound::Dropped)
    }

    pub async fn next(&mut self) -> Option<Inbound> {
        loop {
            let events = self.subscription.as_mut().map(|s| &mut s.events);
            let drops = self.drop_target.as_mut().map(|d| &mut d.drops);
            tokio::select! {
                biased;
                Some(raw) = recv_from(events) => {
                    if let Some(event) = validate(&raw) {
                        return Some(Inbound::Event(event));
                    }
                }
                Some(paths) = recv_from(drops) => return Some(Inbound::Dropped(paths)),
                else => return None,
            }
        }
    }

    /// Unsubscribes exactly the handlers this bridge registered. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.source.unsubscribe(subscription.id);
            debug!(subscription = subscription.id.0, "event bridge unsubscribed");
        }
        if let Some(drop_target) = self.drop_target.take() {
            self.drop_zone.unregister(drop_target.id);
            debug!(drop_target = drop_target.id.0, "drop target unregistered");
        }
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn recv_from<T>(rx: Option<&mut UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

fn validate(raw: &RawEvent) -> Option<BackendEvent> {
    match BackendEvent::decode(raw) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = %raw.name, "dropping backend event: {err}");
            None
        }
    }
}

pub(crate) struct Routes<'a> {
    pub progress: &'a mut ProgressAggregator,
    pub notifications: &'a mut NotificationQueue,
    pub session: &'a mut SessionController,
    pub hide_timers: &'a mut TimerSet<u64, LoopSignal>,
    pub completion_delay: Duration,
}

impl Routes<'_> {
    fn schedule_hide(&mut self) {
        let Some(generation) = self.progress.record().map(|record| record.generation) else {
            return;
        };
        self.hide_timers.schedule(
            generation,
            self.completion_delay,
            LoopSignal::HideProgress { generation },
        );
    }
}

pub(crate) fn route(event: BackendEvent, routes: &mut Routes<'_>) {
    debug!(event = %event.name(), "routing backend event");
    match event {
        BackendEvent::ReceptionStarted { file_name } => {
            routes
                .notifications
                .enqueue(format!("Receiving file: {file_name}..."), Severity::Info);
            if routes.progress.begin(file_name, 1, 1, None, false).is_some() {
                routes.hide_timers.cancel_all();
            }
        }
        BackendEvent::ReceptionFinished { message } => {
            routes.notifications.enqueue(message, Severity::Success);
            routes.schedule_hide();
        }
        BackendEvent::ClientError { message } => {
            routes.notifications.enqueue(message, Severity::Error);
            routes.schedule_hide();
            routes.session.on_transport_error();
        }
        BackendEvent::ServerError { message } => {
            routes.notifications.enqueue(message, Severity::Error);
            routes.session.on_listener_error();
        }
        BackendEvent::SendingFileStart(start) => {
            let opened = routes.progress.begin(
                start.file_name,
                start.current_file,
                start.total_files,
                start.generation,
                true,
            );
            if opened.is_some() {
                routes.hide_timers.cancel_all();
            }
        }
        BackendEvent::SendingFileProgress(update) => {
            let applied = routes
                .progress
                .update(update.generation, update.sent, update.total);
            if applied == Applied::Updated {
                if let Some(count) = update.retransmissions {
                    routes.progress.set_retransmissions(update.generation, count);
                }
            } else {
                debug!(?applied, stamp = update.generation, "send progress discarded");
            }
        }
        BackendEvent::ReceivingFileProgress(update) => {
            match routes
                .progress
                .update(update.generation, update.received, update.total)
            {
                Applied::Updated => routes.progress.show(),
                applied => debug!(?applied, stamp = update.generation, "receive progress discarded"),
            }
        }
    }
}
