use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::Result;
use serde_json::Value;
use shared::{
    domain::{DropTargetId, SubscriptionId},
    protocol::{EventName, RawEvent},
};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::event_bridge::{DropRegistration, DropZone, EventSource, Subscription};

struct Subscriber {
    names: HashSet<String>,
    tx: UnboundedSender<RawEvent>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

#[derive(Default)]
pub struct LocalEventHub {
    inner: Mutex<HubState>,
}

impl LocalEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, name: &str, payload: Value) -> usize {
        let raw = RawEvent::new(name, payload);
        let guard = self.lock();
        let mut delivered = 0;
        for subscriber in guard.subscribers.values() {
            if subscriber.names.contains(name) && subscriber.tx.send(raw.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn emit_event(&self, name: EventName, payload: Value) -> usize {
        self.emit(name.as_str(), payload)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSource for LocalEventHub {
    fn subscribe(&self, names: &[EventName]) -> Result<Subscription> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut guard = self.lock();
        guard.next_id += 1;
        let id = SubscriptionId(guard.next_id);
        guard.subscribers.insert(
            id,
            Subscriber {
                names: names.iter().map(|name| name.as_str().to_string()).collect(),
                tx,
            },
        );
        Ok(Subscription { id, events })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.remove(&id);
    }
}

#[derive(Default)]
struct DropState {
    next_id: u64,
    targets: HashMap<DropTargetId, UnboundedSender<Vec<String>>>,
}

#[derive(Default)]
pub struct LocalDropZone {
    inner: Mutex<DropState>,
}

impl LocalDropZone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drop_paths<I, P>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        let guard = self.lock();
        let mut delivered = 0;
        for tx in guard.targets.values() {
            if tx.send(paths.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn registration_count(&self) -> usize {
        self.lock().targets.len()
    }

    fn lock(&self) -> MutexGuard<'_, DropState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DropZone for LocalDropZone {
    fn register(&self) -> Result<DropRegistration> {
        let (tx, drops) = mpsc::unbounded_channel();
        let mut guard = self.lock();
        guard.next_id += 1;
        let id = DropTargetId(guard.next_id);
        guard.targets.insert(id, tx);
        Ok(DropRegistration { id, drops })
    }

    fn unregister(&self, id: DropTargetId) {
        self.lock().targets.remove(&id);
    }
}
