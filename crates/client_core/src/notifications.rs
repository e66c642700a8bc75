use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::domain::Severity;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::{orchestrator::LoopSignal, timers::TimerSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NotificationId {
    pub seq: u64,
    pub salt: u32,
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:08x}", self.seq, self.salt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub text: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

pub struct NotificationQueue {
    ttl: Duration,
    next_seq: u64,
    records: Vec<NotificationRecord>,
    expiries: TimerSet<NotificationId, LoopSignal>,
}

impl NotificationQueue {
    pub(crate) fn new(ttl: Duration, signals: UnboundedSender<LoopSignal>) -> Self {
        Self {
            ttl,
            next_seq: 0,
            records: Vec::new(),
            expiries: TimerSet::new(signals),
        }
    }

    pub fn enqueue(&mut self, text: impl Into<String>, severity: Severity) -> NotificationId {
        self.next_seq += 1;
        let id = NotificationId {
            seq: self.next_seq,
            salt: rand::random(),
        };
        let text = text.into();
        debug!(%id, ?severity, text = %text, "notification queued");

        self.records.push(NotificationRecord {
            id,
            text,
            severity,
            created_at: Utc::now(),
        });
        self.expiries
            .schedule(id, self.ttl, LoopSignal::NotificationExpired(id));
        id
    }

    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        self.expiries.cancel(&id);
        self.remove(id)
    }

    pub(crate) fn expire(&mut self, id: NotificationId) -> bool {
        self.expiries.fired(&id);
        self.remove(id)
    }

    pub fn clear(&mut self) {
        self.expiries.cancel_all();
        self.records.clear();
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn pending_expiries(&self) -> usize {
        self.expiries.pending()
    }

    fn remove(&mut self, id: NotificationId) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        self.records.len() != before
    }
}
