use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    ReceptionStarted,
    ReceptionFinished,
    ClientError,
    ServerError,
    SendingFileStart,
    SendingFileProgress,
    ReceivingFileProgress,
}

impl EventName {
    pub const ALL: [EventName; 7] = [
        EventName::ReceptionStarted,
        EventName::ReceptionFinished,
        EventName::ClientError,
        EventName::ServerError,
        EventName::SendingFileStart,
        EventName::SendingFileProgress,
        EventName::ReceivingFileProgress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReceptionStarted => "reception-started",
            Self::ReceptionFinished => "reception-finished",
            Self::ClientError => "client-error",
            Self::ServerError => "server-error",
            Self::SendingFileStart => "sending-file-start",
            Self::SendingFileProgress => "sending-file-progress",
            Self::ReceivingFileProgress => "receiving-file-progress",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownEvent(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub name: String,
    pub payload: Value,
}

impl RawEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    pub fn from_name(name: EventName, payload: Value) -> Self {
        Self::new(name.as_str(), payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStartPayload {
    pub file_name: String,
    pub current_file: u32,
    pub total_files: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendProgressPayload {
    pub sent: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    /// Total retransmissions for the current file, when the transport reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retransmissions: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveProgressPayload {
    pub received: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    ReceptionStarted { file_name: String },
    ReceptionFinished { message: String },
    ClientError { message: String },
    ServerError { message: String },
    SendingFileStart(FileStartPayload),
    SendingFileProgress(SendProgressPayload),
    ReceivingFileProgress(ReceiveProgressPayload),
}

impl BackendEvent {
    pub fn decode(raw: &RawEvent) -> Result<Self, ProtocolError> {
        let name: EventName = raw.name.parse()?;
        let event = match name {
            EventName::ReceptionStarted => Self::ReceptionStarted {
                file_name: payload(name, &raw.payload)?,
            },
            EventName::ReceptionFinished => Self::ReceptionFinished {
                message: payload(name, &raw.payload)?,
            },
            EventName::ClientError => Self::ClientError {
                message: payload(name, &raw.payload)?,
            },
            EventName::ServerError => Self::ServerError {
                message: payload(name, &raw.payload)?,
            },
            EventName::SendingFileStart => {
                Self::SendingFileStart(payload(name, &raw.payload)?)
            }
            EventName::SendingFileProgress => {
                Self::SendingFileProgress(payload(name, &raw.payload)?)
            }
            EventName::ReceivingFileProgress => {
                Self::ReceivingFileProgress(payload(name, &raw.payload)?)
            }
        };
        Ok(event)
    }

    pub fn name(&self) -> EventName {
        match self {
            Self::ReceptionStarted { .. } => EventName::ReceptionStarted,
            Self::ReceptionFinished { .. } => EventName::ReceptionFinished,
            Self::ClientError { .. } => EventName::ClientError,
            Self::ServerError { .. } => EventName::ServerError,
            Self::SendingFileStart(_) => EventName::SendingFileStart,
            Self::SendingFileProgress(_) => EventName::SendingFileProgress,
            Self::ReceivingFileProgress(_) => EventName::ReceivingFileProgress,
        }
    }
}

fn payload<T: DeserializeOwned>(name: EventName, value: &Value) -> Result<T, ProtocolError> {
    T::deserialize(value).map_err(|source| ProtocolError::MalformedPayload { event: name, source })
}
