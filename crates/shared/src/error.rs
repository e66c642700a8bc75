use thiserror::Error;

use crate::protocol::EventName;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown backend event '{0}'")]
    UnknownEvent(String),
    #[error("malformed payload for '{event}': {source}")]
    MalformedPayload {
        event: EventName,
        source: serde_json::Error,
    },
}
