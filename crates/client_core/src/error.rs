use shared::domain::TransferMode;
use thiserror::Error;

use crate::session::SessionState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("destination address is empty")]
    EmptyAddress,
    #[error("destination port is empty")]
    EmptyPort,
    #[error("no files selected")]
    NoFiles,
    #[error("sending requires transmit mode, current mode is {0:?}")]
    WrongMode(TransferMode),
    #[error("session is busy ({0:?})")]
    NotIdle(SessionState),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("a lifecycle transition is already in flight ({0:?})")]
    TransitionInFlight(SessionState),
    #[error("transport protocol cannot change while a send is in flight")]
    ProtocolLocked,
    #[error("session has been disposed")]
    Disposed,
}
