//! Error types for the interop bridge.

use super::guid::GuidParseError;
use super::status::{Status, StatusOutcome};
use thiserror::Error;

/// Raised when a caller escalates a failed [`StatusOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("foreign call failed with status {status}")]
pub struct ForeignCallFailed {
    pub status: Status,
}

impl ForeignCallFailed {
    pub fn new(status: Status) -> Self {
        Self { status }
    }
}

/// Bridge error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    CallFailed(#[from] ForeignCallFailed),

    #[error("interface {interface} not supported: {status}")]
    NotSupported {
        interface: &'static str,
        status: Status,
    },

    #[error("index {index} out of range: {status}")]
    IndexOutOfRange { index: u32, status: Status },

    #[error("COM initialization failed: {0}")]
    ComInitFailed(Status),

    #[error(transparent)]
    InvalidGuid(#[from] GuidParseError),
}

impl BridgeError {
    /// The native status behind this error, where there is one.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::CallFailed(e) => Some(e.status),
            Self::NotSupported { status, .. }
            | Self::IndexOutOfRange { status, .. }
            | Self::ComInitFailed(status) => Some(*status),
            Self::InvalidGuid(_) => None,
        }
    }
}

impl<T> From<StatusOutcome<T>> for Result<T, BridgeError> {
    fn from(outcome: StatusOutcome<T>) -> Self {
        outcome.try_unwrap().map_err(BridgeError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_into_result() {
        let ok: Result<u8, BridgeError> = StatusOutcome::success(3).into();
        assert_eq!(ok, Ok(3));

        let err: Result<u8, BridgeError> = StatusOutcome::failure(Status::E_FAIL).into();
        assert_eq!(err.unwrap_err().status(), Some(Status::E_FAIL));
    }

    #[test]
    fn test_message_carries_status() {
        let message = ForeignCallFailed::new(Status::E_POINTER).to_string();
        assert!(message.contains("0x80004003"), "{message}");
        assert!(message.contains("E_POINTER"), "{message}");
    }
}
