//! Unified error model for the bridge.
//! Every failure a request can hit is one of these variants. The typed value is kept
//! internally for logging; at the operation boundary it is flattened to its message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The request field a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Application,
    Server,
    Database,
    Command,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::Application => "Application",
            Field::Server => "Server",
            Field::Database => "Database",
            Field::Command => "Command",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Invalid {}", .field.label())]
    InvalidArgument { field: Field },
    #[error("The caller has no delegable identity; only platform-authenticated callers can execute as themselves")]
    NoDelegableIdentity,
    #[error("{0}")]
    ConnectFailure(String),
    #[error("{0}")]
    ExecutionFailure(String),
    #[error("Failed to assume identity: {0}")]
    IdentitySwitchFailure(String),
    #[error("Failed to restore identity: {0}")]
    IdentityRestoreFailure(String),
    #[error("{0}")]
    SinkFailure(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn invalid(field: Field) -> Self { BridgeError::InvalidArgument { field } }
    pub fn connect<S: Into<String>>(msg: S) -> Self { BridgeError::ConnectFailure(msg.into()) }
    pub fn exec<S: Into<String>>(msg: S) -> Self { BridgeError::ExecutionFailure(msg.into()) }
    pub fn switch<S: Into<String>>(msg: S) -> Self { BridgeError::IdentitySwitchFailure(msg.into()) }
    pub fn restore<S: Into<String>>(msg: S) -> Self { BridgeError::IdentityRestoreFailure(msg.into()) }
    pub fn sink<S: Into<String>>(msg: S) -> Self { BridgeError::SinkFailure(msg.into()) }
    pub fn internal<S: Into<String>>(msg: S) -> Self { BridgeError::Internal(msg.into()) }

    /// Stable machine-readable code, used in logs.
    pub fn code_str(&self) -> &'static str {
        match self {
            BridgeError::InvalidArgument { .. } => "invalid_argument",
            BridgeError::NoDelegableIdentity => "no_delegable_identity",
            BridgeError::ConnectFailure(_) => "connect_failure",
            BridgeError::ExecutionFailure(_) => "execution_failure",
            BridgeError::IdentitySwitchFailure(_) => "identity_switch_failure",
            BridgeError::IdentityRestoreFailure(_) => "identity_restore_failure",
            BridgeError::SinkFailure(_) => "sink_failure",
            BridgeError::Internal(_) => "internal",
        }
    }

    /// Human-readable message reported to the caller.
    pub fn message(&self) -> String { self.to_string() }

    /// The request never reached the remote side.
    pub fn is_rejection(&self) -> bool {
        matches!(self, BridgeError::InvalidArgument { .. } | BridgeError::NoDelegableIdentity)
    }

    /// The thread may be left running under the wrong principal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::IdentityRestoreFailure(_))
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_messages_name_the_field() {
        assert_eq!(BridgeError::invalid(Field::Application).message(), "Invalid Application");
        assert_eq!(BridgeError::invalid(Field::Server).message(), "Invalid Server");
        assert_eq!(BridgeError::invalid(Field::Database).message(), "Invalid Database");
        assert_eq!(BridgeError::invalid(Field::Command).message(), "Invalid Command");
    }

    #[test]
    fn remote_messages_pass_through_verbatim() {
        let e = BridgeError::exec("canceling statement due to statement timeout");
        assert_eq!(e.message(), "canceling statement due to statement timeout");
        assert_eq!(e.code_str(), "execution_failure");
        let e = BridgeError::connect("connection refused");
        assert_eq!(e.message(), "connection refused");
    }

    #[test]
    fn classification() {
        assert!(BridgeError::NoDelegableIdentity.is_rejection());
        assert!(BridgeError::invalid(Field::Command).is_rejection());
        assert!(!BridgeError::exec("x").is_rejection());
        assert!(BridgeError::restore("denied").is_fatal());
        assert!(!BridgeError::switch("denied").is_fatal());
        assert_eq!(BridgeError::restore("denied").code_str(), "identity_restore_failure");
    }
}
