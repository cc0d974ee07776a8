//! Request-scoped input to the three bridge operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything a caller supplies for one remote command.
/// Fields are optional because the host may pass nulls; validation rejects them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub application_name: Option<String>,
    pub server_name: Option<String>,
    pub database_name: Option<String>,
    pub command_text: Option<String>,
    /// Seconds. `None` leaves the connector default in place; `Some(0)` means no limit.
    #[serde(default)]
    pub command_timeout: Option<u32>,
    /// Unspecified is treated as `false` (service identity).
    #[serde(default)]
    pub use_caller_identity: Option<bool>,
}

impl ExecutionRequest {
    pub fn new(
        application: impl Into<String>,
        server: impl Into<String>,
        database: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            application_name: Some(application.into()),
            server_name: Some(server.into()),
            database_name: Some(database.into()),
            command_text: Some(command.into()),
            command_timeout: None,
            use_caller_identity: None,
        }
    }

    pub fn with_timeout(mut self, secs: u32) -> Self { self.command_timeout = Some(secs); self }

    pub fn as_caller(mut self, use_caller_identity: bool) -> Self {
        self.use_caller_identity = Some(use_caller_identity);
        self
    }

    pub fn wants_caller_identity(&self) -> bool { self.use_caller_identity.unwrap_or(false) }

    pub fn timeout(&self) -> CommandTimeout { CommandTimeout::from_secs(self.command_timeout) }
}

/// How long a remote command may run before the engine cancels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTimeout {
    /// Whatever the connector or engine uses when nothing is specified.
    Default,
    Unlimited,
    Limit(Duration),
}

impl CommandTimeout {
    pub fn from_secs(secs: Option<u32>) -> Self {
        match secs {
            None => CommandTimeout::Default,
            Some(0) => CommandTimeout::Unlimited,
            Some(n) => CommandTimeout::Limit(Duration::from_secs(u64::from(n))),
        }
    }

    /// Fall back to `default` only when the request left the timeout unspecified.
    pub fn or(self, default: CommandTimeout) -> Self {
        match self {
            CommandTimeout::Default => default,
            other => other,
        }
    }
}
