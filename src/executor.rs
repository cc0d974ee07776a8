//! Remote executor.
//! ----------------
//! All three modes share one skeleton. The connection opens under the current (possibly
//! switched) principal and is closed on every path; only the handling of the result differs.
//! Streaming additionally gives the identity back as soon as the cursor is live, before
//! a single row reaches the sink, so the borrowed principal is held only for connect
//! and execute.

use tracing::debug;

use crate::connector::{ConnectionParameters, Connector};
use crate::error::BridgeResult;
use crate::identity::{PrincipalSwitcher, ResolvedIdentity};
use crate::relay;
use crate::request::CommandTimeout;
use crate::sink::ResultSink;

/// How the command's result is consumed.
pub enum CommandMode<'s> {
    Streaming(&'s mut dyn ResultSink),
    NonQuery,
    Scalar,
}

impl CommandMode<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            CommandMode::Streaming(_) => "streaming",
            CommandMode::NonQuery => "non_query",
            CommandMode::Scalar => "scalar",
        }
    }
}

/// Successful result of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Rows were relayed to the sink; carries how many.
    StreamedRows(u64),
    ScalarValue(Option<String>),
    Completed,
}

pub struct RemoteExecutor<'a> {
    connector: &'a dyn Connector,
    switcher: &'a PrincipalSwitcher,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(connector: &'a dyn Connector, switcher: &'a PrincipalSwitcher) -> Self {
        Self { connector, switcher }
    }

    pub fn run(
        &self,
        params: &ConnectionParameters,
        command: &str,
        timeout: CommandTimeout,
        identity: &ResolvedIdentity,
        mode: CommandMode<'_>,
    ) -> BridgeResult<ExecutionOutcome> {
        match mode {
            CommandMode::Streaming(sink) => self.stream(params, command, timeout, identity, sink).map(ExecutionOutcome::StreamedRows),
            CommandMode::NonQuery => self.execute(params, command, timeout, identity).map(|()| ExecutionOutcome::Completed),
            CommandMode::Scalar => self.scalar(params, command, timeout, identity).map(ExecutionOutcome::ScalarValue),
        }
    }

    pub fn stream(
        &self,
        params: &ConnectionParameters,
        command: &str,
        timeout: CommandTimeout,
        identity: &ResolvedIdentity,
        sink: &mut dyn ResultSink,
    ) -> BridgeResult<u64> {
        self.switcher.with_identity(identity, |scope| {
            let mut conn = self.connector.open(params)?;
            debug!(target: "execbridge::exec", mode = "streaming", "connection opened");
            let mut cursor = conn.query(command, timeout)?;
            // Cursor is live: the remote side has accepted the command under the borrowed
            // identity. Nothing after this point needs it.
            scope.restore()?;
            relay::relay_rows(cursor.as_mut(), sink)
        })
    }

    pub fn execute(
        &self,
        params: &ConnectionParameters,
        command: &str,
        timeout: CommandTimeout,
        identity: &ResolvedIdentity,
    ) -> BridgeResult<()> {
        self.switcher.with_identity(identity, |_| {
            let mut conn = self.connector.open(params)?;
            debug!(target: "execbridge::exec", mode = "non_query", "connection opened");
            conn.execute(command, timeout)
        })
    }

    pub fn scalar(
        &self,
        params: &ConnectionParameters,
        command: &str,
        timeout: CommandTimeout,
        identity: &ResolvedIdentity,
    ) -> BridgeResult<Option<String>> {
        self.switcher.with_identity(identity, |_| {
            let mut conn = self.connector.open(params)?;
            debug!(target: "execbridge::exec", mode = "scalar", "connection opened");
            let value = conn.scalar(command, timeout)?;
            Ok(relay::relay_scalar(value))
        })
    }
}
