//! Database connector seam.
//! ------------------------
//! The remote engine is opaque: the bridge only needs to open a connection for a set of
//! parameters and issue a command in one of three shapes. Connections close on drop, so
//! every exit path releases them.

use std::fmt;

use crate::error::BridgeResult;
use crate::request::{CommandTimeout, ExecutionRequest};
use crate::value::{Column, Row, Value};

pub mod postgres;
mod wire;

/// Target of a remote command, derived from the request's three naming fields.
/// Authentication is always integrated: the effective principal of the opening thread
/// authenticates, and no username or password is ever carried.
///
/// `Debug` is redacted; these values come from the caller and must not reach logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    application_name: String,
    server: String,
    database: String,
}

impl ConnectionParameters {
    /// Build parameters from a request that already passed validation.
    /// Missing fields become empty strings; validation is what rejects them.
    pub fn from_request(request: &ExecutionRequest) -> Self {
        Self::new(
            request.application_name.as_deref().unwrap_or_default(),
            request.server_name.as_deref().unwrap_or_default(),
            request.database_name.as_deref().unwrap_or_default(),
        )
    }

    pub fn new(application_name: &str, server: &str, database: &str) -> Self {
        Self {
            application_name: application_name.to_string(),
            server: server.to_string(),
            database: database.to_string(),
        }
    }

    pub fn application_name(&self) -> &str { &self.application_name }
    pub fn server(&self) -> &str { &self.server }
    pub fn database(&self) -> &str { &self.database }

    /// Always true; there is no credential-based mode.
    pub fn integrated_security(&self) -> bool { true }

    /// Key/value connection string in the conventional `Key=Value;` form.
    pub fn connection_string(&self) -> String {
        format!(
            "Application Name={};Data Source={};Initial Catalog={};Integrated Security=true",
            self.application_name, self.server, self.database
        )
    }
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters").finish_non_exhaustive()
    }
}

/// Forward-only, single-pass row source.
pub trait RowCursor {
    fn columns(&self) -> &[Column];
    /// `Ok(None)` once exhausted.
    fn next_row(&mut self) -> BridgeResult<Option<Row>>;
}

/// An open connection. Dropping it closes it.
pub trait Connection {
    /// Issue a command and return a live cursor over its first result set.
    fn query(&mut self, command: &str, timeout: CommandTimeout) -> BridgeResult<Box<dyn RowCursor + '_>>;

    /// Issue a command and discard whatever it returns.
    fn execute(&mut self, command: &str, timeout: CommandTimeout) -> BridgeResult<()>;

    /// First column of the first row, `None` when the command returns no rows.
    fn scalar(&mut self, command: &str, timeout: CommandTimeout) -> BridgeResult<Option<Value>> {
        let mut cursor = self.query(command, timeout)?;
        Ok(cursor.next_row()?.map(|row| row.into_iter().next().unwrap_or(Value::Null)))
    }
}

/// Opens connections under whatever principal is effective on the calling thread.
pub trait Connector: Send + Sync {
    fn open(&self, params: &ConnectionParameters) -> BridgeResult<Box<dyn Connection>>;
}
