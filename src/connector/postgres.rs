//! PostgreSQL connector.
//! --------------------
//! Each connection owns a current-thread tokio runtime and drives `tokio-postgres` with
//! `block_on`, so connect, execute and every row fetch happen on the request's own thread.
//! The connection task spawned on that runtime only makes progress while a `block_on` is in
//! flight, which is exactly when the bridge is waiting on the server.
//!
//! Authentication is integrated: the wire `user` is the identity effective on the opening
//! thread and no password is ever sent. The server is expected to trust that identity
//! (peer, ident, GSSAPI or certificate mapping).

use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use tokio::runtime::Runtime;
use tokio_postgres::types::{FromSql, Kind, ToSql, Type};
use tokio_postgres::{Client, Config, NoTls, RowStream};
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::identity::PrincipalPlatform;
use crate::request::CommandTimeout;
use crate::value::{Column, Row, Value};

use super::wire;
use super::{Connection, ConnectionParameters, Connector, RowCursor};

pub const DEFAULT_PG_PORT: u16 = 5432;

#[derive(Debug, Clone)]
pub struct PgConnectorConfig {
    pub port: u16,
    pub connect_timeout: Duration,
    /// Applied when a request leaves its timeout unspecified.
    pub default_command_timeout: CommandTimeout,
}

impl Default for PgConnectorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PG_PORT,
            connect_timeout: Duration::from_secs(15),
            default_command_timeout: CommandTimeout::Default,
        }
    }
}

pub struct PgConnector {
    config: PgConnectorConfig,
    platform: Arc<dyn PrincipalPlatform>,
}

impl PgConnector {
    pub fn new(config: PgConnectorConfig, platform: Arc<dyn PrincipalPlatform>) -> Self {
        Self { config, platform }
    }

    fn pg_config(&self, params: &ConnectionParameters, user: &str) -> Config {
        let (host, port) = split_host_port(params.server(), self.config.port);
        let mut cfg = Config::new();
        cfg.host(host)
            .port(port)
            .dbname(params.database())
            .application_name(params.application_name())
            .user(user)
            .connect_timeout(self.config.connect_timeout);
        cfg
    }
}

impl Connector for PgConnector {
    fn open(&self, params: &ConnectionParameters) -> BridgeResult<Box<dyn Connection>> {
        let identity = self.platform.current();
        let cfg = self.pg_config(params, identity.name());
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BridgeError::connect(format!("failed to start connection runtime: {e}")))?;
        let (client, connection) = rt.block_on(cfg.connect(NoTls)).map_err(|e| BridgeError::connect(engine_message(&e)))?;
        rt.spawn(async move {
            if let Err(err) = connection.await {
                warn!(target: "execbridge::exec", "postgres connection error: {}", err);
            }
        });
        debug!(target: "execbridge::exec", user = %identity.name(), "postgres session established");
        Ok(Box::new(PgConnection { rt, client, default_timeout: self.config.default_command_timeout }))
    }
}

pub struct PgConnection {
    // Field order matters: the client drops (closing the session) before its runtime.
    client: Client,
    rt: Runtime,
    default_timeout: CommandTimeout,
}

impl PgConnection {
    fn apply_timeout(&self, timeout: CommandTimeout) -> BridgeResult<()> {
        let stmt = match timeout.or(self.default_timeout) {
            CommandTimeout::Default => return Ok(()),
            CommandTimeout::Unlimited => "SET statement_timeout = 0".to_string(),
            CommandTimeout::Limit(d) => format!("SET statement_timeout = {}", d.as_millis().max(1)),
        };
        self.rt.block_on(self.client.batch_execute(&stmt)).map_err(|e| BridgeError::exec(engine_message(&e)))
    }
}

impl Connection for PgConnection {
    fn query(&mut self, command: &str, timeout: CommandTimeout) -> BridgeResult<Box<dyn RowCursor + '_>> {
        self.apply_timeout(timeout)?;
        let statement = self.rt.block_on(self.client.prepare(command)).map_err(|e| BridgeError::exec(engine_message(&e)))?;
        let columns = statement.columns().iter().map(|c| Column::new(c.name(), c.type_().name())).collect();
        let no_params: [&dyn ToSql; 0] = [];
        let stream = self
            .rt
            .block_on(self.client.query_raw(&statement, no_params))
            .map_err(|e| BridgeError::exec(engine_message(&e)))?;
        Ok(Box::new(PgCursor { rt: &self.rt, stream: Box::pin(stream), columns }))
    }

    fn execute(&mut self, command: &str, timeout: CommandTimeout) -> BridgeResult<()> {
        self.apply_timeout(timeout)?;
        // Simple protocol: accepts multi-statement batches and discards their results.
        self.rt.block_on(self.client.batch_execute(command)).map_err(|e| BridgeError::exec(engine_message(&e)))
    }
}

struct PgCursor<'c> {
    rt: &'c Runtime,
    stream: Pin<Box<RowStream>>,
    columns: Vec<Column>,
}

impl RowCursor for PgCursor<'_> {
    fn columns(&self) -> &[Column] { &self.columns }

    fn next_row(&mut self) -> BridgeResult<Option<Row>> {
        let next = self.rt.block_on(self.stream.try_next()).map_err(|e| BridgeError::exec(engine_message(&e)))?;
        let Some(row) = next else { return Ok(None) };
        let mut out = Vec::with_capacity(row.len());
        for idx in 0..row.len() {
            let cell: PgCell = row.try_get(idx).map_err(|e| BridgeError::exec(engine_message(&e)))?;
            out.push(cell.0);
        }
        Ok(Some(out))
    }
}

/// Prefer the server's own error text; fall back to the driver's description.
fn engine_message(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => db.message().to_string(),
        None => err.to_string(),
    }
}

/// `host` or `host:port`; anything unparsable after the colon keeps the default port.
pub fn split_host_port(server: &str, default_port: u16) -> (&str, u16) {
    match server.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
            Ok(p) => (host, p),
            Err(_) => (server, default_port),
        },
        _ => (server, default_port),
    }
}

/// Decodes any column into a `Value`. Types with no textual decoder here (arrays, ranges,
/// geometric and composite types) keep their wire bytes.
struct PgCell(Value);

fn rendered(ty: &Type, text: Option<String>) -> Result<Value, Box<dyn StdError + Sync + Send>> {
    text.map(Value::Text).ok_or_else(|| format!("malformed {} value", ty.name()).into())
}

impl<'a> FromSql<'a> for PgCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        if let Kind::Enum(_) = ty.kind() {
            return Ok(PgCell(Value::Text(std::str::from_utf8(raw)?.to_string())));
        }
        let value = match ty.name() {
            "bool" => Value::Bool(bool::from_sql(ty, raw)?),
            "int2" => Value::Int(i64::from(i16::from_sql(ty, raw)?)),
            "int4" => Value::Int(i64::from(i32::from_sql(ty, raw)?)),
            "int8" => Value::Int(i64::from_sql(ty, raw)?),
            "oid" => Value::Int(i64::from(u32::from_sql(ty, raw)?)),
            "float4" => Value::Float(f64::from(f32::from_sql(ty, raw)?)),
            "float8" => Value::Float(f64::from_sql(ty, raw)?),
            "text" | "varchar" | "bpchar" | "name" | "unknown" | "citext" | "xml" => {
                Value::Text(std::str::from_utf8(raw)?.to_string())
            }
            "char" => Value::Text(char::from(i8::from_sql(ty, raw)? as u8).to_string()),
            "bytea" => Value::Bytes(Vec::<u8>::from_sql(ty, raw)?),
            "date" => Value::Date(NaiveDate::from_sql(ty, raw)?),
            "time" => Value::Time(NaiveTime::from_sql(ty, raw)?),
            "timestamp" => Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            "timestamptz" => Value::TimestampTz(DateTime::<Utc>::from_sql(ty, raw)?),
            "uuid" => Value::Uuid(uuid::Uuid::from_sql(ty, raw)?),
            "json" | "jsonb" => Value::Text(serde_json::Value::from_sql(ty, raw)?.to_string()),
            "numeric" => rendered(ty, wire::decode_numeric(raw))?,
            "interval" => rendered(ty, wire::decode_interval(raw))?,
            "timetz" => rendered(ty, wire::decode_timetz(raw))?,
            "inet" | "cidr" => rendered(ty, wire::decode_inet(raw))?,
            "money" => rendered(ty, wire::decode_money(raw))?,
            "macaddr" => rendered(ty, wire::decode_macaddr(raw))?,
            _ => Value::Bytes(raw.to_vec()),
        };
        Ok(PgCell(value))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(PgCell(Value::Null))
    }

    fn accepts(_ty: &Type) -> bool { true }
}
