//! Runtime configuration from `EXECBRIDGE_*` environment variables.
//! Command-line flags in the binary override these values.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::connector::postgres::{PgConnectorConfig, DEFAULT_PG_PORT};
use crate::request::CommandTimeout;

pub const ENV_SERVICE_USER: &str = "EXECBRIDGE_SERVICE_USER";
pub const ENV_PG_PORT: &str = "EXECBRIDGE_PG_PORT";
pub const ENV_CONNECT_TIMEOUT: &str = "EXECBRIDGE_CONNECT_TIMEOUT_SECS";
pub const ENV_COMMAND_TIMEOUT: &str = "EXECBRIDGE_COMMAND_TIMEOUT_SECS";
pub const ENV_OUTPUT: &str = "EXECBRIDGE_OUTPUT";
pub const ENV_PROCESS_WIDE_SWITCH: &str = "EXECBRIDGE_PROCESS_WIDE_SWITCH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" | "jsonl" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Identity the process runs as when delegation is not requested.
    pub service_user: String,
    pub pg_port: u16,
    pub connect_timeout: Duration,
    /// Applied when a request leaves its timeout unspecified; `None` defers to the server.
    pub default_command_timeout: Option<u32>,
    pub output: OutputFormat,
    /// The host's identity switch affects the whole process; elevated windows are serialized.
    pub process_wide_switch: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            service_user: whoami::username(),
            pg_port: DEFAULT_PG_PORT,
            connect_timeout: Duration::from_secs(15),
            default_command_timeout: None,
            output: OutputFormat::Table,
            process_wide_switch: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults, malformed ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(user) = lookup(ENV_SERVICE_USER).filter(|u| !u.trim().is_empty()) {
            cfg.service_user = user;
        }
        if let Some(port) = parse_num::<u16>(&lookup, ENV_PG_PORT)? {
            cfg.pg_port = port;
        }
        if let Some(secs) = parse_num::<u64>(&lookup, ENV_CONNECT_TIMEOUT)? {
            cfg.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_num::<u32>(&lookup, ENV_COMMAND_TIMEOUT)? {
            cfg.default_command_timeout = Some(secs);
        }
        if let Some(raw) = lookup(ENV_OUTPUT) {
            cfg.output = OutputFormat::parse(&raw).ok_or_else(|| anyhow!("{ENV_OUTPUT}: unknown output format '{raw}'"))?;
        }
        if let Some(raw) = lookup(ENV_PROCESS_WIDE_SWITCH) {
            cfg.process_wide_switch = parse_bool(&raw).ok_or_else(|| anyhow!("{ENV_PROCESS_WIDE_SWITCH}: expected a boolean, got '{raw}'"))?;
        }
        Ok(cfg)
    }

    pub fn pg_connector_config(&self) -> PgConnectorConfig {
        PgConnectorConfig {
            port: self.pg_port,
            connect_timeout: self.connect_timeout,
            default_command_timeout: CommandTimeout::from_secs(self.default_command_timeout),
        }
    }
}

fn parse_num<T>(lookup: &dyn Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map(Some).with_context(|| format!("{name}: invalid value '{raw}'")),
        None => Ok(None),
    }
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
