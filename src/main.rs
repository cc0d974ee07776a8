//!
//! execbridge CLI
//! --------------
//! Runs one command against a remote PostgreSQL server through the bridge. The invoking OS
//! user is the caller; `--as-caller` executes under that identity instead of the service
//! identity.

use std::env;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use execbridge::config::{parse_bool, BridgeConfig, OutputFormat};
use execbridge::connector::postgres::PgConnector;
use execbridge::identity::{Principal, PrincipalPlatform, ProcessPrincipal, RequestContext, ThreadPrincipal};
use execbridge::sink::{JsonLinesSink, ResultSink, TableSink};
use execbridge::{Bridge, ExecutionRequest};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} --app <name> --server <host[:port]> --database <db> [options] <COMMAND...>\n\nOptions:\n  --mode <stream|command|scalar>   How to consume the result (default: stream)\n  --timeout <secs>                 Command timeout; 0 means no limit\n  --as-caller                      Execute under the invoking user instead of the service identity\n  --caller-login                   Treat the caller as database-login authenticated (not delegable)\n  --format <table|json>            Output for streamed rows (default: EXECBRIDGE_OUTPUT or table)\n  --service-user <name>            Service identity (default: EXECBRIDGE_SERVICE_USER or OS user)\n  --port <n>                       Default PostgreSQL port (default: EXECBRIDGE_PG_PORT or 5432)\n  --process-wide <true|false>      Serialize identity switches across the process\n  -h, --help                       Show this help\n\nExit status: 0 success, 1 command failed, 2 usage error."
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Stream,
    Command,
    Scalar,
}

fn usage_error(program: &str, msg: &str) -> ExitCode {
    eprintln!("{msg}");
    print_usage(program);
    ExitCode::from(2)
}

fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to build log filter")?;
    let _ = fmt().with_env_filter(filter).with_writer(io::stderr).try_init();

    let mut args: Vec<String> = env::args().collect();
    let program = if args.is_empty() { "execbridge".to_string() } else { args.remove(0) };

    let mut cfg = BridgeConfig::from_env().context("invalid EXECBRIDGE_* environment")?;
    let mut request = ExecutionRequest::default();
    let mut mode = Mode::Stream;
    let mut caller_login = false;
    let mut command_words: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let needs_value = matches!(
            flag,
            "--app" | "--server" | "--database" | "--mode" | "--timeout" | "--format" | "--service-user" | "--port" | "--process-wide"
        );
        if needs_value && i + 1 >= args.len() {
            return Ok(usage_error(&program, &format!("{flag} requires a value")));
        }
        match flag {
            "--app" => { request.application_name = Some(args[i + 1].clone()); i += 2; }
            "--server" => { request.server_name = Some(args[i + 1].clone()); i += 2; }
            "--database" => { request.database_name = Some(args[i + 1].clone()); i += 2; }
            "--mode" => {
                mode = match args[i + 1].to_ascii_lowercase().as_str() {
                    "stream" | "streaming" => Mode::Stream,
                    "command" | "nonquery" | "non_query" => Mode::Command,
                    "scalar" => Mode::Scalar,
                    other => return Ok(usage_error(&program, &format!("unknown mode '{other}'"))),
                };
                i += 2;
            }
            "--timeout" => {
                match args[i + 1].parse::<u32>() {
                    Ok(secs) => request.command_timeout = Some(secs),
                    Err(_) => return Ok(usage_error(&program, &format!("invalid --timeout '{}'", args[i + 1]))),
                }
                i += 2;
            }
            "--format" => {
                match OutputFormat::parse(&args[i + 1]) {
                    Some(f) => cfg.output = f,
                    None => return Ok(usage_error(&program, &format!("unknown format '{}'", args[i + 1]))),
                }
                i += 2;
            }
            "--service-user" => { cfg.service_user = args[i + 1].clone(); i += 2; }
            "--port" => {
                match args[i + 1].parse::<u16>() {
                    Ok(p) => cfg.pg_port = p,
                    Err(_) => return Ok(usage_error(&program, &format!("invalid --port '{}'", args[i + 1]))),
                }
                i += 2;
            }
            "--process-wide" => {
                match parse_bool(&args[i + 1]) {
                    Some(b) => cfg.process_wide_switch = b,
                    None => return Ok(usage_error(&program, &format!("invalid --process-wide '{}'", args[i + 1]))),
                }
                i += 2;
            }
            "--as-caller" => { request.use_caller_identity = Some(true); i += 1; }
            "--caller-login" => { caller_login = true; i += 1; }
            "-h" | "--help" => { print_usage(&program); return Ok(ExitCode::SUCCESS); }
            "--" => { command_words.extend(args[i + 1..].iter().cloned()); break; }
            other if other.starts_with("--") => {
                return Ok(usage_error(&program, &format!("unknown flag '{other}'")));
            }
            _ => { command_words.push(args[i].clone()); i += 1; }
        }
    }
    if command_words.is_empty() {
        return Ok(usage_error(&program, "missing COMMAND"));
    }
    request.command_text = Some(command_words.join(" "));

    info!(
        target: "execbridge",
        "execbridge starting: service_user='{}', pg_port={}, process_wide_switch={}, mode={:?}",
        cfg.service_user, cfg.pg_port, cfg.process_wide_switch, mode
    );

    let platform: Arc<dyn PrincipalPlatform> = if cfg.process_wide_switch {
        Arc::new(ProcessPrincipal::new(cfg.service_user.clone()))
    } else {
        Arc::new(ThreadPrincipal::new(cfg.service_user.clone()))
    };
    let connector = Arc::new(PgConnector::new(cfg.pg_connector_config(), platform.clone()));
    let bridge = Bridge::new(connector, platform);

    let os_user = whoami::username();
    let principal = if caller_login { Principal::database_login(os_user) } else { Principal::platform(os_user) };
    let caller = RequestContext::for_principal(principal).with_request_id(uuid::Uuid::new_v4().to_string());

    let stdout = io::stdout();
    let error_message = match mode {
        Mode::Stream => {
            let mut sink: Box<dyn ResultSink> = match cfg.output {
                OutputFormat::Table => Box::new(TableSink::new(stdout.lock())),
                OutputFormat::Json => Box::new(JsonLinesSink::new(stdout.lock())),
            };
            bridge.execute_streaming(&caller, &request, sink.as_mut())
        }
        Mode::Command => bridge.execute_command(&caller, &request),
        Mode::Scalar => {
            let reply = bridge.execute_scalar(&caller, &request);
            if reply.error_message.is_none() {
                let mut out = stdout.lock();
                match &reply.result {
                    Some(v) => writeln!(out, "{v}")?,
                    None => writeln!(out, "NULL")?,
                }
            }
            reply.error_message
        }
    };

    match error_message {
        None => Ok(ExitCode::SUCCESS),
        Some(msg) => {
            eprintln!("error: {msg}");
            Ok(ExitCode::from(1))
        }
    }
}
