// Recording doubles shared by the integration tests: a platform that logs every switch, a
// scripted connector whose connections and cursors note the identity they run under, and a
// sink that notes the identity seen while each row is delivered.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use execbridge::connector::{Connection, ConnectionParameters, Connector, RowCursor};
use execbridge::identity::{
    Identity, Principal, PrincipalPlatform, ProcessPrincipal, RequestContext, SwitchScope, ThreadPrincipal,
};
use execbridge::sink::{CollectSink, ResultSink};
use execbridge::{Bridge, BridgeError, BridgeResult, Column, CommandTimeout, ExecutionRequest, Row, Value};

pub const SERVICE: &str = "svc_bridge";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Impersonate(String),
    Revert(String),
    Open { user: String, server: String, database: String },
    Query(String),
    Execute(String),
    Fetch { user: String },
    SinkStart { user: String },
    SinkRow { user: String },
    SinkFinish(u64),
    Closed,
}

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, e: Event) { self.0.lock().push(e); }
    pub fn snapshot(&self) -> Vec<Event> { self.0.lock().clone() }
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize { self.0.lock().iter().filter(|e| pred(e)).count() }
    pub fn opens(&self) -> usize { self.count(|e| matches!(e, Event::Open { .. })) }
    pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> { self.0.lock().iter().position(pred) }
}

/// Wraps one of the crate's platforms and records every switch; can be told to fail.
pub struct RecordingPlatform {
    inner: Box<dyn PrincipalPlatform>,
    log: EventLog,
    fail_impersonate: bool,
    fail_revert: bool,
}

impl RecordingPlatform {
    pub fn thread(log: &EventLog) -> Self {
        Self { inner: Box::new(ThreadPrincipal::new(SERVICE)), log: log.clone(), fail_impersonate: false, fail_revert: false }
    }

    pub fn process(log: &EventLog) -> Self {
        Self { inner: Box::new(ProcessPrincipal::new(SERVICE)), log: log.clone(), fail_impersonate: false, fail_revert: false }
    }

    pub fn failing_impersonate(mut self) -> Self { self.fail_impersonate = true; self }
    pub fn failing_revert(mut self) -> Self { self.fail_revert = true; self }
}

impl PrincipalPlatform for RecordingPlatform {
    fn scope(&self) -> SwitchScope { self.inner.scope() }

    fn current(&self) -> Identity { self.inner.current() }

    fn impersonate(&self, identity: &Identity) -> BridgeResult<()> {
        if self.fail_impersonate {
            return Err(BridgeError::switch("access denied"));
        }
        self.log.push(Event::Impersonate(identity.name().to_string()));
        self.inner.impersonate(identity)
    }

    fn revert(&self, prior: &Identity) -> BridgeResult<()> {
        if self.fail_revert {
            return Err(BridgeError::restore("token handle lost"));
        }
        self.log.push(Event::Revert(prior.name().to_string()));
        self.inner.revert(prior)
    }
}

/// How the scripted engine answers one command.
#[derive(Clone)]
pub enum Reply {
    Rows { columns: Vec<Column>, rows: Vec<Row> },
    /// Delivers `rows`, then fails the next fetch.
    RowsThenFail { columns: Vec<Column>, rows: Vec<Row>, error: String },
    Fail(String),
    Panic,
}

impl Reply {
    pub fn rows(columns: &[(&str, &str)], rows: Vec<Row>) -> Self {
        Reply::Rows { columns: columns.iter().map(|(n, t)| Column::new(*n, *t)).collect(), rows }
    }
}

pub struct ScriptedConnector {
    platform: Arc<dyn PrincipalPlatform>,
    log: EventLog,
    replies: HashMap<String, Reply>,
    connect_error: Option<String>,
}

impl ScriptedConnector {
    pub fn new(platform: Arc<dyn PrincipalPlatform>, log: &EventLog) -> Self {
        let mut replies = HashMap::new();
        replies.insert("SELECT 1".to_string(), Reply::rows(&[("?column?", "int4")], vec![vec![Value::Int(1)]]));
        replies.insert("SELECT NULL".to_string(), Reply::rows(&[("?column?", "text")], vec![vec![Value::Null]]));
        replies.insert("SELECT 1 WHERE false".to_string(), Reply::rows(&[("?column?", "int4")], vec![]));
        Self { platform, log: log.clone(), replies, connect_error: None }
    }

    pub fn reply(mut self, command: &str, reply: Reply) -> Self {
        self.replies.insert(command.to_string(), reply);
        self
    }

    pub fn refusing_connections(mut self, msg: &str) -> Self {
        self.connect_error = Some(msg.to_string());
        self
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, params: &ConnectionParameters) -> BridgeResult<Box<dyn Connection>> {
        self.log.push(Event::Open {
            user: self.platform.current().name().to_string(),
            server: params.server().to_string(),
            database: params.database().to_string(),
        });
        if let Some(msg) = &self.connect_error {
            return Err(BridgeError::connect(msg.clone()));
        }
        Ok(Box::new(ScriptedConnection { platform: self.platform.clone(), log: self.log.clone(), replies: self.replies.clone() }))
    }
}

struct ScriptedConnection {
    platform: Arc<dyn PrincipalPlatform>,
    log: EventLog,
    replies: HashMap<String, Reply>,
}

impl ScriptedConnection {
    fn lookup(&self, command: &str) -> BridgeResult<Reply> {
        match self.replies.get(command) {
            Some(Reply::Fail(msg)) => Err(BridgeError::exec(msg.clone())),
            Some(Reply::Panic) => panic!("driver crashed on '{command}'"),
            Some(reply) => Ok(reply.clone()),
            None => Err(BridgeError::exec(format!("syntax error at or near \"{command}\""))),
        }
    }
}

impl Connection for ScriptedConnection {
    fn query(&mut self, command: &str, _timeout: CommandTimeout) -> BridgeResult<Box<dyn RowCursor + '_>> {
        self.log.push(Event::Query(command.to_string()));
        let (columns, rows, error) = match self.lookup(command)? {
            Reply::Rows { columns, rows } => (columns, rows, None),
            Reply::RowsThenFail { columns, rows, error } => (columns, rows, Some(error)),
            Reply::Fail(_) | Reply::Panic => unreachable!("handled by lookup"),
        };
        Ok(Box::new(ScriptedCursor {
            platform: self.platform.clone(),
            log: self.log.clone(),
            columns,
            rows: rows.into_iter(),
            error,
        }))
    }

    fn execute(&mut self, command: &str, _timeout: CommandTimeout) -> BridgeResult<()> {
        self.log.push(Event::Execute(command.to_string()));
        self.lookup(command).map(|_| ())
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) { self.log.push(Event::Closed); }
}

struct ScriptedCursor {
    platform: Arc<dyn PrincipalPlatform>,
    log: EventLog,
    columns: Vec<Column>,
    rows: std::vec::IntoIter<Row>,
    error: Option<String>,
}

impl RowCursor for ScriptedCursor {
    fn columns(&self) -> &[Column] { &self.columns }

    fn next_row(&mut self) -> BridgeResult<Option<Row>> {
        self.log.push(Event::Fetch { user: self.platform.current().name().to_string() });
        match self.rows.next() {
            Some(row) => Ok(Some(row)),
            None => match self.error.take() {
                Some(msg) => Err(BridgeError::exec(msg)),
                None => Ok(None),
            },
        }
    }
}

/// Collects rows and notes the effective identity at every callback.
pub struct RecordingSink {
    platform: Arc<dyn PrincipalPlatform>,
    log: EventLog,
    pub collected: CollectSink,
    fail_at_row: Option<usize>,
}

impl RecordingSink {
    pub fn new(platform: Arc<dyn PrincipalPlatform>, log: &EventLog) -> Self {
        Self { platform, log: log.clone(), collected: CollectSink::new(), fail_at_row: None }
    }

    pub fn failing_at_row(mut self, index: usize) -> Self {
        self.fail_at_row = Some(index);
        self
    }

    fn user(&self) -> String { self.platform.current().name().to_string() }
}

impl ResultSink for RecordingSink {
    fn start(&mut self, columns: &[Column]) -> BridgeResult<()> {
        self.log.push(Event::SinkStart { user: self.user() });
        self.collected.start(columns)
    }

    fn row(&mut self, row: &[Value]) -> BridgeResult<()> {
        self.log.push(Event::SinkRow { user: self.user() });
        if self.fail_at_row == Some(self.collected.rows.len()) {
            return Err(BridgeError::sink("client disconnected"));
        }
        self.collected.row(row)
    }

    fn finish(&mut self, rows: u64) -> BridgeResult<()> {
        self.log.push(Event::SinkFinish(rows));
        self.collected.finish(rows)
    }
}

/// Everything one test needs, wired the way the binary wires it.
pub struct Harness {
    pub log: EventLog,
    pub platform: Arc<dyn PrincipalPlatform>,
    pub bridge: Bridge,
}

impl Harness {
    pub fn new() -> Self { Self::with(|log| RecordingPlatform::thread(log), |c| c) }

    pub fn with(
        platform: impl FnOnce(&EventLog) -> RecordingPlatform,
        connector: impl FnOnce(ScriptedConnector) -> ScriptedConnector,
    ) -> Self {
        let log = EventLog::default();
        let platform: Arc<dyn PrincipalPlatform> = Arc::new(platform(&log));
        let connector = connector(ScriptedConnector::new(platform.clone(), &log));
        let bridge = Bridge::new(Arc::new(connector), platform.clone());
        Self { log, platform, bridge }
    }

    pub fn sink(&self) -> RecordingSink { RecordingSink::new(self.platform.clone(), &self.log) }
}

pub fn request(command: &str) -> ExecutionRequest {
    ExecutionRequest::new("app1", "db01", "Sales", command)
}

pub fn alice() -> RequestContext {
    RequestContext::for_principal(Principal::platform("alice")).with_request_id("req-alice")
}

pub fn sql_login() -> RequestContext {
    RequestContext::for_principal(Principal::database_login("sa"))
}
