//!
//! Bridge facade
//! -------------
//! The three external operations. Each runs one pass of
//! validate -> resolve identity -> execute (restore) -> relay, and reports failure only
//! through a nullable message. Typed errors are kept up to this boundary for logging and
//! flattened here; panics from connectors or sinks are contained here as well.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::connector::{ConnectionParameters, Connector};
use crate::error::{BridgeError, BridgeResult};
use crate::executor::{CommandMode, ExecutionOutcome, RemoteExecutor};
use crate::identity::{resolve_identity, CallerContext, PrincipalPlatform, PrincipalSwitcher, ResolvedIdentity};
use crate::request::{CommandTimeout, ExecutionRequest};
use crate::sink::ResultSink;
use crate::validate::validate;

/// Reply of the scalar operation. At most one of the two is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalarReply {
    pub result: Option<String>,
    pub error_message: Option<String>,
}

pub struct Bridge {
    connector: Arc<dyn Connector>,
    switcher: PrincipalSwitcher,
}

impl Bridge {
    pub fn new(connector: Arc<dyn Connector>, platform: Arc<dyn PrincipalPlatform>) -> Self {
        Self { connector, switcher: PrincipalSwitcher::new(platform) }
    }

    /// Run the command and stream its rows into `sink`. `None` on success.
    pub fn execute_streaming(&self, caller: &dyn CallerContext, request: &ExecutionRequest, sink: &mut dyn ResultSink) -> Option<String> {
        self.contained(caller, request, "streaming", |p| {
            p.executor.stream(&p.params, p.command, p.timeout, &p.identity, sink)
        })
        .err()
        .map(|e| e.message())
    }

    /// Run the command and discard its results. `None` on success.
    pub fn execute_command(&self, caller: &dyn CallerContext, request: &ExecutionRequest) -> Option<String> {
        self.contained(caller, request, "non_query", |p| p.executor.execute(&p.params, p.command, p.timeout, &p.identity))
            .err()
            .map(|e| e.message())
    }

    pub fn execute_scalar(&self, caller: &dyn CallerContext, request: &ExecutionRequest) -> ScalarReply {
        match self.contained(caller, request, "scalar", |p| p.executor.scalar(&p.params, p.command, p.timeout, &p.identity)) {
            Ok(result) => ScalarReply { result, error_message: None },
            Err(e) => ScalarReply { result: None, error_message: Some(e.message()) },
        }
    }

    /// Typed entry point: the same pass as the three operations, with the error taxonomy intact.
    /// Panics are not contained here.
    pub fn run(&self, caller: &dyn CallerContext, request: &ExecutionRequest, mode: CommandMode<'_>) -> BridgeResult<ExecutionOutcome> {
        let p = self.prepare(caller, request)?;
        p.executor.run(&p.params, p.command, p.timeout, &p.identity, mode)
    }

    /// Validation fails fast: no identity lookup, no switch, no connection.
    fn prepare<'r>(&'r self, caller: &dyn CallerContext, request: &'r ExecutionRequest) -> BridgeResult<Prepared<'r>> {
        validate(request)?;
        let identity = resolve_identity(caller, request.use_caller_identity)?;
        Ok(Prepared {
            executor: RemoteExecutor::new(&*self.connector, &self.switcher),
            params: ConnectionParameters::from_request(request),
            command: request.command_text.as_deref().unwrap_or_default(),
            timeout: request.timeout(),
            identity,
        })
    }

    fn contained<T, F>(&self, caller: &dyn CallerContext, request: &ExecutionRequest, mode: &'static str, body: F) -> BridgeResult<T>
    where
        T: std::fmt::Debug,
        F: FnOnce(Prepared<'_>) -> BridgeResult<T>,
    {
        let request_id = caller.request_id().unwrap_or("-");
        let started = Instant::now();
        let pass = || self.prepare(caller, request).and_then(body);
        let result = match catch_unwind(AssertUnwindSafe(pass)) {
            Ok(result) => result,
            Err(panic_payload) => {
                let msg = if let Some(s) = panic_payload.downcast_ref::<&str>() { *s }
                          else if let Some(s) = panic_payload.downcast_ref::<String>() { s.as_str() }
                          else { "panic" };
                error!(target: "panic", request_id, mode, "bridge request panicked: {}", msg);
                Err(BridgeError::internal("the request was aborted by an internal failure"))
            }
        };
        let elapsed_ms = millis(started.elapsed());
        match &result {
            Ok(outcome) => debug!(
                target: "execbridge::bridge", request_id, mode,
                delegated = request.wants_caller_identity(), elapsed_ms, "request completed: {:?}", outcome
            ),
            Err(e) if e.is_fatal() => error!(
                target: "execbridge::bridge", request_id, mode, code = e.code_str(), elapsed_ms,
                "request failed: {}", e
            ),
            Err(e) => warn!(
                target: "execbridge::bridge", request_id, mode, code = e.code_str(), elapsed_ms,
                "request failed: {}", e
            ),
        }
        result
    }
}

/// A validated request with its identity resolved, ready for the executor.
struct Prepared<'r> {
    executor: RemoteExecutor<'r>,
    params: ConnectionParameters,
    command: &'r str,
    timeout: CommandTimeout,
    identity: ResolvedIdentity,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_millis_saturate() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
