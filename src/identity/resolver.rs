use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

use super::{Identity, RequestContext};

/// Host capability: the delegated identity of whoever made the current call.
pub trait CallerContext {
    /// Fails with `NoDelegableIdentity` when the caller has no transferable identity.
    fn caller_identity(&self) -> BridgeResult<Identity>;

    /// Correlation id for logs, if the host has one.
    fn request_id(&self) -> Option<&str> { None }
}

impl CallerContext for RequestContext {
    fn caller_identity(&self) -> BridgeResult<Identity> {
        match &self.principal {
            Some(p) if p.is_delegable() => Ok(Identity::delegated(p.user_id.clone())),
            Some(p) => {
                debug!(target: "execbridge::identity", user = %p.user_id, mechanism = ?p.mechanism, "caller not delegable");
                Err(BridgeError::NoDelegableIdentity)
            }
            None => Err(BridgeError::NoDelegableIdentity),
        }
    }

    fn request_id(&self) -> Option<&str> { self.request_id.as_deref() }
}

/// Which principal performs the remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedIdentity {
    /// Run under the ambient service identity; no switch.
    ServiceAccount,
    Delegated(Identity),
}

impl ResolvedIdentity {
    pub fn is_delegated(&self) -> bool { matches!(self, ResolvedIdentity::Delegated(_)) }
}

/// Consult the caller context only when delegation was asked for. There is no fallback:
/// a caller who asked to run as themselves and cannot gets an error, never the service identity.
pub fn resolve_identity(caller: &dyn CallerContext, use_caller_identity: Option<bool>) -> BridgeResult<ResolvedIdentity> {
    if !use_caller_identity.unwrap_or(false) {
        return Ok(ResolvedIdentity::ServiceAccount);
    }
    let identity = caller.caller_identity()?;
    Ok(ResolvedIdentity::Delegated(identity))
}
