//! The platform's identity-switch primitive.
//! The switcher only ever talks to this trait, so a host that swaps OS tokens and the
//! thread-local default below are interchangeable.

use std::cell::RefCell;

use parking_lot::RwLock;

use crate::error::BridgeResult;

use super::Identity;

/// Reach of a single identity switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchScope {
    /// Applies to the calling thread only; concurrent requests on other threads are unaffected.
    Thread,
    /// Applies to the whole process; concurrent elevated windows must be serialized.
    Process,
}

pub trait PrincipalPlatform: Send + Sync {
    fn scope(&self) -> SwitchScope;

    /// Effective identity of the calling thread.
    fn current(&self) -> Identity;

    /// Make `identity` effective. Errors map to `IdentitySwitchFailure`.
    fn impersonate(&self, identity: &Identity) -> BridgeResult<()>;

    /// Make `prior` effective again. Errors map to `IdentityRestoreFailure`.
    fn revert(&self, prior: &Identity) -> BridgeResult<()>;
}

thread_local! {
    static EFFECTIVE: RefCell<Option<Identity>> = const { RefCell::new(None) };
}

/// Thread-affine platform: the effective identity lives in thread-local storage and
/// defaults to the service identity.
#[derive(Debug, Clone)]
pub struct ThreadPrincipal {
    service: Identity,
}

impl ThreadPrincipal {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service: Identity::service(service_name) }
    }

    pub fn service(&self) -> &Identity { &self.service }
}

impl PrincipalPlatform for ThreadPrincipal {
    fn scope(&self) -> SwitchScope { SwitchScope::Thread }

    fn current(&self) -> Identity {
        EFFECTIVE.with(|cell| cell.borrow().clone().unwrap_or_else(|| self.service.clone()))
    }

    fn impersonate(&self, identity: &Identity) -> BridgeResult<()> {
        EFFECTIVE.with(|cell| *cell.borrow_mut() = Some(identity.clone()));
        Ok(())
    }

    fn revert(&self, prior: &Identity) -> BridgeResult<()> {
        let next = if *prior == self.service { None } else { Some(prior.clone()) };
        EFFECTIVE.with(|cell| *cell.borrow_mut() = next);
        Ok(())
    }
}

/// Process-wide platform: one effective identity shared by every thread, the way a
/// setuid-style switch behaves. The switcher serializes elevated windows for it.
#[derive(Debug)]
pub struct ProcessPrincipal {
    service: Identity,
    effective: RwLock<Option<Identity>>,
}

impl ProcessPrincipal {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service: Identity::service(service_name), effective: RwLock::new(None) }
    }
}

impl PrincipalPlatform for ProcessPrincipal {
    fn scope(&self) -> SwitchScope { SwitchScope::Process }

    fn current(&self) -> Identity {
        self.effective.read().clone().unwrap_or_else(|| self.service.clone())
    }

    fn impersonate(&self, identity: &Identity) -> BridgeResult<()> {
        *self.effective.write() = Some(identity.clone());
        Ok(())
    }

    fn revert(&self, prior: &Identity) -> BridgeResult<()> {
        *self.effective.write() = if *prior == self.service { None } else { Some(prior.clone()) };
        Ok(())
    }
}
