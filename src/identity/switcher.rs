//! Scoped identity elevation.
//! -------------------------
//! `ImpersonationScope` owns one elevated window. The prior identity is held in an `Option`
//! and taken on restore, so a scope restores at most once: explicitly mid-body, at the end
//! of `with_identity`, or from `Drop` when the body unwinds.
//!
//! Elevation never nests on a thread. When the platform switch is process-wide, every window
//! takes the process-wide lock until it restores: delegated windows exclusively, service
//! account windows shared, so nothing runs as the service account while another thread has
//! the process switched to a caller. A failed process-wide restore poisons the lock for good.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error};

use crate::error::{BridgeError, BridgeResult};

use super::{Identity, PrincipalPlatform, ResolvedIdentity, SwitchScope};

static PROCESS_ELEVATION: Lazy<RwLock<()>> = Lazy::new(|| RwLock::new(()));

/// Set, while the exclusive lock is still held, when a process-wide restore fails.
static PROCESS_POISONED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static ELEVATED: Cell<bool> = const { Cell::new(false) };
    static SHARED_HOLDS: Cell<u32> = const { Cell::new(0) };
}

/// True while an elevation is active on the calling thread.
pub fn thread_is_elevated() -> bool { ELEVATED.with(Cell::get) }

/// True once a process-wide restore has failed; every later window is refused.
pub fn process_identity_poisoned() -> bool { PROCESS_POISONED.load(Ordering::SeqCst) }

fn poisoned_error() -> BridgeError {
    BridgeError::restore("an earlier process-wide identity restore failed; refusing to run under an unknown principal")
}

enum ProcessHold {
    Shared(RwLockReadGuard<'static, ()>),
    Exclusive(RwLockWriteGuard<'static, ()>),
}

/// One elevated window (or the ambient window for the service account).
/// Not `Send`: the window belongs to the thread that opened it.
pub struct ImpersonationScope<'p> {
    platform: &'p dyn PrincipalPlatform,
    prior: Option<Identity>,
    process_hold: Option<ProcessHold>,
    _thread_bound: PhantomData<*const ()>,
}

impl<'p> ImpersonationScope<'p> {
    /// Still running under a borrowed identity.
    pub fn is_elevated(&self) -> bool { self.prior.is_some() }

    /// Return to the prior identity. Later calls are no-ops.
    pub fn restore(&mut self) -> BridgeResult<()> {
        let Some(prior) = self.prior.take() else {
            self.release();
            return Ok(());
        };
        let reverted = self.platform.revert(&prior);
        match &reverted {
            Ok(()) => {
                ELEVATED.with(|flag| flag.set(false));
                debug!(target: "execbridge::identity", to = %prior.name(), "identity restored");
            }
            // The thread stays marked elevated so it cannot be reused for another switch.
            Err(err) => {
                error!(target: "execbridge::identity", to = %prior.name(), "identity restore failed: {}", err);
                if matches!(self.process_hold, Some(ProcessHold::Exclusive(_))) {
                    PROCESS_POISONED.store(true, Ordering::SeqCst);
                    error!(target: "execbridge::identity", "process-wide identity is poisoned; further requests are refused");
                }
            }
        }
        self.release();
        reverted.map_err(|err| match err {
            BridgeError::IdentityRestoreFailure(_) => err,
            other => BridgeError::restore(other.message()),
        })
    }

    fn release(&mut self) {
        if let Some(ProcessHold::Shared(_)) = self.process_hold.take() {
            SHARED_HOLDS.with(|n| n.set(n.get().saturating_sub(1)));
        }
    }
}

impl Drop for ImpersonationScope<'_> {
    fn drop(&mut self) {
        // Unwinding or an early return skipped the explicit restore.
        let _ = self.restore();
    }
}

#[derive(Clone)]
pub struct PrincipalSwitcher {
    platform: Arc<dyn PrincipalPlatform>,
}

impl PrincipalSwitcher {
    pub fn new(platform: Arc<dyn PrincipalPlatform>) -> Self { Self { platform } }

    pub fn platform(&self) -> &dyn PrincipalPlatform { &*self.platform }

    /// Open an elevated window for `identity`; the service account opens an ambient one.
    pub fn enter(&self, identity: &ResolvedIdentity) -> BridgeResult<ImpersonationScope<'_>> {
        let process_wide = self.platform.scope() == SwitchScope::Process;
        if process_wide && process_identity_poisoned() {
            return Err(poisoned_error());
        }
        let target = match identity {
            ResolvedIdentity::ServiceAccount => return self.enter_ambient(process_wide),
            ResolvedIdentity::Delegated(target) => target,
        };
        if thread_is_elevated() {
            return Err(BridgeError::switch("an identity switch is already active on this thread"));
        }
        let process_hold = if process_wide {
            if SHARED_HOLDS.with(Cell::get) > 0 {
                return Err(BridgeError::switch("a service-account window is already open on this thread"));
            }
            let guard = PROCESS_ELEVATION.write();
            // Poisoning happens under the exclusive lock, so re-check once it is ours.
            if process_identity_poisoned() {
                return Err(poisoned_error());
            }
            Some(ProcessHold::Exclusive(guard))
        } else {
            None
        };
        let prior = self.platform.current();
        self.platform.impersonate(target).map_err(|err| match err {
            BridgeError::IdentitySwitchFailure(_) => err,
            other => BridgeError::switch(other.message()),
        })?;
        ELEVATED.with(|flag| flag.set(true));
        debug!(target: "execbridge::identity", from = %prior.name(), to = %target.name(), "identity switched");
        Ok(ImpersonationScope {
            platform: &*self.platform,
            prior: Some(prior),
            process_hold,
            _thread_bound: PhantomData,
        })
    }

    fn enter_ambient(&self, process_wide: bool) -> BridgeResult<ImpersonationScope<'_>> {
        // A thread inside its own delegated window already holds the lock exclusively.
        let process_hold = if process_wide && !thread_is_elevated() {
            let guard = PROCESS_ELEVATION.read_recursive();
            if process_identity_poisoned() {
                return Err(poisoned_error());
            }
            SHARED_HOLDS.with(|n| n.set(n.get() + 1));
            Some(ProcessHold::Shared(guard))
        } else {
            None
        };
        Ok(ImpersonationScope { platform: &*self.platform, prior: None, process_hold, _thread_bound: PhantomData })
    }

    /// Run `body` under `identity` and restore afterwards. A failed restore replaces
    /// whatever the body produced, since the thread may now hold the wrong principal.
    pub fn with_identity<T, F>(&self, identity: &ResolvedIdentity, body: F) -> BridgeResult<T>
    where
        F: FnOnce(&mut ImpersonationScope<'_>) -> BridgeResult<T>,
    {
        let mut scope = self.enter(identity)?;
        let outcome = body(&mut scope);
        scope.restore()?;
        outcome
    }
}
