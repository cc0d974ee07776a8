//! Caller identity resolution and scoped principal switching.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod request_context;
mod resolver;
mod platform;
mod switcher;

pub use principal::{AuthMechanism, Identity, IdentityKind, Principal};
pub use request_context::RequestContext;
pub use resolver::{resolve_identity, CallerContext, ResolvedIdentity};
pub use platform::{PrincipalPlatform, ProcessPrincipal, SwitchScope, ThreadPrincipal};
pub use switcher::{process_identity_poisoned, thread_is_elevated, ImpersonationScope, PrincipalSwitcher};
