use serde::{Deserialize, Serialize};

/// How the host authenticated the caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuthMechanism {
    /// Platform identity (OS or directory account); yields a transferable token.
    #[default]
    Platform,
    /// A login native to the database engine; nothing can be delegated.
    DatabaseLogin,
}

/// Authenticated caller as reported by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub mechanism: AuthMechanism,
}

impl Principal {
    pub fn platform(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), mechanism: AuthMechanism::Platform }
    }

    pub fn database_login(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), mechanism: AuthMechanism::DatabaseLogin }
    }

    pub fn is_delegable(&self) -> bool {
        self.mechanism == AuthMechanism::Platform && !self.user_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    /// The fixed identity the hosting process runs as.
    Service,
    /// A caller's identity borrowed for one request.
    Delegated,
}

/// A security principal a thread can run as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    name: String,
    kind: IdentityKind,
}

impl Identity {
    pub fn service(name: impl Into<String>) -> Self { Self { name: name.into(), kind: IdentityKind::Service } }
    pub fn delegated(name: impl Into<String>) -> Self { Self { name: name.into(), kind: IdentityKind::Delegated } }

    pub fn name(&self) -> &str { &self.name }
    pub fn kind(&self) -> IdentityKind { self.kind }
    pub fn is_service(&self) -> bool { self.kind == IdentityKind::Service }
}
