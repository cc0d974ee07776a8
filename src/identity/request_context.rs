use super::Principal;

/// Per-call host context: who is calling, and an optional correlation id for logs.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Option<Principal>,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn for_principal(principal: Principal) -> Self {
        Self { principal: Some(principal), request_id: None }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}
