use crate::models::Identity;

/// Source of the caller identity, established once per client process
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Identity;
}

/// Fixed identity, e.g. read from a local profile at startup
#[derive(Debug, Clone)]
pub struct StaticIdentity(Identity);

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self(identity)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Identity {
        self.0.clone()
    }
}
