//! Identity resolution for deployments behind an authenticating proxy.

use async_trait::async_trait;

use interview_core::ports::IdentityProvider;
use interview_types::{user::Identity, Result};

/// Header carrying the authenticated subject
pub const USER_ID_HEADER: &str = "x-user-id";

/// Trusts whatever non-blank subject the upstream auth layer forwarded.
#[derive(Debug, Clone, Default)]
pub struct HeaderIdentityProvider;

impl HeaderIdentityProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityProvider for HeaderIdentityProvider {
    async fn resolve(&self, credential: Option<&str>) -> Result<Option<Identity>> {
        Ok(credential
            .map(str::trim)
            .filter(|subject| !subject.is_empty())
            .map(Identity::new))
    }
}
