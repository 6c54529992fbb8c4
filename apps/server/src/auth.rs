//! View and object permissions.
//!
//! Views either allow any caller or require one of the configured API keys in
//! a request header. Keys are kept only as SHA-256 digests.
//!
//! Retrieved documents may additionally be subject to an object rule; a
//! document that fails it is reported as missing so its existence does not
//! leak.

use axum::http::{HeaderMap, HeaderName};
use sha2::{Digest, Sha256};
use sieve_query::Hit;

use crate::config::{AuthConfig, ObjectPermission, PermissionMode};
use crate::error::Error;

pub struct ApiKeyAuth {
    header: HeaderName,
    digests: Vec<[u8; 32]>,
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("header", &self.header)
            .field("keys", &self.digests.len())
            .finish()
    }
}

impl ApiKeyAuth {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        let header = HeaderName::try_from(config.header.trim().to_ascii_lowercase())
            .map_err(|e| anyhow::anyhow!("Invalid auth.header '{}': {e}", config.header))?;
        let digests = config
            .api_keys
            .iter()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(digest)
            .collect();
        Ok(Self { header, digests })
    }

    /// Request header carrying the API key.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Check the caller against a view's permission mode.
    pub fn authorize(&self, mode: PermissionMode, headers: &HeaderMap) -> Result<(), Error> {
        match mode {
            PermissionMode::AllowAny => Ok(()),
            PermissionMode::ApiKey => {
                let Some(presented) = headers
                    .get(&self.header)
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                else {
                    return Err(Error::Unauthorized);
                };
                let presented = digest(presented);
                if self.digests.iter().any(|known| *known == presented) {
                    Ok(())
                } else {
                    tracing::debug!(header = %self.header, "API key rejected");
                    Err(Error::Forbidden)
                }
            }
        }
    }
}

fn digest(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

/// Whether `hit` passes the view's object rule; views without a rule allow every document.
pub fn object_permitted(rule: Option<&ObjectPermission>, hit: &Hit) -> bool {
    match rule {
        None => true,
        Some(rule) => hit.source_value(&rule.field) == Some(&rule.equals),
    }
}
