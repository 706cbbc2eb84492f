//! Phone number to platform account lookup

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Identity;

/// Point lookups of identities keyed by phone number.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// `Ok(None)` means the number is not registered; `Err` means the
    /// backend could not answer.
    async fn find_identity(&self, phone: &str) -> Result<Option<Identity>>;
}

/// Resolve both parties of a call. The two lookups run concurrently.
pub async fn lookup_identity_pair(
    store: &dyn IdentityStore,
    a: &str,
    b: &str,
) -> Result<(Option<Identity>, Option<Identity>)> {
    tokio::try_join!(store.find_identity(a), store.find_identity(b))
}
