//! Identity backend trait implemented by cluster API adapters.

use std::fmt;

use async_trait::async_trait;

use crate::model::{Identity, KeyPair, NewIdentity};

/// Remote identity-and-credential service the plugin issues against.
///
/// Every call is awaited to completion by the caller; adapters own any retry
/// or timeout policy.
#[async_trait]
pub trait IdentityBackend: Send + Sync + fmt::Debug {
    /// List the organisational scopes (access zones) known to the cluster.
    async fn list_scopes(&self) -> anyhow::Result<Vec<String>>;

    /// List identities within a scope.
    async fn list_identities(&self, scope: &str) -> anyhow::Result<Vec<Identity>>;

    /// Create an identity. Must fail when the name already exists.
    async fn create_identity(&self, identity: &NewIdentity) -> anyhow::Result<()>;

    /// Replace the supplemental group memberships of an identity.
    async fn set_supplemental_groups(
        &self,
        name: &str,
        groups: &[String],
        scope: &str,
    ) -> anyhow::Result<()>;

    /// Mint an access-key pair.
    ///
    /// `expiry_minutes == 0` leaves the new pair without expiry; a positive
    /// value bounds the previously active pair to that many minutes and
    /// reports its resulting expiry in [`KeyPair::prior_key_expiry`].
    async fn mint_key_pair(
        &self,
        name: &str,
        scope: &str,
        expiry_minutes: i64,
    ) -> anyhow::Result<KeyPair>;

    /// Delete an identity.
    async fn delete_identity(&self, name: &str, scope: &str) -> anyhow::Result<()>;
}
