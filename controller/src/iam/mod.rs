//! Abstract facade over the cloud IAM surface (C1).
//!
//! Narrow enough to be the whole contract the actuator needs, and narrow
//! enough to mock exhaustively in tests: `GetUser`, `CreateUser`,
//! `DeleteUser`, `PutUserPolicy`, `DeleteUserPolicy`, `ListAccessKeys`,
//! `CreateAccessKey`, `DeleteAccessKey`, plus `TagUser` for cluster-ownership
//! tagging (see DESIGN.md for why this was added beyond spec.md).

pub mod aws;
pub mod mock;

use async_trait::async_trait;

/// Errors surfaced by an [`IamClient`]. `NoSuchEntity` is the one code the
/// reconciler treats specially; everything else propagates as transient.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IamError {
    #[error("no such entity")]
    NoSuchEntity,

    #[error("iam call failed: {0}")]
    Transient(String),
}

/// An access key pair as returned by `CreateAccessKey`. The secret half is
/// only ever available at creation time — the cloud never reveals it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKey {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[async_trait]
pub trait IamClient: Send + Sync {
    /// Returns `Ok(())` if `name` exists, `Err(IamError::NoSuchEntity)` if
    /// it does not, or another error on failure.
    async fn get_user(&self, name: &str) -> Result<(), IamError>;

    async fn create_user(&self, name: &str) -> Result<(), IamError>;

    /// Tags the principal with cluster-ownership metadata. Best-effort:
    /// callers may choose to ignore failures here without aborting the
    /// reconcile, since it is not load-bearing for the invariants in §3.
    async fn tag_user(&self, name: &str, tags: &[(String, String)]) -> Result<(), IamError>;

    async fn delete_user(&self, name: &str) -> Result<(), IamError>;

    /// Idempotent replace of the principal's inline policy document.
    async fn put_user_policy(
        &self,
        user_name: &str,
        policy_name: &str,
        policy_document: &str,
    ) -> Result<(), IamError>;

    async fn delete_user_policy(&self, user_name: &str, policy_name: &str) -> Result<(), IamError>;

    /// Returns the set of active access key IDs for `user_name`.
    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<String>, IamError>;

    async fn create_access_key(&self, user_name: &str) -> Result<AccessKey, IamError>;

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<(), IamError>;
}
