/// Error taxonomy for the credentials minting controller.
///
/// Variants line up with the reconciler's retry policy: everything but
/// [`Error::OwnershipConflict`] is treated as transient and requeued with
/// backoff by the framework; `OwnershipConflict` is logged and left alone
/// until an operator intervenes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Invalid user input: {0}")]
    UserInput(String),

    #[error("Failed to parse DateTime: {source}")]
    Chrono {
        #[from]
        source: chrono::ParseError,
    },

    #[error("Provider codec error: {0}")]
    Codec(String),

    #[error("Cloud IAM call failed: {0}")]
    Transient(String),

    #[error("Secret {namespace}/{name} is owned by a different CredentialsRequest")]
    OwnershipConflict { namespace: String, name: String },

    #[error("Reconcile cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// True for errors that should not be retried by immediate requeue.
    /// `OwnershipConflict` requires operator intervention to resolve the
    /// conflicting ownership, so hammering it with retries accomplishes
    /// nothing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::OwnershipConflict { .. })
    }
}
