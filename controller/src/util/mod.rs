use std::time::Duration;

pub mod finalizer;
pub mod patch;

#[cfg(feature = "metrics")]
pub mod metrics;

mod error;

pub use error::*;

/// Default requeue interval once a `CredentialsRequest` has fully converged.
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(120);

/// Requeue interval used for `OwnershipConflict`, which needs operator
/// intervention to clear rather than retries. Long enough to avoid hammering
/// the conflicting secret, short enough that a manually-fixed conflict is
/// picked back up without restarting the controller.
pub(crate) const OWNERSHIP_CONFLICT_REQUEUE_INTERVAL: Duration = Duration::from_secs(3600);

/// Name of the kubernetes resource manager, used as the field manager for
/// server-side apply patches.
pub(crate) const MANAGER_NAME: &str = "credminter-controller";
