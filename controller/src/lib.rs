//! Library surface of the credentials minting controller: the `credminter`
//! and `crdgen` binaries are thin wrappers around what's exposed here, and
//! the test suite drives these modules directly with fakes instead of a
//! live cluster or cloud account.

pub mod actuator;
pub mod codec;
pub mod iam;
pub mod reconcile;
pub mod secret;
pub mod store;
pub mod util;

#[cfg(feature = "metrics")]
pub mod metrics;
