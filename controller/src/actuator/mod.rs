//! Actuator (C4): the provider-facing half of reconcile. `Exists` / `Create`
//! / `Update` / `Delete` is the whole capability set the reconciler depends
//! on; AWS is the only implementation (`aws.rs`) but the trait is the seam
//! a second cloud would plug into.

pub mod aws;

use crate::store::RequestStore;
use crate::util::Error;
use async_trait::async_trait;
use credminter_types::CredentialsRequest;

#[async_trait]
pub trait Actuator: Send + Sync {
    async fn exists(&self, request: &CredentialsRequest) -> Result<bool, Error>;

    async fn create(
        &self,
        store: &dyn RequestStore,
        request: &CredentialsRequest,
    ) -> Result<serde_json::Value, Error>;

    async fn update(
        &self,
        store: &dyn RequestStore,
        request: &CredentialsRequest,
    ) -> Result<serde_json::Value, Error>;

    async fn delete(&self, request: &CredentialsRequest) -> Result<(), Error>;
}

/// `principalName = "<clusterName>-<requestName>"`, truncated to IAM's
/// 64-character user name limit. Deterministic; never regenerated.
pub fn derive_name(request: &CredentialsRequest) -> String {
    use kube::ResourceExt;
    let name = format!(
        "{}-{}",
        request.spec.cluster_name,
        request.name_any()
    );
    name.chars().take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use credminter_types::{CredentialsRequestSpec, SecretRef};
    use kube::core::ObjectMeta;

    fn request_named(cluster: &str, name: &str) -> CredentialsRequest {
        CredentialsRequest {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("myproject".to_owned()),
                ..Default::default()
            },
            spec: CredentialsRequestSpec {
                cluster_name: cluster.to_owned(),
                cluster_id: "e415fe1c-0000-0000-0000-000000000000".to_owned(),
                secret_ref: SecretRef {
                    namespace: "myproject".to_owned(),
                    name: "test-secret".to_owned(),
                },
                provider_spec: serde_json::json!({ "statementEntries": [] }),
            },
            status: None,
        }
    }

    #[test]
    fn name_derivation_is_pure_and_deterministic() {
        let request = request_named("testcluster", "openshift-component-a");
        assert_eq!(
            derive_name(&request),
            "testcluster-openshift-component-a"
        );
        assert_eq!(derive_name(&request), derive_name(&request));
    }

    #[test]
    fn name_derivation_truncates_to_iam_limit() {
        let long_cluster = "c".repeat(40);
        let request = request_named(&long_cluster, "a-very-long-request-name-indeed");
        assert_eq!(derive_name(&request).chars().count(), 64);
    }
}
