//! AWS actuator: provisions an IAM user, an inline policy, and a single
//! live access key per `CredentialsRequest`, following the create/update
//! convergence algorithm and the access-key reconciliation cases A-E.

use super::{derive_name, Actuator};
use crate::codec::{self, AwsProviderStatus};
use crate::iam::{IamClient, IamError};
use crate::secret;
use crate::store::RequestStore;
use crate::util::Error;
use async_trait::async_trait;
use credminter_types::CredentialsRequest;
use tracing::info;

pub struct AwsActuator<C: IamClient> {
    iam: C,
}

impl<C: IamClient> AwsActuator<C> {
    pub fn new(iam: C) -> Self {
        Self { iam }
    }

    fn policy_name(principal: &str) -> String {
        format!("{principal}-policy")
    }

    fn tags(request: &CredentialsRequest) -> Vec<(String, String)> {
        vec![(
            "credminter.openshift.io/cluster-id".to_owned(),
            request.spec.cluster_id.clone(),
        )]
    }

    fn io_error(e: IamError) -> Error {
        match e {
            IamError::NoSuchEntity => Error::Transient("unexpected NoSuchEntity".to_owned()),
            IamError::Transient(msg) => Error::Transient(msg),
        }
    }

    /// Runs the unified create/update convergence algorithm (§4.4 steps
    /// 1-4) and returns the `providerStatus` value to stamp on success.
    async fn converge(
        &self,
        store: &dyn RequestStore,
        request: &CredentialsRequest,
    ) -> Result<serde_json::Value, Error> {
        let principal = derive_name(request);

        match self.iam.get_user(&principal).await {
            Ok(()) => {}
            Err(IamError::NoSuchEntity) => {
                self.iam.create_user(&principal).await.map_err(Self::io_error)?;
                let _ = self.iam.tag_user(&principal, &Self::tags(request)).await;
            }
            Err(e) => return Err(Self::io_error(e)),
        }

        let spec = codec::decode_spec(&request.spec.provider_spec)?;
        let policy_document = codec::statements_to_policy_document(&spec)?;
        let policy_name = Self::policy_name(&principal);
        self.iam
            .put_user_policy(&principal, &policy_name, &policy_document)
            .await
            .map_err(Self::io_error)?;

        self.reconcile_access_key(store, request, &principal).await?;

        codec::encode_status(&AwsProviderStatus {
            user: principal,
            policy: policy_name,
        })
    }

    /// §4.4 step 3, cases A through E.
    async fn reconcile_access_key(
        &self,
        store: &dyn RequestStore,
        request: &CredentialsRequest,
        principal: &str,
    ) -> Result<(), Error> {
        let live_keys = self
            .iam
            .list_access_keys(principal)
            .await
            .map_err(Self::io_error)?;
        let stored_key = secret::read_existing_access_key_id(store, request).await?;

        match stored_key {
            Some(ref stored) if live_keys.iter().any(|k| k == stored) => {
                if live_keys.len() > 1 {
                    // Case D: extra keys beyond the one the secret references.
                    for extra in live_keys.iter().filter(|k| *k != stored) {
                        self.delete_key_tolerating_absence(principal, extra).await?;
                    }
                }
                // Case A otherwise: secret already holds a live key.
            }
            Some(_) => {
                // Case C: secret references a key the cloud has forgotten.
                let created = self
                    .iam
                    .create_access_key(principal)
                    .await
                    .map_err(Self::io_error)?;
                secret::sync_secret(
                    store,
                    request,
                    &created.access_key_id,
                    &created.secret_access_key,
                )
                .await?;
                for orphan in &live_keys {
                    self.delete_key_tolerating_absence(principal, orphan).await?;
                }
            }
            None => {
                // Case B, or Case E if live_keys is non-empty.
                let created = self
                    .iam
                    .create_access_key(principal)
                    .await
                    .map_err(Self::io_error)?;
                secret::sync_secret(
                    store,
                    request,
                    &created.access_key_id,
                    &created.secret_access_key,
                )
                .await?;
                for orphan in &live_keys {
                    self.delete_key_tolerating_absence(principal, orphan).await?;
                }
            }
        }
        Ok(())
    }

    async fn delete_key_tolerating_absence(
        &self,
        principal: &str,
        access_key_id: &str,
    ) -> Result<(), Error> {
        match self.iam.delete_access_key(principal, access_key_id).await {
            Ok(()) | Err(IamError::NoSuchEntity) => Ok(()),
            Err(e) => Err(Self::io_error(e)),
        }
    }
}

#[async_trait]
impl<C: IamClient> Actuator for AwsActuator<C> {
    async fn exists(&self, request: &CredentialsRequest) -> Result<bool, Error> {
        let principal = derive_name(request);
        match self.iam.get_user(&principal).await {
            Ok(()) => Ok(true),
            Err(IamError::NoSuchEntity) => Ok(false),
            Err(e) => Err(Self::io_error(e)),
        }
    }

    async fn create(
        &self,
        store: &dyn RequestStore,
        request: &CredentialsRequest,
    ) -> Result<serde_json::Value, Error> {
        self.converge(store, request).await
    }

    async fn update(
        &self,
        store: &dyn RequestStore,
        request: &CredentialsRequest,
    ) -> Result<serde_json::Value, Error> {
        self.converge(store, request).await
    }

    async fn delete(&self, request: &CredentialsRequest) -> Result<(), Error> {
        let principal = derive_name(request);
        info!(principal, "actuator.delete");

        let keys = match self.iam.list_access_keys(&principal).await {
            Ok(keys) => keys,
            Err(IamError::NoSuchEntity) => Vec::new(),
            Err(e) => return Err(Self::io_error(e)),
        };
        for key in &keys {
            self.delete_key_tolerating_absence(&principal, key).await?;
        }

        match self
            .iam
            .delete_user_policy(&principal, &Self::policy_name(&principal))
            .await
        {
            Ok(()) | Err(IamError::NoSuchEntity) => {}
            Err(e) => return Err(Self::io_error(e)),
        }

        match self.iam.delete_user(&principal).await {
            Ok(()) | Err(IamError::NoSuchEntity) => Ok(()),
            Err(e) => Err(Self::io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::mock::MockIamClient;
    use crate::iam::AccessKey;
    use crate::store::FakeRequestStore;
    use credminter_types::{CredentialsRequestSpec, SecretRef};
    use kube::core::ObjectMeta;

    fn sample_request() -> CredentialsRequest {
        CredentialsRequest {
            metadata: ObjectMeta {
                name: Some("openshift-component-a".to_owned()),
                namespace: Some("myproject".to_owned()),
                ..Default::default()
            },
            spec: CredentialsRequestSpec {
                cluster_name: "testcluster".to_owned(),
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

    #[tokio::test]
    async fn new_credential_creates_user_policy_and_key() {
        let iam = MockIamClient::new().with_access_keys([AccessKey {
            access_key_id: "FAKEAWSACCESSKEYID".to_owned(),
            secret_access_key: "KEEPITSECRET".to_owned(),
        }]);
        let actuator = AwsActuator::new(iam);
        let store = FakeRequestStore::new();
        let request = sample_request();

        assert!(!actuator.exists(&request).await.unwrap());
        actuator.create(&store, &request).await.unwrap();

        let stored = secret::read_existing_access_key_id(&store, &request)
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some("FAKEAWSACCESSKEYID"));
    }

    #[tokio::test]
    async fn existing_credential_is_left_untouched() {
        let iam = MockIamClient::new()
            .with_existing_user("testcluster-openshift-component-a", ["FAKEAWSACCESSKEYID".to_owned()]);
        let actuator = AwsActuator::new(iam);
        let store = FakeRequestStore::new();
        let request = sample_request();
        secret::sync_secret(&store, &request, "FAKEAWSACCESSKEYID", "whatever")
            .await
            .unwrap();

        actuator.update(&store, &request).await.unwrap();

        assert!(!actuator
            .iam
            .calls()
            .iter()
            .any(|c| matches!(c, crate::iam::mock::Call::CreateAccessKey(..))));
    }

    #[tokio::test]
    async fn orphaned_secret_key_triggers_rotation_and_cleanup() {
        let iam = MockIamClient::new()
            .with_existing_user("testcluster-openshift-component-a", ["FAKEAWSACCESSKEYID".to_owned()])
            .with_access_keys([AccessKey {
                access_key_id: "FAKEAWSACCESSKEYID2".to_owned(),
                secret_access_key: "KEEPITSECRET2".to_owned(),
            }]);
        let actuator = AwsActuator::new(iam);
        let store = FakeRequestStore::new();
        let request = sample_request();

        actuator.update(&store, &request).await.unwrap();

        let stored = secret::read_existing_access_key_id(&store, &request)
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some("FAKEAWSACCESSKEYID2"));
        let calls = actuator.iam.calls();
        assert!(calls
            .iter()
            .any(|c| matches!(c, crate::iam::mock::Call::DeleteAccessKey(_, id) if id == "FAKEAWSACCESSKEYID")));
    }

    #[tokio::test]
    async fn delete_tolerates_already_missing_entities() {
        let iam = MockIamClient::new();
        let actuator = AwsActuator::new(iam);
        let request = sample_request();
        actuator.delete(&request).await.unwrap();
    }
}
