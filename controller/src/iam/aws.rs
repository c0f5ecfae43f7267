//! Production [`IamClient`](super::IamClient) backed by `aws-sdk-iam`.

use super::{AccessKey, IamClient, IamError};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_credential_types::Credentials;
use aws_sdk_iam::error::SdkError;
use aws_sdk_iam::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Deadline applied to every IAM call, per the 30s ceiling in the design's
/// concurrency model.
const IAM_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AwsIamClient {
    client: Client,
}

impl AwsIamClient {
    /// Builds a client from a static access key pair — the "bootstrap
    /// credentials" read once per reconcile from the well-known platform
    /// secret (see §6 of the design).
    pub async fn from_static_credentials(access_key_id: &str, secret_access_key: &str) -> Self {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "credminter-bootstrap",
        );
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(IAM_CALL_TIMEOUT)
                    .build(),
            )
            .load()
            .await;
        Self {
            client: Client::new(&sdk_config),
        }
    }
}

/// Maps a `NoSuchEntityException` (present on every IAM delete/get
/// operation's error enum) to [`IamError::NoSuchEntity`]; everything else
/// becomes [`IamError::Transient`].
macro_rules! map_iam_error {
    ($result:expr, $is_no_such_entity:ident) => {
        match $result {
            Ok(out) => Ok(out),
            Err(SdkError::ServiceError(ctx)) if ctx.err().$is_no_such_entity() => {
                Err(IamError::NoSuchEntity)
            }
            Err(e) => Err(IamError::Transient(e.to_string())),
        }
    };
}

#[async_trait]
impl IamClient for AwsIamClient {
    async fn get_user(&self, name: &str) -> Result<(), IamError> {
        debug!(user = name, "iam.get_user");
        let result = self.client.get_user().user_name(name).send().await;
        map_iam_error!(result, is_no_such_entity_exception).map(|_| ())
    }

    async fn create_user(&self, name: &str) -> Result<(), IamError> {
        debug!(user = name, "iam.create_user");
        self.client
            .create_user()
            .user_name(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| IamError::Transient(e.to_string()))
    }

    async fn tag_user(&self, name: &str, tags: &[(String, String)]) -> Result<(), IamError> {
        debug!(user = name, "iam.tag_user");
        let mut req = self.client.tag_user().user_name(name);
        for (key, value) in tags {
            req = req.tags(
                aws_sdk_iam::types::Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(|e| IamError::Transient(e.to_string()))?,
            );
        }
        match req.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(user = name, error = %e, "iam.tag_user failed, continuing");
                Err(IamError::Transient(e.to_string()))
            }
        }
    }

    async fn delete_user(&self, name: &str) -> Result<(), IamError> {
        debug!(user = name, "iam.delete_user");
        let result = self.client.delete_user().user_name(name).send().await;
        map_iam_error!(result, is_no_such_entity_exception).map(|_| ())
    }

    async fn put_user_policy(
        &self,
        user_name: &str,
        policy_name: &str,
        policy_document: &str,
    ) -> Result<(), IamError> {
        debug!(user = user_name, policy = policy_name, "iam.put_user_policy");
        self.client
            .put_user_policy()
            .user_name(user_name)
            .policy_name(policy_name)
            .policy_document(policy_document)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| IamError::Transient(e.to_string()))
    }

    async fn delete_user_policy(&self, user_name: &str, policy_name: &str) -> Result<(), IamError> {
        debug!(user = user_name, policy = policy_name, "iam.delete_user_policy");
        let result = self
            .client
            .delete_user_policy()
            .user_name(user_name)
            .policy_name(policy_name)
            .send()
            .await;
        map_iam_error!(result, is_no_such_entity_exception).map(|_| ())
    }

    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<String>, IamError> {
        debug!(user = user_name, "iam.list_access_keys");
        let result = self
            .client
            .list_access_keys()
            .user_name(user_name)
            .send()
            .await;
        let out = map_iam_error!(result, is_no_such_entity_exception)?;
        Ok(out
            .access_key_metadata()
            .iter()
            .filter_map(|m| m.access_key_id().map(str::to_owned))
            .collect())
    }

    async fn create_access_key(&self, user_name: &str) -> Result<AccessKey, IamError> {
        debug!(user = user_name, "iam.create_access_key");
        let out = self
            .client
            .create_access_key()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| IamError::Transient(e.to_string()))?;
        let key = out
            .access_key()
            .ok_or_else(|| IamError::Transient("CreateAccessKey returned no key".to_owned()))?;
        Ok(AccessKey {
            access_key_id: key.access_key_id().to_owned(),
            secret_access_key: key.secret_access_key().to_owned(),
        })
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<(), IamError> {
        debug!(user = user_name, key = access_key_id, "iam.delete_access_key");
        let result = self
            .client
            .delete_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .send()
            .await;
        map_iam_error!(result, is_no_such_entity_exception).map(|_| ())
    }
}
