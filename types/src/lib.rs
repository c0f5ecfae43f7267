//! Shared types for the credentials minting controller: the
//! [`CredentialsRequest`] custom resource and the AWS provider-specific
//! records carried inside its opaque `providerSpec`/`providerStatus`
//! fields.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A reference to the [`Secret`](k8s_openapi::api::core::v1::Secret) that
/// a [`CredentialsRequest`] mints credentials into.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct SecretRef {
    /// Namespace of the destination Secret.
    pub namespace: String,

    /// Name of the destination Secret.
    pub name: String,
}

/// [`CredentialsRequestSpec`] is the desired state of a cloud credential:
/// which cluster it belongs to, where the minted Secret should land, and
/// an opaque, provider-specific permission document.
///
/// `providerSpec` and `providerStatus` are untyped on the wire so that
/// heterogeneous cloud providers can share this one CRD. The controller
/// decodes them through the AWS-typed records in its own `codec` module.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "credminter.openshift.io",
    version = "v1beta1",
    kind = "CredentialsRequest",
    plural = "credentialsrequests",
    derive = "PartialEq",
    status = "CredentialsRequestStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.provisioned\", \"name\": \"PROVISIONED\", \"type\": \"boolean\" }"
)]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.lastSyncTimestamp\", \"name\": \"AGE\", \"type\": \"date\" }"
)]
pub struct CredentialsRequestSpec {
    /// Name of the cluster this request belongs to. Combined with the
    /// request's own name to derive the cloud principal name.
    #[serde(rename = "clusterName")]
    pub cluster_name: String,

    /// Opaque identifier of the cluster, used for cloud-side tagging only.
    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    /// Destination for the minted credentials.
    #[serde(rename = "secretRef")]
    pub secret_ref: SecretRef,

    /// Provider-specific permission document, opaque to the controller
    /// core and decoded by the provider codec.
    #[serde(rename = "providerSpec")]
    pub provider_spec: Value,
}

/// Status object for [`CredentialsRequest`], owned entirely by the
/// controller.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct CredentialsRequestStatus {
    /// True iff the last reconcile observed the cloud principal, its
    /// policy, and a live access key mirrored into the destination Secret.
    #[serde(default)]
    pub provisioned: bool,

    /// The `spec` generation this status reflects.
    #[serde(rename = "lastSyncGeneration", default)]
    pub last_sync_generation: i64,

    /// RFC3339 timestamp of the last successful sync.
    #[serde(rename = "lastSyncTimestamp")]
    pub last_sync_timestamp: Option<String>,

    /// Provider-specific status payload, opaque to the controller core.
    #[serde(rename = "providerStatus")]
    pub provider_status: Option<Value>,
}
