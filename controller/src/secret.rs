//! Secret Manager (C3): writes minted AWS credentials into the destination
//! `Secret` named by `CredentialsRequest.spec.secretRef`, and reads back
//! what is already there so the actuator can tell a live key apart from an
//! orphan.
//!
//! A destination `Secret` may be shared infrastructure (it is addressed by
//! namespace/name, not created fresh per request), so every write is gated
//! by an ownership annotation: a `Secret` already owned by a different
//! `CredentialsRequest` is left untouched and surfaced as
//! [`Error::OwnershipConflict`].

use crate::store::RequestStore;
use crate::util::Error;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use credminter_types::CredentialsRequest;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Set on every `Secret` this controller writes, naming the
/// `CredentialsRequest` that owns it as `"<namespace>/<name>"`.
pub const OWNER_ANNOTATION: &str = "credminter.openshift.io/credentials-request";

const ACCESS_KEY_ID_KEY: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY_KEY: &str = "aws_secret_access_key";

fn owner_value(request: &CredentialsRequest) -> String {
    format!(
        "{}/{}",
        request.namespace().unwrap_or_default(),
        request.name_any()
    )
}

/// Double-encodes a credential value for storage: once because a `Secret`'s
/// `data` map is itself base64 (handled transparently by `ByteString`), and
/// once more because consumers of these secrets expect the decoded value to
/// still be base64 text, matching the source provider's own convention.
/// Preserved unchanged rather than "fixed" — see DESIGN.md's Open Questions.
fn double_encode(value: &str) -> ByteString {
    ByteString(STANDARD.encode(value).into_bytes())
}

fn double_decode(bytes: &ByteString) -> Option<String> {
    let once = STANDARD.decode(&bytes.0).ok()?;
    let once = String::from_utf8(once).ok()?;
    STANDARD.decode(once).ok().and_then(|v| String::from_utf8(v).ok())
}

/// Creates or updates the destination `Secret` with a freshly minted
/// key pair. Fails with [`Error::OwnershipConflict`] — without writing
/// anything — if the secret already exists and is owned by some other
/// `CredentialsRequest`.
pub async fn sync_secret(
    store: &dyn RequestStore,
    request: &CredentialsRequest,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<(), Error> {
    let secret_ref = &request.spec.secret_ref;
    let owner = owner_value(request);

    let mut data = BTreeMap::new();
    data.insert(ACCESS_KEY_ID_KEY.to_owned(), double_encode(access_key_id));
    data.insert(
        SECRET_ACCESS_KEY_KEY.to_owned(),
        double_encode(secret_access_key),
    );

    match store
        .get_secret(&secret_ref.namespace, &secret_ref.name)
        .await?
    {
        None => {
            let mut annotations = BTreeMap::new();
            annotations.insert(OWNER_ANNOTATION.to_owned(), owner);
            let secret = Secret {
                metadata: crate::store::object_meta(&secret_ref.namespace, &secret_ref.name),
                data: Some(data),
                ..Default::default()
            }
            .with_annotations(annotations);
            store.create_secret(secret).await?;
        }
        Some(mut existing) => {
            match existing.annotations().get(OWNER_ANNOTATION) {
                Some(existing_owner) if existing_owner != &owner => {
                    return Err(Error::OwnershipConflict {
                        namespace: secret_ref.namespace.clone(),
                        name: secret_ref.name.clone(),
                    });
                }
                _ => {}
            }
            existing
                .annotations_mut()
                .insert(OWNER_ANNOTATION.to_owned(), owner);
            existing.data = Some(data);
            store.update_secret(existing).await?;
        }
    }
    Ok(())
}

/// Returns the access key ID currently stored in the destination secret, or
/// `None` if the secret or the key is absent or unreadable.
pub async fn read_existing_access_key_id(
    store: &dyn RequestStore,
    request: &CredentialsRequest,
) -> Result<Option<String>, Error> {
    let secret_ref = &request.spec.secret_ref;
    let secret = match store
        .get_secret(&secret_ref.namespace, &secret_ref.name)
        .await?
    {
        Some(s) => s,
        None => return Ok(None),
    };
    Ok(secret
        .data
        .as_ref()
        .and_then(|d| d.get(ACCESS_KEY_ID_KEY))
        .and_then(double_decode))
}

trait SecretExt {
    fn with_annotations(self, annotations: BTreeMap<String, String>) -> Self;
}

impl SecretExt for Secret {
    fn with_annotations(mut self, annotations: BTreeMap<String, String>) -> Self {
        self.metadata.annotations = Some(annotations);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FakeRequestStore;
    use credminter_types::{CredentialsRequestSpec, SecretRef};
    use kube::core::ObjectMeta;

    fn sample_request() -> CredentialsRequest {
        CredentialsRequest {
            metadata: ObjectMeta {
                name: Some("component-a".to_owned()),
                namespace: Some("openshift-component-a".to_owned()),
                ..Default::default()
            },
            spec: CredentialsRequestSpec {
                cluster_name: "testcluster".to_owned(),
                cluster_id: "11111111-1111-1111-1111-111111111111".to_owned(),
                secret_ref: SecretRef {
                    namespace: "openshift-component-a".to_owned(),
                    name: "component-a-aws-creds".to_owned(),
                },
                provider_spec: serde_json::json!({ "statementEntries": [] }),
            },
            status: None,
        }
    }

    #[tokio::test]
    async fn creates_secret_with_ownership_annotation() {
        let store = FakeRequestStore::new();
        let request = sample_request();
        sync_secret(&store, &request, "AKIAEXAMPLE", "shhh")
            .await
            .unwrap();

        let secret = store
            .get_secret_sync("openshift-component-a", "component-a-aws-creds")
            .unwrap();
        assert_eq!(
            secret.annotations().get(OWNER_ANNOTATION).unwrap(),
            "openshift-component-a/component-a"
        );
        let stored = read_existing_access_key_id(&store, &request).await.unwrap();
        assert_eq!(stored.as_deref(), Some("AKIAEXAMPLE"));
    }

    #[tokio::test]
    async fn updates_secret_it_already_owns() {
        let store = FakeRequestStore::new();
        let request = sample_request();
        sync_secret(&store, &request, "AKIAFIRST", "first").await.unwrap();
        sync_secret(&store, &request, "AKIASECOND", "second").await.unwrap();

        let stored = read_existing_access_key_id(&store, &request).await.unwrap();
        assert_eq!(stored.as_deref(), Some("AKIASECOND"));
    }

    #[tokio::test]
    async fn refuses_to_overwrite_secret_owned_by_another_request() {
        let mut foreign = Secret {
            metadata: crate::store::object_meta("openshift-component-a", "component-a-aws-creds"),
            ..Default::default()
        };
        foreign
            .annotations_mut()
            .insert(OWNER_ANNOTATION.to_owned(), "other-ns/other-request".to_owned());

        let store = FakeRequestStore::new().with_secret(foreign);
        let request = sample_request();
        let err = sync_secret(&store, &request, "AKIAEXAMPLE", "shhh")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OwnershipConflict { .. }));
    }

    #[test]
    fn double_encoding_round_trips() {
        let encoded = double_encode("super-secret-value");
        assert_eq!(double_decode(&encoded).as_deref(), Some("super-secret-value"));
    }
}
