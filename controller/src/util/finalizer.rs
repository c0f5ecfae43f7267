use kube::{
    api::{Patch, Resource},
    core::NamespaceResourceScope,
    Api, Client, Error,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::{clone::Clone, fmt::Debug};

/// The deprovision finalizer. Present on any `CredentialsRequest` whose
/// status is not terminal; removed only after cloud cleanup succeeds.
pub const FINALIZER_NAME: &str = "credminter.openshift.io/deprovision";

/// True if `finalizers` does not already contain [`FINALIZER_NAME`].
pub fn needs_finalizer(finalizers: &[String]) -> bool {
    !finalizers.iter().any(|f| f == FINALIZER_NAME)
}

/// Adds [`FINALIZER_NAME`] to a `T` kind of resource. If the finalizer
/// already exists, this action has no effect.
///
/// Note: Does not check for resource's existence for simplicity.
pub async fn add<T: Clone + Resource + Serialize + DeserializeOwned + Debug>(
    client: Client,
    name: &str,
    namespace: &str,
) -> Result<T, Error>
where
    <T as Resource>::DynamicType: Default,
    T: Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<T> = Api::namespaced(client, namespace);
    let finalizer: Value = json!({
        "metadata": {
            "finalizers": [FINALIZER_NAME]
        }
    });
    let patch: Patch<&Value> = Patch::Merge(&finalizer);
    Ok(api.patch(name, &Default::default(), &patch).await?)
}

/// Removes all finalizers from a `T` kind of resource. If there are no
/// finalizers already, this action has no effect.
///
/// Note: Does not check for resource's existence for simplicity.
pub async fn delete<T: Clone + Resource + Serialize + DeserializeOwned + Debug>(
    client: Client,
    name: &str,
    namespace: &str,
) -> Result<T, Error>
where
    <T as Resource>::DynamicType: Default,
    T: Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<T> = Api::namespaced(client, namespace);
    let finalizer: Value = json!({
        "metadata": {
            "finalizers": null
        }
    });
    let patch: Patch<&Value> = Patch::Merge(&finalizer);
    Ok(api.patch(name, &Default::default(), &patch).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_finalizer_when_absent() {
        assert!(needs_finalizer(&[]));
        assert!(needs_finalizer(&["other.io/thing".to_owned()]));
    }

    #[test]
    fn does_not_need_finalizer_when_present() {
        assert!(!needs_finalizer(&[FINALIZER_NAME.to_owned()]));
    }
}
