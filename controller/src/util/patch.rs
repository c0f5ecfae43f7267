use super::{Error, MANAGER_NAME};
use credminter_types::{CredentialsRequest, CredentialsRequestStatus};
use kube::{
    api::{Patch, PatchParams},
    Api, Client, Resource,
};

/// Patches a `CredentialsRequest`'s status subresource with the result of
/// `f`. Returns `Ok(None)` on an optimistic-concurrency conflict (HTTP 409)
/// rather than an error — per the status write discipline in the design,
/// a conflict just means the caller should requeue and re-read.
pub async fn patch_status(
    client: Client,
    instance: &CredentialsRequest,
    f: impl FnOnce(&mut CredentialsRequestStatus),
) -> Result<Option<CredentialsRequest>, Error> {
    let patch = Patch::Json::<CredentialsRequest>({
        let mut modified = instance.clone();
        let status = modified.status.get_or_insert_with(Default::default);
        f(status);
        json_patch::diff(
            &serde_json::to_value(instance).map_err(|e| Error::Codec(e.to_string()))?,
            &serde_json::to_value(&modified).map_err(|e| Error::Codec(e.to_string()))?,
        )
    });
    let name = instance.meta().name.as_deref().unwrap();
    let namespace = instance.meta().namespace.as_deref().unwrap();
    let api: Api<CredentialsRequest> = Api::namespaced(client, namespace);
    match api
        .patch_status(name, &PatchParams::apply(MANAGER_NAME), &patch)
        .await
    {
        Ok(updated) => Ok(Some(updated)),
        Err(kube::Error::Api(e)) if e.code == 409 => Ok(None),
        Err(e) => Err(e.into()),
    }
}
