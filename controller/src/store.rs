//! Kube Store (C6): abstracts the orchestration-platform reads/writes the
//! reconciler needs, so the reconciler itself is a plain function of
//! `(RequestStore, IamClient)` and can be driven by [`FakeRequestStore`] in
//! tests without a live apiserver.

use crate::util::{finalizer, patch, Error};
use async_trait::async_trait;
use credminter_types::{CredentialsRequest, CredentialsRequestStatus};
use k8s_openapi::api::core::v1::Secret;
use kube::{api::ObjectMeta, Api, Client, Resource, ResourceExt};
use std::collections::HashMap;
use std::sync::Mutex;

/// A status mutation to apply via [`RequestStore::update_status`]. Boxed so
/// the trait stays object-safe (`dyn RequestStore`).
pub type StatusMutator = Box<dyn FnOnce(&mut CredentialsRequestStatus) + Send>;

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get_request(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CredentialsRequest>, Error>;

    async fn add_finalizer(
        &self,
        request: &CredentialsRequest,
    ) -> Result<CredentialsRequest, Error>;

    async fn remove_finalizer(
        &self,
        request: &CredentialsRequest,
    ) -> Result<CredentialsRequest, Error>;

    /// Returns `Ok(None)` on a write conflict — see `util::patch::patch_status`.
    async fn update_status(
        &self,
        request: &CredentialsRequest,
        mutate: StatusMutator,
    ) -> Result<Option<CredentialsRequest>, Error>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    async fn create_secret(&self, secret: Secret) -> Result<Secret, Error>;

    async fn update_secret(&self, secret: Secret) -> Result<Secret, Error>;
}

/// Production [`RequestStore`] backed by a real `kube::Client`.
pub struct KubeRequestStore {
    client: Client,
}

impl KubeRequestStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequestStore for KubeRequestStore {
    async fn get_request(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CredentialsRequest>, Error> {
        let api: Api<CredentialsRequest> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(req) => Ok(Some(req)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn add_finalizer(
        &self,
        request: &CredentialsRequest,
    ) -> Result<CredentialsRequest, Error> {
        let name = request.name_any();
        let namespace = request.namespace().ok_or_else(|| {
            Error::UserInput("CredentialsRequest must be namespaced".to_owned())
        })?;
        Ok(finalizer::add(self.client.clone(), &name, &namespace).await?)
    }

    async fn remove_finalizer(
        &self,
        request: &CredentialsRequest,
    ) -> Result<CredentialsRequest, Error> {
        let name = request.name_any();
        let namespace = request.namespace().ok_or_else(|| {
            Error::UserInput("CredentialsRequest must be namespaced".to_owned())
        })?;
        Ok(finalizer::delete::<CredentialsRequest>(self.client.clone(), &name, &namespace).await?)
    }

    async fn update_status(
        &self,
        request: &CredentialsRequest,
        mutate: StatusMutator,
    ) -> Result<Option<CredentialsRequest>, Error> {
        patch::patch_status(self.client.clone(), request, mutate).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_secret(&self, secret: Secret) -> Result<Secret, Error> {
        let namespace = secret.meta().namespace.clone().ok_or_else(|| {
            Error::UserInput("Secret must be namespaced".to_owned())
        })?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        Ok(api.create(&Default::default(), &secret).await?)
    }

    async fn update_secret(&self, secret: Secret) -> Result<Secret, Error> {
        let namespace = secret.meta().namespace.clone().ok_or_else(|| {
            Error::UserInput("Secret must be namespaced".to_owned())
        })?;
        let name = secret.meta().name.clone().ok_or_else(|| {
            Error::UserInput("Secret must be named".to_owned())
        })?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        Ok(api.replace(&name, &Default::default(), &secret).await?)
    }
}

/// In-memory [`RequestStore`] used by the test suite (§8 scenarios S1–S6).
#[derive(Default)]
pub struct FakeRequestStore {
    requests: Mutex<HashMap<(String, String), CredentialsRequest>>,
    secrets: Mutex<HashMap<(String, String), Secret>>,
}

impl FakeRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(self, request: CredentialsRequest) -> Self {
        let key = (
            request.namespace().unwrap_or_default(),
            request.name_any(),
        );
        self.requests.lock().unwrap().insert(key, request);
        self
    }

    pub fn with_secret(self, secret: Secret) -> Self {
        let key = (
            secret.meta().namespace.clone().unwrap_or_default(),
            secret.meta().name.clone().unwrap_or_default(),
        );
        self.secrets.lock().unwrap().insert(key, secret);
        self
    }

    pub fn get_request_sync(&self, namespace: &str, name: &str) -> Option<CredentialsRequest> {
        self.requests
            .lock()
            .unwrap()
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
    }

    pub fn get_secret_sync(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
    }
}

#[async_trait]
impl RequestStore for FakeRequestStore {
    async fn get_request(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CredentialsRequest>, Error> {
        Ok(self.get_request_sync(namespace, name))
    }

    async fn add_finalizer(
        &self,
        request: &CredentialsRequest,
    ) -> Result<CredentialsRequest, Error> {
        let mut updated = request.clone();
        if finalizer::needs_finalizer(&updated.finalizers()) {
            updated
                .meta_mut()
                .finalizers
                .get_or_insert_with(Vec::new)
                .push(finalizer::FINALIZER_NAME.to_owned());
        }
        let key = (
            updated.namespace().unwrap_or_default(),
            updated.name_any(),
        );
        self.requests.lock().unwrap().insert(key, updated.clone());
        Ok(updated)
    }

    async fn remove_finalizer(
        &self,
        request: &CredentialsRequest,
    ) -> Result<CredentialsRequest, Error> {
        let mut updated = request.clone();
        updated.meta_mut().finalizers = None;
        let key = (
            updated.namespace().unwrap_or_default(),
            updated.name_any(),
        );
        self.requests.lock().unwrap().insert(key, updated.clone());
        Ok(updated)
    }

    async fn update_status(
        &self,
        request: &CredentialsRequest,
        mutate: StatusMutator,
    ) -> Result<Option<CredentialsRequest>, Error> {
        let mut updated = request.clone();
        let status = updated.status.get_or_insert_with(Default::default);
        mutate(status);
        let key = (
            updated.namespace().unwrap_or_default(),
            updated.name_any(),
        );
        self.requests.lock().unwrap().insert(key, updated.clone());
        Ok(Some(updated))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        Ok(self.get_secret_sync(namespace, name))
    }

    async fn create_secret(&self, secret: Secret) -> Result<Secret, Error> {
        let key = (
            secret.meta().namespace.clone().unwrap_or_default(),
            secret.meta().name.clone().unwrap_or_default(),
        );
        self.secrets.lock().unwrap().insert(key, secret.clone());
        Ok(secret)
    }

    async fn update_secret(&self, secret: Secret) -> Result<Secret, Error> {
        let key = (
            secret.meta().namespace.clone().unwrap_or_default(),
            secret.meta().name.clone().unwrap_or_default(),
        );
        self.secrets.lock().unwrap().insert(key, secret.clone());
        Ok(secret)
    }
}

/// Convenience for building a bare [`ObjectMeta`] for a new resource.
pub fn object_meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(namespace.to_owned()),
        name: Some(name.to_owned()),
        ..Default::default()
    }
}
