//! In-memory [`IamClient`] used by the controller's own test suite and
//! available to downstream integration tests. Stands in for the real cloud
//! API the way the source project's own mock package does.

use super::{AccessKey, IamClient, IamError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One call made against a [`MockIamClient`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetUser(String),
    CreateUser(String),
    TagUser(String),
    DeleteUser(String),
    PutUserPolicy(String),
    DeleteUserPolicy(String),
    ListAccessKeys(String),
    CreateAccessKey(String, String),
    DeleteAccessKey(String, String),
}

#[derive(Default)]
struct UserState {
    exists: bool,
    policy: Option<String>,
    tags: Vec<(String, String)>,
    access_keys: Vec<AccessKey>,
}

#[derive(Default)]
struct State {
    users: HashMap<String, UserState>,
    calls: Vec<Call>,
    next_keys: VecDeque<AccessKey>,
}

pub struct MockIamClient {
    state: Mutex<State>,
}

impl Default for MockIamClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIamClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Queues access keys to be handed out, in order, by successive
    /// `create_access_key` calls. Lets tests assert on deterministic IDs
    /// such as `FAKEAWSACCESSKEYID` / `FAKEAWSACCESSKEYID2`.
    pub fn with_access_keys(self, keys: impl IntoIterator<Item = AccessKey>) -> Self {
        self.state.lock().unwrap().next_keys.extend(keys);
        self
    }

    /// Seeds a pre-existing principal with the given set of active key IDs.
    pub fn with_existing_user(self, name: &str, active_key_ids: impl IntoIterator<Item = String>) -> Self {
        let mut state = self.state.lock().unwrap();
        let user = state.users.entry(name.to_owned()).or_default();
        user.exists = true;
        user.access_keys = active_key_ids
            .into_iter()
            .map(|id| AccessKey {
                access_key_id: id,
                secret_access_key: String::new(),
            })
            .collect();
        drop(state);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl IamClient for MockIamClient {
    async fn get_user(&self, name: &str) -> Result<(), IamError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::GetUser(name.to_owned()));
        match state.users.get(name) {
            Some(u) if u.exists => Ok(()),
            _ => Err(IamError::NoSuchEntity),
        }
    }

    async fn create_user(&self, name: &str) -> Result<(), IamError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateUser(name.to_owned()));
        state.users.entry(name.to_owned()).or_default().exists = true;
        Ok(())
    }

    async fn tag_user(&self, name: &str, tags: &[(String, String)]) -> Result<(), IamError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::TagUser(name.to_owned()));
        if let Some(u) = state.users.get_mut(name) {
            u.tags = tags.to_vec();
        }
        Ok(())
    }

    async fn delete_user(&self, name: &str) -> Result<(), IamError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DeleteUser(name.to_owned()));
        match state.users.remove(name) {
            Some(_) => Ok(()),
            None => Err(IamError::NoSuchEntity),
        }
    }

    async fn put_user_policy(
        &self,
        user_name: &str,
        _policy_name: &str,
        policy_document: &str,
    ) -> Result<(), IamError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::PutUserPolicy(user_name.to_owned()));
        match state.users.get_mut(user_name) {
            Some(u) => {
                u.policy = Some(policy_document.to_owned());
                Ok(())
            }
            None => Err(IamError::NoSuchEntity),
        }
    }

    async fn delete_user_policy(&self, user_name: &str, _policy_name: &str) -> Result<(), IamError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DeleteUserPolicy(user_name.to_owned()));
        match state.users.get_mut(user_name) {
            Some(u) => {
                u.policy = None;
                Ok(())
            }
            None => Err(IamError::NoSuchEntity),
        }
    }

    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<String>, IamError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListAccessKeys(user_name.to_owned()));
        match state.users.get(user_name) {
            Some(u) => Ok(u.access_keys.iter().map(|k| k.access_key_id.clone()).collect()),
            None => Err(IamError::NoSuchEntity),
        }
    }

    async fn create_access_key(&self, user_name: &str) -> Result<AccessKey, IamError> {
        let mut state = self.state.lock().unwrap();
        let key = state.next_keys.pop_front().unwrap_or_else(|| {
            let n = state
                .users
                .get(user_name)
                .map(|u| u.access_keys.len())
                .unwrap_or(0)
                + 1;
            AccessKey {
                access_key_id: format!("MOCKACCESSKEYID{n}"),
                secret_access_key: format!("MOCKSECRETACCESSKEY{n}"),
            }
        });
        state
            .calls
            .push(Call::CreateAccessKey(user_name.to_owned(), key.access_key_id.clone()));
        match state.users.get_mut(user_name) {
            Some(u) => {
                u.access_keys.push(key.clone());
                Ok(key)
            }
            None => Err(IamError::NoSuchEntity),
        }
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<(), IamError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::DeleteAccessKey(user_name.to_owned(), access_key_id.to_owned()));
        match state.users.get_mut(user_name) {
            Some(u) => {
                let before = u.access_keys.len();
                u.access_keys.retain(|k| k.access_key_id != access_key_id);
                if u.access_keys.len() == before {
                    Err(IamError::NoSuchEntity)
                } else {
                    Ok(())
                }
            }
            None => Err(IamError::NoSuchEntity),
        }
    }
}
