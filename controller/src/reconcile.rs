//! Reconciler (C5): drives the `CredentialsRequest` state machine once per
//! delivery from the host framework. Pure function of observed state; no
//! in-memory cross-request state is kept here or anywhere else in the
//! controller.

use crate::actuator::Actuator;
use crate::store::RequestStore;
use crate::util::{Error, MANAGER_NAME, OWNERSHIP_CONFLICT_REQUEUE_INTERVAL, PROBE_INTERVAL};
use chrono::Utc;
use credminter_types::{CredentialsRequest, CredentialsRequestStatus};
use futures::stream::StreamExt;
use kube::runtime::{controller::Action, Controller};
use kube::{api::ListParams, Api, Client, Resource, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Where a `CredentialsRequest` sits in its lifecycle, per the state table.
/// `Absent` only arises when a caller explicitly re-reads the object (e.g.
/// to check it still exists); the framework never delivers a reconcile for
/// a key it no longer has an object for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Absent,
    NeedsFinalizer,
    Active,
    Terminating,
    Gone,
}

fn determine_state(request: Option<&CredentialsRequest>) -> State {
    let request = match request {
        None => return State::Absent,
        Some(r) => r,
    };
    let deleting = request.meta().deletion_timestamp.is_some();
    let has_finalizer = !crate::util::finalizer::needs_finalizer(&request.finalizers());
    match (deleting, has_finalizer) {
        (false, false) => State::NeedsFinalizer,
        (false, true) => State::Active,
        (true, true) => State::Terminating,
        (true, false) => State::Gone,
    }
}

pub struct ContextData {
    store: Arc<dyn RequestStore>,
    actuator: Arc<dyn Actuator>,
    #[cfg(feature = "metrics")]
    metrics: crate::util::metrics::ControllerMetrics,
}

impl ContextData {
    pub fn new(store: Arc<dyn RequestStore>, actuator: Arc<dyn Actuator>) -> Self {
        Self {
            store,
            actuator,
            #[cfg(feature = "metrics")]
            metrics: crate::util::metrics::ControllerMetrics::new(),
        }
    }
}

impl State {
    fn label(&self) -> &'static str {
        match self {
            State::Absent => "absent",
            State::NeedsFinalizer => "needs_finalizer",
            State::Active => "active",
            State::Terminating => "terminating",
            State::Gone => "gone",
        }
    }
}

/// Entrypoint for the `CredentialsRequest` controller.
pub async fn run(client: Client, context: Arc<ContextData>) -> Result<(), Error> {
    info!("starting CredentialsRequest controller");
    let api: Api<CredentialsRequest> = Api::all(client);
    Controller::new(api, ListParams::default())
        .run(reconcile, on_error, context)
        .for_each(|result| async move {
            if let Err(e) = result {
                warn!(error = %e, "reconcile stream reported an error");
            }
        })
        .await;
    Ok(())
}

/// Reconciliation function for the `CredentialsRequest` resource.
async fn reconcile(
    instance: Arc<CredentialsRequest>,
    context: Arc<ContextData>,
) -> Result<Action, Error> {
    let name = instance.name_any();
    let namespace = instance.namespace().ok_or_else(|| {
        Error::UserInput("CredentialsRequest must be namespaced".to_owned())
    })?;

    let state = determine_state(Some(&instance));

    #[cfg(feature = "metrics")]
    context
        .metrics
        .reconcile_counter
        .with_label_values(&[&name, &namespace, state.label()])
        .inc();
    #[cfg(feature = "metrics")]
    let timer = context
        .metrics
        .reconcile_histogram
        .with_label_values(&[&name, &namespace, state.label()])
        .start_timer();

    let result = match state {
        State::Absent => Ok(Action::await_change()),

        State::NeedsFinalizer => {
            info!(%namespace, %name, "adding finalizer");
            context.store.add_finalizer(&instance).await?;
            // The framework re-delivers once the finalizer write lands;
            // Update is deliberately deferred to that delivery.
            Ok(Action::requeue(Duration::ZERO))
        }

        State::Active => reconcile_active(&instance, &context).await,

        State::Terminating => {
            info!(%namespace, %name, "deleting cloud principal");
            context.actuator.delete(&instance).await?;
            context.store.remove_finalizer(&instance).await?;
            Ok(Action::await_change())
        }

        State::Gone => Ok(Action::await_change()),
    };

    #[cfg(feature = "metrics")]
    {
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_terminal() => "ownership_conflict",
            Err(_) => "transient",
        };
        context
            .metrics
            .outcome_counter
            .with_label_values(&[&name, &namespace, outcome])
            .inc();
        timer.observe_duration();
    }

    result
}

async fn reconcile_active(
    instance: &CredentialsRequest,
    context: &ContextData,
) -> Result<Action, Error> {
    let exists = context.actuator.exists(instance).await?;
    let converge_result = if exists {
        context.actuator.update(context.store.as_ref(), instance).await
    } else {
        context.actuator.create(context.store.as_ref(), instance).await
    };

    // Status write discipline: re-read before the status write, since the
    // convergence step above may have raced a concurrent spec edit. On a
    // write conflict, retry without surfacing an error.
    let fresh = context
        .store
        .get_request(
            &instance.namespace().unwrap_or_default(),
            &instance.name_any(),
        )
        .await?
        .unwrap_or_else(|| instance.clone());

    let generation = fresh.meta().generation.unwrap_or_default();

    match converge_result {
        Ok(provider_status) => {
            let updated = context
                .store
                .update_status(
                    &fresh,
                    Box::new(move |status: &mut CredentialsRequestStatus| {
                        status.provisioned = true;
                        status.last_sync_generation = generation;
                        status.last_sync_timestamp = Some(Utc::now().to_rfc3339());
                        status.provider_status = Some(provider_status);
                    }),
                )
                .await?;
            if updated.is_none() {
                return Ok(Action::requeue(Duration::ZERO));
            }
            Ok(Action::requeue(PROBE_INTERVAL))
        }
        Err(e) => {
            if e.is_terminal() {
                warn!(error = %e, "terminal error, marking unprovisioned");
            }
            let _ = context
                .store
                .update_status(
                    &fresh,
                    Box::new(|status: &mut CredentialsRequestStatus| {
                        status.provisioned = false;
                    }),
                )
                .await;
            Err(e)
        }
    }
}

/// Called by the framework whenever `reconcile` returns an error. Logs and
/// requeues with backoff; `OwnershipConflict` is left for operator
/// intervention, requeued far out rather than hammered with retries.
fn on_error(instance: Arc<CredentialsRequest>, error: &Error, _context: Arc<ContextData>) -> Action {
    error!(
        name = %instance.name_any(),
        namespace = ?instance.namespace(),
        error = %error,
        "reconcile failed"
    );
    if error.is_terminal() {
        Action::requeue(OWNERSHIP_CONFLICT_REQUEUE_INTERVAL)
    } else {
        Action::requeue(Duration::from_secs(30))
    }
}

/// Field manager name used for status patches, re-exported here so the
/// `main` binary can share it with the metrics and health endpoints.
pub const FIELD_MANAGER: &str = MANAGER_NAME;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::finalizer::FINALIZER_NAME;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::core::ObjectMeta;

    fn bare_request() -> CredentialsRequest {
        CredentialsRequest {
            metadata: ObjectMeta::default(),
            spec: Default::default(),
            status: None,
        }
    }

    #[test]
    fn absent_when_no_object() {
        assert_eq!(determine_state(None), State::Absent);
    }

    #[test]
    fn needs_finalizer_when_not_deleting_and_no_finalizer() {
        let request = bare_request();
        assert_eq!(determine_state(Some(&request)), State::NeedsFinalizer);
    }

    #[test]
    fn active_when_not_deleting_and_finalizer_present() {
        let mut request = bare_request();
        request.meta_mut().finalizers = Some(vec![FINALIZER_NAME.to_owned()]);
        assert_eq!(determine_state(Some(&request)), State::Active);
    }

    #[test]
    fn terminating_when_deleting_and_finalizer_present() {
        let mut request = bare_request();
        request.meta_mut().finalizers = Some(vec![FINALIZER_NAME.to_owned()]);
        request.meta_mut().deletion_timestamp = Some(Time(Utc::now()));
        assert_eq!(determine_state(Some(&request)), State::Terminating);
    }

    #[test]
    fn gone_when_deleting_and_no_finalizer() {
        let mut request = bare_request();
        request.meta_mut().deletion_timestamp = Some(Time(Utc::now()));
        assert_eq!(determine_state(Some(&request)), State::Gone);
    }
}
