use clap::Parser;
use credminter_controller::actuator::aws::AwsActuator;
use credminter_controller::iam::aws::AwsIamClient;
use credminter_controller::reconcile::{self, ContextData};
use credminter_controller::store::KubeRequestStore;
use credminter_controller::util::Error;
use k8s_openapi::api::core::v1::Secret;
use kube::{client::Client, Api};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "metrics")]
use credminter_controller::metrics;

/// Top-level CLI configuration for the binary. Any command line
/// flags should go in here.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Namespace of the platform secret holding bootstrap IAM credentials.
    #[arg(long, env = "BOOTSTRAP_SECRET_NAMESPACE", default_value = "kube-system")]
    bootstrap_secret_namespace: String,

    /// Name of the platform secret holding bootstrap IAM credentials.
    #[arg(long, env = "BOOTSTRAP_SECRET_NAME", default_value = "aws-creds")]
    bootstrap_secret_name: String,

    /// Prometheus metrics server scrape port. Disabled by default.
    #[cfg(feature = "metrics")]
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

/// Reads the well-known bootstrap secret and returns the
/// `(access_key_id, secret_access_key)` pair used to build the IAM client.
/// Read once per reconcile, per the design's bootstrap-credentials contract.
async fn read_bootstrap_credentials(
    client: Client,
    namespace: &str,
    name: &str,
) -> Result<(String, String), Error> {
    let api: Api<Secret> = Api::namespaced(client, namespace);
    let secret = api.get(name).await?;
    let data = secret.data.ok_or_else(|| {
        Error::UserInput(format!("bootstrap secret {namespace}/{name} has no data"))
    })?;
    let field = |key: &str| -> Result<String, Error> {
        data.get(key)
            .and_then(|v| String::from_utf8(v.0.clone()).ok())
            .ok_or_else(|| {
                Error::UserInput(format!(
                    "bootstrap secret {namespace}/{name} missing key {key}"
                ))
            })
    };
    Ok((field("aws_access_key_id")?, field("aws_secret_access_key")?))
}

/// Secondary entrypoint that wires up the controller and runs it to
/// completion (which, barring shutdown, never happens).
async fn run(client: Client) -> Result<(), Error> {
    let cli = Cli::parse();

    #[cfg(feature = "metrics")]
    if let Some(metrics_port) = cli.metrics_port {
        tokio::spawn(metrics::run_server(metrics_port));
    }

    let (access_key_id, secret_access_key) = read_bootstrap_credentials(
        client.clone(),
        &cli.bootstrap_secret_namespace,
        &cli.bootstrap_secret_name,
    )
    .await?;
    let iam = AwsIamClient::from_static_credentials(&access_key_id, &secret_access_key).await;

    let store = Arc::new(KubeRequestStore::new(client.clone()));
    let actuator = Arc::new(AwsActuator::new(iam));
    let context = Arc::new(ContextData::new(store, actuator));

    reconcile::run(client, context).await
}

/// Main entrypoint that sets up the environment before running the secondary entrypoint `run`.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Set the panic hook to exit the process with a non-zero exit code
    // when a panic occurs on any thread. This is desired behavior when
    // running in a container, as the metrics server or controller may
    // panic and we always want to restart the container in that case.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    // Create a kubernetes client using the default configuration.
    // In-cluster, the kubeconfig will be set by the service account.
    let client: Client = Client::try_default()
        .await
        .expect("Expected a valid KUBECONFIG environment variable.");

    if let Err(e) = run(client).await {
        tracing::error!(error = %e, "controller exited with error");
        std::process::exit(1);
    }

    // This is an unreachable branch in practice: the controller's run loop
    // only returns once the watch stream itself terminates.
    panic!("exited prematurely");
}
