use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

/// Prometheus metrics for the `CredentialsRequest` controller.
pub struct ControllerMetrics {
    /// Number of reconciliations, labeled by the lifecycle state handled.
    pub reconcile_counter: CounterVec,

    /// Number of terminal outcomes, labeled by result (ok/transient/ownership_conflict).
    pub outcome_counter: CounterVec,

    /// Latency of a full reconcile pass.
    pub reconcile_histogram: HistogramVec,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        let pre = format!("{}_credentialsrequest", prefix());
        let reconcile_counter = register_counter_vec!(
            &format!("{}_reconcile_total", pre),
            "Number of CredentialsRequest reconciliations by lifecycle state.",
            &["name", "namespace", "state"]
        )
        .unwrap();
        let outcome_counter = register_counter_vec!(
            &format!("{}_outcome_total", pre),
            "Number of CredentialsRequest reconcile outcomes.",
            &["name", "namespace", "outcome"]
        )
        .unwrap();
        let reconcile_histogram = register_histogram_vec!(
            &format!("{}_reconcile_duration_seconds", pre),
            "Latency of a CredentialsRequest reconcile pass.",
            &["name", "namespace", "state"]
        )
        .unwrap();
        ControllerMetrics {
            reconcile_counter,
            outcome_counter,
            reconcile_histogram,
        }
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the metrics prefix, overridable with the `METRICS_PREFIX`
/// environment variable.
pub fn prefix() -> String {
    std::env::var("METRICS_PREFIX").unwrap_or_else(|_| "credminter".to_string())
}
