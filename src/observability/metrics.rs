use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub assignment_latency_seconds: HistogramVec,
    pub transitions_total: IntCounterVec,
    pub compensations_total: IntCounterVec,
    pub store_retries_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub active_trackers: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Total assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let assignment_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of assignment transactions in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("status_transitions_total", "Committed status transitions"),
            &["entity", "to"],
        )
        .expect("valid status_transitions_total metric");

        let compensations_total = IntCounterVec::new(
            Opts::new(
                "compensations_total",
                "Rollbacks of a first write after the second write failed",
            ),
            &["operation", "outcome"],
        )
        .expect("valid compensations_total metric");

        let store_retries_total = IntCounterVec::new(
            Opts::new("store_retries_total", "Retries of transient store failures"),
            &["operation"],
        )
        .expect("valid store_retries_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Notification deliveries by outcome"),
            &["outcome"],
        )
        .expect("valid notifications_total metric");

        let active_trackers = IntGauge::new(
            "active_location_trackers",
            "Location tracking tasks currently running",
        )
        .expect("valid active_location_trackers metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(compensations_total.clone()))
            .expect("register compensations_total");
        registry
            .register(Box::new(store_retries_total.clone()))
            .expect("register store_retries_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(active_trackers.clone()))
            .expect("register active_location_trackers");

        Self {
            registry,
            assignments_total,
            assignment_latency_seconds,
            transitions_total,
            compensations_total,
            store_retries_total,
            notifications_total,
            active_trackers,
        }
    }

    pub fn record_transition(&self, entity: &str, to: impl ToString) {
        self.transitions_total
            .with_label_values(&[entity, &to.to_string()])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
