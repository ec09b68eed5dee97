use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};

pub static STATS_FETCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "securelog_stats_fetches_total",
        "Dashboard statistics fetches by outcome",
        &["outcome"]
    )
    .unwrap()
});

pub static STATS_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "securelog_stats_latency_seconds",
        "Time to join the dashboard count queries",
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap()
});

pub static SIGN_OUTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "securelog_sign_outs_total",
        "Sign-out attempts by outcome",
        &["outcome"]
    )
    .unwrap()
});

pub static REDIRECTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "securelog_redirects_total",
        "Client redirects issued by views",
        &["route"]
    )
    .unwrap()
});

/// Render the default registry in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
