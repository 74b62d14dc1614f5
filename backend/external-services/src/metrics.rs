use error_stack::ResultExt;
use lazy_static::lazy_static;
use prometheus::{
    self, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

// Define latency buckets for histograms
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

lazy_static! {
    pub static ref EXTERNAL_SERVICE_API_CALLS_LATENCY: HistogramVec = register_histogram_vec!(
        "BIDV_EXTERNAL_SERVICE_API_CALLS_LATENCY_SECONDS",
        "Latency of gateway API calls",
        &["flow", "method"],
        LATENCY_BUCKETS.to_vec()
    )
    .unwrap();

    pub static ref EXTERNAL_SERVICE_TOTAL_API_CALLS: IntCounterVec = register_int_counter_vec!(
        "BIDV_EXTERNAL_SERVICE_TOTAL_API_CALLS",
        "Total number of gateway API calls",
        &["flow", "method"]
    )
    .unwrap();

    pub static ref EXTERNAL_SERVICE_API_CALLS_ERRORS: IntCounterVec = register_int_counter_vec!(
        "BIDV_EXTERNAL_SERVICE_API_CALLS_ERRORS",
        "Total number of errors in gateway API calls",
        &["flow", "method", "error"]
    )
    .unwrap();
}

/// Renders every registered metric in the prometheus text format.
pub fn metrics_handler() -> error_stack::Result<String, MetricsError> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .change_context(MetricsError::EncodingError)?;
    String::from_utf8(buffer).change_context(MetricsError::Utf8Error)
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Error encoding metrics")]
    EncodingError,
    #[error("Error converting metrics to utf8")]
    Utf8Error,
}
