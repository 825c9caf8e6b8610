use lazy_static::lazy_static;
use prometheus::{
    Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter = register_counter!(
        "cna_requests_total",
        "Total number of report generation requests"
    )
    .unwrap();
    pub static ref ADMISSIONS: Counter =
        register_counter!("cna_admissions_total", "Report generation requests admitted").unwrap();
    pub static ref DENIALS: Counter = register_counter!(
        "cna_denials_total",
        "Report generation requests denied by quota"
    )
    .unwrap();
    pub static ref GENERATION_FAILURES: Counter =
        register_counter!("cna_generation_failures_total", "Failed text generation calls").unwrap();
    pub static ref GENERATION_LATENCY: Histogram = register_histogram!(
        "cna_generation_latency_seconds",
        "Text generation latency in seconds"
    )
    .unwrap();
    pub static ref ACTIVE_WINDOWS: Gauge = register_gauge!(
        "cna_active_windows",
        "Identities currently holding an admission window"
    )
    .unwrap();
}
