//! Observability - Metrics and the logging event subscriber

mod metrics;
mod subscriber;

pub use self::metrics::{record_chain_run, record_llm_request, LlmRequestMetricParams};
pub use subscriber::ObservabilitySubscriber;
