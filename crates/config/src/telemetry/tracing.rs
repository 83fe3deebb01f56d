use serde::Deserialize;

use super::ExportersConfig;

/// Tracing-specific configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConfig {
    /// Ratio of requests sampled, between 0.0 and 1.0.
    #[serde(default = "default_sampling")]
    pub sampling: f64,
    /// Use a parent-based sampler instead of the plain ratio sampler.
    pub parent_based_sampler: bool,
    /// Span/event/link collection limits passed to the tracer provider.
    #[serde(default)]
    pub collect: CollectConfig,
    /// Context propagation formats accepted on inbound requests.
    #[serde(default)]
    pub propagation: PropagationConfig,
    /// Tracing-specific exporter overrides, falling back to the global ones.
    exporters: Option<ExportersConfig>,
}

impl TracingConfig {
    /// Tracing-specific exporter overrides, if any.
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}

fn default_sampling() -> f64 {
    0.15
}

/// Limits on how much data a single span/trace may carry before being dropped.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectConfig {
    /// Maximum events recorded per span.
    pub max_events_per_span: u32,
    /// Maximum attributes recorded per span.
    pub max_attributes_per_span: u32,
    /// Maximum links recorded per span.
    pub max_links_per_span: u32,
    /// Maximum attributes recorded per event.
    pub max_attributes_per_event: u32,
    /// Maximum attributes recorded per link.
    pub max_attributes_per_link: u32,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            max_events_per_span: 128,
            max_attributes_per_span: 128,
            max_links_per_span: 128,
            max_attributes_per_event: 128,
            max_attributes_per_link: 128,
        }
    }
}

/// Which trace context propagation formats to accept.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PropagationConfig {
    /// W3C traceparent/tracestate headers.
    pub trace_context: bool,
    /// AWS X-Ray propagation header.
    pub aws_xray: bool,
}
