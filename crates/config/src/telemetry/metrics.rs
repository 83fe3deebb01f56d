use serde::Deserialize;

use super::ExportersConfig;

/// Metrics-specific configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Metrics-specific exporter overrides, falling back to the global ones.
    exporters: Option<ExportersConfig>,
}

impl MetricsConfig {
    /// Metrics-specific exporter overrides, if any.
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}
