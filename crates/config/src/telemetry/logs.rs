use serde::Deserialize;

use super::ExportersConfig;

/// Logs-specific configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LogsConfig {
    /// Logs-specific exporter overrides, falling back to the global ones.
    exporters: Option<ExportersConfig>,
}

impl LogsConfig {
    /// Logs-specific exporter overrides, if any.
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}
