//! Meridian configuration structures, mapping `meridian.toml`.

#![deny(missing_docs)]

mod error;
mod http_types;
mod loader;
mod responses;
mod server;
mod store;
mod telemetry;
mod vector;

use std::path::Path;

pub use error::Error;
pub use http_types::{HeaderName, HeaderValue};
pub use responses::{HeaderRule, ProviderConfig, ResponsesConfig};
pub use server::{HealthConfig, ServerConfig, TlsServerConfig};
pub use store::{StoreBackend, StoreConfig};
pub use telemetry::OtlpProtocol;
pub use telemetry::exporters::{
    ExportersConfig, GrpcHeaders, HttpHeaders, OtlpExporterConfig, OtlpGrpcConfig, OtlpHttpConfig,
};
pub use telemetry::tracing::{PropagationConfig, TracingConfig};
pub use telemetry::{LogsConfig, MetricsConfig, TelemetryConfig};
pub use vector::{ChunkingConfig, VectorConfig};

use serde::Deserialize;

/// Main configuration structure for the Meridian gateway.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    pub server: ServerConfig,
    /// Responses API and upstream provider configuration.
    pub responses: ResponsesConfig,
    /// Response Store configuration.
    pub store: StoreConfig,
    /// Vector Search Tool configuration.
    pub vector: VectorConfig,
    /// Telemetry configuration settings.
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates that the configuration has at least one usable provider.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate_has_providers(self)
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config, @r#"
        Config {
            server: ServerConfig {
                listen_address: None,
                tls: None,
                health: HealthConfig {
                    enabled: true,
                    listen: None,
                    path: "/health",
                },
            },
            responses: ResponsesConfig {
                max_tool_calls: 10,
                max_streaming_timeout_ms: 60000,
                providers: {},
            },
            store: StoreConfig {
                backend: Memory,
                max_chain_depth: 128,
            },
            vector: VectorConfig {
                embedding_url: Url {
                    scheme: "https",
                    cannot_be_a_base: false,
                    username: "",
                    password: None,
                    host: Some(
                        Domain(
                            "api.openai.com",
                        ),
                    ),
                    port: None,
                    path: "/v1/embeddings",
                    query: None,
                    fragment: None,
                },
                embedding_api_key: None,
                embedding_model: "text-embedding-3-small",
                index_path: "./meridian-data/vector-index",
                chunking: ChunkingConfig {
                    max_chunk_size_tokens: 1000,
                    chunk_overlap_tokens: 200,
                },
            },
            telemetry: TelemetryConfig {
                service_name: None,
                resource_attributes: {},
                exporters: ExportersConfig {
                    otlp: OtlpExporterConfig {
                        enabled: false,
                        endpoint: Url {
                            scheme: "http",
                            cannot_be_a_base: false,
                            username: "",
                            password: None,
                            host: Some(
                                Domain(
                                    "localhost",
                                ),
                            ),
                            port: Some(
                                4317,
                            ),
                            path: "/",
                            query: None,
                            fragment: None,
                        },
                        protocol: Grpc,
                        timeout: 60s,
                        batch_export: BatchExportConfig {
                            scheduled_delay: 5s,
                            max_queue_size: 2048,
                            max_export_batch_size: 512,
                            max_concurrent_exports: 1,
                        },
                        grpc: None,
                        http: None,
                    },
                },
                tracing: TracingConfig {
                    sampling: 0.15,
                    parent_based_sampler: false,
                    collect: CollectConfig {
                        max_events_per_span: 128,
                        max_attributes_per_span: 128,
                        max_links_per_span: 128,
                        max_attributes_per_event: 128,
                        max_attributes_per_link: 128,
                    },
                    propagation: PropagationConfig {
                        trace_context: false,
                        aws_xray: false,
                    },
                    exporters: None,
                },
                metrics: MetricsConfig {
                    exporters: None,
                },
                logs: LogsConfig {
                    exporters: None,
                },
            },
        }
        "#);
    }
}
