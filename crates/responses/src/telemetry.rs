//! Telemetry Hooks: a call-site wrapper around every upstream provider call.
//!
//! HTTP-level tracing is already handled by `meridian-server`'s tracing
//! layer; this module only instruments the gen-ai operation itself —
//! span, duration histogram, and token-usage histogram — mirroring the
//! `{operation=chat, system=<provider>}` shape from the OpenTelemetry GenAI
//! semantic conventions. Telemetry failures are logged and never fail the
//! request (§4.9).

use std::time::Instant;

use fastrace::Span;
use telemetry::attributes::{
    GEN_AI_OPERATION_NAME, GEN_AI_PROVIDER_NAME, GEN_AI_REQUEST_MODEL, GEN_AI_RESPONSE_FINISH_REASONS,
    GEN_AI_RESPONSE_MODEL, GEN_AI_TOKEN_TYPE,
};
use telemetry::metrics::{
    GEN_AI_CLIENT_INPUT_TOKEN_USAGE, GEN_AI_CLIENT_OPERATION_DURATION, GEN_AI_CLIENT_OUTPUT_TOKEN_USAGE, meter,
};

use crate::request::RequestContext;

/// Low-cardinality dimensions attached to both the span and the metrics.
pub(crate) struct CallLabels<'a> {
    pub provider: &'a str,
    pub request_model: &'a str,
    pub server_address: &'a str,
}

/// Opens a span around one upstream call and records duration/token-usage
/// metrics when dropped. Construct with [`start`], fill in `response_model`
/// and `usage` once the upstream reply is decoded, then let it drop (or call
/// [`Recorder::finish`] explicitly).
pub(crate) struct Recorder {
    start: Instant,
    span: Span,
    provider: String,
    request_model: String,
    server_address: String,
    response_model: Option<String>,
    input_tokens: u64,
    output_tokens: u64,
    finish_reasons: Vec<String>,
    error_type: Option<String>,
}

pub(crate) fn start(context: &RequestContext, labels: &CallLabels<'_>) -> Recorder {
    let span = context.new_span("gen_ai.chat");
    span.add_property(|| (GEN_AI_OPERATION_NAME, "chat".to_string()));
    span.add_property(|| (GEN_AI_PROVIDER_NAME, labels.provider.to_string()));
    span.add_property(|| (GEN_AI_REQUEST_MODEL, labels.request_model.to_string()));
    span.add_property(|| ("server.address", labels.server_address.to_string()));

    Recorder {
        start: Instant::now(),
        span,
        provider: labels.provider.to_string(),
        request_model: labels.request_model.to_string(),
        server_address: labels.server_address.to_string(),
        response_model: None,
        input_tokens: 0,
        output_tokens: 0,
        finish_reasons: Vec::new(),
        error_type: None,
    }
}

impl Recorder {
    pub fn record_usage(&mut self, input_tokens: u32, output_tokens: u32) {
        self.input_tokens += input_tokens as u64;
        self.output_tokens += output_tokens as u64;
    }

    pub fn record_response_model(&mut self, model: &str) {
        self.response_model = Some(model.to_string());
        self.span.add_property(|| (GEN_AI_RESPONSE_MODEL, model.to_string()));
    }

    pub fn record_finish_reason(&mut self, reason: &str) {
        self.finish_reasons.push(reason.to_string());
    }

    pub fn record_error(&mut self, error_type: &str) {
        self.error_type = Some(error_type.to_string());
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if !self.finish_reasons.is_empty() {
            self.span.add_property(|| (GEN_AI_RESPONSE_FINISH_REASONS, self.finish_reasons.join(",")));
        }
        if let Some(error_type) = &self.error_type {
            self.span.add_property(|| ("error.type", error_type.clone()));
        }

        let duration_secs = self.start.elapsed().as_secs_f64();
        let meter = meter();

        let mut attributes = vec![
            opentelemetry::KeyValue::new(GEN_AI_OPERATION_NAME, "chat"),
            opentelemetry::KeyValue::new(GEN_AI_PROVIDER_NAME, self.provider.clone()),
            opentelemetry::KeyValue::new(GEN_AI_REQUEST_MODEL, self.request_model.clone()),
            opentelemetry::KeyValue::new("server.address", self.server_address.clone()),
        ];
        if let Some(error_type) = &self.error_type {
            attributes.push(opentelemetry::KeyValue::new("error.type", error_type.clone()));
        }

        let duration_histogram = meter.f64_histogram(GEN_AI_CLIENT_OPERATION_DURATION).build();
        duration_histogram.record(duration_secs, &attributes);

        if self.input_tokens > 0 {
            let mut input_attributes = attributes.clone();
            input_attributes.push(opentelemetry::KeyValue::new(GEN_AI_TOKEN_TYPE, "input"));
            meter
                .u64_histogram(GEN_AI_CLIENT_INPUT_TOKEN_USAGE)
                .build()
                .record(self.input_tokens, &input_attributes);
        }
        if self.output_tokens > 0 {
            let mut output_attributes = attributes;
            output_attributes.push(opentelemetry::KeyValue::new(GEN_AI_TOKEN_TYPE, "output"));
            meter
                .u64_histogram(GEN_AI_CLIENT_OUTPUT_TOKEN_USAGE)
                .build()
                .record(self.output_tokens, &output_attributes);
        }
    }
}
