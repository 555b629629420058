//! [`SdkContext`] – process-wide logging and tracing setup.
//!
//! Create one context before the first sensor source and keep it alive until
//! the last one is closed; dropping it (or calling [`SdkContext::deinit`])
//! flushes and shuts down the span exporter.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set, spans are exported over OTLP/HTTP. |
//! | `RUST_LOG` | Log filter; overrides the requested [`LogSeverity`]. |
//!
//! # Example
//!
//! ```rust,no_run
//! use rigport_core::context::{LogFormat, LogSeverity, SdkContext, SdkOptions};
//!
//! let options = SdkOptions {
//!     severity: LogSeverity::Debug,
//!     format: LogFormat::Json,
//!     ..SdkOptions::default()
//! };
//! let ctx = SdkContext::init(options).expect("logging already initialised");
//! // ... create, open, query, close sources ...
//! ctx.deinit();
//! ```

use std::fmt;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum severity of emitted log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogSeverity {
    /// The equivalent `EnvFilter` directive.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogSeverity::Trace => "trace",
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warn",
            LogSeverity::Error => "error",
        }
    }

    /// One step more verbose per count, starting from `self`.
    pub fn raised_by(self, steps: u8) -> Self {
        const ORDER: [LogSeverity; 5] = [
            LogSeverity::Error,
            LogSeverity::Warning,
            LogSeverity::Info,
            LogSeverity::Debug,
            LogSeverity::Trace,
        ];
        let current = ORDER.iter().position(|&s| s == self).unwrap_or(2);
        ORDER[(current + usize::from(steps)).min(ORDER.len() - 1)]
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkOptions {
    /// `service.name` attached to exported spans.
    pub service_name: String,
    pub severity: LogSeverity,
    pub format: LogFormat,
}

impl Default for SdkOptions {
    fn default() -> Self {
        Self {
            service_name: "rigport".to_string(),
            severity: LogSeverity::default(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("logging has already been initialised in this process")]
    AlreadyInitialised,
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the global `tracing` subscriber installation and the optional OTel
/// [`SdkTracerProvider`].
#[derive(Debug)]
pub struct SdkContext {
    provider: Option<SdkTracerProvider>,
}

impl SdkContext {
    /// Install the global subscriber.
    ///
    /// # Errors
    ///
    /// [`ContextError::AlreadyInitialised`] when a global subscriber is
    /// already set, whether by an earlier context or by someone else.
    pub fn init(options: SdkOptions) -> Result<Self, ContextError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(options.severity.as_filter()));
        let json = options.format == LogFormat::Json;
        let provider = build_provider(&options.service_name);

        let installed = if let Some(ref p) = provider {
            let tracer = p.tracer("rigport");
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            if json {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(otel_layer)
                    .with(tracing_subscriber::fmt::layer().json())
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(otel_layer)
                    .with(tracing_subscriber::fmt::layer().compact())
                    .try_init()
            }
        } else if json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init()
        };

        let context = Self { provider };
        match installed {
            Ok(()) => Ok(context),
            // Dropping `context` shuts down the unused provider.
            Err(_) => Err(ContextError::AlreadyInitialised),
        }
    }

    /// `true` when spans are being exported over OTLP.
    pub fn exporting(&self) -> bool {
        self.provider.is_some()
    }

    /// Flush and shut down the exporter.  Equivalent to dropping the context.
    pub fn deinit(self) {}
}

impl Drop for SdkContext {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[rigport] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Build an [`SdkTracerProvider`] when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[rigport] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Simple (synchronous) exporter: there is no async runtime to host a
    // batch processor.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_provider_returns_none_without_endpoint() {
        // SAFETY: no other test in this crate reads this env-var.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        assert!(build_provider("test-service").is_none());
    }

    #[test]
    fn second_init_is_rejected() {
        // SAFETY: see above.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        // Whichever call wins the race to install the global subscriber, a
        // later one must fail.
        let first = SdkContext::init(SdkOptions::default());
        let second = SdkContext::init(SdkOptions::default());
        assert!(matches!(second, Err(ContextError::AlreadyInitialised)));
        if let Ok(ctx) = first {
            assert!(!ctx.exporting());
            ctx.deinit();
        }
    }

    #[test]
    fn context_without_provider_drops_cleanly() {
        drop(SdkContext { provider: None });
    }

    #[test]
    fn severity_maps_to_filter_directives() {
        assert_eq!(LogSeverity::Warning.as_filter(), "warn");
        assert_eq!(LogSeverity::default().to_string(), "info");
        assert_eq!(LogSeverity::Info.raised_by(1), LogSeverity::Debug);
        assert_eq!(LogSeverity::Info.raised_by(9), LogSeverity::Trace);
        assert_eq!(LogSeverity::Error.raised_by(0), LogSeverity::Error);
    }

    #[test]
    fn severity_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: LogSeverity,
        }
        let w: Wrapper = toml::from_str("level = \"warning\"").unwrap();
        assert_eq!(w.level, LogSeverity::Warning);
    }
}
