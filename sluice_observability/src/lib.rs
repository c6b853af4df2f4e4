//! Logging and metrics setup shared by the sluice crates.
//!
//! Library crates only depend on [`meter`] to register their instruments.
//! Binaries call [`init_observability`] once at startup.
use std::borrow::Cow;
use std::time::Duration;

use opentelemetry::{InstrumentationScope, global};
use opentelemetry_otlp::{ExporterBuildError, MetricExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider};
use snafu::{ResultExt, Snafu};
use tracing::Subscriber;
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::{prelude::*, registry::LookupSpan};

pub use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};

const OTEL_SDK_DISABLED: &str = "OTEL_SDK_DISABLED";
const RUST_LOG_FORMAT: &str = "RUST_LOG_FORMAT";
const EXPORT_INTERVAL: Duration = Duration::from_secs(10);

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum ObservabilityError {
    #[snafu(display("Failed to build metrics exporter"))]
    Exporter { source: ExporterBuildError },
}

/// Returns the meter with the given name from the global meter provider.
///
/// Instruments created before [`init_observability`] runs are no-ops.
pub fn meter(name: &'static str) -> Meter {
    global::meter(name)
}

pub fn init_observability(
    package_name: impl Into<Cow<'static, str>>,
    package_version: impl Into<Cow<'static, str>>,
) -> Result<(), ObservabilityError> {
    // Exports are opt-in: OTEL_SDK_DISABLED must be explicitly "false".
    let sdk_disabled = std::env::var(OTEL_SDK_DISABLED)
        .map(|v| v != "false")
        .unwrap_or(true);

    let meter_provider = meter_provider(package_name, package_version, !sdk_disabled)?;

    global::set_meter_provider(meter_provider.clone());

    let layers = vec![stdout(), otel_metrics(meter_provider)];

    tracing_subscriber::registry().with(layers).init();

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO"))
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let json_fmt = std::env::var(RUST_LOG_FORMAT)
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(env_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .compact()
            .with_filter(env_filter())
            .boxed()
    }
}

fn otel_metrics<S>(meter_provider: SdkMeterProvider) -> BoxedLayer<S>
where
    S: Subscriber + Send + Sync,
    for<'a> S: LookupSpan<'a>,
{
    // Events with `monotonic_counter.*` and `histogram.*` fields become
    // otel instruments.
    MetricsLayer::new(meter_provider)
        .with_filter(env_filter())
        .boxed()
}

fn meter_provider(
    package_name: impl Into<Cow<'static, str>>,
    version: impl Into<Cow<'static, str>>,
    sdk_enabled: bool,
) -> Result<SdkMeterProvider, ObservabilityError> {
    let scope = InstrumentationScope::builder(package_name.into())
        .with_version(version.into())
        .build();

    let resource = Resource::builder()
        .with_service_name(scope.name().to_string())
        .build();

    // Without a reader, instruments record nothing.
    let mut builder = MeterProviderBuilder::default().with_resource(resource);

    if sdk_enabled {
        let exporter = MetricExporter::builder()
            .with_tonic()
            .build()
            .context(ExporterSnafu {})?;

        let reader = PeriodicReader::builder(exporter)
            .with_interval(EXPORT_INTERVAL)
            .build();

        builder = builder.with_reader(reader);
    }

    Ok(builder.build())
}
