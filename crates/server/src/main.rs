//! Vocab Audio Server Entry Point

use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use vocab_audio_config::{load_settings, Settings};
use vocab_audio_server::{create_router, init_metrics, AppState};

const RUN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // env vars override config/{env}, which overrides config/default
    let env = std::env::var("VOCAB_AUDIO_ENV").ok();
    let profile = env.as_deref().unwrap_or("default");
    let (config, load_error) = match load_settings(env.as_deref()) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    init_tracing(&config);
    if let Some(e) = load_error {
        tracing::warn!(error = %e, profile, "Configuration rejected; using built-in defaults");
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        profile,
        "vocab-audio starting"
    );

    if config.observability.metrics_enabled && init_metrics().is_some() {
        tracing::info!("Prometheus recorder installed, scrape /metrics");
    }

    let state = AppState::new(config.clone())?;
    tracing::info!(
        ready = state.is_ready(),
        max_concurrent_extraction = config.concurrency.max_concurrent_extraction,
        rate_limit = config.concurrency.rate_limit_max_requests,
        rate_window_ms = config.concurrency.rate_limit_window_ms,
        "Services wired"
    );

    state.spawn_run_sweeper(RUN_SWEEP_INTERVAL);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Accepting connections");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "ctrl_c",
        _ = terminate => "sigterm",
    };
    tracing::info!(signal, "Shutting down; waiting for in-flight requests");
}

fn env_filter(config: &Settings) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "vocab_audio={level},tower_http=debug",
            level = config.observability.log_level
        )
        .into()
    })
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

/// `fmt` layer, JSON when `observability.log_json` is set
fn fmt_layer(config: &Settings) -> BoxedLayer {
    if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    }
}

#[cfg(feature = "telemetry")]
fn init_tracing(config: &Settings) {
    use opentelemetry_otlp::WithExportConfig;

    let Some(endpoint) = config.observability.otlp_endpoint.as_deref() else {
        tracing_subscriber::registry()
            .with(fmt_layer(config))
            .with(env_filter(config))
            .init();
        return;
    };

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                opentelemetry::KeyValue::new("service.name", "vocab-audio"),
                opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio);

    match tracer {
        Ok(tracer) => {
            tracing_subscriber::registry()
                .with(fmt_layer(config))
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .with(env_filter(config))
                .init();
            tracing::info!(endpoint, "Exporting spans over OTLP");
        },
        Err(e) => {
            tracing_subscriber::registry()
                .with(fmt_layer(config))
                .with(env_filter(config))
                .init();
            tracing::warn!(error = %e, endpoint, "OTLP exporter unavailable; logging only");
        },
    }
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(config: &Settings) {
    tracing_subscriber::registry()
        .with(fmt_layer(config))
        .with(env_filter(config))
        .init();
}
