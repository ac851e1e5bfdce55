use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use clap::Parser;
use chatstorm_bus::{redis_bus::RedisBus, Bus};
use chatstorm_domain::ConfigSeverity;
use chatstorm_safety::SafetyConfig;
use chatstorm_gateway::api;
use chatstorm_gateway::cli::{self, Cli, Command};
use chatstorm_gateway::clients::ClientRegistry;
use chatstorm_gateway::state::{AppState, Stats};
use chatstorm_gateway::broadcaster;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _path) = cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::ConfigValidate) => {
            let (config, path) = cli::load_config()?;
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                anyhow::bail!("{path}: config validation failed");
            }
            println!("{path}: ok");
            Ok(())
        }
        Some(Command::ConfigShow) => {
            let (config, _path) = cli::load_config()?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("chatstorm-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chatstorm_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<chatstorm_domain::Config>) -> anyhow::Result<()> {
    tracing::info!("chatstorm-gateway starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let bus: Arc<dyn Bus> = Arc::new(
        RedisBus::connect(
            &config.bus.redis_url,
            config.bus.backoff_min_ms,
            config.bus.backoff_max_ms,
        )
        .await
        .map_err(|e| anyhow::anyhow!("connecting to redis: {e}"))?,
    );
    tracing::info!(redis_url = %config.bus.redis_url, "bus connected");

    let safety = Arc::new(SafetyConfig {
        max_chars: config.moderation.max_chars,
        blocklist: config.moderation.blocklist.clone(),
    });

    let state = AppState {
        config: config.clone(),
        bus,
        safety,
        clients: Arc::new(ClientRegistry::new()),
        stats: Arc::new(Stats::default()),
        group_joined: Arc::new(AtomicBool::new(false)),
    };

    let shutdown = CancellationToken::new();
    let broadcaster_state = state.clone();
    let broadcaster_shutdown = shutdown.clone();
    let broadcaster_task = tokio::spawn(async move {
        broadcaster::run(broadcaster_state, broadcaster_shutdown).await;
    });

    let allowed_origins: Vec<HeaderValue> = config
        .server
        .cors
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let cors = if config.server.cors.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods([Method::GET])
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed_origins))
            .allow_methods([Method::GET])
    };

    let app = api::router().with_state(state).layer(cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    let shutdown_signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown_signal.cancel();
        })
        .await?;

    broadcaster_task.abort();
    Ok(())
}
