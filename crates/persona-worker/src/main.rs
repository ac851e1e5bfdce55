use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use chatstorm_bus::{redis_bus::RedisBus, Bus};
use chatstorm_buffers::{ChatWindow, ObservationBuffer};
use chatstorm_domain::{ConfigSeverity, SystemClock};
use chatstorm_generator::{
    DeterministicGenerator, Generator, LiveGenerator, LlmProvider, OpenAiCompatProvider, StubGenerator,
};
use chatstorm_domain::GenerationMode;
use chatstorm_memory::{MemoryProvider, RestMemoryProvider};
use chatstorm_persona_worker::{api, cli, config as worker_config, dispatch, reactive, reflection};
use chatstorm_persona_worker::context::{ServiceContext, Stats};
use chatstorm_persona_worker::state::{PersonaState, WorkerInbox};
use chatstorm_policy::PolicyConfig;
use chatstorm_safety::SafetyConfig;
use cli::{Cli, Command};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const PERSONA_INBOX_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _path) = cli::load_config()?;
            run_worker(Arc::new(config)).await
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
            println!("chatstorm-persona-worker {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chatstorm_persona_worker=debug")),
        )
        .json()
        .init();
}

async fn run_worker(config: Arc<chatstorm_domain::Config>) -> anyhow::Result<()> {
    tracing::info!("chatstorm-persona-worker starting");

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

    let room = Arc::new(worker_config::load_room_config(&config.room_config_path)?);
    let persona_configs = worker_config::load_persona_configs(&config.persona_config_dir)?;

    let mut states = HashMap::new();
    let mut personas = HashMap::new();
    let now_ms = chrono::Utc::now().timestamp_millis();
    for persona_id in &room.enabled_personas {
        let Some(persona) = persona_configs.get(persona_id) else {
            tracing::warn!(%persona_id, "enabled persona has no config file; skipping enrollment");
            continue;
        };
        states.insert(persona_id.clone(), Mutex::new(PersonaState::new(persona.drift.clone(), now_ms)));
        personas.insert(persona_id.clone(), persona.clone());
    }
    if personas.is_empty() {
        tracing::warn!(room_id = %room.room_id, "no personas enrolled; worker will stay idle");
    }

    let bus: Arc<dyn Bus> = Arc::new(
        RedisBus::connect(&config.bus.redis_url, config.bus.backoff_min_ms, config.bus.backoff_max_ms)
            .await
            .map_err(|e| anyhow::anyhow!("connecting to redis: {e}"))?,
    );

    let safety = Arc::new(SafetyConfig {
        max_chars: config.moderation.max_chars,
        blocklist: config.moderation.blocklist.clone(),
    });

    let memory: Arc<dyn MemoryProvider> = Arc::new(RestMemoryProvider::new(
        config.memory.base_url.clone(),
        Duration::from_millis(config.memory.timeout_ms),
    ));

    let (generator, reflection_provider): (Arc<dyn Generator>, Option<Arc<dyn LlmProvider>>) = match config.generation.mode {
        GenerationMode::Deterministic => (Arc::new(DeterministicGenerator), None),
        GenerationMode::Stub => (Arc::new(StubGenerator::default()), None),
        GenerationMode::Litellm => {
            let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::new(
                config.llm.base_url.clone(),
                config.llm.api_key.clone(),
                config.llm.model.clone(),
            ));
            let generator: Arc<dyn Generator> = Arc::new(LiveGenerator::new(
                provider.clone(),
                config.llm.max_concurrency,
                Duration::from_millis(config.generation.timeout_ms),
            ));
            (generator, Some(provider))
        }
    };

    let ctx = Arc::new(ServiceContext {
        config: config.clone(),
        room,
        personas: Arc::new(personas),
        policy_config: Arc::new(PolicyConfig::default()),
        bus,
        safety,
        memory,
        generator,
        reflection_provider,
        clock: Arc::new(SystemClock),
        chat_window: Arc::new(ChatWindow::default()),
        observation_buffer: Arc::new(ObservationBuffer::default()),
        states: Arc::new(states),
        mem_semaphore: Arc::new(Semaphore::new(config.memory.max_concurrency.max(1))),
        stats: Arc::new(Stats::default()),
        group_joined: Arc::new(AtomicBool::new(false)),
    });

    let shutdown = CancellationToken::new();
    let mut senders = HashMap::new();
    let mut persona_tasks = Vec::new();

    for persona_id in ctx.personas.keys() {
        let (tx, rx) = mpsc::channel::<WorkerInbox>(PERSONA_INBOX_CAPACITY);
        senders.insert(persona_id.clone(), tx);

        let reactive_ctx = ctx.clone();
        let reactive_id = persona_id.clone();
        let reactive_shutdown = shutdown.clone();
        persona_tasks.push(tokio::spawn(async move {
            reactive::run_persona_loop(reactive_ctx, reactive_id, rx, reactive_shutdown).await;
        }));

        let reflection_ctx = ctx.clone();
        let reflection_id = persona_id.clone();
        let reflection_shutdown = shutdown.clone();
        persona_tasks.push(tokio::spawn(async move {
            reflection::run_persona_reflection(reflection_ctx, reflection_id, reflection_shutdown).await;
        }));
    }

    let firehose_ctx = ctx.clone();
    let firehose_senders = senders.clone();
    let firehose_shutdown = shutdown.clone();
    let firehose_task = tokio::spawn(async move {
        dispatch::run_firehose_dispatch(firehose_ctx, firehose_senders, firehose_shutdown).await;
    });

    let observation_ctx = ctx.clone();
    let observation_senders = senders;
    let observation_shutdown = shutdown.clone();
    let observation_task = tokio::spawn(async move {
        dispatch::run_observation_dispatch(observation_ctx, observation_senders, observation_shutdown).await;
    });

    let app = api::router().with_state(ctx.clone());
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

    firehose_task.abort();
    observation_task.abort();
    for task in persona_tasks {
        task.abort();
    }
    Ok(())
}
