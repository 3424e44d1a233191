//! `shadowtraffic run`: start the shadowing proxy.
//!
//! Loads configuration from a file source, builds the shadow dispatcher
//! and its worker pools, starts the Axum HTTP server with graceful
//! shutdown, and spawns a background config refresh loop for hot-reloading.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::RunArgs;
use crate::config::sources::FileSource;
use crate::config::{ConfigResolver, ConfigSource, ConfigStore, LoadedConfig};
use crate::error::ShadowTrafficError;
use crate::logging;
use crate::pool::WorkerPool;
use crate::server::{self, AppState, Stats};
use crate::shadow::client::HyperShadowClient;
use crate::shadow::headers::resolve_origin;
use crate::shadow::ShadowDispatcher;

const CONFIG_CANDIDATES: &[&str] = &[
    "shadowtraffic.yaml",
    "shadowtraffic.yml",
    "shadowtraffic.json",
    "shadowtraffic.toml",
];

pub async fn execute(args: RunArgs) -> Result<(), ShadowTrafficError> {
    logging::init(
        &args.log_level,
        logging::resolve_format(args.pretty, args.json),
    );

    let resolver =
        resolve_config_sources(args.config.as_deref(), args.fallback_config.as_deref()).await?;
    let (mut config, version, source_name) = resolver.load_with_fallback().await?;

    if let (Some(timeout), Some(upstream)) = (args.timeout, config.upstream.as_mut()) {
        upstream.timeout = timeout;
    }

    // Pool sizes, timeouts and origin are fixed for the life of the process.
    let shadow = config.shadow.clone();
    let origin = resolve_origin(shadow.origin.as_deref());

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args.sentry_dsn.as_ref().map(|dsn| {
        crate::sentry_integration::init(dsn, args.sentry_environment.as_deref(), &origin)
    });

    let store = Arc::new(ConfigStore::new(LoadedConfig {
        config: Arc::new(config),
        version,
        source_name: source_name.to_string(),
        loaded_at: Instant::now(),
    }));

    let shadow_client = HyperShadowClient::new(
        server::build_http_client(Some(Duration::from_millis(shadow.connect_timeout_ms))),
        Duration::from_millis(shadow.read_timeout_ms),
    );
    let dispatcher = ShadowDispatcher::new(
        store.clone(),
        Arc::new(shadow_client),
        WorkerPool::new("shadow-dispatch", shadow.dispatch_pool_size()),
        WorkerPool::new("shadow-http", shadow.http_pool_size()),
        origin,
    );

    let state = Arc::new(AppState {
        config: store,
        http_client: server::build_http_client(None),
        dispatcher: Arc::new(dispatcher),
        start_time: Instant::now(),
        max_body: args.max_body,
        stats: Stats::new(),
    });

    // Shutdown signal: dropping shutdown_tx closes the channel and stops the refresh loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let refresh_state = state.clone();
    let poll_interval = args.poll_interval;
    let refresh_handle = tokio::spawn(async move {
        config_refresh_loop(refresh_state, resolver, poll_interval, shutdown_rx).await;
    });

    let router = server::build_router(state);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        shadow_enabled = shadow.enabled,
        percentage = shadow.percentage,
        hosts = shadow.hosts.len(),
        rules = shadow.inclusion_patterns.len(),
        dispatch_pool = shadow.dispatch_pool_size(),
        http_pool = shadow.http_pool_size(),
        "shadowtraffic started"
    );

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    if let Err(e) = refresh_handle.await {
        tracing::error!(error = %e, "config refresh task failed");
    }

    tracing::info!("shadowtraffic stopped");
    Ok(())
}

async fn resolve_config_sources(
    explicit: Option<&Path>,
    fallback: Option<&Path>,
) -> Result<ConfigResolver, ShadowTrafficError> {
    let fallback = match fallback {
        Some(path) => Some(Box::new(FileSource::for_path(path)?) as Box<dyn ConfigSource>),
        None => None,
    };

    if let Some(path) = explicit {
        return Ok(ConfigResolver::new(
            Box::new(FileSource::for_path(path)?),
            fallback,
        ));
    }

    for name in CONFIG_CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return Ok(ConfigResolver::new(
                Box::new(FileSource::for_path(&path)?),
                fallback,
            ));
        }
    }

    Err(ShadowTrafficError::NoConfigSource {
        hint: "Provide --config <file>.\n  \
               Run 'shadowtraffic init' to create a config file."
            .into(),
    })
}

async fn config_refresh_loop(
    state: Arc<AppState>,
    resolver: ConfigResolver,
    interval_secs: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("config refresh loop shutting down");
                return;
            }
        }

        let current_version = state.config.version().await;
        match resolver.primary().has_changed(&current_version).await {
            Ok(true) => {
                tracing::info!("config change detected, reloading");
                match resolver.load_with_fallback().await {
                    Ok((config, version, _)) => {
                        let enabled = config.shadow.enabled;
                        let percentage = config.shadow.percentage;
                        state.config.replace(config, version).await;
                        state.stats.config_reloads.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(enabled, percentage, "config reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "config reload failed, keeping current config");
                    }
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "config change check failed");
            }
        }
    }
}
