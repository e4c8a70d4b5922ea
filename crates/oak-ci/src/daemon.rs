//! Composition root for `oak-ci start`: wires every port to a concrete
//! adapter, starts the watcher/scheduler/relay background tasks, and
//! serves the HTTP surface until shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use oak_ci_application::{
    BackgroundProcessorConfig, BackgroundProcessorService, HookIngestionService, IndexingService,
    InjectionConfig, RetrievalService,
};
use oak_ci_domain::ports::{FileChangeEvent, Watcher};
use oak_ci_infrastructure::config::{AppConfig, ConfigLoader, ProjectPaths};
use oak_ci_infrastructure::di;
use oak_ci_infrastructure::scheduler::{JobKey, Scheduler, Tier};
use oak_ci_server::http::{build_router, AppState, DaemonStatus, DaemonStatusValue};
use oak_ci_server::mcp::McpServer;
use oak_ci_server::relay::CloudRelay;

use crate::process;

const SCHEDULER_CAPACITY: usize = 10_000;
const SCHEDULER_WORKERS: usize = 4;

pub async fn run(project_root: PathBuf) -> anyhow::Result<()> {
    let config = ConfigLoader::new(&project_root).load()?;
    let ports = di::bootstrap(&project_root, &config).await?;
    let paths = ProjectPaths::new(&project_root);

    let retrieval_for_state = Arc::new(RetrievalService::new(
        Arc::clone(&ports.vector_store),
        Arc::clone(&ports.embedder),
        config.retrieval.high_confidence_threshold,
        config.retrieval.medium_confidence_threshold,
    ));
    let retrieval_for_hooks = RetrievalService::new(
        Arc::clone(&ports.vector_store),
        Arc::clone(&ports.embedder),
        config.retrieval.high_confidence_threshold,
        config.retrieval.medium_confidence_threshold,
    );
    let hook_ingestion = Arc::new(HookIngestionService::new(
        Arc::clone(&ports.activity_store),
        retrieval_for_hooks,
        InjectionConfig::default(),
    ));
    let indexing = Arc::new(IndexingService::new(
        project_root.clone(),
        oak_ci_application::exclusion::ExclusionPolicy::new(
            &config.indexing.exclude_patterns,
            &config.indexing.include_managed_paths,
        )
        .map_err(|e| anyhow::anyhow!("invalid exclusion pattern: {e}"))?,
        config.indexing.skip_empty,
        Arc::clone(&ports.activity_store),
        Arc::clone(&ports.vector_store),
        Arc::clone(&ports.embedder),
        Arc::clone(&ports.chunker),
        Arc::clone(&ports.event_bus),
    ));
    let background = Arc::new(BackgroundProcessorService::new(
        Arc::clone(&ports.activity_store),
        Arc::clone(&ports.vector_store),
        Arc::clone(&ports.embedder),
        Arc::clone(&ports.summarizer),
        Arc::clone(&ports.event_bus),
        BackgroundProcessorConfig::default(),
    ));

    let status = Arc::new(DaemonStatus::new());
    let mcp_tools = Arc::new(McpServer::new(Arc::clone(&retrieval_for_state), Arc::clone(&ports.activity_store)));

    let state = AppState {
        activity_store: Arc::clone(&ports.activity_store),
        vector_store: Arc::clone(&ports.vector_store),
        embedder: Arc::clone(&ports.embedder),
        hook_ingestion,
        retrieval: retrieval_for_state,
        indexing: Arc::clone(&indexing),
        status: Arc::clone(&status),
        started_at: Instant::now(),
        config_loader: Arc::new(ConfigLoader::new(&project_root)),
    };

    let listener = tokio::net::TcpListener::bind((config.daemon.host.as_str(), config.daemon.port)).await?;
    let bound_port = listener.local_addr()?.port();
    process::write(&paths, bound_port)?;

    let scheduler = Scheduler::new(SCHEDULER_CAPACITY);
    let workers = scheduler.spawn_workers(SCHEDULER_WORKERS);
    let tickers = spawn_tiers(&scheduler, &background, &config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let watcher_handle = spawn_watcher(Arc::clone(&ports.watcher), Arc::clone(&indexing));

    let relay_handle = config.relay.url.clone().zip(config.relay.relay_token.clone()).map(|(url, token)| {
        let relay = CloudRelay::new(url, token, Arc::clone(&mcp_tools));
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(relay.run(shutdown_rx))
    });

    status.set(DaemonStatusValue::Ready);
    tracing::info!(port = bound_port, "daemon ready");

    let app = build_router(state);
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!(%addr, "listening");
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx.clone(), Arc::clone(&status)));
    let result = server.await;

    scheduler.cancel();
    for ticker in tickers {
        let _ = ticker.await;
    }
    for worker in workers {
        let _ = worker.await;
    }
    watcher_handle.abort();
    if let Some(relay_handle) = relay_handle {
        let _ = relay_handle.await;
    }
    process::clear(&paths);

    result.map_err(anyhow::Error::from)
}

async fn shutdown_signal(shutdown_tx: tokio::sync::watch::Sender<bool>, status: Arc<DaemonStatus>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested, draining");
    status.set(DaemonStatusValue::Draining);
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
}

fn spawn_watcher(watcher: Arc<dyn Watcher>, indexing: Arc<IndexingService>) -> tokio::task::JoinHandle<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<FileChangeEvent>(1024);
    tokio::spawn(async move {
        tokio::spawn(async move {
            if let Err(e) = watcher.run(tx).await {
                oak_ci_domain::warn!("watcher", "watcher task exited", e);
            }
        });
        while let Some(event) = rx.recv().await {
            if let Err(e) = indexing.apply_change(event).await {
                oak_ci_domain::warn!("watcher", "failed to apply file change", e);
            }
        }
    })
}

fn spawn_tiers(
    scheduler: &Arc<Scheduler>,
    background: &Arc<BackgroundProcessorService>,
    config: &AppConfig,
) -> Vec<tokio::task::JoinHandle<()>> {
    let stale_timeout = chrono::Duration::seconds(config.session.stale_timeout_seconds);

    let fast = {
        let scheduler = Arc::clone(scheduler);
        let background = Arc::clone(background);
        scheduler.clone().spawn_tier(Tier::Fast, move || {
            let scheduler = Arc::clone(&scheduler);
            let background = Arc::clone(&background);
            async move {
                scheduler
                    .submit(JobKey { entity_id: "activities".to_owned(), job_kind: "flush" }, move || {
                        Box::pin(async move { background.flush_activities().await })
                    })
                    .await;
            }
        })
    };

    let medium = {
        let scheduler = Arc::clone(scheduler);
        let background = Arc::clone(background);
        scheduler.clone().spawn_tier(Tier::Medium, move || {
            let scheduler = Arc::clone(&scheduler);
            let background = Arc::clone(&background);
            async move {
                let now = chrono::Utc::now();
                scheduler
                    .submit(JobKey { entity_id: "batches".to_owned(), job_kind: "classify" }, {
                        let background = Arc::clone(&background);
                        move || Box::pin(async move { background.classify_stale_batches(now).await.map(|_| ()) })
                    })
                    .await;
                scheduler
                    .submit(JobKey { entity_id: "observations".to_owned(), job_kind: "extract" }, {
                        let background = Arc::clone(&background);
                        move || Box::pin(async move { background.extract_pending_observations().await.map(|_| ()) })
                    })
                    .await;
                scheduler
                    .submit(JobKey { entity_id: "observations".to_owned(), job_kind: "embed" }, {
                        let background = Arc::clone(&background);
                        move || Box::pin(async move { background.embed_pending_observations().await.map(|_| ()) })
                    })
                    .await;
                scheduler
                    .submit(JobKey { entity_id: "plans".to_owned(), job_kind: "embed" }, move || {
                        Box::pin(async move { background.embed_pending_plans().await.map(|_| ()) })
                    })
                    .await;
            }
        })
    };

    let infrequent = {
        let scheduler = Arc::clone(scheduler);
        let background = Arc::clone(background);
        scheduler.clone().spawn_tier(Tier::Infrequent, move || {
            let scheduler = Arc::clone(&scheduler);
            let background = Arc::clone(&background);
            move_stale_recovery(scheduler, background, stale_timeout)
        })
    };

    vec![fast, medium, infrequent]
}

async fn move_stale_recovery(scheduler: Arc<Scheduler>, background: Arc<BackgroundProcessorService>, timeout: chrono::Duration) {
    scheduler
        .submit(JobKey { entity_id: "sessions".to_owned(), job_kind: "stale-recovery" }, move || {
            Box::pin(async move { background.run_stale_recovery(timeout).await.map(|_| ()) })
        })
        .await;
}
