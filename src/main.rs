//! Process entrypoint (spec.md §6): loads configuration, establishes the
//! Postgres pool, Redis connection manager, object store, and upstream
//! client, wires the job queue and worker pools, registers cron tasks,
//! starts the admin HTTP surface, and performs a graceful, bounded-window
//! shutdown on SIGINT/SIGTERM (spec.md §4.7: "drains active jobs within a
//! bounded window … then forcibly stops").

use std::net::SocketAddr;
use std::time::Duration;

use tokio_cron_scheduler::JobScheduler;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use promidata_sync::control::ControlPlane;
use promidata_sync::cron::{self, CronDeps};
use promidata_sync::db;
use promidata_sync::downstream::{DownstreamClient, DownstreamConfig};
use promidata_sync::jobs::queue::JobQueue;
use promidata_sync::jobs::worker::{self, WorkerContext};
use promidata_sync::objectstore::ObjectStore;
use promidata_sync::routes::{self, AppState};
use promidata_sync::upstream::{ClientConfig, UpstreamClient};
use promidata_sync::Config;

/// Suppliers are bootstrapped once from a static list (spec.md §3
/// "Supplier"). The real ~56-supplier roster is operational data owned by
/// the deploying CMS, not source; an empty default here means this binary
/// expects supplier rows to already exist (e.g. seeded by the host) unless
/// `BOOTSTRAP_SUPPLIER_CODES` names a comma-separated list to insert.
fn bootstrap_supplier_codes() -> Vec<String> {
    std::env::var("BOOTSTRAP_SUPPLIER_CODES")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fatal configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with_target(false)
        .with_level(true)
        .compact()
        .init();

    tracing::info!("starting promidata-sync engine");

    let pool = match db::create_pool(&config.db_dsn).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to Postgres");
            std::process::exit(2);
        }
    };

    if config.run_migrations {
        if let Err(e) = db::run_migrations(&pool).await {
            tracing::error!(error = %e, "failed to run migrations");
            std::process::exit(2);
        }
    }

    if let Err(e) = db::health_check(&pool).await {
        tracing::error!(error = %e, "database health check failed");
        std::process::exit(2);
    }
    tracing::info!("connected to Postgres");

    let redis_client = match redis::Client::open(config.redis_url.clone()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "invalid REDIS_URL");
            std::process::exit(1);
        }
    };
    let redis_manager = match redis::aio::ConnectionManager::new(redis_client).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to Redis");
            std::process::exit(2);
        }
    };
    tracing::info!("connected to Redis");

    let object_store = ObjectStore::new(
        &config.object_store_access_key,
        &config.object_store_secret,
        config.object_store_bucket.clone(),
        &config.object_store_endpoint,
        config.object_store_public_url.clone(),
    );

    let upstream = match UpstreamClient::new(ClientConfig::default()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build upstream HTTP client");
            std::process::exit(1);
        }
    };

    let downstream = DownstreamClient::new(DownstreamConfig {
        index_url: config.search_index_url.clone(),
        semantic_url: config.semantic_store_url.clone(),
    });

    let queue = JobQueue::new(pool.clone());
    let control = ControlPlane::new(redis_manager);

    let bootstrap_codes = bootstrap_supplier_codes();
    if !bootstrap_codes.is_empty() {
        let codes: Vec<&str> = bootstrap_codes.iter().map(String::as_str).collect();
        if let Err(e) = promidata_sync::db::suppliers::bootstrap(&pool, &codes).await {
            tracing::error!(error = %e, "failed to bootstrap supplier rows");
            std::process::exit(2);
        }
    }

    match queue.reclaim_orphaned().await {
        Ok(0) => {}
        Ok(n) => tracing::warn!(count = n, "reclaimed orphaned active jobs from a prior crash"),
        Err(e) => {
            tracing::error!(error = %e, "failed to reclaim orphaned jobs");
            std::process::exit(2);
        }
    }

    let shutdown = CancellationToken::new();

    let worker_ctx = WorkerContext {
        pool: pool.clone(),
        upstream,
        object_store,
        downstream,
        queue: queue.clone(),
        control: control.clone(),
    };
    let worker_handles = worker::spawn_all(worker_ctx, shutdown.clone());

    let scheduler = match JobScheduler::new().await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            tracing::error!(error = %e, "failed to build cron scheduler");
            std::process::exit(1);
        }
    };
    if let Err(e) = cron::register(&scheduler, CronDeps { pool: pool.clone(), queue: queue.clone(), control: control.clone() }).await {
        tracing::error!(error = %e, "failed to register cron tasks");
        std::process::exit(1);
    }
    if let Err(e) = scheduler.start().await {
        tracing::error!(error = %e, "failed to start cron scheduler");
        std::process::exit(1);
    }

    let state = AppState { pool: pool.clone(), queue: queue.clone(), control };
    let app = routes::router(state, config.admin_token.clone()).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(TimeoutLayer::new(Duration::from_secs(30)))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    );

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "invalid HOST/PORT");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind admin HTTP surface");
            std::process::exit(2);
        }
    };
    tracing::info!(%addr, "admin control surface listening");

    let graceful_shutdown = config.graceful_shutdown;
    let server_shutdown = shutdown.clone();
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_signal(server_shutdown).await })
        .await;

    if let Err(e) = serve_result {
        tracing::error!(error = %e, "admin HTTP server error");
    }

    shutdown.cancel();
    drain_workers(worker_handles, graceful_shutdown).await;
    scheduler.shutdown().await.ok();

    tracing::info!("promidata-sync engine shut down cleanly");
}

/// Waits for SIGINT or SIGTERM, then signals `shutdown` so worker loops stop
/// claiming new jobs while letting the axum server drain in-flight requests.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining in-flight jobs");
    shutdown.cancel();
}

/// Waits up to `window` for in-flight worker tasks to finish on their own
/// (spec.md §4.7's 30s default drain window); anything still running after
/// that is abandoned. Its job row stays `active` in the queue table — the
/// next process start calls `JobQueue::reclaim_orphaned` to return it to
/// `waiting` before workers resume claiming.
async fn drain_workers(handles: Vec<tokio::task::JoinHandle<()>>, window: Duration) {
    let join_all = futures::future::join_all(handles);
    if tokio::time::timeout(window, join_all).await.is_err() {
        tracing::warn!("graceful shutdown window elapsed with workers still in flight");
    }
}
