mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use sift_fetch::{Fetcher, FetcherConfig, HttpFetcher};
use sift_pipeline::{
    build_pipeline, BasicExtractor, BudgetLimits, ContentStore, PgStore, SetupError,
};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    scheduler::JobContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(sift_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = sift_db::PoolConfig::from_app_config(&config);
    let pool = sift_db::connect_pool(&config.database_url, pool_config).await?;
    sift_db::run_migrations(&pool).await?;

    let store: Arc<dyn ContentStore> = Arc::new(PgStore::new(pool.clone()));
    let pipeline = match build_pipeline(&config, Arc::clone(&store)).await {
        Ok(pipeline) => Some(pipeline),
        Err(SetupError::MissingApiKey) => {
            tracing::warn!("SIFT_LLM_API_KEY not set; processing endpoints and jobs are disabled");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let fetcher: Arc<dyn Fetcher> = match &pipeline {
        Some(p) => Arc::clone(&p.fetcher),
        None => Arc::new(HttpFetcher::new(&FetcherConfig::from_app_config(&config))?),
    };
    let processor = pipeline.as_ref().map(|p| Arc::clone(&p.processor));

    let _scheduler = scheduler::build_scheduler(Arc::new(JobContext {
        config: Arc::clone(&config),
        store: Arc::clone(&store),
        fetcher,
        extractor: Arc::new(BasicExtractor),
        processor: processor.clone(),
    }))
    .await?;

    let app = build_app(AppState {
        pool,
        store,
        processor,
        budget_limits: BudgetLimits::from_app_config(&config),
        max_attempts: config.max_item_attempts,
    });

    tracing::info!(addr = %config.bind_addr, "listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
