//! Background job scheduler.
//!
//! Registers the recurring ingestion and processing jobs at server startup.
//! Each job skips a tick while its previous run is still in flight.

use std::sync::Arc;

use sift_core::AppConfig;
use sift_fetch::Fetcher;
use sift_pipeline::{ingest_source, ContentStore, Extractor, ProcessOptions, Processor};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Every 30 minutes, on the half hour.
const INGEST_SCHEDULE: &str = "0 */30 * * * *";
/// Every 5 minutes.
const PROCESS_SCHEDULE: &str = "0 */5 * * * *";
const PROCESS_BATCH_SIZE: usize = 25;

/// Collaborators shared by every job run.
pub struct JobContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ContentStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    /// Processing job is not registered when this is `None`.
    pub processor: Option<Arc<Processor>>,
}

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(ctx: Arc<JobContext>) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_ingest_job(&scheduler, Arc::clone(&ctx)).await?;
    if let Some(processor) = ctx.processor.clone() {
        register_process_job(&scheduler, processor).await?;
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_ingest_job(
    scheduler: &JobScheduler,
    ctx: Arc<JobContext>,
) -> Result<(), JobSchedulerError> {
    let running = Arc::new(Mutex::new(()));

    let job = Job::new_async(INGEST_SCHEDULE, move |_uuid, _lock| {
        let ctx = Arc::clone(&ctx);
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!("scheduler: previous ingestion run still active; skipping");
                return;
            };
            tracing::info!("scheduler: starting ingestion run");
            run_ingest_job(&ctx).await;
            tracing::info!("scheduler: ingestion run complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Ingest every enabled source, one at a time. A failing source is logged
/// and does not stop the rest.
async fn run_ingest_job(ctx: &JobContext) {
    let sources = match sift_core::load_sources(&ctx.config.sources_path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load sources");
            return;
        }
    };

    for source in sources.enabled() {
        match ingest_source(
            ctx.fetcher.as_ref(),
            ctx.store.as_ref(),
            ctx.extractor.as_ref(),
            source,
        )
        .await
        {
            Ok(report) => tracing::info!(
                source = %source.slug,
                fetched = report.fetched,
                created = report.created,
                updated = report.updated,
                failed = report.failed,
                "scheduler: source ingested"
            ),
            Err(e) => tracing::error!(
                source = %source.slug,
                error = %e,
                "scheduler: source ingestion failed"
            ),
        }
    }
}

async fn register_process_job(
    scheduler: &JobScheduler,
    processor: Arc<Processor>,
) -> Result<(), JobSchedulerError> {
    let running = Arc::new(Mutex::new(()));

    let job = Job::new_async(PROCESS_SCHEDULE, move |_uuid, _lock| {
        let processor = Arc::clone(&processor);
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::debug!("scheduler: previous processing run still active; skipping");
                return;
            };
            match processor
                .process_pending(PROCESS_BATCH_SIZE, None, ProcessOptions::default())
                .await
            {
                Ok(results) if results.is_empty() => {
                    tracing::debug!("scheduler: nothing pending");
                }
                Ok(results) => {
                    let succeeded = results.iter().filter(|r| r.success).count();
                    tracing::info!(
                        total = results.len(),
                        succeeded,
                        "scheduler: processing run complete"
                    );
                }
                Err(e) => tracing::error!(error = %e, "scheduler: failed to list pending items"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
