mod ingest;
mod process;
mod report;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use sift_core::ContentType;
use sift_pipeline::{ContentStore, PgStore};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "sift")]
#[command(about = "Content ingestion and summarization pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ContentTypeArg {
    Article,
    PodcastEpisode,
    Video,
}

impl From<ContentTypeArg> for ContentType {
    fn from(arg: ContentTypeArg) -> Self {
        match arg {
            ContentTypeArg::Article => ContentType::Article,
            ContentTypeArg::PodcastEpisode => ContentType::PodcastEpisode,
            ContentTypeArg::Video => ContentType::Video,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Fetch configured sources and record new or changed items
    Ingest {
        /// Only ingest this source (by slug)
        #[arg(long)]
        source: Option<String>,
    },
    /// Record a single item from a local file or a transcript URL
    Submit {
        /// Source slug the item belongs to
        #[arg(long)]
        source: String,
        /// Identifier unique within the source
        #[arg(long)]
        external_id: String,
        #[arg(long, value_enum, default_value = "article")]
        content_type: ContentTypeArg,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        url: Option<String>,
        /// HTML or plain-text file holding the content
        #[arg(long)]
        file: Option<PathBuf>,
        /// Transcript location, fetched when the item is processed
        #[arg(long)]
        transcript_url: Option<String>,
    },
    /// Process one item through to a terminal status
    Process {
        id: Uuid,
        /// Regenerate the summary even if one exists
        #[arg(long)]
        force_resummarize: bool,
        /// Re-fetch the transcript even if text is stored
        #[arg(long)]
        force_retranscribe: bool,
    },
    /// Process pending items in one batch
    ProcessPending {
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Restrict to one source (by slug)
        #[arg(long)]
        source: Option<String>,
    },
    /// List items awaiting processing
    Pending {
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long)]
        source: Option<String>,
    },
    /// Show generation spend against the daily and monthly budgets
    Usage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = sift_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = sift_db::PoolConfig::from_app_config(&config);
    let pool = sift_db::connect_pool(&config.database_url, pool_config).await?;
    let store: Arc<dyn ContentStore> = Arc::new(PgStore::new(pool.clone()));

    match cli.command {
        Commands::Migrate => {
            sift_db::run_migrations(&pool).await?;
            println!("migrations applied");
        }
        Commands::Ingest { source } => {
            ingest::run_ingest(&config, store.as_ref(), source.as_deref()).await?;
        }
        Commands::Submit {
            source,
            external_id,
            content_type,
            title,
            url,
            file,
            transcript_url,
        } => {
            let submission = ingest::Submission {
                source,
                external_id,
                content_type: content_type.into(),
                title,
                url,
                file,
                transcript_url,
            };
            ingest::run_submit(store.as_ref(), submission).await?;
        }
        Commands::Process {
            id,
            force_resummarize,
            force_retranscribe,
        } => {
            let options = sift_pipeline::ProcessOptions {
                force_resummarize,
                force_retranscribe,
            };
            process::run_process(&config, store, id, options).await?;
        }
        Commands::ProcessPending { limit, source } => {
            process::run_process_pending(&config, store, limit, source.as_deref()).await?;
        }
        Commands::Pending { limit, source } => {
            report::run_pending(&config, store.as_ref(), limit, source).await?;
        }
        Commands::Usage => report::run_usage(&config, store.as_ref()).await?,
    }

    Ok(())
}
