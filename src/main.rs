use clap::Parser;
use research_aggregator::client::providers::{
    ArxivAdapter, GoogleScholarAdapter, PubMedAdapter,
};
use research_aggregator::config::LoggingConfig;
use research_aggregator::{
    Config, DailyRateLimiter, DateRange, InMemoryRateLimitStore, InMemorySessionStore,
    SearchAggregator, SearchRequest, SessionOrchestrator, SessionStore, SortBy, Source,
    SourceAdapter,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Search academic papers across arXiv, PubMed, and Google Scholar
#[derive(Debug, Parser)]
#[command(name = "research-aggregator", version, about)]
struct Cli {
    /// Free-text search query
    query: String,

    /// Catalogs to search
    #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = [Source::Arxiv, Source::Pubmed])]
    sources: Vec<Source>,

    /// Overall number of results to return (defaults to the configured value)
    #[arg(short = 'n', long)]
    max_results: Option<usize>,

    /// Sort order for the merged results
    #[arg(long, value_enum, default_value_t = SortBy::Relevance)]
    sort_by: SortBy,

    /// Earliest publication date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<chrono::NaiveDate>,

    /// Latest publication date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<chrono::NaiveDate>,

    /// Skip AI analysis of the results
    #[arg(long)]
    no_analysis: bool,

    /// User id the search and its quotas are attributed to
    #[arg(long, default_value = "default")]
    user: String,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration decides the log format and default filter, so it loads
    // before the subscriber; load failures go to stderr directly
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` overrides the configured level; the format comes from config
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli, config: Config) -> research_aggregator::Result<()> {
    let scholar_limiter = Arc::new(DailyRateLimiter::new(
        Arc::new(InMemoryRateLimitStore::new()),
        config.rate_limit.scholar_daily_limit,
    ));

    let mut adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(ArxivAdapter::new()?),
        Arc::new(PubMedAdapter::new(
            config.sources.pubmed.tool.clone(),
            config.sources.pubmed.email.clone(),
        )?),
    ];
    match GoogleScholarAdapter::new(
        config.sources.google_scholar.api_key.clone(),
        scholar_limiter,
    ) {
        Ok(adapter) => adapters.push(Arc::new(adapter)),
        Err(e) => warn!("Google Scholar adapter unavailable: {e}"),
    }

    let aggregator = Arc::new(
        SearchAggregator::new(adapters).with_source_timeout(Duration::from_secs(
            config.search.per_source_timeout_secs,
        )),
    );
    for (source, description) in aggregator.describe_sources() {
        info!("Source {}: {}", source, description);
    }
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let orchestrator = SessionOrchestrator::new(aggregator, Arc::clone(&store), None);

    let date_range = (cli.from.is_some() || cli.to.is_some()).then(|| DateRange {
        start: cli.from,
        end: cli.to,
    });

    let request = SearchRequest {
        query: cli.query,
        sources: cli.sources,
        max_results: config.search.resolve_max_results(cli.max_results),
        sort_by: cli.sort_by,
        date_range,
        generate_analysis: config.enrichment.enabled && !cli.no_analysis,
    };

    let session = orchestrator.run(&cli.user, &request).await?;
    info!(
        "Session {} finished: {} ({} results)",
        session.session_id, session.status, session.results_count
    );

    let papers = store
        .get_session_papers(&cli.user, &session.session_id)
        .await?;
    let output = serde_json::json!({
        "session": session,
        "papers": papers,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
