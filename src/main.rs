use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use paper_search::api::{build_router, AppState};
use paper_search::cache::SearchCache;
use paper_search::config::{load_config, Config, LimiterBackend};
use paper_search::limiter::{MemoryStore, RateLimitStore, RateLimiter, SledStore};
use paper_search::search::SearchService;
use paper_search::sources::{
    OpenAlexAdapter, PubMedAdapter, SemanticScholarAdapter, SourceAdapter,
};

#[derive(Debug, Parser)]
#[command(name = "paper-search", version, about = "Federated academic paper search service")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overriding the configuration file
    #[arg(short, long)]
    bind: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    if cli.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("Starting paper-search v{}", env!("CARGO_PKG_VERSION"));

    let state = build_state(&config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("paper-search listening on http://{}", config.server.bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn build_state(config: &Config) -> Result<AppState> {
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(SemanticScholarAdapter::new(
            config.sources.semantic_api_key.clone(),
        )),
        Arc::new(PubMedAdapter::new()),
        Arc::new(OpenAlexAdapter::new(config.sources.openalex_mailto.clone())),
    ];

    let cache = if config.cache.enabled {
        Arc::new(SearchCache::open(
            &config.cache.path,
            Duration::from_secs(config.cache.ttl_secs),
        ))
    } else {
        Arc::new(SearchCache::disabled())
    };

    let service = Arc::new(SearchService::new(
        adapters,
        cache,
        config.search.page_size,
        Duration::from_secs(config.search.source_timeout_secs),
    ));

    let window = Duration::from_secs(config.rate_limit.window_secs);
    let memory = Arc::new(MemoryStore::new());
    Arc::clone(&memory).spawn_sweeper(
        window,
        Duration::from_secs(config.rate_limit.sweep_interval_secs),
    );

    let limiter = match config.rate_limit.backend {
        LimiterBackend::Memory => RateLimiter::new(
            memory.clone() as Arc<dyn RateLimitStore>,
            None,
            config.rate_limit.limit,
            window,
        ),
        LimiterBackend::Sled => match SledStore::open(&config.rate_limit.path) {
            Ok(store) => RateLimiter::new(
                Arc::new(store),
                Some(memory.clone()),
                config.rate_limit.limit,
                window,
            ),
            Err(error) => {
                warn!(%error, "sled rate-limit store unavailable, using memory backend");
                RateLimiter::new(
                    memory.clone() as Arc<dyn RateLimitStore>,
                    None,
                    config.rate_limit.limit,
                    window,
                )
            }
        },
    };

    Ok(AppState::new(service, Arc::new(limiter)))
}
