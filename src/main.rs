use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use job_board::{
    config::Config,
    jobs::JobStore,
    middleware::build_rate_limiter,
    render::AssetIntegrity,
    routes::{create_router, static_files::resolve_static_dir},
    sessions::SessionStore,
    utils::init_logger,
    AppState,
};

const RATE_LIMITER_CLEANUP: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "job-board", version, about = "Progressively enhanced job board")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// JSON job source (overrides JOBS_FILE)
    #[arg(long)]
    jobs_file: Option<PathBuf>,

    /// Validate the job source, print a summary and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = cli.jobs_file {
        config.jobs.source = Some(path);
    }

    let _log_guard = init_logger(&config.logging)?;
    info!("Configuration loaded: {:?}", config.server);

    let jobs = JobStore::load(config.jobs.source.as_deref(), config.jobs.tag_match)
        .context("Failed to load job source")?;

    if cli.check {
        println!("{} valid jobs, tags: {}", jobs.len(), jobs.tags().join(", "));
        return Ok(());
    }
    info!(
        jobs = jobs.len(),
        tags = jobs.tags().len(),
        tag_match = %jobs.tag_match(),
        "Job store ready"
    );

    // Session store and its expiry sweep
    let sessions = SessionStore::new(config.session.ttl());
    let sweeper = sessions.spawn_sweeper(config.session.sweep_interval());

    config.server.static_dir = resolve_static_dir(&config.server.static_dir);
    let assets = AssetIntegrity::from_dir(&config.server.static_dir);

    let rate_limiter = Arc::new(build_rate_limiter(config.rate_limit.per_minute));
    info!(
        per_minute = config.rate_limit.per_minute,
        trust_proxy = config.server.trust_proxy,
        "Rate limiter ready"
    );
    let limiter_cleanup = {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RATE_LIMITER_CLEANUP);
            loop {
                ticker.tick().await;
                limiter.retain_recent();
                limiter.shrink_to_fit();
            }
        })
    };

    // Create shared state
    let state = AppState {
        config: config.clone(),
        jobs: Arc::new(jobs),
        sessions,
        assets: Arc::new(assets),
        rate_limiter,
    };

    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.server.host, config.server.port))?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    sweeper.abort();
    limiter_cleanup.abort();
    Ok(())
}
