use anyhow::Context;
use clap::Parser;
use podmon::{
    config::{Config, read_config_file},
    pipeline::{Collaborators, PodCollectionPipeline},
    storage,
    util::{get_config_path, get_workers},
};
use tracing::{debug, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short, long, default_value_t = get_config_path())]
    config: String,

    /// Only collect this pod
    #[arg(long)]
    domain: Option<String>,

    /// Trace every stage of every pod
    #[arg(long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|directives| directives.parse::<filter::Targets>().ok())
        .unwrap_or_else(|| {
            filter::Targets::new().with_targets(vec![("podmon", level), ("podmon_collector", level)])
        });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let mut config: Config = read_config_file(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;
    if let Some(workers) = get_workers() {
        config.pipeline.workers = workers;
    }
    config.pipeline.verbose |= args.verbose;

    let store = storage::open(&config.storage.clone().unwrap_or_default())
        .await
        .context("storage unreachable")?;
    let health = store.health_check().await.context("storage unreachable")?;
    if !health.healthy {
        anyhow::bail!("storage unhealthy: {}", health.message);
    }
    debug!("storage: {}", health.message);

    let collaborators = Collaborators::from_config(&config)?;
    let pipeline = PodCollectionPipeline::new(&config, store.clone(), collaborators);

    let report = pipeline.run(args.domain.as_deref()).await;

    if let Err(e) = store.close().await {
        warn!("failed to close storage: {e}");
    }

    match report {
        Ok(report) => {
            for line in report.to_string().lines() {
                info!("{line}");
            }
            Ok(())
        }
        Err(e) => {
            error!("could not list pods: {e}");
            Err(e.into())
        }
    }
}
