use anyhow::Context;
use clap::{Parser, Subcommand};
use review_harvester::catalog::{load_catalog, load_handle_map};
use review_harvester::config::{load_config, AppConfig};
use review_harvester::driver::HttpDriverFactory;
use review_harvester::harvest::Harvester;
use review_harvester::pipeline::Pipeline;
use review_harvester::storage::{
    export_catalog, export_mismatches, export_reviews, export_status, mismatch_path_for,
    status_path_for,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "review-harvester", about = "Harvest storefront reviews into an import-ready CSV")]
struct Cli {
    /// JSON config file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve catalog products, scrape their reviews and export them
    Run {
        /// Product names: one per line, or a CSV with a product_name column
        #[arg(long)]
        catalog: PathBuf,
        /// Review CSV to write
        #[arg(short, long)]
        output: PathBuf,
        /// Unmatched names file (default: <output>.mismatches.txt)
        #[arg(long)]
        mismatches: Option<PathBuf>,
        /// Target shop base URL used for product_url
        #[arg(long)]
        shop_domain: Option<String>,
        /// CSV mapping product_name to product_handle[,product_id]
        #[arg(long)]
        handle_map: Option<PathBuf>,
        /// Products processed at once (1-3)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Reviews kept per product
        #[arg(long)]
        max_reviews: Option<usize>,
        /// Wall-clock budget for the whole run, in seconds
        #[arg(long)]
        budget_secs: Option<u64>,
    },
    /// Collect brand and product names from category pages into a catalog CSV
    Harvest {
        /// Category page URLs
        #[arg(long = "url", required = true)]
        urls: Vec<String>,
        /// Catalog CSV to write
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    if let Err(e) = run(Cli::parse()).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default().validate()?,
    };

    match cli.command {
        Commands::Run {
            catalog,
            output,
            mismatches,
            shop_domain,
            handle_map,
            concurrency,
            max_reviews,
            budget_secs,
        } => {
            if let Some(domain) = shop_domain {
                config.shop_domain = domain;
            }
            if let Some(n) = concurrency {
                config.concurrency = n;
            }
            if let Some(n) = max_reviews {
                config.max_reviews_per_product = n;
            }
            if let Some(secs) = budget_secs {
                config.run_budget_secs = Some(secs);
            }
            if let Some(path) = handle_map {
                config.handle_overrides.extend(load_handle_map(&path)?);
            }
            let config = config.validate()?;
            if config.shop_domain.is_empty() {
                warn!("No shop domain configured; product_url will point at the source page");
            }

            let entries = load_catalog(&catalog)?;
            let factory =
                HttpDriverFactory::new(&config.site.user_agent, config.request_timeout())?;
            let pipeline = Pipeline::new(factory, &config)?;
            let report = pipeline.run(&entries).await;

            export_reviews(&output, report.aggregator.reviews())
                .context("review export failed")?;
            let mismatch_path = mismatches.unwrap_or_else(|| mismatch_path_for(&output));
            export_mismatches(&mismatch_path, &report.mismatches)
                .context("mismatch export failed")?;
            export_status(&status_path_for(&output), &report.statuses)
                .context("status export failed")?;

            println!(
                "Exported {} reviews from {} products; {} unmatched, {} empty, {} skipped.",
                report.aggregator.len(),
                report.resolved,
                report.mismatches.len(),
                report.empty,
                report.skipped
            );
        }
        Commands::Harvest { urls, output } => {
            let factory =
                HttpDriverFactory::new(&config.site.user_agent, config.request_timeout())?;
            let harvester = Harvester::new(factory, &config);
            let entries = harvester.harvest(&urls).await;
            export_catalog(&output, &entries).context("catalog export failed")?;
            println!("Saved {} products to {}", entries.len(), output.display());
        }
    }

    info!("Done in {:.1}s", t0.elapsed().as_secs_f64());
    Ok(())
}
