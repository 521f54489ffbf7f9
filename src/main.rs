use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_guide::{config::Config, models::LoadedCatalog, services::GuideLoader};

#[derive(Parser)]
#[command(name = "m3u-guide")]
#[command(version)]
#[command(about = "Load an IPTV playlist and its program guide through resilient proxy-aware fetching")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Playlist URL (overrides config file)
    #[arg(short, long, value_name = "URL")]
    playlist_url: Option<String>,

    /// Guide URL (overrides config file)
    #[arg(short, long, value_name = "URL")]
    guide_url: Option<String>,

    /// Skip the guide entirely
    #[arg(long)]
    no_guide: bool,

    /// Print the loaded catalog as JSON
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

fn print_summary(catalog: &LoadedCatalog) {
    let now = Utc::now();
    for group in &catalog.groups {
        println!("{} ({})", group.name, group.channels.len());
        for channel in &group.channels {
            let airing = catalog
                .programs_for(&channel.id)
                .find(|p| p.is_airing(now))
                .map(|p| format!(" - now: {}", p.title))
                .unwrap_or_default();
            println!("  {}{}", channel.name, airing);
        }
    }
    println!(
        "{} channels, {} groups, {} programs",
        catalog.channels.len(),
        catalog.groups.len(),
        catalog.programs.len()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("m3u_guide={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting m3u-guide v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;

    // Override config with CLI arguments
    if let Some(playlist_url) = cli.playlist_url {
        config.sources.playlist_url = playlist_url;
    }
    if let Some(guide_url) = cli.guide_url {
        config.sources.guide_url = Some(guide_url);
    }
    if cli.no_guide {
        config.loader.guide_enabled = false;
    }
    config.validate()?;

    info!(
        "Worst-case playlist latency before failure: {:?}",
        config.loader.worst_case_playlist_latency(&config.fetch)
    );

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling load");
            ctrl_c_cancel.cancel();
        }
    });

    let loader = GuideLoader::new(&config);
    let catalog = loader.load(&cancel).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        print_summary(&catalog);
    }

    Ok(())
}
