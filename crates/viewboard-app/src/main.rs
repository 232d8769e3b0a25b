use anyhow::Result;
use clap::Parser;
use tracing::info;

use viewboard_app::cli::{Cli, Command, FetchArgs};
use viewboard_app::dashboard::Dashboard;
use viewboard_app::report::render_summary;
use viewboard_core::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Structured JSON logs on stderr so stdout stays clean for output.
    // Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("viewboard=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cfg = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Command::Fetch(args) => run_fetch(&cfg, &args).await,
    }
}

async fn run_fetch(cfg: &Config, args: &FetchArgs) -> Result<()> {
    let mut dashboard = Dashboard::from_config(cfg)?;
    let gc = dashboard.spawn_gc(cfg.gc_interval());

    args.select(dashboard.store_mut())?;
    dashboard.apply();
    info!(endpoint = %cfg.analytics_url, key = %dashboard.query_key(), "fetching analytics");

    let result = dashboard.refresh().await;
    gc.abort();
    let data = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(data.as_ref())?);
    } else {
        let store = dashboard.store();
        print!("{}", render_summary(store.applied(), store.date_range(), &data));
    }
    Ok(())
}
