use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use homedir::my_home;

mod cli;
mod collector;
mod config;
mod errors;
mod export;
mod extract;
mod fetch;
mod games;
mod normalize;
mod platform;
mod runner;
mod storage;
mod store;
#[cfg(test)]
mod tests;

use cli::Context;
use config::Config;
use store::GameStore;

fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("GAMESCOUT_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .context("couldnt find home dir")?
        .context("couldnt find home dir")?;
    Ok(home.join(".local/share/gamescout"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,html5ever=warn,selectors=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let base_path = base_path()?;
    let config = Config::load_with(&base_path)?;
    let store = GameStore::open(&base_path)
        .with_context(|| format!("failed to open store at {}", base_path.display()))?;

    let ctx = Context {
        config,
        store: Arc::new(store),
    };

    match args.command {
        cli::Command::Collect {
            platforms,
            max,
            fetch_args,
        } => cli::handle_collect(platforms, max, fetch_args, &ctx),

        cli::Command::List {
            filter,
            search,
            count,
        } => cli::handle_list(filter, search, count, &ctx),

        cli::Command::Extract { url, fetch_args } => cli::handle_extract(url, fetch_args, &ctx),

        cli::Command::Stats {} => cli::handle_stats(&ctx),

        cli::Command::Export {
            filter,
            format,
            template,
            preset,
            output,
        } => cli::handle_export(filter, format, template, preset, output, &ctx),

        cli::Command::Clear { yes } => cli::handle_clear(yes, &ctx),

        cli::Command::Platforms {} => cli::handle_platforms(&ctx),
    }
}
