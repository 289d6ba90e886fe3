mod config;
mod tui;

use std::{env, path::PathBuf};

use clap::{Parser, Subcommand};
use comfy_table::Table;
use supwatch_cmd::{CommandError, CommandLine};
use supwatch_filter::{RunFilter, select};
use supwatch_kubectl::{ClusterQuery, Kubectl, KubectlError, Stern};
use supwatch_model::RunSnapshot;
use supwatch_reconcile::{ABSENT, progress_line};
use thiserror::Error;
use which::which;

pub use crate::config::{Config, ConfigError};
use crate::tui::{TuiError, TuiOptions, tui};

#[derive(Parser, Debug)]
#[command(name = "supwatch", version, about = "Watch supply chain runs on a cluster")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Cmd>,

    #[arg(long = "config", env = "SUPWATCH_CONFIG", global = true)]
    pub config_path: Option<PathBuf>,

    #[arg(long = "log", env = "SUPWATCH_LOG", global = true)]
    pub log: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Interactive dashboard (the default)
    Watch,
    /// Print the current runs once
    Runs {
        /// Only runs of this chain
        #[arg(long)]
        chain: Option<String>,
        /// Only runs whose readiness reason matches
        #[arg(long)]
        status: Option<String>,
        /// Only each workload's most recent run
        #[arg(long)]
        latest: bool,
    },
    /// Print the supply chain catalog once
    Chains,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Kubectl(#[from] KubectlError),

    #[error("required tool not found on PATH: {tool}")]
    ToolNotFound {
        tool: String,
        #[source]
        source: which::Error,
    },

    #[error(transparent)]
    Tui(#[from] TuiError),
}

pub async fn get_config(cli: &Cli) -> Result<Config, AppError> {
    let config_path = cli
        .config_path
        .clone()
        .or_else(|| env::var("SUPWATCH_CONFIG").ok().map(PathBuf::from))
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let config = Config::load(&config_path, cli).await?;
    Ok(config)
}

pub async fn run(cli: Cli, config: Config) -> Result<(), AppError> {
    match cli.command.unwrap_or(Cmd::Watch) {
        Cmd::Watch => cmd_watch(config).await,
        Cmd::Runs {
            chain,
            status,
            latest,
        } => cmd_runs(config, chain, status, latest).await,
        Cmd::Chains => cmd_chains(config).await,
    }
}

async fn cmd_watch(config: Config) -> Result<(), AppError> {
    require_tool(&config.kubectl)?;
    require_tool(&config.stern)?;

    tui(TuiOptions {
        kubectl: Kubectl::new(config.kubectl),
        stern: Stern::new(config.stern),
        refresh_interval: config.refresh_interval,
        detail_refresh: config.detail_refresh,
    })
    .await?;

    Ok(())
}

async fn cmd_runs(
    config: Config,
    chain: Option<String>,
    status: Option<String>,
    latest: bool,
) -> Result<(), AppError> {
    require_tool(&config.kubectl)?;
    let kubectl = Kubectl::new(config.kubectl);
    let runs = kubectl.list_runs().await?;
    let filter = RunFilter {
        chain,
        status,
        latest_only: latest,
    };
    print_runs(&select(&runs, &filter));
    Ok(())
}

async fn cmd_chains(config: Config) -> Result<(), AppError> {
    require_tool(&config.kubectl)?;
    let kubectl = Kubectl::new(config.kubectl);
    let chains = kubectl.list_chains().await?;

    let mut table = new_table(vec!["name", "namespace"]);
    for chain in &chains {
        table.add_row(vec![
            chain.name.as_str(),
            chain.namespace.as_deref().unwrap_or(ABSENT),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn print_runs(runs: &[&RunSnapshot]) {
    let mut table = new_table(vec![
        "namespace",
        "chain",
        "run",
        "ready",
        "created",
        "progress",
        "message",
    ]);
    for run in runs {
        let ready = run.ready_condition().ok();
        table.add_row(vec![
            run.namespace.clone(),
            run.chain.clone().unwrap_or_else(|| ABSENT.into()),
            run.search_key(),
            ready
                .and_then(|c| c.reason.clone())
                .unwrap_or_else(|| ABSENT.into()),
            run.created.clone(),
            progress_line(run),
            ready
                .and_then(|c| c.first_sentence())
                .unwrap_or_default()
                .to_string(),
        ]);
    }
    println!("{table}");
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn require_tool(command: &CommandLine) -> Result<(), AppError> {
    which(command.program()).map_err(|source| AppError::ToolNotFound {
        tool: command.program().to_string(),
        source,
    })?;
    Ok(())
}
