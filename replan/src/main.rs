use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use replan_core::{Planner, PlannerConfig, SearchMode};

mod error;
mod output;
mod scenario;

use error::{CliError, CliResult};
use scenario::Scenario;

#[derive(Parser)]
#[command(name = "replan")]
#[command(about = "Reconfiguration planner for virtual machine clusters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Compute a reconfiguration plan
    Plan {
        /// Scenario file (JSON, or YAML with a .yaml/.yml extension)
        #[arg(long)]
        scenario: PathBuf,

        /// Planner configuration file (TOML); REPLAN_* variables are used otherwise
        #[arg(long)]
        config: Option<PathBuf>,

        /// Search time budget (e.g. 500ms, 10s)
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,

        /// Maximum number of explored search nodes
        #[arg(long)]
        max_nodes: Option<u64>,

        /// Keep searching for cheaper plans until the budget runs out
        #[arg(long)]
        optimize: bool,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Check the placement rules of a scenario against its source configuration
    Check {
        #[arg(long)]
        scenario: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Plan {
            scenario,
            config,
            timeout,
            max_nodes,
            optimize,
            format,
        } => {
            load_config(config, timeout, max_nodes, optimize)
                .and_then(|config| plan(&scenario, config, format))
        }
        Commands::Check { scenario } => check(&scenario),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() -> CliResult<()> {
    let directive = "replan=info"
        .parse()
        .map_err(|e| CliError::LogDirective(format!("{}", e)))?;
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(directive);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_config(
    path: Option<PathBuf>,
    timeout: Option<Duration>,
    max_nodes: Option<u64>,
    optimize: bool,
) -> CliResult<PlannerConfig> {
    let mut config = match path {
        Some(path) => PlannerConfig::from_file(&path)?,
        None => PlannerConfig::from_env()?,
    };
    if let Some(timeout) = timeout {
        config.search.timeout = timeout;
    }
    if let Some(max_nodes) = max_nodes {
        config.search.max_nodes = max_nodes;
    }
    if optimize {
        config.search.mode = SearchMode::Best;
    }
    config.validate()?;
    Ok(config)
}

fn plan(path: &Path, config: PlannerConfig, format: Format) -> CliResult<()> {
    let request = Scenario::load(path)?.into_request()?;
    info!(
        scenario = %path.display(),
        nodes = request.source.node_count(),
        vms = request.source.vm_count(),
        "Scenario loaded"
    );

    let plan = Planner::with_config(config).plan(&request)?;
    plan.check_capacity()?;

    let rendered = match format {
        Format::Text => output::plan_text(&plan),
        Format::Json => output::plan_json(&plan)? + "\n",
    };
    print!("{}", rendered);
    Ok(())
}

fn check(path: &Path) -> CliResult<()> {
    let request = Scenario::load(path)?.into_request()?;
    let report = output::check_text(&request);
    print!("{}", report.text);

    if report.violations > 0 {
        warn!(violations = report.violations, "Source configuration is not viable");
        return Err(CliError::Violations(report.violations));
    }
    Ok(())
}
