use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use optimoldiq::prelude::*;
use optimoldiq::workflow::Discovery;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "optimoldiq")]
#[command(about = "Inspect and validate OptiMoldIQ workflow definitions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Orchestrator config file (orchestrator.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workflows directory (overrides the config)
    #[arg(short, long, global = true)]
    workflows: Option<PathBuf>,

    /// External module registry file (overrides the config)
    #[arg(short, long, global = true)]
    registry: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered workflows
    List,

    /// Print a workflow definition as JSON
    Info {
        #[arg(value_name = "WORKFLOW")]
        name: String,
    },

    /// Validate every workflow in the workflows directory
    Validate,

    /// List available dependency policies
    Policies,

    /// Print the parameter schema of a dependency policy
    Schema {
        #[arg(value_name = "POLICY")]
        policy: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "optimoldiq=debug" } else { "optimoldiq=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries command output only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from(2)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<OrchestratorConfig> {
    let mut config = match &cli.config {
        Some(path) => OrchestratorConfig::load(path)?,
        None => OrchestratorConfig::default(),
    };
    if let Some(dir) = &cli.workflows {
        config.workflows_dir = dir.clone();
    }
    if let Some(registry) = &cli.registry {
        config.module_registry = Some(registry.clone());
    }
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    match &cli.command {
        Commands::List => {
            let config = load_config(&cli)?;
            let orchestrator = Orchestrator::from_config(&config, ModuleRegistry::new())?;
            for name in orchestrator.list_workflows() {
                let info = orchestrator.get_workflow_info(&name)?;
                match &info.description {
                    Some(desc) => println!("{:<30} {} modules  {}", name, info.modules.len(), desc),
                    None => println!("{:<30} {} modules", name, info.modules.len()),
                }
            }
            Ok(true)
        }
        Commands::Info { name } => {
            let config = load_config(&cli)?;
            let orchestrator = Orchestrator::from_config(&config, ModuleRegistry::new())?;
            let info = orchestrator.get_workflow_info(name)?;
            println!("{}", serde_json::to_string_pretty(info)?);
            Ok(true)
        }
        Commands::Validate => {
            let config = load_config(&cli)?;
            let discovery: Discovery = WorkflowLoader::discover(&config.workflows_dir)?;

            for name in discovery.workflows.keys() {
                println!("ok       {}", name);
            }
            for path in &discovery.skipped {
                println!("skipped  {} (invalid JSON)", path.display());
            }
            for problem in &discovery.problems {
                println!("error    {}", problem);
            }
            Ok(discovery.problems.is_empty())
        }
        Commands::Policies => {
            for (kind, description) in DependencyPolicyFactory::list_policies() {
                println!("{:<10} {}", kind.as_str(), description);
            }
            Ok(true)
        }
        Commands::Schema { policy } => {
            let schema = DependencyPolicyFactory::get_schema_by_name(policy)?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(true)
        }
    }
}
