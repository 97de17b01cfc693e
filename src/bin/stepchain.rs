//! # Stepchain
//!
//! Command-line entry point: runs the scheduler daemon against PostgreSQL and offers
//! workflow creation and inspection from the shell.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stepchain_core::config::ConfigManager;
use stepchain_core::database::{create_pool, run_migrations};
use stepchain_core::logging::init_structured_logging;
use stepchain_core::orchestration::{
    StepScheduler, WorkflowInitializer, WorkflowInspector, WorkflowRecipe,
};
use stepchain_core::store::{PgStepStore, StepStore};
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "stepchain")]
#[command(about = "Run and inspect dependent workflow steps")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration directory (default: $STEPCHAIN_CONFIG_DIR or ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment name (default: $STEPCHAIN_ENV, $APP_ENV or development)
    #[arg(short, long)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Run,

    /// Create a workflow from a YAML recipe
    Create {
        #[arg(short, long)]
        recipe: PathBuf,

        /// JSON object attached to every step
        #[arg(short, long)]
        payload: Option<String>,
    },

    /// List every workflow with its steps
    List,

    /// Show all steps of the workflow a step belongs to
    Show { step_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &environment)
        .context("loading configuration")?;
    let config = manager.config();

    init_structured_logging(&config.logging, manager.environment());

    let pool = create_pool(&config.database)
        .await
        .context("connecting to database")?;
    if config.database.run_migrations {
        run_migrations(&pool).await.context("running migrations")?;
    }
    let store: Arc<dyn StepStore> = Arc::new(PgStepStore::new(pool));

    match cli.command {
        Commands::Run => {
            let scheduler = StepScheduler::from_config(store, config);
            if !config.scheduler.enabled {
                info!("Scheduler disabled by configuration; exiting");
                return Ok(());
            }
            scheduler
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Failed to listen for shutdown signal");
                    }
                })
                .await;
        }
        Commands::Create { recipe, payload } => {
            let payload = match payload {
                Some(raw) => serde_json::from_str(&raw).context("parsing --payload")?,
                None => serde_json::json!({}),
            };
            let request = WorkflowRecipe::from_file(&recipe)?.into_request(payload);
            let result = WorkflowInitializer::new(store).create_workflow(request).await?;
            print_json(&result)?;
        }
        Commands::List => {
            let workflows = WorkflowInspector::new(store).list_workflows().await?;
            print_json(&serde_json::json!({
                "workflows": workflows,
                "total_workflows": workflows.len(),
            }))?;
        }
        Commands::Show { step_id } => {
            match WorkflowInspector::new(store).related_steps(step_id).await? {
                Some(summary) => print_json(&summary)?,
                None => anyhow::bail!("no step with id {step_id}"),
            }
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
