use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use lattice_client::HttpWorkflowClient;
use lattice_components::{ComponentLookup, ComponentStore, WorkflowSettings, WorkflowStore};
use lattice_config::Config;
use lattice_resource_id::{ComponentId, WorkflowId};

/// Lattice - manage the actions and triggers of Logic App workflows
#[derive(Parser)]
#[command(name = "lattice")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the config file (default: ~/.lattice/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Log at debug level (overrides RUST_LOG)
  #[arg(long, short, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Manage an action or trigger inside a workflow
  Component {
    #[command(subcommand)]
    command: ComponentCommand,
  },

  /// Trigger-only operations
  Trigger {
    #[command(subcommand)]
    command: TriggerCommand,
  },

  /// Manage the parent workflow
  Workflow {
    #[command(subcommand)]
    command: WorkflowCommand,
  },
}

#[derive(Subcommand)]
enum ComponentCommand {
  /// Print a component body
  Get {
    /// Component resource id (.../workflows/{name}/actions/{name} or .../triggers/{name})
    id: ComponentId,
  },

  /// Write a component body read from stdin
  Put {
    /// Component resource id
    id: ComponentId,

    /// Fail instead of overwriting an existing component
    #[arg(long)]
    create: bool,
  },

  /// Remove a component (succeeds if it is already gone)
  Delete {
    /// Component resource id
    id: ComponentId,
  },
}

#[derive(Subcommand)]
enum TriggerCommand {
  /// Print the URL that invokes a trigger
  CallbackUrl {
    /// Trigger resource id
    id: ComponentId,
  },
}

#[derive(Subcommand)]
enum WorkflowCommand {
  /// Print the workflow settings
  Get {
    /// Workflow resource id
    id: WorkflowId,
  },

  /// Create a workflow from settings read from stdin
  Create {
    /// Workflow resource id
    id: WorkflowId,
  },

  /// Replace the settings of a workflow, keeping its actions and triggers
  Update {
    /// Workflow resource id
    id: WorkflowId,
  },

  /// Delete a workflow (succeeds if it is already gone)
  Delete {
    /// Workflow resource id
    id: WorkflowId,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let Some(command) = cli.command else {
    println!("lattice - use --help to see available commands");
    return Ok(());
  };

  let config_path = match cli.config {
    Some(path) => path,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".lattice")
      .join("config.json"),
  };
  let config = Config::load_or_default(&config_path)
    .with_context(|| format!("failed to load config: {}", config_path.display()))?
    .with_env_overrides()
    .context("invalid configuration override")?;

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run(command, config).await })
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

async fn run(command: Commands, config: Config) -> Result<()> {
  let client = HttpWorkflowClient::from_env(&config).context("failed to create workflow client")?;

  let cancel = CancellationToken::new();
  {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, cancelling");
        cancel.cancel();
      }
    });
  }

  match command {
    Commands::Component { command } => run_component(ComponentStore::new(client), command, cancel).await,
    Commands::Trigger {
      command: TriggerCommand::CallbackUrl { id },
    } => {
      let url = ComponentStore::new(client)
        .trigger_callback_url(&id, cancel)
        .await
        .with_context(|| format!("failed to get callback URL for {id}"))?;
      println!("{url}");
      Ok(())
    }
    Commands::Workflow { command } => run_workflow(WorkflowStore::new(client), command, cancel).await,
  }
}

async fn run_component(
  store: ComponentStore<HttpWorkflowClient>,
  command: ComponentCommand,
  cancel: CancellationToken,
) -> Result<()> {
  match command {
    ComponentCommand::Get { id } => {
      let lookup = store
        .read(&id, cancel)
        .await
        .with_context(|| format!("failed to read {id}"))?;

      match lookup {
        ComponentLookup::Found { body, .. } => {
          println!("{}", serde_json::to_string_pretty(&body)?);
        }
        ComponentLookup::ComponentMissing { .. } => {
          bail!("{} {:?} does not exist in workflow {}", id.kind, id.name, id.workflow);
        }
        ComponentLookup::WorkflowMissing => {
          bail!("workflow {} does not exist", id.workflow);
        }
      }
    }
    ComponentCommand::Put { id, create } => {
      let body = read_json_from_stdin()?;
      let written = store
        .upsert(&id, body, create, cancel)
        .await
        .with_context(|| format!("failed to write {id}"))?;
      println!("{written}");
    }
    ComponentCommand::Delete { id } => {
      store
        .remove(&id, cancel)
        .await
        .with_context(|| format!("failed to delete {id}"))?;
    }
  }

  Ok(())
}

async fn run_workflow(
  store: WorkflowStore<HttpWorkflowClient>,
  command: WorkflowCommand,
  cancel: CancellationToken,
) -> Result<()> {
  match command {
    WorkflowCommand::Get { id } => {
      let settings = store
        .read(&id, cancel)
        .await
        .with_context(|| format!("failed to read workflow {id}"))?;

      match settings {
        Some(settings) => println!("{}", serde_json::to_string_pretty(&settings)?),
        None => bail!("workflow {id} does not exist"),
      }
    }
    WorkflowCommand::Create { id } => {
      let settings = read_settings_from_stdin()?;
      let created = store
        .create(&id, &settings, cancel)
        .await
        .with_context(|| format!("failed to create workflow {id}"))?;
      println!("{created}");
    }
    WorkflowCommand::Update { id } => {
      let settings = read_settings_from_stdin()?;
      store
        .update_settings(&id, &settings, cancel)
        .await
        .with_context(|| format!("failed to update workflow {id}"))?;
    }
    WorkflowCommand::Delete { id } => {
      store
        .delete(&id, cancel)
        .await
        .with_context(|| format!("failed to delete workflow {id}"))?;
    }
  }

  Ok(())
}

fn read_settings_from_stdin() -> Result<WorkflowSettings> {
  let value = read_json_from_stdin()?;
  serde_json::from_value(value).context("invalid workflow settings")
}

fn read_json_from_stdin() -> Result<serde_json::Value> {
  if io::stdin().is_terminal() {
    bail!("expected a JSON document on stdin");
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read stdin")?;

  if input.trim().is_empty() {
    bail!("expected a JSON document on stdin, got nothing");
  }
  serde_json::from_str(&input).context("failed to parse JSON from stdin")
}
