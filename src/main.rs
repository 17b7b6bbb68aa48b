mod workflows;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stategraph_core::config::{AppConfig, API_KEY_ENV};
use stategraph_graph::CompiledGraph;

use workflows::calculator::CalculatorState;
use workflows::greeting::GreetingState;
use workflows::looping::LoopState;
use workflows::process::{Operation, ProcessState};

#[derive(Parser)]
#[command(name = "stategraph", version, about = "Small stateful workflows on a graph executor")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "stategraph.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Greet someone: greeting -> END
    Greeting {
        #[arg(long, default_value = "Alice")]
        name: String,
    },
    /// Sum or multiply a list of values
    Process {
        #[arg(long, default_value = "Alice")]
        name: String,
        /// `+` or `*`
        #[arg(long, default_value = "+")]
        operation: String,
        /// Values to combine
        #[arg(default_values_t = vec![1, 2, 3, 4, 5], allow_negative_numbers = true)]
        values: Vec<i64>,
    },
    /// Add or subtract two numbers through a routed graph
    Calculator {
        #[arg(long, allow_negative_numbers = true)]
        number1: f64,
        #[arg(long, allow_negative_numbers = true)]
        number2: f64,
        /// `+` or `-`
        #[arg(long, default_value = "+")]
        operation: String,
    },
    /// Greet, then draw random numbers in a loop until the counter reaches five
    Loop {
        #[arg(long, default_value = "Vaibhav")]
        name: String,
    },
    /// Chat with the configured model, one graph run per line
    Chat,
    /// Print a workflow as a Mermaid flowchart
    Graph {
        #[arg(value_enum)]
        workflow: Workflow,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Workflow {
    Greeting,
    Process,
    Calculator,
    Loop,
    Chat,
}

const DEFAULT_LOG_FILTER: &str = "stategraph=info,warn";

/// Load `.env` (from `env_file`, or the nearest one found), then build the
/// log filter so a `RUST_LOG` set there takes effect. A missing file is fine.
fn load_env(env_file: Option<&Path>) -> EnvFilter {
    let _ = match env_file {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(load_env(None))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_env(&cli.config)?;

    match cli.command {
        Commands::Greeting { name } => {
            let graph = workflows::greeting::build()?.with_config(&config.graph);
            run_once(&graph, GreetingState::new(name)).await?;
        }
        Commands::Process {
            name,
            operation,
            values,
        } => {
            let operation: Operation = operation.parse()?;
            let graph = workflows::process::build()?.with_config(&config.graph);
            run_once(&graph, ProcessState::new(name, operation, values)).await?;
        }
        Commands::Calculator {
            number1,
            number2,
            operation,
        } => {
            let graph = workflows::calculator::build()?.with_config(&config.graph);
            run_once(&graph, CalculatorState::new(number1, number2, operation)).await?;
        }
        Commands::Loop { name } => {
            let graph = workflows::looping::build()?.with_config(&config.graph);
            run_once(&graph, LoopState::new(name)).await?;
        }
        Commands::Chat => {
            if config.model.api_key.is_none() {
                anyhow::bail!(
                    "No API key configured. Set {} or model.api_key in {}",
                    API_KEY_ENV,
                    cli.config.display()
                );
            }
            info!(model = %config.model.model_id, provider = %config.model.provider, "Starting chat");
            let graph = build_chat(&config)?;
            let stdin = std::io::stdin();
            workflows::chat::run_repl(&graph, stdin.lock(), std::io::stdout()).await?;
        }
        Commands::Graph { workflow } => {
            let diagram = match workflow {
                Workflow::Greeting => workflows::greeting::build()?.to_mermaid(),
                Workflow::Process => workflows::process::build()?.to_mermaid(),
                Workflow::Calculator => workflows::calculator::build()?.to_mermaid(),
                Workflow::Loop => workflows::looping::build()?.to_mermaid(),
                Workflow::Chat => build_chat(&config)?.to_mermaid(),
            };
            print!("{}", diagram);
        }
    }

    Ok(())
}

fn build_chat(config: &AppConfig) -> anyhow::Result<CompiledGraph<workflows::chat::ChatState>> {
    let client = stategraph_llm::create_client(&config.model)?;
    let graph = workflows::chat::build(Arc::from(client), config.model.clone())?;
    Ok(graph.with_config(&config.graph))
}

/// Invoke `graph` once, printing the initial and final state.
async fn run_once<S>(graph: &CompiledGraph<S>, initial: S) -> anyhow::Result<()>
where
    S: Serialize + Send + 'static,
{
    println!("Initial state: {}", serde_json::to_string_pretty(&initial)?);
    let report = graph.invoke_with_report(initial).await?;
    info!(
        path = %report.path().join(" -> "),
        elapsed_ms = report.total_elapsed_ms,
        "Workflow finished"
    );
    println!("Final output : {}", serde_json::to_string_pretty(&report.state)?);
    Ok(())
}
