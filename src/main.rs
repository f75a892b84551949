//! solflow command line
//!
//! Validates, compiles and executes workflows stored as JSON files or in the
//! local workflow store.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solflow::config::Config;
use solflow::execution::{ExecutionCoordinator, ExecutionUpdate};
use solflow::metrics::metrics;
use solflow::services::{HttpLiquidityService, JupiterClient, RpcLedger};
use solflow::tokens::TokenRegistry;
use solflow::tx_builder::{CompilerSettings, WorkflowCompiler};
use solflow::wallet::{WalletManager, WalletSigner};
use solflow::workflow::{ActionRecord, SledWorkflowStore, Workflow, WorkflowSnapshot, WorkflowStore};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the compile-ready node list and any skipped nodes
    Validate(Source),
    /// Compile to an unsigned transaction and print it as base64
    Compile {
        #[command(flatten)]
        source: Source,
        /// Fee payer; defaults to the configured wallet
        #[arg(long)]
        payer: Option<String>,
    },
    /// Compile, sign, send and confirm
    Execute(Source),
    /// Store a workflow file under a key
    Import {
        file: String,
        /// Store key; defaults to the workflow id
        #[arg(long)]
        key: Option<String>,
    },
    /// List stored workflows
    List,
}

#[derive(ClapArgs, Debug)]
struct Source {
    /// Workflow JSON file
    #[arg(short, long, conflicts_with = "key")]
    workflow: Option<String>,
    /// Key of a stored workflow
    #[arg(short, long)]
    key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config, cli.verbose)?;

    info!("🚀 solflow {}", env!("CARGO_PKG_VERSION"));

    let result = match &cli.command {
        Command::Validate(source) => validate(&config, source),
        Command::Compile { source, payer } => compile(&config, source, payer.as_deref()).await,
        Command::Execute(source) => execute(&config, source).await,
        Command::Import { file, key } => import(&config, file, key.as_deref()),
        Command::List => list(&config),
    };

    if config.monitoring.enable_metrics && config.monitoring.print_metrics_on_exit {
        match metrics().encode_text() {
            Ok(text) => println!("{}", text),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }
    result
}

fn validate(config: &Config, source: &Source) -> Result<()> {
    let workflow = load_workflow(config, source)?;
    let snapshot = WorkflowSnapshot::capture(&workflow);
    print_snapshot(&snapshot);
    Ok(())
}

async fn compile(config: &Config, source: &Source, payer: Option<&str>) -> Result<()> {
    let workflow = load_workflow(config, source)?;
    let snapshot = WorkflowSnapshot::capture(&workflow);
    print_snapshot(&snapshot);

    let payer = match payer {
        Some(key) => Pubkey::from_str(key).with_context(|| format!("Invalid payer: {}", key))?,
        None => load_wallet(config)?.pubkey(),
    };

    let compiler = build_compiler(config)?;
    let compiled = compiler.compile(&snapshot, &payer).await?;

    info!(
        "✅ Compiled {} instructions (unit limit: {:?}, unit price: {})",
        compiled.instructions.len(),
        compiled.unit_limit,
        compiled.unit_price
    );
    for span in &compiled.node_spans {
        println!(
            "node {} '{}' ({}): instructions {}..{}",
            span.order_id, span.node_id, span.kind, span.range.start, span.range.end
        );
    }
    println!("signers: {:?}", compiled.required_signers());
    println!("{}", compiled.to_base64()?);
    Ok(())
}

async fn execute(config: &Config, source: &Source) -> Result<()> {
    let workflow = load_workflow(config, source)?;
    let snapshot = WorkflowSnapshot::capture(&workflow);
    print_snapshot(&snapshot);

    let wallet: Arc<dyn WalletSigner> = Arc::new(load_wallet(config)?);
    let compiler = Arc::new(build_compiler(config)?);

    let (tx, mut rx) = mpsc::channel::<ExecutionUpdate>(16);
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            match update.signature {
                Some(signature) => println!("{:<10} {:<8} {}", update.step, update.status, signature),
                None => println!("{:<10} {}", update.step, update.status),
            }
        }
    });

    let coordinator = ExecutionCoordinator::new(compiler, wallet).with_updates(tx);
    let outcome = coordinator.execute(&snapshot).await;
    drop(coordinator);
    printer.await.context("Update printer panicked")?;

    match outcome {
        Ok(report) => {
            info!("🎉 Confirmed: {}", report.signature);
            Ok(())
        }
        Err(failure) => {
            if let Some(signature) = failure.signature() {
                warn!("Transaction {} was submitted before the failure", signature);
            }
            Err(failure.into())
        }
    }
}

fn import(config: &Config, file: &str, key: Option<&str>) -> Result<()> {
    let workflow = read_workflow_file(file)?;
    let key = key.unwrap_or(&workflow.id).to_string();
    let store = open_store(config)?;
    store.save(&key, &workflow)?;
    info!("💾 Stored workflow '{}' ({} actions) as '{}'", workflow.name, workflow.actions.len(), key);
    Ok(())
}

fn list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    for key in store.list()? {
        match store.load(&key)? {
            Some(workflow) => println!("{}\t{}\t{} actions", key, workflow.name, workflow.actions.len()),
            None => println!("{}", key),
        }
    }
    Ok(())
}

fn print_snapshot(snapshot: &WorkflowSnapshot) {
    info!(
        "📋 Workflow '{}': {} nodes, {} skipped",
        snapshot.name,
        snapshot.len(),
        snapshot.warnings().len()
    );
    for node in snapshot.nodes() {
        println!("{}", node);
    }
    for warning in snapshot.warnings() {
        warn!("{}", warning);
    }
}

fn build_compiler(config: &Config) -> Result<WorkflowCompiler> {
    let ledger = Arc::new(RpcLedger::from_config(&config.rpc));
    let quote = Arc::new(JupiterClient::new(&config.quote).context("Failed to create quote client")?);
    let liquidity = Arc::new(
        HttpLiquidityService::new(&config.liquidity).context("Failed to create liquidity client")?,
    );
    let tokens = Arc::new(TokenRegistry::with_overrides(&config.tokens));

    Ok(WorkflowCompiler::new(
        ledger,
        quote,
        liquidity,
        tokens,
        CompilerSettings::from_config(config),
    ))
}

fn load_wallet(config: &Config) -> Result<WalletManager> {
    info!("🔑 Loading wallet from: {}", config.wallet.keypair_path);
    let wallet =
        WalletManager::from_file(&config.wallet.keypair_path).context("Failed to load wallet")?;
    info!("💼 Wallet address: {}", wallet.pubkey());
    Ok(wallet)
}

fn open_store(config: &Config) -> Result<SledWorkflowStore> {
    SledWorkflowStore::open(&config.storage.path)
        .with_context(|| format!("Failed to open workflow store at {}", config.storage.path))
}

fn load_workflow(config: &Config, source: &Source) -> Result<Workflow> {
    match (&source.workflow, &source.key) {
        (Some(file), _) => read_workflow_file(file),
        (None, Some(key)) => open_store(config)?
            .load(key)?
            .with_context(|| format!("No stored workflow named '{}'", key)),
        (None, None) => bail!("Pass --workflow <file> or --key <key>"),
    }
}

/// Accepts a full workflow document or a bare array of actions
fn read_workflow_file(path: &str) -> Result<Workflow> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file: {}", path))?;
    if let Ok(workflow) = serde_json::from_str::<Workflow>(&text) {
        return Ok(workflow);
    }

    let actions: Vec<ActionRecord> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse workflow file: {}", path))?;
    let id = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("workflow")
        .to_string();
    let mut workflow = Workflow::new(id.clone(), id);
    workflow.actions = actions;
    Ok(workflow)
}

fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "solflow=debug,info".to_string()
    } else {
        format!("solflow={},warn", config.monitoring.log_level)
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    let initialised = if config.monitoring.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    initialised.context("Failed to initialise logging")?;

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    let config = if Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))?
    } else {
        eprintln!("Config file '{}' not found, using defaults", path);
        Config::from_env()
    };
    config.validate()?;
    Ok(config)
}
