//! Binary entry point for cardvault.
//!
//! This binary provides the CLI interface for the card catalog.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result, bail};
use cardvault::config::CardvaultConfig;
use cardvault::models::{Card, QueryResult};
use cardvault::observability::{self, InitOptions};
use cardvault::query::QueryOrchestrator;
use cardvault::security::{Identity, Role};
use cardvault::services::{BulkImportService, CatalogService, LoadReport, LoadTarget};
use cardvault::storage::{InMemoryEngine, PersistenceMode, PersistenceSwitch, RelationalEngine};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Cardvault - a card catalog with switchable storage and natural-language queries.
#[derive(Parser)]
#[command(name = "cardvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Persistence mode to start in (memory or relational).
    #[arg(short, long, global = true)]
    mode: Option<String>,

    /// Role of the caller (admin or user).
    #[arg(long, global = true, env = "CARDVAULT_ROLE", default_value = "user")]
    role: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List every card.
    List,

    /// Show one card.
    Get {
        /// Card id.
        id: String,
    },

    /// Add a card.
    Add(CardArgs),

    /// Replace a card.
    Update {
        /// Card id.
        id: String,

        #[command(flatten)]
        card: CardArgs,
    },

    /// Delete a card.
    Delete {
        /// Card id.
        id: String,
    },

    /// Remove every card from the active engine (admin only).
    Clear,

    /// Import the CSV dataset.
    Load {
        /// Target engines: memory, relational or both.
        #[arg(short, long, default_value = "both")]
        target: String,

        /// Dataset path (overrides configuration).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Show the active persistence mode.
    Mode,

    /// Ask a question about the catalog.
    Query {
        /// The query text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Print the result envelope as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the deterministic query rules.
    Rules,

    /// Interactive session over stdin.
    Shell,
}

/// Card attributes accepted by `add` and `update`.
#[derive(Args)]
struct CardArgs {
    /// Card name.
    #[arg(long)]
    name: String,

    /// Mana cost, e.g. {2}{U}.
    #[arg(long)]
    mana_cost: Option<String>,

    /// Type line.
    #[arg(long = "type")]
    card_type: Option<String>,

    /// Rarity.
    #[arg(long)]
    rarity: Option<String>,

    /// Set name.
    #[arg(long = "set")]
    set_name: Option<String>,

    /// Rules text.
    #[arg(long)]
    text: Option<String>,

    /// Power.
    #[arg(long)]
    power: Option<String>,

    /// Toughness.
    #[arg(long)]
    toughness: Option<String>,

    /// Image URL.
    #[arg(long)]
    image_url: Option<String>,

    /// Multiverse id.
    #[arg(long)]
    multiverse_id: Option<String>,
}

impl CardArgs {
    fn into_card(self) -> Card {
        let mut card = Card::new(self.name);
        card.mana_cost = self.mana_cost;
        card.card_type = self.card_type;
        card.rarity = self.rarity;
        card.set_name = self.set_name;
        card.text = self.text;
        card.power = self.power;
        card.toughness = self.toughness;
        card.image_url = self.image_url;
        card.multiverse_id = self.multiverse_id;
        card
    }
}

/// Services wired over one persistence switch.
struct App {
    catalog: CatalogService,
    importer: BulkImportService,
    orchestrator: QueryOrchestrator,
    identity: Identity,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CardvaultConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(
        &config.observability,
        InitOptions {
            verbose: cli.verbose,
        },
    ) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn bootstrap(cli: &Cli, config: &CardvaultConfig) -> Result<App> {
    let role: Role = cli.role.parse()?;
    let identity = Identity::new(whoami(), role);

    let memory = Arc::new(InMemoryEngine::new());
    let relational = RelationalEngine::open(&config.persistence.database_path);
    let switch = Arc::new(PersistenceSwitch::from_bootstrap(memory, relational));

    let mode = match &cli.mode {
        Some(mode) => mode.parse::<PersistenceMode>()?,
        None => config.persistence.mode,
    };
    switch
        .switch_mode(mode)
        .with_context(|| format!("cannot start in {mode} mode"))?;

    Ok(App {
        catalog: CatalogService::new(Arc::clone(&switch)),
        importer: BulkImportService::new(Arc::clone(&switch), &config.dataset.path),
        orchestrator: QueryOrchestrator::from_config(switch, config),
        identity,
    })
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "anonymous".to_string())
}

/// Runs the selected command.
async fn run_command(cli: Cli, config: CardvaultConfig) -> Result<()> {
    let mut app = bootstrap(&cli, &config)?;

    match cli.command {
        Commands::List => cmd_list(&app).await,
        Commands::Get { id } => cmd_get(&app, &id).await,
        Commands::Add(args) => {
            let card = app.catalog.add(&app.identity, args.into_card()).await?;
            println!("Card added: {}", card.id);
            Ok(())
        },
        Commands::Update { id, card } => {
            let card = card.into_card().with_id(id);
            let card = app.catalog.update(&app.identity, card).await?;
            println!("Card updated: {}", card.id);
            Ok(())
        },
        Commands::Delete { id } => {
            app.catalog.delete(&app.identity, &id).await?;
            println!("Card deleted: {id}");
            Ok(())
        },
        Commands::Clear => {
            app.catalog.clear(&app.identity).await?;
            println!("Catalog cleared ({})", app.catalog.mode());
            Ok(())
        },
        Commands::Load { target, path } => {
            if let Some(path) = path {
                app.importer = BulkImportService::new(app.catalog.switch(), path);
            }
            let target: LoadTarget = target.parse()?;
            cmd_load(&app, target).await
        },
        Commands::Mode => {
            println!("Active mode: {}", app.catalog.mode());
            Ok(())
        },
        Commands::Query { text, json } => {
            let result = app.orchestrator.process_query(&text.join(" ")).await;
            print_query_result(&result, json)
        },
        Commands::Rules => {
            print_rules(&app);
            Ok(())
        },
        Commands::Shell => cmd_shell(&app).await,
    }
}

async fn cmd_list(app: &App) -> Result<()> {
    let cards = app.catalog.list(&app.identity).await?;
    if cards.is_empty() {
        println!("No cards in the {} catalog.", app.catalog.mode());
        return Ok(());
    }

    println!("{} cards ({}):", cards.len(), app.catalog.mode());
    for card in &cards {
        let stats = if card.is_creature() {
            format!(
                " {}/{}",
                card.power.as_deref().unwrap_or("?"),
                card.toughness.as_deref().unwrap_or("?")
            )
        } else {
            String::new()
        };
        println!(
            "  {:<36}  {:<30}  {:<10}  {:<16}  {}{stats}",
            card.id.as_str(),
            card.name,
            card.mana_cost.as_deref().unwrap_or("-"),
            card.colors(),
            card.card_type.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_get(app: &App, id: &str) -> Result<()> {
    let Some(card) = app.catalog.get(&app.identity, id).await? else {
        bail!("card '{id}' not found");
    };
    println!("{}", serde_json::to_string_pretty(&card)?);
    Ok(())
}

async fn cmd_load(app: &App, target: LoadTarget) -> Result<()> {
    let reports = app.importer.trigger_load(&app.identity, target).await?;
    print_load_reports(&reports);

    if reports.iter().any(|r| r.success && r.target == PersistenceMode::Memory) {
        println!("Note: the memory engine lives only as long as this process; use 'shell' to query it.");
    }
    if reports.iter().all(|r| !r.success) {
        bail!("no engine was loaded");
    }
    Ok(())
}

fn print_load_reports(reports: &[LoadReport]) {
    for report in reports {
        if report.success {
            println!("  {}: loaded {} records", report.target, report.records_loaded);
        } else {
            println!(
                "  {}: failed ({})",
                report.target,
                report.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

fn print_query_result(result: &QueryResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{}", result.response);
    println!();
    println!(
        "[{}] {} result(s) in {}ms",
        result.router,
        result.result_count(),
        result.execution_time_ms
    );
    Ok(())
}

fn print_rules(app: &App) {
    println!("Query rules (first match wins):");
    for (i, rule) in app.orchestrator.available_rules().iter().enumerate() {
        println!("  {}. {rule}", i + 1);
    }
}

async fn cmd_shell(app: &App) -> Result<()> {
    println!(
        "cardvault shell ({} mode). Commands: :mode [memory|relational], :load [target], :rules, :quit",
        app.catalog.mode()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let head = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match head {
            ":quit" | ":q" | ":exit" => break,
            ":mode" => match arg {
                Some(mode) => match app.catalog.switch_mode(&app.identity, mode) {
                    Ok(mode) => println!("Switched to {mode} mode"),
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("Active mode: {}", app.catalog.mode()),
            },
            ":load" => match arg.unwrap_or("both").parse::<LoadTarget>() {
                Ok(target) => match app.importer.trigger_load(&app.identity, target).await {
                    Ok(reports) => print_load_reports(&reports),
                    Err(e) => println!("Error: {e}"),
                },
                Err(e) => println!("Error: {e}"),
            },
            ":rules" => print_rules(app),
            _ => {
                let result = app.orchestrator.process_query(line).await;
                print_query_result(&result, false)?;
            },
        }
    }
    Ok(())
}
