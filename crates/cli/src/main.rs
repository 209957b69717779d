// BOVINEXT CLI - API server and offline settlement tools

mod exit_codes;

use std::fs;
use std::io::{self, ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use bovinext_config::{ConfigError, Settings};
use bovinext_core::address::RandomAddressGenerator;
use bovinext_core::quote::{best_quote, packer_quote};
use bovinext_core::wallet::transfer_fee;
use bovinext_core::{compute_settlement, AnimalForSale, CoreError, Repository};
use bovinext_gateway::{ledger_from_settings, ChainedIdentityResolver, GatewayError};
use bovinext_protocol::{QuoteResponse, SettlementResponse};
use bovinext_server::AppState;
use bovinext_store::{MemoryStore, SqliteStore};

use exit_codes::{
    core_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_IO, EXIT_PARSE, EXIT_SERVE_BIND,
    EXIT_SERVE_RUNTIME, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "bovinext")]
#[command(about = "Livestock settlement and wallet API")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    #[command(after_help = "\
Examples:
  bovinext serve
  bovinext serve --config ./settings.toml --bind 0.0.0.0:3001
  BOVINEXT_DATABASE=/var/lib/bovinext/db.sqlite bovinext serve
  RUST_LOG=debug bovinext serve --memory")]
    Serve {
        /// Settings file (default: <config dir>/bovinext/settings.toml)
        #[arg(long, env = "BOVINEXT_CONFIG")]
        config: Option<PathBuf>,

        /// Listen address, overrides [server] bind
        #[arg(long)]
        bind: Option<String>,

        /// Keep all data in memory (nothing survives a restart)
        #[arg(long)]
        memory: bool,
    },

    /// Compute a sale settlement from a JSON file of animals
    #[command(after_help = "\
Input is a JSON array of animals:
  [{\"id\": \"a1\", \"weight_kg\": 520, \"acquisition_cost\": 2800, \"accumulated_cost\": 450}]

Examples:
  bovinext settle lot.json --price 285.50
  cat lot.json | bovinext settle - --price 285.50 --json")]
    Settle {
        /// Animals file, or - for stdin
        file: PathBuf,

        /// Price per arroba (15 kg)
        #[arg(long)]
        price: Decimal,

        /// Print the API response body instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the network fee and total debit for a transfer amount
    Fee {
        amount: Decimal,

        #[arg(long)]
        json: bool,
    },

    /// Quote a category at a packer, or "best" for the highest price
    #[command(after_help = "\
Examples:
  bovinext quote JBS BOI
  bovinext quote best VACA --json")]
    Quote {
        /// JBS, MARFRIG, MINERVA or best
        packer: String,

        /// BOI or VACA
        category: String,

        #[arg(long)]
        json: bool,
    },

    /// Database maintenance
    #[command(subcommand)]
    Db(DbCommands),
}

#[derive(Subcommand)]
enum DbCommands {
    /// Create the database file and apply the schema
    Init {
        /// Database file (default: [database] path from settings)
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(long, env = "BOVINEXT_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("BOVINEXT_COMMIT"), ")",
        "\napi:     v1",
        "\ntarget:  ", env!("BOVINEXT_TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config, bind, memory } => cmd_serve(config, bind, memory),
        Commands::Settle { file, price, json } => cmd_settle(&file, price, json),
        Commands::Fee { amount, json } => cmd_fee(amount, json),
        Commands::Quote { packer, category, json } => cmd_quote(&packer, &category, json),
        Commands::Db(DbCommands::Init { path, config }) => cmd_db_init(path, config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(EXIT_PARSE, msg)
    }

    pub fn config(err: ConfigError) -> Self {
        Self::new(EXIT_CONFIG, err.to_string())
            .with_hint("see [auth], [ledger] and [database] in settings.toml")
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        Self::new(core_exit_code(&err), err.to_string())
    }
}

impl From<GatewayError> for CliError {
    fn from(err: GatewayError) -> Self {
        Self::new(EXIT_ERROR, err.to_string())
    }
}

fn emit_json(value: &impl serde::Serialize) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// ============================================================================
// serve
// ============================================================================

fn cmd_serve(config: Option<PathBuf>, bind: Option<String>, memory: bool) -> Result<(), CliError> {
    let mut settings = Settings::load(config.as_deref()).map_err(CliError::config)?;
    if let Some(bind) = bind {
        settings.server.bind = bind;
    }
    if memory {
        settings.database.in_memory = true;
    }

    bovinext_server::init_tracing(settings.log.format);

    // Blocking HTTP clients are built and finally dropped outside the runtime.
    let state = build_state(&settings)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::new(EXIT_SERVE_RUNTIME, format!("cannot start runtime: {e}")))?;

    let bind = settings.server.bind.clone();
    let served = runtime.block_on({
        let state = state.clone();
        async move {
            let listener = tokio::net::TcpListener::bind(&bind).await.map_err(|e| {
                CliError::new(EXIT_SERVE_BIND, format!("cannot bind {bind}: {e}"))
                    .with_hint("pass --bind or set BOVINEXT_BIND")
            })?;
            bovinext_server::serve(listener, state)
                .await
                .map_err(|e| CliError::new(EXIT_SERVE_RUNTIME, e.to_string()))
        }
    });

    drop(runtime);
    drop(state);
    served
}

fn build_state(settings: &Settings) -> Result<AppState, CliError> {
    let repo: Arc<dyn Repository> = if settings.database.in_memory {
        info!("using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let path = &settings.database.path;
        info!(path = %path.display(), "opening database");
        Arc::new(open_database(path)?)
    };

    let identities = ChainedIdentityResolver::from_settings(&settings.auth)?;
    let ledger = ledger_from_settings(&settings.ledger)?;
    if settings.ledger.url.is_none() {
        info!("no ledger configured; balances come from the store");
    }

    Ok(AppState::new(
        repo,
        Arc::new(identities),
        ledger,
        Arc::new(RandomAddressGenerator),
    ))
}

fn open_database(path: &Path) -> Result<SqliteStore, CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| CliError::io(format!("cannot create {}: {e}", parent.display())))?;
    }
    SqliteStore::open(path)
        .map_err(|e| CliError::io(format!("cannot open database {}: {e}", path.display())))
}

// ============================================================================
// settle
// ============================================================================

fn read_input(file: &Path) -> Result<String, CliError> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| CliError::io(format!("cannot read stdin: {e}")))?;
        return Ok(text);
    }
    fs::read_to_string(file).map_err(|e| match e.kind() {
        IoErrorKind::NotFound => CliError::new(EXIT_USAGE, format!("file not found: {}", file.display())),
        _ => CliError::io(format!("cannot read {}: {e}", file.display())),
    })
}

fn cmd_settle(file: &Path, price: Decimal, json: bool) -> Result<(), CliError> {
    let text = read_input(file)?;
    let animals: Vec<AnimalForSale> = serde_json::from_str(&text).map_err(|e| {
        CliError::parse(format!("invalid animals file: {e}"))
            .with_hint("expected a JSON array of {id, weight_kg, acquisition_cost, accumulated_cost}")
    })?;

    let result = compute_settlement(&animals, price)?;
    if json {
        return emit_json(&SettlementResponse::from(&result));
    }

    let shown = result.rounded();
    let rows = [
        ("animals", Decimal::from(shown.animal_count)),
        ("weight_kg", shown.total_weight_kg),
        ("arrobas", shown.arrobas),
        ("gross", shown.gross_value),
        ("funrural", shown.taxes.funrural),
        ("icms", shown.taxes.icms),
        ("outros", shown.taxes.outros),
        ("taxes", shown.taxes.total),
        ("net", shown.net_value),
        ("cost", shown.cost_basis),
        ("profit", shown.net_profit),
        ("margin_pct", shown.margin_percent),
    ];

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (label, value) in rows {
        writeln!(out, "{:<12} {:>14}", label, value).map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// fee
// ============================================================================

fn cmd_fee(amount: Decimal, json: bool) -> Result<(), CliError> {
    let quote = transfer_fee(amount)?;
    if json {
        return emit_json(&quote);
    }
    println!("amount {}", quote.amount);
    println!("fee    {}", quote.fee);
    println!("total  {}", quote.total);
    Ok(())
}

// ============================================================================
// quote
// ============================================================================

fn cmd_quote(packer: &str, category: &str, json: bool) -> Result<(), CliError> {
    let now = Utc::now();
    let quote = if packer.eq_ignore_ascii_case("best") {
        best_quote(category, now)?
    } else {
        packer_quote(packer, category, now)?
    };

    let body = QuoteResponse::from(&quote);
    if json {
        return emit_json(&body);
    }
    println!(
        "{} {} {} per arroba (valid until {})",
        body.frigorifico, body.categoria, body.preco, body.validade
    );
    Ok(())
}

// ============================================================================
// db init
// ============================================================================

fn cmd_db_init(path: Option<PathBuf>, config: Option<PathBuf>) -> Result<(), CliError> {
    let path = match path {
        Some(p) => p,
        None => {
            // Only the database path matters here; auth need not be configured.
            let file = config.or_else(|| Some(Settings::config_path()).filter(|p| p.exists()));
            let mut settings = match file {
                Some(p) => Settings::from_file(&p).map_err(CliError::config)?,
                None => Settings::default(),
            };
            settings.apply_env(|key| std::env::var(key).ok());
            settings.database.path
        }
    };

    open_database(&path)?;
    println!("initialized {}", path.display());
    Ok(())
}
