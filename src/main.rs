use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use disbursements_engine::{
    init_tracing, serve, Analyst, AppConfig, AppState, DisbursementStore, EngineError, LogFormat,
    Result, SqlGuard,
};

/// Read API and SQL assistant over a disbursements database.
#[derive(Debug, Parser)]
#[command(name = "disbursements", version, about)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "disbursements.toml")]
    config: PathBuf,

    /// Address to bind (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database file (overrides config).
    #[arg(long)]
    db: Option<String>,

    /// Verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format: pretty or json.
    #[arg(long)]
    log_format: Option<String>,
}

impl Cli {
    fn apply(&self, cfg: &mut AppConfig) {
        if let Some(host) = &self.host {
            cfg.server.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.server.port = port;
        }
        if let Some(db) = &self.db {
            cfg.database.path = db.clone();
        }
        match self.verbose {
            0 => {}
            1 => cfg.logging.level = "debug".into(),
            _ => cfg.logging.level = "trace".into(),
        }
        if let Some(format) = self.log_format.as_deref().and_then(LogFormat::parse) {
            cfg.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = AppConfig::from_env_or_file(&cli.config)?;
    cli.apply(&mut cfg);
    init_tracing(&cfg.logging)?;

    tracing::debug!(config = ?cli.config, "starting disbursements service");

    let store = Arc::new(DisbursementStore::open(&cfg.database.path, cfg.database.max_connections).await?);
    let guard = SqlGuard::new(disbursements_engine::schema::TABLE, cfg.database.row_ceiling);

    let mut state = AppState::new(store.clone());
    if cfg.model.is_configured() {
        state = state.with_analyst(Analyst::from_config(&cfg.model, store, guard)?);
        tracing::info!(model = %cfg.model.model, "natural-language endpoint enabled");
    } else {
        tracing::warn!("no OpenAI API key configured; /api/ask will report a configuration error");
    }

    let addr: SocketAddr = cfg
        .bind_address()
        .parse()
        .map_err(|err| EngineError::Config(format!("invalid bind address `{}`: {err}", cfg.bind_address())))?;
    serve(state, addr).await
}
