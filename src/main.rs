//! certone - timestamp-anchored content certificates

use anyhow::Context;
use certone::config::{AnchoringConfig, Config, PinataConfig, WebhookConfig, DEFAULT_VERIFICATION_URL};
use certone::handlers::AppState;
use certone::infrastructure::anchoring::{OtsCliBackend, ProcessRunner, ScratchArea};
use certone::infrastructure::database::{CertificateRepository, SqliteRepository};
use certone::rendering::{CertificateAssembler, RendererChain};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "certone")]
#[command(about = "Issue certificates of existence anchored with OpenTimestamps")]
struct Args {
    /// Host to bind to
    #[arg(long, env = "CERTONE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(long, env = "CERTONE_PORT", default_value = "3000")]
    port: u16,

    /// Path to SQLite certificate log
    #[arg(long, env = "CERTONE_DATABASE_PATH", default_value = "./certone.db")]
    database: String,

    /// OpenTimestamps client executable
    #[arg(long, env = "CERTONE_OTS_BINARY", default_value = "ots")]
    ots_binary: String,

    /// Directory for per-request scratch files
    #[arg(long, env = "CERTONE_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Directory where proofs are retained
    #[arg(long, env = "CERTONE_PROOF_DIR")]
    proof_dir: Option<PathBuf>,

    /// Timeout per `ots` invocation in seconds
    #[arg(long, env = "CERTONE_TOOL_TIMEOUT_SECS", default_value = "30")]
    tool_timeout_secs: u64,

    /// Human-facing verification page printed on certificates
    #[arg(long, env = "CERTONE_VERIFICATION_URL", default_value = DEFAULT_VERIFICATION_URL)]
    verification_url: String,

    /// Comma-separated renderer preference
    #[arg(long, env = "CERTONE_RENDERERS", default_value = "pdf,html", value_delimiter = ',')]
    renderers: Vec<String>,

    /// Log level
    #[arg(long, env = "CERTONE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "PINATA_API_KEY", hide_env_values = true)]
    pinata_api_key: Option<String>,

    #[arg(long, env = "PINATA_SECRET_KEY", hide_env_values = true)]
    pinata_secret_key: Option<String>,

    /// Outbound notification webhook (e.g. `id@hook.us2.make.com`)
    #[arg(long, env = "MAKE_WEBHOOK_URL")]
    webhook_url: Option<String>,

    #[arg(long, env = "MAKE_WEBHOOK_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    webhook_enabled: bool,
}

impl Args {
    fn into_config(self) -> Config {
        let defaults = AnchoringConfig::default();
        Config {
            host: self.host,
            port: self.port,
            database_path: self.database,
            log_level: self.log_level,
            renderers: self.renderers,
            anchoring: AnchoringConfig {
                ots_binary: self.ots_binary,
                scratch_dir: self.scratch_dir.unwrap_or(defaults.scratch_dir),
                proof_dir: self.proof_dir.unwrap_or(defaults.proof_dir),
                tool_timeout_secs: self.tool_timeout_secs,
                verification_url: self.verification_url,
            },
            pinata: PinataConfig::from_credentials(self.pinata_api_key, self.pinata_secret_key),
            webhook: WebhookConfig {
                url: self.webhook_url.filter(|u| !u.trim().is_empty()),
                enabled: self.webhook_enabled,
                ..WebhookConfig::default()
            },
        }
    }
}

/// Open the certificate log, falling back to an in-memory one.
fn open_repository(path: &str) -> anyhow::Result<Arc<dyn CertificateRepository>> {
    match SqliteRepository::new(path) {
        Ok(repo) => Ok(Arc::new(repo)),
        Err(e) => {
            tracing::warn!(path, error = %e, "Falling back to in-memory certificate log");
            let repo = SqliteRepository::new_in_memory().context("in-memory certificate log")?;
            Ok(Arc::new(repo))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting certone v{}", env!("CARGO_PKG_VERSION"));

    let repository = open_repository(&config.database_path)?;
    tracing::info!(
        "Certificate log initialized with {} certificates",
        repository.count_certificates().unwrap_or(0)
    );

    let chain = RendererChain::from_names(&config.renderers).context("invalid renderer list")?;
    CertificateAssembler::install(CertificateAssembler::new(chain));

    let runner = Arc::new(ProcessRunner::new(config.anchoring.tool_timeout()));
    let backend = Arc::new(OtsCliBackend::new(
        runner,
        config.anchoring.ots_binary.clone(),
        ScratchArea::new(&config.anchoring.scratch_dir),
    ));

    let state = Arc::new(AppState::build(
        &config,
        backend,
        repository,
        CertificateAssembler::shared(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let (bound, server) = certone::server::bind(addr, state, shutdown_signal())
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", bound);

    server.await.context("server error")?;
    Ok(())
}
