use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rentdesk_core::cli::{self, Cli, Commands, DbCommands, LedgerCommands, TenantCommands};
use rentdesk_core::config::{Config, LogFormat};
use rentdesk_core::{cors_layer, create_app, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Ledger(command) => {
            let pool = db::create_pool(&config).await?;
            let ledger = cli::postgres_ledger(pool, &config);
            match command {
                LedgerCommands::Verify {
                    transaction_id,
                    amount,
                    verifier,
                } => cli::handle_ledger_verify(&ledger, &transaction_id, amount, &verifier).await,
                LedgerCommands::Reject { transaction_id } => {
                    cli::handle_ledger_reject(&ledger, &transaction_id).await
                }
                LedgerCommands::Summary { tenant } => cli::handle_ledger_summary(&ledger, tenant).await,
            }
        }
        Commands::Tenant(TenantCommands::Onboard { tenant_id }) => {
            let pool = db::create_pool(&config).await?;
            let ledger = cli::postgres_ledger(pool, &config);
            cli::handle_tenant_onboard(&ledger, tenant_id).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool, Path::new("./migrations")).await?;

    let report = startup::validate_environment(&config, &pool).await?;
    if !report.is_valid() {
        report.print();
        anyhow::bail!("Startup validation failed");
    }

    let ledger = cli::postgres_ledger(pool, &config);
    let state = AppState::new(ledger, config.verifier_keys.clone());
    let app = create_app(state).layer(cors_layer(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
