use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::services::Ledger;

#[derive(Parser)]
#[command(name = "rentdesk-core")]
#[command(about = "Rentdesk Core - rent ledger and payment verification service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,

    /// Payment verification commands
    #[command(subcommand)]
    Ledger(LedgerCommands),

    /// Tenant lifecycle commands
    #[command(subcommand)]
    Tenant(TenantCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Verify a submitted payment and allocate it across outstanding obligations
    Verify {
        /// Transaction reference quoted by the tenant
        #[arg(value_name = "TRANSACTION_ID")]
        transaction_id: String,

        /// Amount actually received
        #[arg(value_name = "AMOUNT")]
        amount: BigDecimal,

        /// Identity recorded as the verifier
        #[arg(short, long)]
        verifier: String,
    },

    /// Delete a pending payment claim
    Reject {
        #[arg(value_name = "TRANSACTION_ID")]
        transaction_id: String,
    },

    /// Print paid, pending and overdue totals
    Summary {
        /// Restrict the summary to one tenant
        #[arg(short, long)]
        tenant: Option<Uuid>,
    },
}

#[derive(Subcommand)]
pub enum TenantCommands {
    /// Open the first rent cycle for a newly onboarded tenant
    Onboard {
        #[arg(value_name = "TENANT_ID")]
        tenant_id: Uuid,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool, std::path::Path::new("./migrations")).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    let mut verifiers: Vec<&str> = config.verifier_keys.values().map(String::as_str).collect();
    verifiers.sort_unstable();

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Database Max Connections: {}", config.database_max_connections);
    if verifiers.is_empty() {
        println!("  Verifiers: none (serve requires VERIFIER_API_KEYS)");
    } else {
        println!("  Verifiers: {}", verifiers.join(", "));
    }
    println!(
        "  CORS Allowed Origins: {}",
        config
            .cors_allowed_origins
            .as_ref()
            .map(|origins| origins.join(", "))
            .unwrap_or_else(|| "*".to_string())
    );
    println!("  Summary Cache TTL: {}s", config.summary_cache_ttl_secs);
    println!("  Log Format: {:?}", config.log_format);

    crate::startup::validate_env_vars(config)?;

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

pub async fn handle_ledger_verify(
    ledger: &Ledger,
    transaction_id: &str,
    amount: BigDecimal,
    verifier: &str,
) -> anyhow::Result<()> {
    let receipt = ledger
        .verifications
        .verify(transaction_id, amount, verifier)
        .await?;

    println!(
        "✓ Transaction {} verified for tenant {}",
        receipt.transaction.external_ref, receipt.tenant_id
    );
    for allocation in &receipt.allocations {
        println!("  {} <- {}", allocation.obligation_id, allocation.amount);
    }
    if receipt.overpayment > BigDecimal::from(0) {
        println!("  Overpayment of {} left on the last obligation", receipt.overpayment);
    }
    for obligation in &receipt.completed {
        println!("  Obligation {} ({}) is now fully paid", obligation.id, obligation.label);
    }

    Ok(())
}

pub async fn handle_ledger_reject(ledger: &Ledger, transaction_id: &str) -> anyhow::Result<()> {
    let rejected = ledger.verifications.reject(transaction_id).await?;
    println!("✓ Transaction {} rejected and deleted", rejected.external_ref);
    Ok(())
}

pub async fn handle_ledger_summary(ledger: &Ledger, tenant: Option<Uuid>) -> anyhow::Result<()> {
    let summary = match tenant {
        Some(tenant_id) => ledger.dashboard.tenant_summary(tenant_id).await?,
        None => ledger.dashboard.summary().await?,
    };

    println!("{:<10} {:>8} {:>16}", "Status", "Count", "Amount");
    println!("{}", "-".repeat(36));
    println!("{:<10} {:>8} {:>16}", "Paid", summary.paid_count, summary.collected_amount);
    println!("{:<10} {:>8} {:>16}", "Pending", summary.pending_count, summary.pending_amount);
    println!("{:<10} {:>8} {:>16}", "Overdue", summary.overdue_count, summary.overdue_amount);
    println!("{:<10} {:>8}", "Total", summary.total_count);

    Ok(())
}

pub async fn handle_tenant_onboard(ledger: &Ledger, tenant_id: Uuid) -> anyhow::Result<()> {
    let cycle = ledger.onboarding.execute(tenant_id).await?;
    let obligation = cycle.obligation();

    if cycle.was_created() {
        println!(
            "✓ First rent cycle {} opened: {} due {}",
            obligation.id, obligation.total_amount, obligation.due_date
        );
    } else {
        println!(
            "Tenant {} already has rent cycle {} due {}",
            tenant_id, obligation.id, obligation.due_date
        );
    }

    Ok(())
}

/// Builds the Postgres-backed ledger used by the server and the CLI.
pub fn postgres_ledger(pool: PgPool, config: &Config) -> Ledger {
    use crate::adapters::{PostgresLedgerStore, PostgresTenantDirectory};
    use crate::ports::SystemClock;
    use std::sync::Arc;

    Ledger::new(
        Arc::new(PostgresLedgerStore::new(pool.clone())),
        Arc::new(PostgresTenantDirectory::new(pool)),
        Arc::new(SystemClock),
        config.summary_cache_ttl(),
    )
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
