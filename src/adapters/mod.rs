pub mod memory;
pub mod postgres_ledger_store;
pub mod postgres_tenant_directory;

pub use memory::{InMemoryLedgerStore, InMemoryTenantDirectory};
pub use postgres_ledger_store::PostgresLedgerStore;
pub use postgres_tenant_directory::PostgresTenantDirectory;
