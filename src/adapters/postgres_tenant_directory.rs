//! Postgres implementation of TenantDirectory over the `tenants` and `units` tables.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::error::LedgerResult;
use crate::ports::{TenantDirectory, TenantProfile};

#[derive(Clone)]
pub struct PostgresTenantDirectory {
    pool: PgPool,
}

impl PostgresTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    async fn find_tenant(&self, tenant_id: Uuid) -> LedgerResult<Option<TenantProfile>> {
        queries::find_tenant_profile(&self.pool, tenant_id)
            .await?
            .map(|row| row.into_domain())
            .transpose()
    }
}
