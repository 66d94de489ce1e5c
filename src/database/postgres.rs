use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::database::error::{DbError, DbResult};
use crate::database::models::{
    NewRouting, PodBinding, PodMap, ResourceRouting, RoutingFilter, Site, SiteServiceConfiguration,
};
use crate::database::schema;
use crate::database::session::{PodRepo, RoutingRepo, Session, SiteRepo, Store};

const SITE_COLUMNS: &str = "site_id, site_name, az_id";
const SERVICE_COLUMNS: &str = "service_id, site_id, service_type, service_url";
const POD_MAP_COLUMNS: &str = "id, az_name, dc_name, pod_name, pod_az_name, created_at, updated_at";
const POD_BINDING_COLUMNS: &str = "id, tenant_id, az_pod_map_id, created_at, updated_at";
const ROUTING_COLUMNS: &str =
    "id, top_id, bottom_id, site_id, project_id, resource_type, created_at, updated_at";

/// Postgres-backed store; every session is one read-committed transaction
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create any missing tables; safe to run on every start
    pub async fn migrate(&self) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for statement in schema::STATEMENTS {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!("Schema ready ({} tables)", schema::TABLES.len());
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> DbResult<Box<dyn Session>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }

    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// One open transaction. Dropping it without commit rolls back.
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn conn(&mut self) -> DbResult<&mut PgConnection> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(DbError::SessionClosed),
        }
    }

    async fn count(&mut self, sql: &str, key: &str) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as(sql).bind(key).fetch_one(self.conn()?).await?;
        Ok(count)
    }
}

#[async_trait]
impl SiteRepo for PgSession {
    async fn insert_site(&mut self, site: &Site) -> DbResult<()> {
        let result = sqlx::query(
            "INSERT INTO cascaded_sites (site_id, site_name, az_id) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(&site.site_id)
        .bind(&site.site_name)
        .bind(&site.az_id)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "site '{}' or name '{}' already exists",
                site.site_id, site.site_name
            )));
        }
        Ok(())
    }

    async fn get_site(&mut self, site_id: &str) -> DbResult<Option<Site>> {
        let sql = format!("SELECT {} FROM cascaded_sites WHERE site_id = $1", SITE_COLUMNS);
        Ok(sqlx::query_as::<_, Site>(&sql)
            .bind(site_id)
            .fetch_optional(self.conn()?)
            .await?)
    }

    async fn list_sites(&mut self) -> DbResult<Vec<Site>> {
        let sql = format!("SELECT {} FROM cascaded_sites ORDER BY site_id", SITE_COLUMNS);
        Ok(sqlx::query_as::<_, Site>(&sql).fetch_all(self.conn()?).await?)
    }

    async fn delete_site(&mut self, site_id: &str) -> DbResult<bool> {
        let references = self
            .count(
                "SELECT (SELECT COUNT(*) FROM cascaded_site_service_configuration WHERE site_id = $1) \
                      + (SELECT COUNT(*) FROM cascaded_sites_resource_routing WHERE site_id = $1)",
                site_id,
            )
            .await?;
        if references > 0 {
            return Err(DbError::conflict(format!(
                "site '{}' is still referenced by {} rows",
                site_id, references
            )));
        }

        let result = sqlx::query("DELETE FROM cascaded_sites WHERE site_id = $1")
            .bind(site_id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_service(&mut self, service: &SiteServiceConfiguration) -> DbResult<()> {
        if self.get_site(&service.site_id).await?.is_none() {
            return Err(DbError::not_found(format!("site '{}'", service.site_id)));
        }

        let result = sqlx::query(
            "INSERT INTO cascaded_site_service_configuration \
             (service_id, site_id, service_type, service_url) VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING",
        )
        .bind(&service.service_id)
        .bind(&service.site_id)
        .bind(&service.service_type)
        .bind(&service.service_url)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "service '{}' or a {} endpoint on '{}' already exists",
                service.service_id, service.service_type, service.site_id
            )));
        }
        Ok(())
    }

    async fn list_services(&mut self, site_id: &str) -> DbResult<Vec<SiteServiceConfiguration>> {
        let sql = format!(
            "SELECT {} FROM cascaded_site_service_configuration WHERE site_id = $1 ORDER BY service_id",
            SERVICE_COLUMNS
        );
        Ok(sqlx::query_as::<_, SiteServiceConfiguration>(&sql)
            .bind(site_id)
            .fetch_all(self.conn()?)
            .await?)
    }

    async fn delete_service(&mut self, service_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM cascaded_site_service_configuration WHERE service_id = $1")
            .bind(service_id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PodRepo for PgSession {
    async fn insert_pod_map(&mut self, pod: &PodMap) -> DbResult<()> {
        let result = sqlx::query(
            "INSERT INTO pod_map (id, az_name, dc_name, pod_name, pod_az_name, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT DO NOTHING",
        )
        .bind(&pod.id)
        .bind(&pod.az_name)
        .bind(&pod.dc_name)
        .bind(&pod.pod_name)
        .bind(&pod.pod_az_name)
        .bind(pod.timestamps.created_at)
        .bind(pod.timestamps.updated_at)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "pod '{}' already mapped to az {:?}",
                pod.pod_name, pod.az_name
            )));
        }
        Ok(())
    }

    async fn get_pod_map(&mut self, id: &str) -> DbResult<Option<PodMap>> {
        let sql = format!("SELECT {} FROM pod_map WHERE id = $1", POD_MAP_COLUMNS);
        Ok(sqlx::query_as::<_, PodMap>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?)
    }

    async fn list_pod_maps(&mut self, az_name: Option<&str>) -> DbResult<Vec<PodMap>> {
        let sql = format!(
            "SELECT {} FROM pod_map WHERE ($1::text IS NULL OR az_name = $1) ORDER BY pod_name, id",
            POD_MAP_COLUMNS
        );
        Ok(sqlx::query_as::<_, PodMap>(&sql)
            .bind(az_name)
            .fetch_all(self.conn()?)
            .await?)
    }

    async fn delete_pod_map(&mut self, id: &str) -> DbResult<bool> {
        let bindings = self
            .count("SELECT COUNT(*) FROM pod_binding WHERE az_pod_map_id = $1", id)
            .await?;
        if bindings > 0 {
            return Err(DbError::conflict(format!(
                "pod map '{}' has {} bindings",
                id, bindings
            )));
        }

        let result = sqlx::query("DELETE FROM pod_map WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_pod_binding(&mut self, binding: &PodBinding) -> DbResult<()> {
        if self.get_pod_map(&binding.az_pod_map_id).await?.is_none() {
            return Err(DbError::not_found(format!("pod map '{}'", binding.az_pod_map_id)));
        }

        let result = sqlx::query(
            "INSERT INTO pod_binding (id, tenant_id, az_pod_map_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
        )
        .bind(&binding.id)
        .bind(&binding.tenant_id)
        .bind(&binding.az_pod_map_id)
        .bind(binding.timestamps.created_at)
        .bind(binding.timestamps.updated_at)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "tenant '{}' already bound to pod map '{}'",
                binding.tenant_id, binding.az_pod_map_id
            )));
        }
        Ok(())
    }

    async fn list_pod_bindings(&mut self, tenant_id: &str) -> DbResult<Vec<PodBinding>> {
        let sql = format!(
            "SELECT {} FROM pod_binding WHERE tenant_id = $1 ORDER BY created_at, id",
            POD_BINDING_COLUMNS
        );
        Ok(sqlx::query_as::<_, PodBinding>(&sql)
            .bind(tenant_id)
            .fetch_all(self.conn()?)
            .await?)
    }

    async fn delete_pod_binding(&mut self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM pod_binding WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoutingRepo for PgSession {
    async fn insert_routing(&mut self, new: &NewRouting) -> DbResult<ResourceRouting> {
        if self.get_site(&new.site_id).await?.is_none() {
            return Err(DbError::not_found(format!("site '{}'", new.site_id)));
        }

        let sql = format!(
            "INSERT INTO cascaded_sites_resource_routing (top_id, site_id, project_id, resource_type) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING RETURNING {}",
            ROUTING_COLUMNS
        );
        let row = sqlx::query_as::<_, ResourceRouting>(&sql)
            .bind(&new.top_id)
            .bind(&new.site_id)
            .bind(&new.project_id)
            .bind(&new.resource_type)
            .fetch_optional(self.conn()?)
            .await?;

        row.ok_or_else(|| {
            DbError::conflict(format!(
                "routing for '{}' on site '{}' already exists",
                new.top_id, new.site_id
            ))
        })
    }

    async fn get_routing(&mut self, top_id: &str, site_id: &str) -> DbResult<Option<ResourceRouting>> {
        let sql = format!(
            "SELECT {} FROM cascaded_sites_resource_routing WHERE top_id = $1 AND site_id = $2",
            ROUTING_COLUMNS
        );
        Ok(sqlx::query_as::<_, ResourceRouting>(&sql)
            .bind(top_id)
            .bind(site_id)
            .fetch_optional(self.conn()?)
            .await?)
    }

    async fn set_bottom_id(
        &mut self,
        id: i32,
        expected: Option<&str>,
        bottom_id: Option<&str>,
    ) -> DbResult<ResourceRouting> {
        let sql = format!(
            "UPDATE cascaded_sites_resource_routing SET bottom_id = $3, updated_at = now() \
             WHERE id = $1 AND bottom_id IS NOT DISTINCT FROM $2 RETURNING {}",
            ROUTING_COLUMNS
        );
        let updated = sqlx::query_as::<_, ResourceRouting>(&sql)
            .bind(id)
            .bind(expected)
            .bind(bottom_id)
            .fetch_optional(self.conn()?)
            .await?;
        if let Some(row) = updated {
            return Ok(row);
        }

        let current: Option<(Option<String>,)> =
            sqlx::query_as("SELECT bottom_id FROM cascaded_sites_resource_routing WHERE id = $1")
                .bind(id)
                .fetch_optional(self.conn()?)
                .await?;
        match current {
            Some((stored,)) => Err(DbError::conflict(format!(
                "routing {} is bound to {:?}, expected {:?}",
                id, stored, expected
            ))),
            None => Err(DbError::not_found(format!("routing {}", id))),
        }
    }

    async fn list_routings(&mut self, filter: &RoutingFilter) -> DbResult<Vec<ResourceRouting>> {
        let sql = format!(
            "SELECT {} FROM cascaded_sites_resource_routing \
             WHERE ($1::text IS NULL OR top_id = $1) \
               AND ($2::text IS NULL OR bottom_id = $2) \
               AND ($3::text IS NULL OR site_id = $3) \
               AND ($4::text IS NULL OR project_id = $4) \
               AND ($5::text IS NULL OR resource_type = $5) \
               AND ($6::bool IS NULL OR (bottom_id IS NOT NULL) = $6) \
             ORDER BY id",
            ROUTING_COLUMNS
        );
        debug!("Listing routings with {:?}", filter);
        Ok(sqlx::query_as::<_, ResourceRouting>(&sql)
            .bind(&filter.top_id)
            .bind(&filter.bottom_id)
            .bind(&filter.site_id)
            .bind(&filter.project_id)
            .bind(&filter.resource_type)
            .bind(filter.bound)
            .fetch_all(self.conn()?)
            .await?)
    }

    async fn delete_routing(&mut self, top_id: &str, site_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "DELETE FROM cascaded_sites_resource_routing WHERE top_id = $1 AND site_id = $2",
        )
        .bind(top_id)
        .bind(site_id)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Session for PgSession {
    async fn commit(&mut self) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::SessionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::SessionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}
