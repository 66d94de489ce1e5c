//! Storage seams: a `Store` hands out `Session`s, one per operation.
//!
//! A session is a unit of work. Writes become visible to other sessions on
//! `commit()`; a session dropped without committing is rolled back.
//! Inserts report a lost uniqueness race as `DbError::Conflict` and leave
//! the session usable, so callers can fall back to reading the winner's row.

use async_trait::async_trait;

use crate::database::error::DbResult;
use crate::database::models::{
    NewRouting, PodBinding, PodMap, ResourceRouting, RoutingFilter, Site, SiteServiceConfiguration,
};

#[async_trait]
pub trait SiteRepo: Send {
    /// `Conflict` on duplicate site id or site name
    async fn insert_site(&mut self, site: &Site) -> DbResult<()>;

    async fn get_site(&mut self, site_id: &str) -> DbResult<Option<Site>>;

    async fn list_sites(&mut self) -> DbResult<Vec<Site>>;

    /// `Conflict` while service configurations or routings reference the site
    async fn delete_site(&mut self, site_id: &str) -> DbResult<bool>;

    /// `NotFound` for an unknown site, `Conflict` on duplicate service id or
    /// a second endpoint of the same type on the site
    async fn insert_service(&mut self, service: &SiteServiceConfiguration) -> DbResult<()>;

    async fn list_services(&mut self, site_id: &str) -> DbResult<Vec<SiteServiceConfiguration>>;

    async fn delete_service(&mut self, service_id: &str) -> DbResult<bool>;
}

#[async_trait]
pub trait PodRepo: Send {
    /// `Conflict` on duplicate (az_name, pod_name)
    async fn insert_pod_map(&mut self, pod: &PodMap) -> DbResult<()>;

    async fn get_pod_map(&mut self, id: &str) -> DbResult<Option<PodMap>>;

    /// Pod maps ordered by pod name, optionally restricted to one AZ
    async fn list_pod_maps(&mut self, az_name: Option<&str>) -> DbResult<Vec<PodMap>>;

    /// `Conflict` while bindings reference the pod map
    async fn delete_pod_map(&mut self, id: &str) -> DbResult<bool>;

    /// `NotFound` for an unknown pod map, `Conflict` on duplicate (tenant, pod map)
    async fn insert_pod_binding(&mut self, binding: &PodBinding) -> DbResult<()>;

    /// Bindings of one tenant, oldest first
    async fn list_pod_bindings(&mut self, tenant_id: &str) -> DbResult<Vec<PodBinding>>;

    async fn delete_pod_binding(&mut self, id: &str) -> DbResult<bool>;
}

#[async_trait]
pub trait RoutingRepo: Send {
    /// `NotFound` for an unknown site, `Conflict` on duplicate (top_id, site_id)
    async fn insert_routing(&mut self, new: &NewRouting) -> DbResult<ResourceRouting>;

    async fn get_routing(&mut self, top_id: &str, site_id: &str) -> DbResult<Option<ResourceRouting>>;

    /// Compare-and-set the bottom id and touch `updated_at`.
    /// `Conflict` when the stored value is no longer `expected`, `NotFound` if the row is gone.
    async fn set_bottom_id(
        &mut self,
        id: i32,
        expected: Option<&str>,
        bottom_id: Option<&str>,
    ) -> DbResult<ResourceRouting>;

    /// Matching rows ordered by id
    async fn list_routings(&mut self, filter: &RoutingFilter) -> DbResult<Vec<ResourceRouting>>;

    async fn delete_routing(&mut self, top_id: &str, site_id: &str) -> DbResult<bool>;
}

#[async_trait]
pub trait Session: SiteRepo + PodRepo + RoutingRepo {
    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new unit of work
    async fn begin(&self) -> DbResult<Box<dyn Session>>;

    async fn health_check(&self) -> DbResult<()>;
}
