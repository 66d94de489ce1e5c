use async_trait::async_trait;

use crate::context::Context;
use crate::database::error::DbResult;
use crate::database::memory::MemoryStore;
use crate::database::models::{
    NewRouting, PodBinding, PodMap, ResourceRouting, RoutingFilter, Site, SiteServiceConfiguration,
};
use crate::database::session::{PodRepo, RoutingRepo, Session, SiteRepo, Store};
use crate::services::{pod, site};

pub const SITE_A: &str = "site-A";
pub const SITE_B: &str = "site-B";

/// Memory store with two sites and two pods in az1, one pod in az2
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    let admin = Context::admin();
    let mut session = store.begin().await.expect("begin seed session");

    for (id, name, az) in [(SITE_A, "Site A", "az1"), (SITE_B, "Site B", "az2")] {
        site::register_site(&admin, session.as_mut(), id, name, az)
            .await
            .expect("seed site");
    }
    for (az, pod_name) in [("az1", "pod1"), ("az1", "pod2"), ("az2", "pod3")] {
        pod::create_pod_map(&admin, session.as_mut(), Some(az), Some("dc1"), pod_name, Some(az))
            .await
            .expect("seed pod map");
    }

    session.commit().await.expect("commit seed session");
    store
}

/// Session that lets another writer's bottom id update land between a
/// caller's read and its own compare-and-set
pub struct InterleavedSession {
    inner: Box<dyn Session>,
    pending: Option<Option<String>>,
}

impl InterleavedSession {
    /// The next `set_bottom_id` is preceded by a competing write of `bottom_id`
    pub fn new(inner: Box<dyn Session>, bottom_id: Option<&str>) -> Self {
        Self {
            inner,
            pending: Some(bottom_id.map(str::to_string)),
        }
    }
}

#[async_trait]
impl SiteRepo for InterleavedSession {
    async fn insert_site(&mut self, site: &Site) -> DbResult<()> {
        self.inner.insert_site(site).await
    }

    async fn get_site(&mut self, site_id: &str) -> DbResult<Option<Site>> {
        self.inner.get_site(site_id).await
    }

    async fn list_sites(&mut self) -> DbResult<Vec<Site>> {
        self.inner.list_sites().await
    }

    async fn delete_site(&mut self, site_id: &str) -> DbResult<bool> {
        self.inner.delete_site(site_id).await
    }

    async fn insert_service(&mut self, service: &SiteServiceConfiguration) -> DbResult<()> {
        self.inner.insert_service(service).await
    }

    async fn list_services(&mut self, site_id: &str) -> DbResult<Vec<SiteServiceConfiguration>> {
        self.inner.list_services(site_id).await
    }

    async fn delete_service(&mut self, service_id: &str) -> DbResult<bool> {
        self.inner.delete_service(service_id).await
    }
}

#[async_trait]
impl PodRepo for InterleavedSession {
    async fn insert_pod_map(&mut self, pod: &PodMap) -> DbResult<()> {
        self.inner.insert_pod_map(pod).await
    }

    async fn get_pod_map(&mut self, id: &str) -> DbResult<Option<PodMap>> {
        self.inner.get_pod_map(id).await
    }

    async fn list_pod_maps(&mut self, az_name: Option<&str>) -> DbResult<Vec<PodMap>> {
        self.inner.list_pod_maps(az_name).await
    }

    async fn delete_pod_map(&mut self, id: &str) -> DbResult<bool> {
        self.inner.delete_pod_map(id).await
    }

    async fn insert_pod_binding(&mut self, binding: &PodBinding) -> DbResult<()> {
        self.inner.insert_pod_binding(binding).await
    }

    async fn list_pod_bindings(&mut self, tenant_id: &str) -> DbResult<Vec<PodBinding>> {
        self.inner.list_pod_bindings(tenant_id).await
    }

    async fn delete_pod_binding(&mut self, id: &str) -> DbResult<bool> {
        self.inner.delete_pod_binding(id).await
    }
}

#[async_trait]
impl RoutingRepo for InterleavedSession {
    async fn insert_routing(&mut self, new: &NewRouting) -> DbResult<ResourceRouting> {
        self.inner.insert_routing(new).await
    }

    async fn get_routing(&mut self, top_id: &str, site_id: &str) -> DbResult<Option<ResourceRouting>> {
        self.inner.get_routing(top_id, site_id).await
    }

    async fn set_bottom_id(
        &mut self,
        id: i32,
        expected: Option<&str>,
        bottom_id: Option<&str>,
    ) -> DbResult<ResourceRouting> {
        if let Some(competing) = self.pending.take() {
            self.inner.set_bottom_id(id, expected, competing.as_deref()).await?;
        }
        self.inner.set_bottom_id(id, expected, bottom_id).await
    }

    async fn list_routings(&mut self, filter: &RoutingFilter) -> DbResult<Vec<ResourceRouting>> {
        self.inner.list_routings(filter).await
    }

    async fn delete_routing(&mut self, top_id: &str, site_id: &str) -> DbResult<bool> {
        self.inner.delete_routing(top_id, site_id).await
    }
}

#[async_trait]
impl Session for InterleavedSession {
    async fn commit(&mut self) -> DbResult<()> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.inner.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_store_has_sites_and_pods() {
        let store = seeded_store().await;
        let ctx = Context::new();
        let mut session = store.begin().await.unwrap();
        assert_eq!(site::list_sites(&ctx, session.as_mut()).await.unwrap().len(), 2);
        assert_eq!(pod::list_pod_maps(&ctx, session.as_mut(), Some("az1")).await.unwrap().len(), 2);
    }
}
