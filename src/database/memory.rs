//! In-process store used for tests and single-node deployments.
//!
//! A session holds the table lock for its whole lifetime, so sessions are
//! serialized. Each session keeps a snapshot taken at `begin()`; rollback,
//! or dropping the session without commit, restores it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::database::error::{DbError, DbResult};
use crate::database::models::{
    NewRouting, PodBinding, PodMap, ResourceRouting, RoutingFilter, Site, SiteServiceConfiguration,
    Timestamps,
};
use crate::database::session::{PodRepo, RoutingRepo, Session, SiteRepo, Store};

#[derive(Debug, Clone, Default)]
struct Tables {
    sites: BTreeMap<String, Site>,
    services: BTreeMap<String, SiteServiceConfiguration>,
    pod_maps: BTreeMap<String, PodMap>,
    pod_bindings: BTreeMap<String, PodBinding>,
    routings: BTreeMap<i32, ResourceRouting>,
    next_routing_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> DbResult<Box<dyn Session>> {
        let guard = self.tables.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemorySession {
            guard,
            snapshot: Some(snapshot),
        }))
    }

    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }
}

pub struct MemorySession {
    guard: OwnedMutexGuard<Tables>,
    // None once the session has been committed or rolled back
    snapshot: Option<Tables>,
}

impl MemorySession {
    fn tables(&mut self) -> DbResult<&mut Tables> {
        if self.snapshot.is_none() {
            return Err(DbError::SessionClosed);
        }
        Ok(&mut *self.guard)
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl SiteRepo for MemorySession {
    async fn insert_site(&mut self, site: &Site) -> DbResult<()> {
        let t = self.tables()?;
        if t.sites.contains_key(&site.site_id) {
            return Err(DbError::conflict(format!("site '{}' already exists", site.site_id)));
        }
        if t.sites.values().any(|s| s.site_name == site.site_name) {
            return Err(DbError::conflict(format!(
                "site name '{}' already in use",
                site.site_name
            )));
        }
        t.sites.insert(site.site_id.clone(), site.clone());
        Ok(())
    }

    async fn get_site(&mut self, site_id: &str) -> DbResult<Option<Site>> {
        Ok(self.tables()?.sites.get(site_id).cloned())
    }

    async fn list_sites(&mut self) -> DbResult<Vec<Site>> {
        Ok(self.tables()?.sites.values().cloned().collect())
    }

    async fn delete_site(&mut self, site_id: &str) -> DbResult<bool> {
        let t = self.tables()?;
        let referenced = t.services.values().any(|s| s.site_id == site_id)
            || t.routings.values().any(|r| r.site_id == site_id);
        if referenced {
            return Err(DbError::conflict(format!("site '{}' is still referenced", site_id)));
        }
        Ok(t.sites.remove(site_id).is_some())
    }

    async fn insert_service(&mut self, service: &SiteServiceConfiguration) -> DbResult<()> {
        let t = self.tables()?;
        if !t.sites.contains_key(&service.site_id) {
            return Err(DbError::not_found(format!("site '{}'", service.site_id)));
        }
        let same_type = t
            .services
            .values()
            .any(|s| s.site_id == service.site_id && s.service_type == service.service_type);
        if same_type || t.services.contains_key(&service.service_id) {
            return Err(DbError::conflict(format!(
                "service '{}' or a {} endpoint on '{}' already exists",
                service.service_id, service.service_type, service.site_id
            )));
        }
        t.services.insert(service.service_id.clone(), service.clone());
        Ok(())
    }

    async fn list_services(&mut self, site_id: &str) -> DbResult<Vec<SiteServiceConfiguration>> {
        Ok(self
            .tables()?
            .services
            .values()
            .filter(|s| s.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn delete_service(&mut self, service_id: &str) -> DbResult<bool> {
        Ok(self.tables()?.services.remove(service_id).is_some())
    }
}

#[async_trait]
impl PodRepo for MemorySession {
    async fn insert_pod_map(&mut self, pod: &PodMap) -> DbResult<()> {
        let t = self.tables()?;
        if t.pod_maps.contains_key(&pod.id) || t.pod_maps.values().any(|p| p.same_slot(pod)) {
            return Err(DbError::conflict(format!(
                "pod '{}' already mapped to az {:?}",
                pod.pod_name, pod.az_name
            )));
        }
        t.pod_maps.insert(pod.id.clone(), pod.clone());
        Ok(())
    }

    async fn get_pod_map(&mut self, id: &str) -> DbResult<Option<PodMap>> {
        Ok(self.tables()?.pod_maps.get(id).cloned())
    }

    async fn list_pod_maps(&mut self, az_name: Option<&str>) -> DbResult<Vec<PodMap>> {
        let mut pods: Vec<PodMap> = self
            .tables()?
            .pod_maps
            .values()
            .filter(|p| az_name.map_or(true, |az| p.az_name.as_deref() == Some(az)))
            .cloned()
            .collect();
        pods.sort_by(|a, b| a.pod_name.cmp(&b.pod_name).then_with(|| a.id.cmp(&b.id)));
        Ok(pods)
    }

    async fn delete_pod_map(&mut self, id: &str) -> DbResult<bool> {
        let t = self.tables()?;
        if t.pod_bindings.values().any(|b| b.az_pod_map_id == id) {
            return Err(DbError::conflict(format!("pod map '{}' has bindings", id)));
        }
        Ok(t.pod_maps.remove(id).is_some())
    }

    async fn insert_pod_binding(&mut self, binding: &PodBinding) -> DbResult<()> {
        let t = self.tables()?;
        if !t.pod_maps.contains_key(&binding.az_pod_map_id) {
            return Err(DbError::not_found(format!("pod map '{}'", binding.az_pod_map_id)));
        }
        let duplicate = t.pod_bindings.values().any(|b| {
            b.tenant_id == binding.tenant_id && b.az_pod_map_id == binding.az_pod_map_id
        });
        if duplicate || t.pod_bindings.contains_key(&binding.id) {
            return Err(DbError::conflict(format!(
                "tenant '{}' already bound to pod map '{}'",
                binding.tenant_id, binding.az_pod_map_id
            )));
        }
        t.pod_bindings.insert(binding.id.clone(), binding.clone());
        Ok(())
    }

    async fn list_pod_bindings(&mut self, tenant_id: &str) -> DbResult<Vec<PodBinding>> {
        let mut bindings: Vec<PodBinding> = self
            .tables()?
            .pod_bindings
            .values()
            .filter(|b| b.tenant_id == tenant_id)
            .cloned()
            .collect();
        bindings.sort_by(|a, b| {
            a.timestamps
                .created_at
                .cmp(&b.timestamps.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(bindings)
    }

    async fn delete_pod_binding(&mut self, id: &str) -> DbResult<bool> {
        Ok(self.tables()?.pod_bindings.remove(id).is_some())
    }
}

#[async_trait]
impl RoutingRepo for MemorySession {
    async fn insert_routing(&mut self, new: &NewRouting) -> DbResult<ResourceRouting> {
        let t = self.tables()?;
        if !t.sites.contains_key(&new.site_id) {
            return Err(DbError::not_found(format!("site '{}'", new.site_id)));
        }
        if t
            .routings
            .values()
            .any(|r| r.top_id == new.top_id && r.site_id == new.site_id)
        {
            return Err(DbError::conflict(format!(
                "routing for '{}' on site '{}' already exists",
                new.top_id, new.site_id
            )));
        }
        t.next_routing_id += 1;
        let row = ResourceRouting {
            id: t.next_routing_id,
            top_id: new.top_id.clone(),
            bottom_id: None,
            site_id: new.site_id.clone(),
            project_id: new.project_id.clone(),
            resource_type: new.resource_type.clone(),
            timestamps: Timestamps::now(),
        };
        t.routings.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_routing(&mut self, top_id: &str, site_id: &str) -> DbResult<Option<ResourceRouting>> {
        Ok(self
            .tables()?
            .routings
            .values()
            .find(|r| r.top_id == top_id && r.site_id == site_id)
            .cloned())
    }

    async fn set_bottom_id(
        &mut self,
        id: i32,
        expected: Option<&str>,
        bottom_id: Option<&str>,
    ) -> DbResult<ResourceRouting> {
        let row = self
            .tables()?
            .routings
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found(format!("routing {}", id)))?;
        if row.bottom_id.as_deref() != expected {
            return Err(DbError::conflict(format!(
                "routing {} is bound to {:?}, expected {:?}",
                id, row.bottom_id, expected
            )));
        }
        row.bottom_id = bottom_id.map(str::to_string);
        row.timestamps.touch();
        Ok(row.clone())
    }

    async fn list_routings(&mut self, filter: &RoutingFilter) -> DbResult<Vec<ResourceRouting>> {
        Ok(self
            .tables()?
            .routings
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn delete_routing(&mut self, top_id: &str, site_id: &str) -> DbResult<bool> {
        let t = self.tables()?;
        let id = t
            .routings
            .values()
            .find(|r| r.top_id == top_id && r.site_id == site_id)
            .map(|r| r.id);
        Ok(id.map_or(false, |id| t.routings.remove(&id).is_some()))
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn commit(&mut self) -> DbResult<()> {
        self.snapshot.take().ok_or(DbError::SessionClosed)?;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        let snapshot = self.snapshot.take().ok_or(DbError::SessionClosed)?;
        *self.guard = snapshot;
        Ok(())
    }
}
