//! Pod map administration and tenant-to-pod binding.
//!
//! A tenant is bound to exactly one pod per availability zone. The first
//! placement picks the pod from a hash of the tenant id, so racing first
//! placements for the same tenant pick the same pod and collide on the
//! (tenant, pod map) uniqueness constraint instead of splitting the tenant.

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::database::error::{DbError, DbResult};
use crate::database::models::{PodBinding, PodMap};
use crate::database::session::{PodRepo, Session};

/// Return the tenant's binding for `az_name`, creating it on first use
pub async fn get_or_create_binding(
    ctx: &Context,
    session: &mut dyn Session,
    tenant_id: &str,
    az_name: &str,
) -> DbResult<PodBinding> {
    ctx.require_project(Some(tenant_id))?;

    let pods = session.list_pod_maps(Some(az_name)).await?;
    if pods.is_empty() {
        return Err(DbError::configuration(format!(
            "no pod configured for availability zone '{}'",
            az_name
        )));
    }

    if let Some(existing) = find_binding(session, tenant_id, &pods).await? {
        debug!("Tenant '{}' already bound in az '{}'", tenant_id, az_name);
        return Ok(existing);
    }

    ctx.require_writable()?;
    let pod = &pods[pick_pod_index(tenant_id, pods.len())];
    let binding = PodBinding::new(tenant_id, pod.id.clone())?;

    match session.insert_pod_binding(&binding).await {
        Ok(()) => {
            info!(
                "Bound tenant '{}' to pod '{}' in az '{}'",
                tenant_id, pod.pod_name, az_name
            );
            Ok(binding)
        }
        Err(e) if e.is_conflict() => {
            warn!(
                "Concurrent binding for tenant '{}' in az '{}', reading winner",
                tenant_id, az_name
            );
            find_binding(session, tenant_id, &pods).await?.ok_or(e)
        }
        Err(e) => Err(e),
    }
}

async fn find_binding(
    session: &mut dyn Session,
    tenant_id: &str,
    pods: &[PodMap],
) -> DbResult<Option<PodBinding>> {
    Ok(session
        .list_pod_bindings(tenant_id)
        .await?
        .into_iter()
        .find(|b| pods.iter().any(|p| p.id == b.az_pod_map_id)))
}

/// Stable pod choice for a tenant among `count` pods
fn pick_pod_index(tenant_id: &str, count: usize) -> usize {
    let digest = Sha256::digest(tenant_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % count as u64) as usize
}

pub async fn create_pod_map(
    ctx: &Context,
    session: &mut dyn Session,
    az_name: Option<&str>,
    dc_name: Option<&str>,
    pod_name: &str,
    pod_az_name: Option<&str>,
) -> DbResult<PodMap> {
    ctx.require_admin()?;
    ctx.require_writable()?;
    let pod = PodMap::new(
        az_name.map(str::to_string),
        dc_name.map(str::to_string),
        pod_name,
        pod_az_name.map(str::to_string),
    )?;
    session.insert_pod_map(&pod).await?;
    info!("Mapped az {:?} to pod '{}' ({})", az_name, pod_name, pod.id);
    Ok(pod)
}

pub async fn get_pod_map(ctx: &Context, session: &mut dyn Session, id: &str) -> DbResult<PodMap> {
    debug!("Pod map lookup '{}' ({})", id, ctx.request_id);
    session
        .get_pod_map(id)
        .await?
        .ok_or_else(|| DbError::not_found(format!("pod map '{}'", id)))
}

pub async fn list_pod_maps(
    _ctx: &Context,
    session: &mut dyn Session,
    az_name: Option<&str>,
) -> DbResult<Vec<PodMap>> {
    session.list_pod_maps(az_name).await
}

pub async fn delete_pod_map(ctx: &Context, session: &mut dyn Session, id: &str) -> DbResult<()> {
    ctx.require_admin()?;
    ctx.require_writable()?;
    if !session.delete_pod_map(id).await? {
        return Err(DbError::not_found(format!("pod map '{}'", id)));
    }
    info!("Deleted pod map '{}'", id);
    Ok(())
}

pub async fn list_bindings(
    ctx: &Context,
    session: &mut dyn Session,
    tenant_id: &str,
) -> DbResult<Vec<PodBinding>> {
    ctx.require_project(Some(tenant_id))?;
    session.list_pod_bindings(tenant_id).await
}

pub async fn delete_binding(ctx: &Context, session: &mut dyn Session, id: &str) -> DbResult<()> {
    ctx.require_admin()?;
    ctx.require_writable()?;
    if !session.delete_pod_binding(id).await? {
        return Err(DbError::not_found(format!("pod binding '{}'", id)));
    }
    info!("Deleted pod binding '{}'", id);
    Ok(())
}
