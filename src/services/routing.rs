//! Resource routing table: top-level (logical) ids to per-site bottom-level ids.
//!
//! Every operation runs inside the caller's session and is scoped by the
//! caller's context. Rows outside a non-admin context's project are treated
//! as missing.

use tracing::{debug, info, warn};

use crate::context::Context;
use crate::database::error::{check_len, DbError, DbResult};
use crate::database::models::routing::RESOURCE_ID_MAX;
use crate::database::models::{NewRouting, Resolution, ResourceRouting, RoutingFilter};
use crate::database::session::{RoutingRepo, Session};

/// Reserve a routing row with no bottom id yet
pub async fn create_routing(
    ctx: &Context,
    session: &mut dyn Session,
    top_id: &str,
    site_id: &str,
    project_id: Option<&str>,
    resource_type: &str,
) -> DbResult<ResourceRouting> {
    ctx.require_writable()?;
    ctx.require_project(project_id)?;
    let new = NewRouting::new(top_id, site_id, project_id.map(str::to_string), resource_type)?;

    match session.insert_routing(&new).await {
        Ok(row) => {
            info!(
                "Reserved routing {} for {} '{}' on site '{}' ({})",
                row.id, row.resource_type, row.top_id, row.site_id, ctx.request_id
            );
            Ok(row)
        }
        Err(e) => {
            if e.is_conflict() {
                warn!("Routing for '{}' on site '{}' already reserved", top_id, site_id);
            }
            Err(e)
        }
    }
}

/// Create the reservation, or return the existing one when a previous
/// attempt (or a concurrent caller) already made it for the same project
/// and resource type.
pub async fn ensure_routing(
    ctx: &Context,
    session: &mut dyn Session,
    top_id: &str,
    site_id: &str,
    project_id: Option<&str>,
    resource_type: &str,
) -> DbResult<ResourceRouting> {
    match create_routing(ctx, session, top_id, site_id, project_id, resource_type).await {
        Err(e) if e.is_conflict() => {
            let existing = match session.get_routing(top_id, site_id).await? {
                Some(row) if ctx.can_see_project(row.project_id.as_deref()) => row,
                // The creator's project stays hidden from other tenants
                _ => return Err(e),
            };
            if existing.project_id.as_deref() != project_id || existing.resource_type != resource_type {
                return Err(DbError::conflict(format!(
                    "routing for '{}' on site '{}' belongs to {:?}/{}",
                    top_id, site_id, existing.project_id, existing.resource_type
                )));
            }
            debug!("Reusing routing {} for '{}' on '{}'", existing.id, top_id, site_id);
            Ok(existing)
        }
        other => other,
    }
}

/// Record the site-local id once the remote site confirms creation.
/// Binding the value already stored is a no-op.
pub async fn bind_bottom(
    ctx: &Context,
    session: &mut dyn Session,
    top_id: &str,
    site_id: &str,
    bottom_id: &str,
) -> DbResult<ResourceRouting> {
    ctx.require_writable()?;
    check_len("bottom_id", bottom_id, RESOURCE_ID_MAX)?;
    let row = get_routing(ctx, session, top_id, site_id).await?;

    match row.bottom_id.as_deref() {
        Some(current) if current == bottom_id => {
            debug!("Routing {} already bound to '{}'", row.id, bottom_id);
            Ok(row)
        }
        Some(current) => {
            warn!(
                "Refusing to rebind '{}' on '{}' from '{}' to '{}'",
                top_id, site_id, current, bottom_id
            );
            Err(DbError::conflict(format!(
                "'{}' on site '{}' is already bound to '{}'",
                top_id, site_id, current
            )))
        }
        None => {
            let bound = match session.set_bottom_id(row.id, None, Some(bottom_id)).await {
                Err(e) if e.is_conflict() => return settled(session, &row, Some(bottom_id), e).await,
                other => other?,
            };
            info!("Bound '{}' on site '{}' to '{}'", top_id, site_id, bottom_id);
            Ok(bound)
        }
    }
}

/// A lost compare-and-set is still a success when the concurrent writer
/// stored the value this caller wanted.
async fn settled(
    session: &mut dyn Session,
    row: &ResourceRouting,
    wanted: Option<&str>,
    lost: DbError,
) -> DbResult<ResourceRouting> {
    match session.get_routing(&row.top_id, &row.site_id).await? {
        Some(current) if current.id == row.id && current.bottom_id.as_deref() == wanted => {
            debug!("Routing {} already settled to {:?} by a concurrent writer", row.id, wanted);
            Ok(current)
        }
        _ => Err(lost),
    }
}

/// Clear the bottom id, keeping the reservation
pub async fn unbind_bottom(
    ctx: &Context,
    session: &mut dyn Session,
    top_id: &str,
    site_id: &str,
) -> DbResult<ResourceRouting> {
    ctx.require_writable()?;
    let row = get_routing(ctx, session, top_id, site_id).await?;
    if row.is_pending() {
        return Ok(row);
    }
    let cleared = match session.set_bottom_id(row.id, row.bottom_id.as_deref(), None).await {
        Err(e) if e.is_conflict() => return settled(session, &row, None, e).await,
        other => other?,
    };
    info!("Cleared bottom id of '{}' on site '{}'", top_id, site_id);
    Ok(cleared)
}

pub async fn get_routing(
    ctx: &Context,
    session: &mut dyn Session,
    top_id: &str,
    site_id: &str,
) -> DbResult<ResourceRouting> {
    let missing = || DbError::not_found(format!("no routing for '{}' on site '{}'", top_id, site_id));

    match session.get_routing(top_id, site_id).await? {
        Some(row) if ctx.can_see_project(row.project_id.as_deref()) => Ok(row),
        Some(_) => {
            warn!(
                "Tenant {:?} asked for routing '{}' outside its project",
                ctx.tenant_id, top_id
            );
            Err(missing())
        }
        None => Err(missing()),
    }
}

pub async fn resolve(
    ctx: &Context,
    session: &mut dyn Session,
    top_id: &str,
    site_id: &str,
) -> DbResult<Resolution> {
    let resolution = get_routing(ctx, session, top_id, site_id).await?.resolution();
    debug!("Resolved '{}' on '{}' to {:?}", top_id, site_id, resolution);
    Ok(resolution)
}

/// Sites a logical resource is routed to, sorted
pub async fn list_sites_for(
    ctx: &Context,
    session: &mut dyn Session,
    top_id: &str,
) -> DbResult<Vec<String>> {
    let mut sites: Vec<String> = list_routings(ctx, session, RoutingFilter::top(top_id))
        .await?
        .into_iter()
        .map(|row| row.site_id)
        .collect();
    sites.sort();
    sites.dedup();
    Ok(sites)
}

/// Rows matching `filter`, narrowed to the caller's project unless admin
pub async fn list_routings(
    ctx: &Context,
    session: &mut dyn Session,
    mut filter: RoutingFilter,
) -> DbResult<Vec<ResourceRouting>> {
    if !ctx.is_admin() {
        let Some(tenant) = ctx.tenant_id.clone() else {
            return Ok(Vec::new());
        };
        if filter.project_id.as_ref().is_some_and(|p| *p != tenant) {
            return Ok(Vec::new());
        }
        filter.project_id = Some(tenant);
    }
    session.list_routings(&filter).await
}

/// Reverse lookup from a site-local id
pub async fn find_by_bottom(
    ctx: &Context,
    session: &mut dyn Session,
    site_id: &str,
    bottom_id: &str,
) -> DbResult<ResourceRouting> {
    let filter = RoutingFilter {
        site_id: Some(site_id.to_string()),
        bottom_id: Some(bottom_id.to_string()),
        ..Default::default()
    };
    list_routings(ctx, session, filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            DbError::not_found(format!("no routing for '{}' on site '{}'", bottom_id, site_id))
        })
}

/// Remove one routing row, bound or not
pub async fn delete_routing(
    ctx: &Context,
    session: &mut dyn Session,
    top_id: &str,
    site_id: &str,
) -> DbResult<()> {
    ctx.require_writable()?;
    let row = get_routing(ctx, session, top_id, site_id).await?;
    if !session.delete_routing(top_id, site_id).await? {
        return Err(DbError::not_found(format!(
            "no routing for '{}' on site '{}'",
            top_id, site_id
        )));
    }
    info!(
        "Deleted routing {} for '{}' on site '{}' (bottom {:?})",
        row.id, top_id, site_id, row.bottom_id
    );
    Ok(())
}

/// Remove every visible routing of a logical resource, across all sites.
/// Returns the removed rows so the caller can tear down bound bottom resources.
pub async fn delete_all_routings(
    ctx: &Context,
    session: &mut dyn Session,
    top_id: &str,
) -> DbResult<Vec<ResourceRouting>> {
    ctx.require_writable()?;
    let rows = list_routings(ctx, session, RoutingFilter::top(top_id)).await?;
    for row in &rows {
        session.delete_routing(&row.top_id, &row.site_id).await?;
    }
    info!("Deleted {} routings for '{}'", rows.len(), top_id);
    Ok(rows)
}
