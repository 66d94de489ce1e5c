use tracing::{debug, info};
use uuid::Uuid;

use crate::context::Context;
use crate::database::error::{DbError, DbResult};
use crate::database::models::{Site, SiteServiceConfiguration};
use crate::database::session::{Session, SiteRepo};

pub async fn register_site(
    ctx: &Context,
    session: &mut dyn Session,
    site_id: &str,
    site_name: &str,
    az_id: &str,
) -> DbResult<Site> {
    ctx.require_admin()?;
    ctx.require_writable()?;
    let site = Site::new(site_id, site_name, az_id)?;
    session.insert_site(&site).await?;
    info!("Registered site '{}' ({}) in az '{}'", site.site_id, site.site_name, site.az_id);
    Ok(site)
}

pub async fn get_site(_ctx: &Context, session: &mut dyn Session, site_id: &str) -> DbResult<Site> {
    session
        .get_site(site_id)
        .await?
        .ok_or_else(|| DbError::not_found(format!("site '{}'", site_id)))
}

pub async fn list_sites(_ctx: &Context, session: &mut dyn Session) -> DbResult<Vec<Site>> {
    session.list_sites().await
}

pub async fn delete_site(ctx: &Context, session: &mut dyn Session, site_id: &str) -> DbResult<()> {
    ctx.require_admin()?;
    ctx.require_writable()?;
    if !session.delete_site(site_id).await? {
        return Err(DbError::not_found(format!("site '{}'", site_id)));
    }
    info!("Deleted site '{}'", site_id);
    Ok(())
}

/// Register the endpoint of one service type on a site, replacing any
/// previous endpoint of the same type.
pub async fn register_service(
    ctx: &Context,
    session: &mut dyn Session,
    site_id: &str,
    service_type: &str,
    service_url: &str,
) -> DbResult<SiteServiceConfiguration> {
    ctx.require_admin()?;
    ctx.require_writable()?;
    let service = SiteServiceConfiguration::new(
        Uuid::new_v4().to_string(),
        site_id,
        service_type,
        service_url,
    )?;

    for old in session.list_services(site_id).await? {
        if old.service_type == service_type {
            session.delete_service(&old.service_id).await?;
            debug!("Replacing {} endpoint {} on '{}'", service_type, old.service_url, site_id);
        }
    }
    session.insert_service(&service).await?;
    info!("Site '{}' serves {} at {}", site_id, service_type, service_url);
    Ok(service)
}

pub async fn list_services(
    _ctx: &Context,
    session: &mut dyn Session,
    site_id: &str,
) -> DbResult<Vec<SiteServiceConfiguration>> {
    session.list_services(site_id).await
}

pub async fn get_service_url(
    _ctx: &Context,
    session: &mut dyn Session,
    site_id: &str,
    service_type: &str,
) -> DbResult<String> {
    session
        .list_services(site_id)
        .await?
        .into_iter()
        .find(|s| s.service_type == service_type)
        .map(|s| s.service_url)
        .ok_or_else(|| {
            DbError::not_found(format!("no {} endpoint on site '{}'", service_type, site_id))
        })
}

pub async fn delete_service(ctx: &Context, session: &mut dyn Session, service_id: &str) -> DbResult<()> {
    ctx.require_admin()?;
    ctx.require_writable()?;
    if !session.delete_service(service_id).await? {
        return Err(DbError::not_found(format!("service '{}'", service_id)));
    }
    info!("Deleted service configuration '{}'", service_id);
    Ok(())
}
