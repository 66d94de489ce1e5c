mod common;

use std::time::Duration;

use anyhow::Result;
use tricircle_db::database::models::{Resolution, RoutingFilter};
use tricircle_db::database::schema;
use tricircle_db::database::{RoutingRepo, Store};
use tricircle_db::services::{pod, routing, site};
use tricircle_db::{Context, DbError};

use common::postgres_fixture;

// Long enough for the spawned session to block on the first one's row lock
const OVERLAP: Duration = Duration::from_millis(300);

#[tokio::test]
async fn migrate_is_repeatable() -> Result<()> {
    let Some(fx) = postgres_fixture().await? else {
        return Ok(());
    };

    fx.store.migrate().await?;
    for table in schema::TABLES {
        let (exists,): (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
            .bind(*table)
            .fetch_one(fx.store.pool())
            .await?;
        assert!(exists, "table {} missing", table);
    }
    fx.store.health_check().await?;
    Ok(())
}

#[tokio::test]
async fn reserve_bind_resolve_delete() -> Result<()> {
    let Some(fx) = postgres_fixture().await? else {
        return Ok(());
    };
    let project = fx.id("p");
    let top = fx.id("net");
    let ctx = Context::for_tenant(project.clone());
    let mut session = fx.store.begin().await?;

    let row = routing::create_routing(&ctx, session.as_mut(), &top, &fx.site_a, Some(project.as_str()), "network").await?;
    assert!(row.is_pending());
    assert_eq!(
        routing::resolve(&ctx, session.as_mut(), &top, &fx.site_a).await?,
        Resolution::Pending
    );

    routing::bind_bottom(&ctx, session.as_mut(), &top, &fx.site_a, "net-abc").await?;
    session.commit().await?;

    let mut session = fx.store.begin().await?;
    assert_eq!(
        routing::resolve(&ctx, session.as_mut(), &top, &fx.site_a).await?,
        Resolution::Bound("net-abc".to_string())
    );
    let found = routing::find_by_bottom(&ctx, session.as_mut(), &fx.site_a, "net-abc").await?;
    assert_eq!(found.id, row.id);

    routing::delete_routing(&ctx, session.as_mut(), &top, &fx.site_a).await?;
    let err = routing::resolve(&ctx, session.as_mut(), &top, &fx.site_a)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    session.commit().await?;
    Ok(())
}

#[tokio::test]
async fn uniqueness_and_references() -> Result<()> {
    let Some(fx) = postgres_fixture().await? else {
        return Ok(());
    };
    let admin = Context::admin();
    let project = fx.id("p");
    let top = fx.id("net");
    let mut session = fx.store.begin().await?;

    routing::create_routing(&admin, session.as_mut(), &top, &fx.site_a, Some(project.as_str()), "network").await?;
    let err = routing::create_routing(&admin, session.as_mut(), &top, &fx.site_a, Some(project.as_str()), "network")
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // The conflict leaves the transaction usable
    routing::create_routing(&admin, session.as_mut(), &top, &fx.site_b, Some(project.as_str()), "network").await?;
    routing::bind_bottom(&admin, session.as_mut(), &top, &fx.site_a, "b-a").await?;

    let pending = routing::list_routings(
        &admin,
        session.as_mut(),
        RoutingFilter {
            top_id: Some(top.clone()),
            project_id: Some(project.clone()),
            bound: Some(false),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].site_id, fx.site_b);
    assert_eq!(
        routing::list_sites_for(&admin, session.as_mut(), &top).await?,
        vec![fx.site_a.clone(), fx.site_b.clone()]
    );

    let err = routing::create_routing(&admin, session.as_mut(), &fx.id("vol"), "no-such-site", None, "volume")
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = site::delete_site(&admin, session.as_mut(), &fx.site_b).await.unwrap_err();
    assert!(err.is_conflict());
    let removed = routing::delete_all_routings(&admin, session.as_mut(), &top).await?;
    assert_eq!(removed.len(), 2);
    site::delete_site(&admin, session.as_mut(), &fx.site_b).await?;

    session.rollback().await?;
    Ok(())
}

#[tokio::test]
async fn overlapping_reservations_have_one_winner() -> Result<()> {
    let Some(fx) = postgres_fixture().await? else {
        return Ok(());
    };
    let project = fx.id("p");
    let top = fx.id("net");
    let ctx = Context::for_tenant(project.clone());

    let mut first = fx.store.begin().await?;
    let mut second = fx.store.begin().await?;
    let winner = routing::create_routing(&ctx, first.as_mut(), &top, &fx.site_a, Some(project.as_str()), "network").await?;

    let racer = {
        let (ctx, top, site, project) = (ctx.clone(), top.clone(), fx.site_a.clone(), project.clone());
        tokio::spawn(async move {
            let result = routing::create_routing(&ctx, second.as_mut(), &top, &site, Some(project.as_str()), "network").await;
            (second, result)
        })
    };
    tokio::time::sleep(OVERLAP).await;
    first.commit().await?;

    let (mut second, result) = racer.await?;
    assert!(result.unwrap_err().is_conflict());

    // Read committed: the loser sees the winner's row on its next statement
    let seen = second
        .get_routing(&top, &fx.site_a)
        .await?
        .expect("winner's routing is visible");
    assert_eq!(seen.id, winner.id);
    let reused = routing::ensure_routing(&ctx, second.as_mut(), &top, &fx.site_a, Some(project.as_str()), "network").await?;
    assert_eq!(reused.id, winner.id);
    second.commit().await?;
    Ok(())
}

#[tokio::test]
async fn overlapping_same_value_binds_both_succeed() -> Result<()> {
    let Some(fx) = postgres_fixture().await? else {
        return Ok(());
    };
    let project = fx.id("p");
    let top = fx.id("net");
    let ctx = Context::for_tenant(project.clone());

    let mut session = fx.store.begin().await?;
    routing::create_routing(&ctx, session.as_mut(), &top, &fx.site_a, Some(project.as_str()), "network").await?;
    session.commit().await?;

    let mut first = fx.store.begin().await?;
    let second = fx.store.begin().await?;
    routing::bind_bottom(&ctx, first.as_mut(), &top, &fx.site_a, "b-1").await?;

    let retry = |mut session: Box<dyn tricircle_db::database::Session>, bottom: &'static str| {
        let (ctx, top, site) = (ctx.clone(), top.clone(), fx.site_a.clone());
        tokio::spawn(async move {
            let result = routing::bind_bottom(&ctx, session.as_mut(), &top, &site, bottom).await;
            (session, result)
        })
    };
    let racer = retry(second, "b-1");
    tokio::time::sleep(OVERLAP).await;
    first.commit().await?;

    let (mut second, result) = racer.await?;
    assert_eq!(result?.bottom_id.as_deref(), Some("b-1"));
    second.commit().await?;

    // A different value racing the same way is refused
    let mut first = fx.store.begin().await?;
    let second = fx.store.begin().await?;
    routing::unbind_bottom(&ctx, first.as_mut(), &top, &fx.site_a).await?;
    routing::bind_bottom(&ctx, first.as_mut(), &top, &fx.site_a, "b-2").await?;
    let racer = retry(second, "b-3");
    tokio::time::sleep(OVERLAP).await;
    first.commit().await?;

    let (_, result) = racer.await?;
    assert!(result.unwrap_err().is_conflict());
    Ok(())
}

#[tokio::test]
async fn binding_is_sticky_and_race_free() -> Result<()> {
    let Some(fx) = postgres_fixture().await? else {
        return Ok(());
    };
    let tenant = fx.id("t");
    let ctx = Context::for_tenant(tenant.clone());

    let mut first = fx.store.begin().await?;
    let mut second = fx.store.begin().await?;
    let placed = pod::get_or_create_binding(&ctx, first.as_mut(), &tenant, &fx.az1).await?;

    let racer = {
        let (ctx, tenant, az) = (ctx.clone(), tenant.clone(), fx.az1.clone());
        tokio::spawn(async move {
            let result = pod::get_or_create_binding(&ctx, second.as_mut(), &tenant, &az).await;
            (second, result)
        })
    };
    tokio::time::sleep(OVERLAP).await;
    first.commit().await?;

    let (mut second, result) = racer.await?;
    let raced = result?;
    assert_eq!(raced.id, placed.id);
    second.commit().await?;

    for _ in 0..3 {
        let mut session = fx.store.begin().await?;
        let again = pod::get_or_create_binding(&ctx, session.as_mut(), &tenant, &fx.az1).await?;
        assert_eq!(again.az_pod_map_id, placed.az_pod_map_id);
    }

    let mut session = fx.store.begin().await?;
    assert_eq!(pod::list_bindings(&ctx, session.as_mut(), &tenant).await?.len(), 1);
    let other_az = pod::get_or_create_binding(&ctx, session.as_mut(), &tenant, &fx.az2).await?;
    assert_ne!(other_az.az_pod_map_id, placed.az_pod_map_id);

    let err = pod::get_or_create_binding(&ctx, session.as_mut(), &tenant, &fx.id("az9"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Configuration(_)));
    Ok(())
}

#[tokio::test]
async fn overlapping_service_registrations_keep_one_endpoint() -> Result<()> {
    let Some(fx) = postgres_fixture().await? else {
        return Ok(());
    };
    let admin = Context::admin();

    let mut first = fx.store.begin().await?;
    let mut second = fx.store.begin().await?;
    site::register_service(&admin, first.as_mut(), &fx.site_a, "network", "http://10.0.0.1:9696").await?;

    let racer = {
        let (admin, site_id) = (admin.clone(), fx.site_a.clone());
        tokio::spawn(async move {
            let result =
                site::register_service(&admin, second.as_mut(), &site_id, "network", "http://10.0.0.2:9696").await;
            (second, result)
        })
    };
    tokio::time::sleep(OVERLAP).await;
    first.commit().await?;

    let (_, result) = racer.await?;
    assert!(result.unwrap_err().is_conflict());

    let mut session = fx.store.begin().await?;
    assert_eq!(
        site::get_service_url(&admin, session.as_mut(), &fx.site_a, "network").await?,
        "http://10.0.0.1:9696"
    );
    assert_eq!(site::list_services(&admin, session.as_mut(), &fx.site_a).await?.len(), 1);
    Ok(())
}
