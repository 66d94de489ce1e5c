#![allow(dead_code)]

use anyhow::Result;
use tokio::sync::OnceCell;
use tricircle_db::config::DatabaseConfig;
use tricircle_db::database::manager::connect_postgres;
use tricircle_db::database::{MemoryStore, PgStore, Store};
use tricircle_db::services::{pod, site};
use tricircle_db::Context;
use uuid::Uuid;

pub const SITE_A: &str = "site-A";
pub const SITE_B: &str = "site-B";

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Fresh in-process store with two sites (az1, az2), two pods in az1 and one in az2
pub async fn seeded_store() -> Result<MemoryStore> {
    let store = MemoryStore::new();
    let admin = Context::admin();
    let mut session = store.begin().await?;

    site::register_site(&admin, session.as_mut(), SITE_A, "Site A", "az1").await?;
    site::register_site(&admin, session.as_mut(), SITE_B, "Site B", "az2").await?;
    site::register_service(&admin, session.as_mut(), SITE_A, "network", "http://192.168.0.10:9696").await?;
    site::register_service(&admin, session.as_mut(), SITE_B, "network", "http://192.168.0.20:9696").await?;

    pod::create_pod_map(&admin, session.as_mut(), Some("az1"), Some("dc1"), "pod1", Some("az1")).await?;
    pod::create_pod_map(&admin, session.as_mut(), Some("az1"), Some("dc1"), "pod2", Some("az1")).await?;
    pod::create_pod_map(&admin, session.as_mut(), Some("az2"), Some("dc2"), "pod3", Some("az2")).await?;

    session.commit().await?;
    Ok(store)
}

/// Postgres store plus the ids seeded for one test. Every name carries a
/// per-test suffix so suites can share a database without cleanup.
pub struct PgFixture {
    pub store: PgStore,
    pub suffix: String,
    pub site_a: String,
    pub site_b: String,
    pub az1: String,
    pub az2: String,
}

impl PgFixture {
    /// Test-local id, short enough for 36-character columns
    pub fn id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.suffix)
    }
}

/// Connect, migrate once per test binary and seed; `None` when
/// `DATABASE_URL` is not set
pub async fn postgres_fixture() -> Result<Option<PgFixture>> {
    dotenvy::dotenv().ok();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping postgres test");
        return Ok(None);
    };

    let config = DatabaseConfig {
        url: Some(url.clone()),
        max_connections: 5,
        connection_timeout: 5,
        enable_query_logging: false,
        run_migrations: true,
    };
    let store = connect_postgres(&url, &config).await?;
    MIGRATED.get_or_try_init(|| store.migrate()).await?;

    let suffix = Uuid::new_v4().simple().to_string()[..12].to_string();
    let fixture = PgFixture {
        site_a: format!("site-A-{}", suffix),
        site_b: format!("site-B-{}", suffix),
        az1: format!("az1-{}", suffix),
        az2: format!("az2-{}", suffix),
        suffix,
        store,
    };

    let admin = Context::admin();
    let mut session = fixture.store.begin().await?;
    site::register_site(&admin, session.as_mut(), &fixture.site_a, &fixture.site_a, &fixture.az1).await?;
    site::register_site(&admin, session.as_mut(), &fixture.site_b, &fixture.site_b, &fixture.az2).await?;
    for (az, pod_name) in [(&fixture.az1, "pod1"), (&fixture.az1, "pod2"), (&fixture.az2, "pod3")] {
        pod::create_pod_map(&admin, session.as_mut(), Some(az.as_str()), Some("dc1"), pod_name, Some(az.as_str())).await?;
    }
    session.commit().await?;

    Ok(Some(fixture))
}
