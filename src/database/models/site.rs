use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::error::{check_len, DbError, DbResult};

pub const SITE_ID_MAX: usize = 64;
pub const SERVICE_URL_MAX: usize = 512;

/// A cascaded site: one physical or logical deployment location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub site_id: String,
    pub site_name: String,
    pub az_id: String,
}

impl Site {
    pub fn new(
        site_id: impl Into<String>,
        site_name: impl Into<String>,
        az_id: impl Into<String>,
    ) -> DbResult<Self> {
        let site = Self {
            site_id: site_id.into(),
            site_name: site_name.into(),
            az_id: az_id.into(),
        };
        check_len("site_id", &site.site_id, SITE_ID_MAX)?;
        check_len("site_name", &site.site_name, SITE_ID_MAX)?;
        check_len("az_id", &site.az_id, SITE_ID_MAX)?;
        Ok(site)
    }
}

/// A service endpoint (e.g. "network" or "compute") exposed by a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SiteServiceConfiguration {
    pub service_id: String,
    pub site_id: String,
    pub service_type: String,
    pub service_url: String,
}

impl SiteServiceConfiguration {
    pub fn new(
        service_id: impl Into<String>,
        site_id: impl Into<String>,
        service_type: impl Into<String>,
        service_url: impl Into<String>,
    ) -> DbResult<Self> {
        let config = Self {
            service_id: service_id.into(),
            site_id: site_id.into(),
            service_type: service_type.into(),
            service_url: service_url.into(),
        };
        check_len("service_id", &config.service_id, SITE_ID_MAX)?;
        check_len("site_id", &config.site_id, SITE_ID_MAX)?;
        check_len("service_type", &config.service_type, SITE_ID_MAX)?;
        check_len("service_url", &config.service_url, SERVICE_URL_MAX)?;

        let parsed = url::Url::parse(&config.service_url)
            .map_err(|e| DbError::invalid(format!("service_url '{}': {}", config.service_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(DbError::invalid(format!(
                "service_url '{}' is not an absolute endpoint",
                config.service_url
            )));
        }
        Ok(config)
    }
}
