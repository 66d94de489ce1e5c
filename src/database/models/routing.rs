use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Timestamps;
use crate::database::error::{check_len, DbResult};
use crate::database::models::site::SITE_ID_MAX;

pub const RESOURCE_ID_MAX: usize = 36;
pub const RESOURCE_TYPE_MAX: usize = 64;

/// Common resource type names recorded in the routing table
pub mod resource_type {
    pub const NETWORK: &str = "network";
    pub const SUBNET: &str = "subnet";
    pub const PORT: &str = "port";
    pub const ROUTER: &str = "router";
    pub const SERVER: &str = "server";
    pub const VOLUME: &str = "volume";
}

/// Maps a top-level (logical) resource to its bottom-level (site-local) resource.
///
/// `bottom_id == None` means the routing is reserved but the remote site has
/// not confirmed creation yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ResourceRouting {
    pub id: i32,
    pub top_id: String,
    pub bottom_id: Option<String>,
    pub site_id: String,
    pub project_id: Option<String>,
    pub resource_type: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

impl ResourceRouting {
    pub fn is_pending(&self) -> bool {
        self.bottom_id.is_none()
    }

    pub fn resolution(&self) -> Resolution {
        match &self.bottom_id {
            Some(bottom_id) => Resolution::Bound(bottom_id.clone()),
            None => Resolution::Pending,
        }
    }
}

/// Values for a new routing reservation; the id is assigned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRouting {
    pub top_id: String,
    pub site_id: String,
    pub project_id: Option<String>,
    pub resource_type: String,
}

impl NewRouting {
    pub fn new(
        top_id: impl Into<String>,
        site_id: impl Into<String>,
        project_id: Option<String>,
        resource_type: impl Into<String>,
    ) -> DbResult<Self> {
        let new = Self {
            top_id: top_id.into(),
            site_id: site_id.into(),
            project_id,
            resource_type: resource_type.into(),
        };
        check_len("top_id", &new.top_id, RESOURCE_ID_MAX)?;
        check_len("site_id", &new.site_id, SITE_ID_MAX)?;
        check_len("resource_type", &new.resource_type, RESOURCE_TYPE_MAX)?;
        if let Some(project_id) = &new.project_id {
            check_len("project_id", project_id, RESOURCE_ID_MAX)?;
        }
        Ok(new)
    }
}

/// Outcome of resolving a top-level id on one site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "bottom_id", rename_all = "snake_case")]
pub enum Resolution {
    Bound(String),
    Pending,
}

impl Resolution {
    pub fn bottom_id(&self) -> Option<&str> {
        match self {
            Resolution::Bound(id) => Some(id),
            Resolution::Pending => None,
        }
    }
}

/// Optional predicates for listing routing rows; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingFilter {
    pub top_id: Option<String>,
    pub bottom_id: Option<String>,
    pub site_id: Option<String>,
    pub project_id: Option<String>,
    pub resource_type: Option<String>,
    pub bound: Option<bool>,
}

impl RoutingFilter {
    pub fn top(top_id: impl Into<String>) -> Self {
        Self {
            top_id: Some(top_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, row: &ResourceRouting) -> bool {
        fn eq(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |w| w == have)
        }

        eq(&self.top_id, &row.top_id)
            && eq(&self.site_id, &row.site_id)
            && eq(&self.resource_type, &row.resource_type)
            && self
                .bottom_id
                .as_ref()
                .map_or(true, |b| row.bottom_id.as_ref() == Some(b))
            && self
                .project_id
                .as_ref()
                .map_or(true, |p| row.project_id.as_ref() == Some(p))
            && self.bound.map_or(true, |bound| bound != row.is_pending())
    }
}
