//! Per-request identity and authorization scope.
//!
//! A `Context` is built once per inbound operation, either from identity
//! claims extracted upstream or from a serialized map, and is never mutated
//! afterwards. It carries no database handle; operations receive an open
//! session alongside it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::error::{DbError, DbResult};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default, rename = "user")]
    pub user_id: Option<String>,
    #[serde(default, rename = "tenant")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub user_domain: Option<String>,
    #[serde(default)]
    pub project_domain: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub show_deleted: bool,
    #[serde(default = "generate_request_id")]
    pub request_id: String,
    #[serde(default)]
    pub resource_uuid: Option<String>,
}

fn generate_request_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

/// Identity already extracted from the transport by an upstream step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub auth_token: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
    pub domain: Option<String>,
    pub user_domain: Option<String>,
    pub project_domain: Option<String>,
    pub roles: Vec<String>,
    pub request_id: Option<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            auth_token: None,
            user_id: None,
            tenant_id: None,
            user_name: None,
            tenant_name: None,
            domain: None,
            user_domain: None,
            project_domain: None,
            is_admin: false,
            read_only: false,
            show_deleted: false,
            request_id: generate_request_id(),
            resource_uuid: None,
        }
    }
}

impl Context {
    /// Plain context for internal database work, no identity attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that bypasses project scoping
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Self::default()
        }
    }

    /// Context scoped to one tenant
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Self::default()
        }
    }

    pub fn from_claims(claims: IdentityClaims) -> Self {
        let is_admin = claims.roles.iter().any(|r| r == ADMIN_ROLE);
        Self {
            auth_token: claims.auth_token,
            user_id: claims.user_id,
            tenant_id: claims.tenant_id,
            user_name: claims.user_name,
            tenant_name: claims.tenant_name,
            domain: claims.domain,
            user_domain: claims.user_domain,
            project_domain: claims.project_domain,
            is_admin,
            request_id: claims.request_id.unwrap_or_else(generate_request_id),
            ..Self::default()
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_show_deleted(mut self, show_deleted: bool) -> Self {
        self.show_deleted = show_deleted;
        self
    }

    pub fn with_resource_uuid(mut self, resource_uuid: impl Into<String>) -> Self {
        self.resource_uuid = Some(resource_uuid.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Context only holds strings and bools
            _ => Map::new(),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> DbResult<Self> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| DbError::invalid(format!("context: {}", e)))
    }

    /// Admins see every project; others only their own tenant's rows
    pub fn can_see_project(&self, project_id: Option<&str>) -> bool {
        if self.is_admin {
            return true;
        }
        match (self.tenant_id.as_deref(), project_id) {
            (Some(tenant), Some(project)) => tenant == project,
            _ => false,
        }
    }

    pub fn require_admin(&self) -> DbResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(DbError::not_authorized(format!(
                "admin context required (request {})",
                self.request_id
            )))
        }
    }

    pub fn require_writable(&self) -> DbResult<()> {
        if self.read_only {
            Err(DbError::not_authorized(format!(
                "read-only context (request {})",
                self.request_id
            )))
        } else {
            Ok(())
        }
    }

    /// Writes on behalf of `project_id` need admin or a matching tenant
    pub fn require_project(&self, project_id: Option<&str>) -> DbResult<()> {
        if self.can_see_project(project_id) {
            Ok(())
        } else {
            Err(DbError::not_authorized(format!(
                "tenant {:?} may not act on project {:?}",
                self.tenant_id, project_id
            )))
        }
    }
}
