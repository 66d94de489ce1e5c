use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Timestamps;
use crate::database::error::{check_len, DbResult};

pub const NAME_MAX: usize = 255;
pub const TENANT_ID_MAX: usize = 36;

/// Maps an availability zone to a pod inside a data center.
///
/// `(az_name, pod_name)` is unique: an AZ never maps to the same pod twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PodMap {
    pub id: String,
    pub az_name: Option<String>,
    pub dc_name: Option<String>,
    pub pod_name: String,
    pub pod_az_name: Option<String>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

impl PodMap {
    pub fn new(
        az_name: Option<String>,
        dc_name: Option<String>,
        pod_name: impl Into<String>,
        pod_az_name: Option<String>,
    ) -> DbResult<Self> {
        let pod = Self {
            id: Uuid::new_v4().to_string(),
            az_name,
            dc_name,
            pod_name: pod_name.into(),
            pod_az_name,
            timestamps: Timestamps::now(),
        };
        check_len("pod_name", &pod.pod_name, NAME_MAX)?;
        for (field, value) in [
            ("az_name", &pod.az_name),
            ("dc_name", &pod.dc_name),
            ("pod_az_name", &pod.pod_az_name),
        ] {
            if let Some(value) = value {
                check_len(field, value, NAME_MAX)?;
            }
        }
        Ok(pod)
    }

    /// True when both rows claim the same (az_name, pod_name) slot.
    /// Rows without an AZ never collide, matching SQL NULL semantics.
    pub fn same_slot(&self, other: &PodMap) -> bool {
        self.az_name.is_some() && self.az_name == other.az_name && self.pod_name == other.pod_name
    }
}

/// Binds a tenant to one pod map entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PodBinding {
    pub id: String,
    pub tenant_id: String,
    pub az_pod_map_id: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub timestamps: Timestamps,
}

impl PodBinding {
    pub fn new(tenant_id: impl Into<String>, az_pod_map_id: impl Into<String>) -> DbResult<Self> {
        let binding = Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            az_pod_map_id: az_pod_map_id.into(),
            timestamps: Timestamps::now(),
        };
        check_len("tenant_id", &binding.tenant_id, TENANT_ID_MAX)?;
        check_len("az_pod_map_id", &binding.az_pod_map_id, TENANT_ID_MAX)?;
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_map_serializes_flat_timestamps() {
        let pod = PodMap::new(Some("az1".into()), Some("dc1".into()), "pod1", None).unwrap();
        let value = serde_json::to_value(&pod).unwrap();
        assert!(value.get("created_at").is_some());
        assert!(value.get("timestamps").is_none());
        assert_eq!(value["pod_name"], "pod1");
    }

    #[test]
    fn pod_name_is_required() {
        assert!(PodMap::new(Some("az1".into()), None, "", None).is_err());
    }
}
