pub mod pod;
pub mod routing;
pub mod site;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub use pod::{PodBinding, PodMap};
pub use routing::{resource_type, NewRouting, Resolution, ResourceRouting, RoutingFilter};
pub use site::{Site, SiteServiceConfiguration};

/// Creation and last-update times shared by the timestamped tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn now() -> Self {
        Self {
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
