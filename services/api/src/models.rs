//! API Models
//!
//! Response bodies of the plain HTTP endpoints, documented with `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct HealthResponse {
    #[schema(value_type = String, example = "healthy")]
    pub status: HealthStatus,
    /// Whether an upstream credential was configured at startup.
    pub api_key_configured: bool,
    pub timestamp: DateTime<Utc>,
}
