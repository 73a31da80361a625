use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Liveness of the page service
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}
