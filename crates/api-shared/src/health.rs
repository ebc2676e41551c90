use crate::dto::HealthRes;

/// Simple health service used by the REST API.
#[derive(Clone)]
pub struct HealthService;

impl HealthService {
    /// Report service health.
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            status: "ok".into(),
        }
    }
}
