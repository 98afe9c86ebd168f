//! Health checks that work against any client.

use tracing::debug;

use crate::domain::{parse_health_response, Config, HealthCheck, ShiroResult};
use crate::ports::ShiroClient;

/// Phylum endpoint used when the client cannot enumerate services.
pub const PHYLUM_HEALTH_CHECK_METHOD: &str = "healthcheck";

/// Checks connectivity from this client to its upstream services.
///
/// Clients with a [`HealthChecker`](crate::ports::HealthChecker) query the
/// named `services` (e.g. `phylum`, `shiroclient_gateway`). Others, such as
/// mock clients, ignore `services` and invoke the phylum's `healthcheck`
/// endpoint; a phylum failure is returned as an error.
pub async fn remote_health_check(
    client: &dyn ShiroClient,
    services: &[String],
    configs: &[Config],
) -> ShiroResult<HealthCheck> {
    if let Some(checker) = client.health_checker() {
        return checker.health_check(services, configs).await;
    }

    debug!("client has no service enumeration; calling phylum healthcheck");
    let success = client
        .call(PHYLUM_HEALTH_CHECK_METHOD, configs)
        .await?
        .into_result()?;
    parse_health_response(&success.result)
}
