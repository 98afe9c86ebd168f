//! Gateway health check URL.

use url::{form_urlencoded, Url};

use crate::domain::{ShiroError, ShiroResult};

const HEALTH_CHECK_PATH: &str = "health_check";

/// `{endpoint}/health_check` with one `service=` parameter per service.
///
/// An existing query string is kept byte for byte and the service parameters
/// are appended after it.
pub(crate) fn health_check_url(endpoint: &str, services: &[String]) -> ShiroResult<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| ShiroError::Config(format!("invalid gateway url: {}", e)))?;

    let path = format!("{}/{}", url.path().trim_end_matches('/'), HEALTH_CHECK_PATH);
    url.set_path(&path);

    if !services.is_empty() {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(services.iter().map(|s| ("service", s.as_str())))
            .finish();
        let query = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, encoded),
            _ => encoded,
        };
        url.set_query(Some(&query));
    }
    Ok(url)
}
