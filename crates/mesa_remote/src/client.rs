use mesa_core::error::AppError;
use url::{Host, Url};

use crate::config::RemoteConfig;

const BODY_SNIPPET_CHARS: usize = 200;

/// Thin authenticated HTTP client for the report service.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    token: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, AppError> {
        let base_url = validate_base_url(&config.base_url)?;
        let token = config.token.trim().to_string();
        if token.is_empty() {
            return Err(AppError::validation(
                "REMOTE_TOKEN_MISSING",
                "A bearer credential is required",
            ));
        }
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            base_url,
            token,
            agent,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base_url}/{segments...}`; each segment is percent-encoded, so ids may contain `/` or spaces.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| invalid_url(self.base_url.as_str(), "URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Request against the endpoint for `segments`, carrying the bearer credential.
    pub fn request(&self, method: &str, segments: &[&str]) -> Result<ureq::Request, AppError> {
        let url = self.endpoint(segments)?;
        Ok(self
            .agent
            .request(method, url.as_str())
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/json"))
    }
}

fn invalid_url(base_url: &str, reason: &str) -> AppError {
    AppError::validation("REMOTE_BASE_URL_INVALID", "Report service URL is not allowed")
        .with_details(format!("base_url={base_url}; {reason}"))
}

fn is_loopback(host: Host<&str>) -> bool {
    match host {
        Host::Ipv4(ip) => ip.is_loopback(),
        Host::Ipv6(ip) => ip.is_loopback(),
        Host::Domain(name) => name.eq_ignore_ascii_case("localhost"),
    }
}

/// Parse the service URL and reject shapes that could leak the credential.
///
/// `https` is required except for loopback hosts. Userinfo, query strings and fragments are refused.
pub fn validate_base_url(raw: &str) -> Result<Url, AppError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|e| invalid_url(raw, &e.to_string()))?;
    let secure = match url.scheme() {
        "https" => true,
        "http" => false,
        _ => return Err(invalid_url(raw, "scheme must be http or https")),
    };
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid_url(raw, "query and fragment are not allowed"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid_url(raw, "userinfo is not allowed"));
    }
    let Some(host) = url.host() else {
        return Err(invalid_url(raw, "missing host"));
    };
    if url.port() == Some(0) {
        return Err(invalid_url(raw, "invalid port"));
    }
    if !secure && !is_loopback(host) {
        return Err(invalid_url(raw, "plain http is only allowed for loopback hosts"));
    }
    Ok(url)
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
    out.push('…');
    out
}

/// Server-provided message from `{"message": …}` or `{"error": …}` bodies.
fn server_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|k| v.get(k).and_then(|m| m.as_str()))
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

/// Map a non-success HTTP status to the error taxonomy.
pub fn classify_status(status: u16, body: &str) -> AppError {
    let message = |fallback: &str| server_message(body).unwrap_or_else(|| fallback.to_string());
    let err = match status {
        400 | 422 => AppError::validation("REMOTE_REJECTED", message("The service rejected the request")),
        401 | 403 => AppError::authorization(
            "REMOTE_UNAUTHORIZED",
            message("The service refused the credential"),
        ),
        404 | 410 => AppError::not_found("REMOTE_REPORT_NOT_FOUND", message("Report does not exist")),
        429 => AppError::server("REMOTE_RATE_LIMITED", message("Too many requests")),
        500..=599 => AppError::server("REMOTE_SERVER_ERROR", message("The service failed")),
        _ => AppError::server("REMOTE_UNEXPECTED_STATUS", message("Unexpected response"))
            .with_retryable(false),
    };
    err.with_details(format!("status={status}; body={}", snippet(body)))
}

/// Convert a ureq failure for operation `op` into an `AppError`.
pub fn map_ureq_error(op: &str, err: ureq::Error) -> AppError {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            let mut mapped = classify_status(status, &body);
            mapped.details = Some(format!(
                "op={op}; {}",
                mapped.details.unwrap_or_default()
            ));
            mapped
        }
        ureq::Error::Transport(t) => {
            AppError::network("REMOTE_UNREACHABLE", "Failed to reach the report service")
                .with_details(format!("op={op}: {t}"))
        }
    }
}
