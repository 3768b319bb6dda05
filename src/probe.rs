use crate::config::{Credentials, HttpMethod, ProbeDefinition, ProbeIdentity};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use url::Url;

/// A probe's request with every dependency placeholder substituted.
/// Built fresh for each execution.
#[derive(Clone, Debug)]
pub struct ResolvedRequest {
    pub identity: ProbeIdentity,
    pub address: Url,
    pub method: HttpMethod,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
}

impl ResolvedRequest {
    pub fn from_definition(definition: &ProbeDefinition, timeout: Duration) -> Self {
        let template = &definition.request;
        Self {
            identity: definition.identity.clone(),
            address: definition.address.clone(),
            method: template.method,
            body: template.body.clone(),
            headers: template.headers.clone(),
            query: template.query.clone(),
            credentials: template.credentials.clone(),
            timeout,
        }
    }

    /// Target URL with the query parameters appended to any already present.
    pub fn url(&self) -> Url {
        let mut url = self.address.clone();
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    pub fn encoded_query(&self) -> String {
        self.url().query().unwrap_or_default().to_string()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StatusCategory {
    Success,
    Failure,
}

impl StatusCategory {
    pub fn from_http_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            StatusCategory::Success
        } else {
            StatusCategory::Failure
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub category: StatusCategory,
    pub status: Option<u16>,
    pub body: String,
}

/// Most recent successful outcome of a probe, as seen by its dependents.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProbeResult {
    pub success: bool,
    pub payload: String,
    pub status: Option<u16>,
    pub recorded_at: SystemTime,
}

impl ProbeResult {
    pub fn success(payload: impl Into<String>, status: Option<u16>, recorded_at: SystemTime) -> Self {
        Self {
            success: true,
            payload: payload.into(),
            status,
            recorded_at,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ProbeErrorKind {
    Dns,
    Connect,
    ConnectTimeout,
    TlsHandshakeFailed,
    HttpTimeout,
    HttpStatusError,
    BodyRead,
    InvalidRequest,
    IoError,
}

impl ProbeErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeErrorKind::Dns => "dns",
            ProbeErrorKind::Connect => "connect",
            ProbeErrorKind::ConnectTimeout => "connect_timeout",
            ProbeErrorKind::TlsHandshakeFailed => "tls_handshake_failed",
            ProbeErrorKind::HttpTimeout => "http_timeout",
            ProbeErrorKind::HttpStatusError => "http_status_error",
            ProbeErrorKind::BodyRead => "body_read",
            ProbeErrorKind::InvalidRequest => "invalid_request",
            ProbeErrorKind::IoError => "io_error",
        }
    }
}

#[derive(Clone, Debug, Error)]
#[error("{}: {message}", .kind.label())]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// What one execution cycle ended with.
#[derive(Clone, Debug)]
pub enum ExecutionOutcome {
    Published(ProbeResult),
    Failed(ProbeError),
    Aborted { dependency: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckKind, RequestTemplate};

    fn definition() -> ProbeDefinition {
        let mut query = BTreeMap::new();
        query.insert("user".to_string(), "a b".to_string());
        query.insert("page".to_string(), "2".to_string());
        ProbeDefinition {
            identity: ProbeIdentity::new("tribe", "op"),
            address: Url::parse("http://example.com/items?fixed=1").expect("url"),
            interval: Duration::from_secs(5),
            dependencies: Vec::new(),
            request: RequestTemplate {
                query,
                ..RequestTemplate::default()
            },
            order: 0,
            check: CheckKind::Http,
            max_in_flight: None,
        }
    }

    #[test]
    fn url_appends_query_after_existing_pairs() {
        let request = ResolvedRequest::from_definition(&definition(), Duration::from_secs(1));
        assert_eq!(
            request.url().as_str(),
            "http://example.com/items?fixed=1&page=2&user=a+b"
        );
        assert_eq!(request.encoded_query(), "fixed=1&page=2&user=a+b");
    }

    #[test]
    fn url_without_query_is_unchanged() {
        let mut definition = definition();
        definition.request.query.clear();
        definition.address = Url::parse("http://example.com/items").expect("url");
        let request = ResolvedRequest::from_definition(&definition, Duration::from_secs(1));
        assert_eq!(request.url().as_str(), "http://example.com/items");
        assert_eq!(request.encoded_query(), "");
    }

    #[test]
    fn status_category_treats_only_2xx_as_success() {
        assert_eq!(StatusCategory::from_http_status(200), StatusCategory::Success);
        assert_eq!(StatusCategory::from_http_status(204), StatusCategory::Success);
        assert_eq!(StatusCategory::from_http_status(199), StatusCategory::Failure);
        assert_eq!(StatusCategory::from_http_status(301), StatusCategory::Failure);
        assert_eq!(StatusCategory::from_http_status(404), StatusCategory::Failure);
    }

    #[test]
    fn probe_error_display_includes_kind_label() {
        let err = ProbeError::new(ProbeErrorKind::HttpStatusError, "HTTP status 404");
        assert_eq!(err.to_string(), "http_status_error: HTTP status 404");
    }
}
