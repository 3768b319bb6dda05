mod client;
mod helpers;
mod tcp;

pub use client::HttpTransport;
pub use tcp::TcpTransport;

use crate::config::{CheckKind, DEFAULT_MAX_BODY_BYTES};
use crate::probe::{ProbeError, ResolvedRequest, TransportResponse};
use std::sync::Arc;

/// Performs one check against a target. One implementation per check kind.
///
/// A response with a non-success status is still `Ok`; `Err` is reserved for
/// requests that produced no usable response at all.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &ResolvedRequest) -> Result<TransportResponse, ProbeError>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TransportSettings {
    pub max_body_bytes: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

pub fn transport_for(check: CheckKind, settings: &TransportSettings) -> Arc<dyn Transport> {
    match check {
        CheckKind::Http => Arc::new(HttpTransport::new(settings.max_body_bytes)),
        CheckKind::Tcp => Arc::new(TcpTransport),
    }
}
