use super::Transport;
use super::helpers::map_io_error;
use crate::common::net::connect_target;
use crate::probe::{
    ProbeError, ProbeErrorKind, ResolvedRequest, StatusCategory, TransportResponse,
};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Instant;

/// Blackbox-style reachability check: succeeds when a TCP connection to the
/// target host and port can be established within the request timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn execute(&self, request: &ResolvedRequest) -> Result<TransportResponse, ProbeError> {
        let Some((host, port)) = connect_target(&request.address) else {
            return Err(ProbeError::new(
                ProbeErrorKind::InvalidRequest,
                format!("{} has no host or port to connect to", request.address),
            ));
        };

        let addrs: Vec<SocketAddr> = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|err| ProbeError::new(ProbeErrorKind::Dns, err.to_string()))?
            .collect();

        let started = Instant::now();
        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, request.timeout) {
                Ok(_stream) => {
                    let body = serde_json::json!({
                        "connected": true,
                        "remote": addr.to_string(),
                        "elapsed_ms": started.elapsed().as_millis() as u64,
                    });
                    return Ok(TransportResponse {
                        category: StatusCategory::Success,
                        status: None,
                        body: body.to_string(),
                    });
                }
                Err(err) => last_error = Some(err),
            }
        }

        Err(match last_error {
            Some(err) => map_io_error(&err),
            None => ProbeError::new(
                ProbeErrorKind::Dns,
                format!("{host} resolved to no addresses"),
            ),
        })
    }
}
