use crate::probe::{ProbeError, ProbeErrorKind};
use curl::Error as CurlError;
use std::io;

pub(super) fn map_curl_error(err: &CurlError) -> ProbeError {
    let kind = if err.is_couldnt_resolve_host() || err.is_couldnt_resolve_proxy() {
        ProbeErrorKind::Dns
    } else if err.is_operation_timedout() {
        ProbeErrorKind::HttpTimeout
    } else if err.is_couldnt_connect() {
        ProbeErrorKind::Connect
    } else if err.is_ssl_connect_error()
        || err.is_ssl_cacert()
        || err.is_ssl_certproblem()
        || err.is_ssl_cipher()
    {
        ProbeErrorKind::TlsHandshakeFailed
    } else if err.is_read_error() || err.is_recv_error() || err.is_partial_file() {
        ProbeErrorKind::BodyRead
    } else if err.is_url_malformed() || err.is_unsupported_protocol() {
        ProbeErrorKind::InvalidRequest
    } else {
        ProbeErrorKind::IoError
    };

    ProbeError::new(kind, err.to_string())
}

pub(super) fn map_io_error(err: &io::Error) -> ProbeError {
    let kind = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ProbeErrorKind::ConnectTimeout,
        _ => ProbeErrorKind::Connect,
    };
    ProbeError::new(kind, err.to_string())
}

/// libcurl drops a header given as `Name:`; an empty value has to be sent as `Name;`.
pub(super) fn header_line(name: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{name};")
    } else {
        format!("{name}: {value}")
    }
}

/// libcurl reports 0 when no response was received.
pub(super) fn status_from_code(code: u32) -> Option<u16> {
    match u16::try_from(code) {
        Ok(0) | Err(_) => None,
        Ok(status) => Some(status),
    }
}
