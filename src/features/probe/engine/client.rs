use super::Transport;
use super::helpers::{header_line, map_curl_error, status_from_code};
use crate::config::HttpMethod;
use crate::probe::{
    ProbeError, ProbeErrorKind, ResolvedRequest, StatusCategory, TransportResponse,
};
use curl::Error as CurlError;
use curl::easy::{Auth, Easy2, Handler, List, WriteError};

const MAX_REDIRECTS: u32 = 10;

#[derive(Default)]
struct BodyCollector {
    body: Vec<u8>,
    limit: usize,
    limit_reached: bool,
}

impl BodyCollector {
    fn reset(&mut self, limit: usize) {
        self.body.clear();
        self.limit = limit;
        self.limit_reached = false;
    }
}

impl Handler for BodyCollector {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        let take = if self.limit == 0 {
            data.len()
        } else {
            let remaining = self.limit.saturating_sub(self.body.len());
            data.len().min(remaining)
        };

        self.body.extend_from_slice(&data[..take]);
        if self.limit > 0 && self.body.len() >= self.limit {
            self.limit_reached = true;
        }

        Ok(data.len())
    }

    fn progress(&mut self, _dltotal: f64, dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        if self.limit == 0 {
            return true;
        }

        if self.limit_reached {
            return false;
        }

        if dlnow >= self.limit as f64 {
            self.limit_reached = true;
            return false;
        }

        true
    }
}

/// HTTP check backed by libcurl. A fresh handle is used per execution since
/// executions of the same probe may overlap.
#[derive(Debug, Clone, Copy)]
pub struct HttpTransport {
    max_body_bytes: usize,
}

impl HttpTransport {
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }

    fn configure(
        &self,
        easy: &mut Easy2<BodyCollector>,
        request: &ResolvedRequest,
    ) -> Result<(), CurlError> {
        easy.url(request.url().as_str())?;
        easy.timeout(request.timeout)?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTS)?;
        easy.accept_encoding("")?;
        easy.progress(true)?;

        match request.method {
            HttpMethod::Head => easy.nobody(true)?,
            method => {
                let needs_body = matches!(
                    method,
                    HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch
                );
                if needs_body || !request.body.is_empty() {
                    easy.post_fields_copy(request.body.as_bytes())?;
                }
                easy.custom_request(method.as_str())?;
            }
        }

        if !request.headers.is_empty() {
            let mut list = List::new();
            for (name, value) in &request.headers {
                list.append(&header_line(name, value))?;
            }
            easy.http_headers(list)?;
        }

        if let Some(credentials) = &request.credentials
            && credentials.is_complete()
        {
            let mut auth = Auth::new();
            auth.basic(true);
            easy.http_auth(&auth)?;
            easy.username(&credentials.username)?;
            easy.password(credentials.password.expose())?;
        }

        Ok(())
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ResolvedRequest) -> Result<TransportResponse, ProbeError> {
        let mut easy = Easy2::new(BodyCollector::default());
        easy.get_mut().reset(self.max_body_bytes);
        self.configure(&mut easy, request)
            .map_err(|err| ProbeError::new(ProbeErrorKind::InvalidRequest, err.to_string()))?;

        if let Err(err) = easy.perform() {
            let aborted_by_limit = easy.get_ref().limit_reached
                && (err.is_write_error() || err.is_aborted_by_callback());
            if !aborted_by_limit {
                return Err(map_curl_error(&err));
            }
        }

        let code = easy.response_code().map_err(|err| map_curl_error(&err))?;
        let status = status_from_code(code);
        let body = String::from_utf8_lossy(&easy.get_ref().body).into_owned();

        Ok(TransportResponse {
            category: status.map_or(StatusCategory::Failure, StatusCategory::from_http_status),
            status,
            body,
        })
    }
}
