//! HTTPS client adapter.
//!
//! Implements [`HttpClient`] for the version check, the image download and
//! the chat notifier. Each `get` opens a fresh connection; the body is then
//! pulled with `read` until it returns 0.
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` with the certificate
//!   bundle attached.
//! - **all other targets**: scripted routes keyed by URL prefix, `404` for
//!   anything unscripted.

use log::{debug, warn};

use crate::app::ports::{HttpClient, HttpError, HttpResponse};

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::Method;

#[cfg(target_os = "espidf")]
const REQUEST_TIMEOUT: core::time::Duration = core::time::Duration::from_secs(30);

pub struct HttpAdapter {
    #[cfg(target_os = "espidf")]
    conn: Option<EspHttpConnection>,
    #[cfg(not(target_os = "espidf"))]
    routes: Vec<SimRoute>,
    #[cfg(not(target_os = "espidf"))]
    body: std::collections::VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    requested: Vec<String>,
}

/// Simulation: canned answer for URLs starting with `prefix`.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
pub struct SimRoute {
    pub prefix: String,
    pub status: u16,
    pub body: Vec<u8>,
    /// Overrides the declared length, to script truncated downloads.
    pub declared_length: Option<u64>,
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            conn: None,
            #[cfg(not(target_os = "espidf"))]
            routes: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            body: std::collections::VecDeque::new(),
            #[cfg(not(target_os = "espidf"))]
            requested: Vec::new(),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_route(&mut self, prefix: &str, status: u16, body: &[u8]) {
        self.routes.push(SimRoute {
            prefix: String::from(prefix),
            status,
            body: body.to_vec(),
            declared_length: None,
        });
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_add_route(&mut self, route: SimRoute) {
        self.routes.push(route);
    }

    /// Simulation: every URL requested so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    #[cfg(target_os = "espidf")]
    fn platform_get(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        self.conn = None;
        let mut conn = EspHttpConnection::new(&Configuration {
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            timeout: Some(REQUEST_TIMEOUT),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("HTTP: connection init failed: {:?}", e);
            HttpError::Connect
        })?;

        conn.initiate_request(Method::Get, url, &[]).map_err(|e| {
            warn!("HTTP: request failed: {:?}", e);
            HttpError::Connect
        })?;
        conn.initiate_response().map_err(|e| {
            warn!("HTTP: no response: {:?}", e);
            HttpError::NoResponse
        })?;

        let response = HttpResponse {
            status: conn.status(),
            content_length: conn
                .header("Content-Length")
                .and_then(|v| v.trim().parse().ok()),
        };
        self.conn = Some(conn);
        Ok(response)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_get(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        self.requested.push(String::from(url));
        self.body.clear();
        let Some(route) = self.routes.iter().find(|r| url.starts_with(&r.prefix)) else {
            return Ok(HttpResponse {
                status: 404,
                content_length: Some(0),
            });
        };
        self.body.extend(route.body.iter().copied());
        Ok(HttpResponse {
            status: route.status,
            content_length: route
                .declared_length
                .or(Some(route.body.len() as u64)),
        })
    }

    #[cfg(target_os = "espidf")]
    fn platform_read(&mut self, buf: &mut [u8]) -> Result<usize, HttpError> {
        let conn = self.conn.as_mut().ok_or(HttpError::NoResponse)?;
        conn.read(buf).map_err(|e| {
            warn!("HTTP: read failed: {:?}", e);
            HttpError::Read
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_read(&mut self, buf: &mut [u8]) -> Result<usize, HttpError> {
        let n = buf.len().min(self.body.len());
        for (slot, byte) in buf.iter_mut().zip(self.body.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl HttpClient for HttpAdapter {
    fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        let response = self.platform_get(url)?;
        debug!(
            "HTTP: GET -> {} ({:?} bytes)",
            response.status, response.content_length
        );
        Ok(response)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, HttpError> {
        self.platform_read(buf)
    }
}
