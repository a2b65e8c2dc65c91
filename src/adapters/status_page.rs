//! Local status page.
//!
//! `GET /` answers `200 text/plain` with the running firmware version.
//! On device it is served by the ESP-IDF HTTP server, which runs handlers
//! on its own task; the handler only reads the version string, so it
//! shares nothing with the device loop.

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{Configuration, EspHttpServer};

/// Body of the status page.
pub fn status_body(version: &str) -> String {
    format!("v{}", version)
}

/// Handle to the running server; dropping it stops serving.
pub struct StatusPage {
    #[cfg(target_os = "espidf")]
    _server: EspHttpServer<'static>,
    version: &'static str,
}

impl StatusPage {
    #[cfg(target_os = "espidf")]
    pub fn start(version: &'static str) -> anyhow::Result<Self> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::io::{EspIOError, Write};

        let mut server = EspHttpServer::new(&Configuration::default())?;
        server.fn_handler("/", Method::Get, move |req| -> Result<(), EspIOError> {
            let mut resp = req.into_response(200, Some("OK"), &[("Content-Type", "text/plain")])?;
            resp.write_all(status_body(version).as_bytes())?;
            Ok(())
        })?;
        log::info!("status page: serving v{} on port 80", version);
        Ok(Self {
            _server: server,
            version,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(version: &'static str) -> anyhow::Result<Self> {
        Ok(Self { version })
    }

    /// What `GET /` currently answers.
    pub fn body(&self) -> String {
        status_body(self.version)
    }
}
