//! Boot-time self-update.
//!
//! ```text
//!  check_for_update ──None──▶ UpToDate
//!        │ Some(url)
//!        ▼
//!  apply_update ──▶ DownloadFailed | ApplyFailed   (boot continues on current image)
//!        │
//!        ▼ Applied
//!     restart
//! ```
//!
//! Every failure fails open: the device always ends up either restarted on
//! the new image or running the current one.

use core::fmt;

use log::{info, warn};

use crate::app::ports::{HttpClient, ImageWriter, RestartPort};
use crate::config::SystemConfig;
use crate::error::Error;

/// Body is streamed into the image writer in chunks of this size.
pub const DOWNLOAD_CHUNK_SIZE: usize = 1024;

/// Longest version-check body taken as a download URL. Anything larger is
/// not a URL (portal page, misrouted binary) and is not buffered.
pub const MAX_VERSION_BODY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Applied,
    DownloadFailed,
    ApplyFailed,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UpToDate => "up to date",
            Self::Applied => "applied",
            Self::DownloadFailed => "download failed",
            Self::ApplyFailed => "apply failed",
        };
        f.write_str(name)
    }
}

pub struct UpdateSequencer {
    base_url: String,
    version: String,
    variant: String,
}

impl UpdateSequencer {
    pub fn new(base_url: &str, version: &str, variant: &str) -> Self {
        Self {
            base_url: String::from(base_url),
            version: String::from(version),
            variant: String::from(variant),
        }
    }

    pub fn from_config(cfg: &SystemConfig, version: &str) -> Self {
        Self::new(&cfg.version_check_url, version, &cfg.variant)
    }

    /// `<base>?version=<v>&variant=<p>`.
    pub fn version_check_url(&self) -> String {
        let sep = if self.base_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}version={}&variant={}",
            self.base_url, sep, self.version, self.variant
        )
    }

    /// Ask the version service for a newer image.
    ///
    /// Only a 200 with a non-blank body yields a URL; every other answer,
    /// including transport errors, means "up to date".
    pub fn check_for_update(&self, http: &mut impl HttpClient) -> Option<String> {
        let url = self.version_check_url();
        info!("update: checking {}", url);

        let response = match http.get(&url) {
            Ok(r) => r,
            Err(e) => {
                warn!("update: version check failed: {}", e);
                return None;
            }
        };
        if response.status != 200 {
            info!("update: version service answered {}, up to date", response.status);
            return None;
        }
        if response
            .content_length
            .is_some_and(|len| len > MAX_VERSION_BODY as u64)
        {
            warn!("update: version check body too large, ignoring");
            return None;
        }

        let body = match read_text(http) {
            Ok(Some(body)) => body,
            Ok(None) => {
                warn!("update: version check body exceeds {} bytes, ignoring", MAX_VERSION_BODY);
                return None;
            }
            Err(e) => {
                warn!("update: version check body unreadable: {}", e);
                return None;
            }
        };
        let download_url = body.trim();
        if download_url.is_empty() {
            info!("update: v{} is current", self.version);
            return None;
        }
        info!("update: new image at {}", download_url);
        Some(String::from(download_url))
    }

    /// Download `url` and stream it into `writer`.
    ///
    /// The image is finalized only after exactly the declared number of
    /// bytes was written; anything short is aborted.
    pub fn apply_update(
        &self,
        url: &str,
        http: &mut impl HttpClient,
        writer: &mut impl ImageWriter,
    ) -> UpdateOutcome {
        let response = match http.get(url) {
            Ok(r) => r,
            Err(e) => {
                warn!("update: download failed: {}", e);
                return UpdateOutcome::DownloadFailed;
            }
        };
        if response.status != 200 {
            warn!("update: download answered {}", response.status);
            return UpdateOutcome::DownloadFailed;
        }
        let declared = match response.content_length {
            Some(len) if len > 0 => len,
            _ => {
                warn!("update: no content length in response");
                return UpdateOutcome::DownloadFailed;
            }
        };

        let Ok(size) = u32::try_from(declared) else {
            warn!("update: image of {} bytes cannot fit", declared);
            return UpdateOutcome::ApplyFailed;
        };
        if let Err(e) = writer.begin(size) {
            warn!("update: not enough space to begin: {}", e);
            return UpdateOutcome::ApplyFailed;
        }

        info!("update: writing {} bytes, this takes a while", declared);
        let written = match stream_body(http, writer, declared) {
            Ok(n) => n,
            Err(()) => {
                writer.abort();
                return UpdateOutcome::ApplyFailed;
            }
        };
        if written != declared {
            warn!("update: {} ({}/{} bytes)", Error::DownloadIncomplete, written, declared);
            writer.abort();
            return UpdateOutcome::ApplyFailed;
        }

        match writer.finalize() {
            Ok(()) => {
                info!("update: {} bytes written and verified", written);
                UpdateOutcome::Applied
            }
            Err(e) => {
                warn!("update: finalize failed: {}", e);
                writer.abort();
                UpdateOutcome::ApplyFailed
            }
        }
    }

    /// Check, apply, and restart on success. Runs once per boot.
    pub fn run(
        &self,
        http: &mut impl HttpClient,
        writer: &mut impl ImageWriter,
        restart: &mut impl RestartPort,
    ) -> UpdateOutcome {
        let outcome = match self.check_for_update(http) {
            None => UpdateOutcome::UpToDate,
            Some(url) => self.apply_update(&url, http, writer),
        };
        match outcome {
            UpdateOutcome::Applied => {
                info!("update: restarting into new image");
                restart.restart();
            }
            UpdateOutcome::UpToDate => {}
            UpdateOutcome::DownloadFailed | UpdateOutcome::ApplyFailed => {
                warn!("update: {}, continuing on v{}", outcome, self.version);
            }
        }
        outcome
    }
}

/// Copy up to `declared` body bytes into `writer`. Returns the count
/// written; a read error ends the stream early, a write error is fatal.
fn stream_body(
    http: &mut impl HttpClient,
    writer: &mut impl ImageWriter,
    declared: u64,
) -> Result<u64, ()> {
    let mut buf = [0u8; DOWNLOAD_CHUNK_SIZE];
    let mut written: u64 = 0;
    while written < declared {
        let want = usize::try_from(declared - written)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let n = match http.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("update: body read failed after {} bytes: {}", written, e);
                break;
            }
        };
        if let Err(e) = writer.write(&buf[..n]) {
            warn!("update: image write failed: {}", e);
            return Err(());
        }
        written += n as u64;
    }
    Ok(written)
}

/// Read a small text body to the end; `None` once it outgrows
/// [`MAX_VERSION_BODY`].
fn read_text(
    http: &mut impl HttpClient,
) -> Result<Option<String>, crate::app::ports::HttpError> {
    let mut body: heapless::Vec<u8, MAX_VERSION_BODY> = heapless::Vec::new();
    let mut buf = [0u8; 128];
    loop {
        let n = http.read(&mut buf)?;
        if n == 0 {
            break;
        }
        if body.extend_from_slice(&buf[..n]).is_err() {
            return Ok(None);
        }
    }
    Ok(Some(String::from_utf8_lossy(&body).into_owned()))
}
