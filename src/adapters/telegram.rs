//! Chat-bot notification adapter.
//!
//! Implements [`NotifierPort`] with the Telegram Bot API `sendMessage`
//! method, issued as a GET over any [`HttpClient`]. The destination is the
//! chat id from the device settings.

use core::fmt::Write;

use log::{info, warn};

use crate::app::ports::{HttpClient, NotifierPort, NotifyError};

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramNotifier<H> {
    http: H,
    token: String,
}

impl<H: HttpClient> TelegramNotifier<H> {
    pub fn new(http: H, token: &str) -> Self {
        Self {
            http,
            token: String::from(token),
        }
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    fn send_url(&self, chat_id: &str, text: &str) -> String {
        let mut url = format!("{}/bot{}/sendMessage?chat_id=", API_BASE, self.token);
        percent_encode_into(&mut url, chat_id);
        url.push_str("&text=");
        percent_encode_into(&mut url, text);
        url
    }
}

impl<H: HttpClient> NotifierPort for TelegramNotifier<H> {
    fn send(&mut self, destination: &str, text: &str) -> Result<(), NotifyError> {
        let url = self.send_url(destination, text);
        let response = self.http.get(&url).map_err(|e| {
            warn!("notify: {}", e);
            NotifyError::Transport
        })?;
        if response.status != 200 {
            return Err(NotifyError::Rejected(response.status));
        }
        info!("notify: delivered to chat {}", destination);
        Ok(())
    }
}

/// RFC 3986 unreserved characters pass through; every other byte of the
/// UTF-8 encoding becomes `%XX`.
fn percent_encode_into(out: &mut String, input: &str) {
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{:02X}", byte);
        }
    }
}
