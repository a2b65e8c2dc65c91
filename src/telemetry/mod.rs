//! Telemetry — the authenticated broker session and what travels over it.
//!
//! - [`session`]: connection state machine, reconnect policy, publish.
//! - [`credential`]: time-boxed ES256 JWT minted per connection.
//! - [`payload`]: outbound reading and inbound remote-config wire formats.

pub mod credential;
pub mod payload;
pub mod session;

pub use credential::{CredentialError, CredentialIssuer, SessionCredential, signing_key_from_pem};
pub use payload::{RemoteConfig, RemoteConfigError, TelemetryPayload};
pub use session::{SessionConfig, SessionState, TelemetrySession, wait_for_network};
