//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements         | Connects to                  |
//! |---------------|--------------------|------------------------------|
//! | `hardware`    | RangePort          | HC-SR04 on GPIO16/17         |
//! |               | ConnectivityPort   | (delegates to `wifi`)        |
//! |               | ClockPort, DelayNs |                              |
//! | `http`        | HttpClient         | ESP-IDF HTTPS client         |
//! | `log_sink`    | EventSink          | Serial log output            |
//! | `mqtt`        | BrokerPort         | ESP-IDF MQTT over TLS        |
//! | `nvs`         | ConfigPort         | NVS / in-memory store        |
//! | `status_page` | (none)             | ESP-IDF HTTP server, `GET /` |
//! | `telegram`    | NotifierPort       | Bot API over `HttpClient`    |
//! | `time`        | ClockPort          | ESP32 system timer + SNTP    |
//! | `wifi`        | ConnectivityPort   | ESP-IDF WiFi STA             |

pub mod device_id;
pub mod hardware;
pub mod http;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod status_page;
pub mod telegram;
pub mod time;
pub mod wifi;
