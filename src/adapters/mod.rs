//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements                   | Connects to              |
//! |----------------|------------------------------|--------------------------|
//! | `hardware`     | ConnectivityPort             | WiFi link                |
//! |                | TemperatureProbe             | NTC thermistor (ADC1)    |
//! |                | EpochSource                  | SNTP-synced system clock |
//! | `tls_client`   | SecureConnector              | TCP + mbedTLS client     |
//! | `time`         | EpochSource                  | ESP32 system timer, SNTP |
//! | `udp`          | DatagramSink                 | lwIP / host UDP socket   |
//! | `wifi`         | ConnectivityPort             | ESP-IDF WiFi STA         |

pub mod hardware;
pub mod time;
pub mod tls_client;
pub mod udp;
pub mod wifi;
