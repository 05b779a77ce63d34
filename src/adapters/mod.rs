//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `ble`          | LinkPort           | Bluedroid GATT server        |
//! | `hardware`     | SensorPort         | IR sensors (GPIO)            |
//! |                | ActuatorPort       | Motor bridge, buzzer, LED    |
//! |                | DisplayPort        | 16×2 LCD over I²C            |
//! | `notify_sink`  | EventSink          | Serial log + LinkPort        |
//! | `nvs`          | ConfigPort         | NVS / in-memory store        |
//! |                | StoragePort        |                              |
//! | `time`         | ClockPort          | ESP32 system timer, FreeRTOS |

pub mod ble;
pub mod hardware;
pub mod notify_sink;
pub mod nvs;
pub mod time;
