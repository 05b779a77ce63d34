//! Notification sink adapter.
//!
//! Implements [`EventSink`] by encoding each [`Notification`] as JSON,
//! logging it to the serial console and, while a central is connected,
//! pushing it out over the link's status characteristic.
//!
//! ```text
//! AppService ──emit──▶ NotifySink ──info!──▶ UART
//!                          │
//!                          └──notify──▶ LinkPort (if connected)
//! ```

use log::{info, warn};

use crate::app::events::Notification;
use crate::app::ports::{EventSink, LinkPort};

/// Adapter that mirrors every notification to the log and the link.
pub struct NotifySink<'a, L> {
    link: &'a mut L,
    sent: usize,
}

impl<'a, L: LinkPort> NotifySink<'a, L> {
    pub fn new(link: &'a mut L) -> Self {
        Self { link, sent: 0 }
    }

    /// Notifications pushed to the link by this sink.
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl<L: LinkPort> EventSink for NotifySink<'_, L> {
    fn emit(&mut self, notification: &Notification) {
        let json = match notification.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("NOTIFY encode failed ({}): {:?}", notification.kind(), e);
                return;
            }
        };
        info!("NOTIFY -> {}", String::from_utf8_lossy(&json));
        if self.link.is_connected() {
            self.link.notify(&json);
            self.sent += 1;
        }
    }
}
