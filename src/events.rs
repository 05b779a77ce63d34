//! Link event queue.
//!
//! Events are produced by the BLE stack's callback context (connect,
//! disconnect, characteristic write) and consumed by the main loop, which
//! is the only code that touches the reminder repository.
//!
//! ```text
//! ┌──────────────┐  LinkEvent   ┌──────────────┐
//! │  GATTS cb    │─────────────▶│  Main Loop   │──▶ AppService
//! │  (BT task)   │  try_send    │  (consumer)  │
//! └──────────────┘   depth 8    └──────────────┘
//! ```
//!
//! A command written while a dispense cycle is blocking the main loop
//! waits here and is handled once the cycle returns.  When the queue is
//! full the newest event is dropped and logged.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

/// Largest command payload accepted from the link.
pub const MAX_COMMAND_LEN: usize = 512;

/// Queue depth.
pub const LINK_QUEUE_DEPTH: usize = 8;

/// Raw command bytes, as written by the central.
pub type CommandFrame = heapless::Vec<u8, MAX_COMMAND_LEN>;

/// Things that happen on the link, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Command(CommandFrame),
}

impl LinkEvent {
    /// Copy a written payload into a command event.  Payloads longer than
    /// [`MAX_COMMAND_LEN`] are rejected.
    pub fn command(payload: &[u8]) -> Option<Self> {
        CommandFrame::from_slice(payload).ok().map(Self::Command)
    }
}

/// Bounded MPMC queue bridging the link callbacks and the main loop.
pub struct LinkQueue {
    channel: Channel<CriticalSectionRawMutex, LinkEvent, LINK_QUEUE_DEPTH>,
}

impl LinkQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue from any context.  Returns `false` if the event was dropped.
    pub fn push(&self, event: LinkEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                warn!("LINK: event queue full, dropping event");
                false
            }
        }
    }

    pub fn try_next(&self) -> Option<LinkEvent> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending events into a callback, FIFO.
    pub fn drain(&self, mut handler: impl FnMut(LinkEvent)) -> usize {
        let mut n = 0;
        while let Some(event) = self.try_next() {
            handler(event);
            n += 1;
        }
        n
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for LinkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide queue fed by the BLE adapter.
pub static LINK_EVENTS: LinkQueue = LinkQueue::new();
