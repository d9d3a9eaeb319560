//! Fix hand-off between the location thread and the publish worker.
//!
//! Uses `embassy-sync` primitives so the producer never blocks and the
//! worker wakes as soon as a fix is posted.
//!
//! ```text
//! ┌────────────────┐  post(fix)  ┌────────────┐  receive()  ┌────────────────┐
//! │ location thread│────────────▶│ FixMailbox │────────────▶│ publish worker │
//! └────────────────┘             └────────────┘             └────────────────┘
//! ```
//!
//! - [`Backpressure::LatestOnly`]: a one-slot cell behind a blocking
//!   `Mutex` plus a wake-up `Signal`; posting over an unread fix replaces it.
//! - [`Backpressure::Fifo`]: a bounded `Channel`; posting into a full queue
//!   evicts the oldest fix.
//!
//! Either way every replaced or evicted fix is counted as superseded, and
//! each posted fix is either received or counted exactly once.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;

use crate::app::payload::PositionFix;
use crate::config::Backpressure;

/// Queue depth for [`Backpressure::Fifo`].
pub const FIFO_DEPTH: usize = 8;

/// Latest-only slot.  The swap and the superseded check happen under one
/// lock; `wake` only tells the worker to look.
struct LatestSlot {
    fix: Mutex<CriticalSectionRawMutex, Cell<Option<PositionFix>>>,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl LatestSlot {
    fn new() -> Self {
        Self {
            fix: Mutex::new(Cell::new(None)),
            wake: Signal::new(),
        }
    }

    /// Store `fix`; `true` when it replaced an unread one.
    fn replace(&self, fix: PositionFix) -> bool {
        let replaced = self.fix.lock(|cell| cell.replace(Some(fix)).is_some());
        self.wake.signal(());
        replaced
    }

    fn take(&self) -> Option<PositionFix> {
        self.fix.lock(Cell::take)
    }

    async fn wait(&self) -> PositionFix {
        loop {
            if let Some(fix) = self.take() {
                return fix;
            }
            self.wake.wait().await;
        }
    }
}

enum Slot {
    Latest(LatestSlot),
    Fifo(Channel<CriticalSectionRawMutex, PositionFix, FIFO_DEPTH>),
}

/// Single-consumer hand-off for position fixes.
pub struct FixMailbox {
    slot: Slot,
    superseded: AtomicU32,
}

impl FixMailbox {
    pub fn new(policy: Backpressure) -> Self {
        let slot = match policy {
            Backpressure::LatestOnly => Slot::Latest(LatestSlot::new()),
            Backpressure::Fifo => Slot::Fifo(Channel::new()),
        };
        Self {
            slot,
            superseded: AtomicU32::new(0),
        }
    }

    pub fn policy(&self) -> Backpressure {
        match self.slot {
            Slot::Latest(_) => Backpressure::LatestOnly,
            Slot::Fifo(_) => Backpressure::Fifo,
        }
    }

    /// Hand a fix to the worker.  Never blocks.
    pub fn post(&self, fix: PositionFix) {
        match &self.slot {
            Slot::Latest(slot) => {
                if slot.replace(fix) {
                    self.superseded.fetch_add(1, Ordering::Relaxed);
                }
            }
            Slot::Fifo(queue) => {
                if let Err(TrySendError::Full(fix)) = queue.try_send(fix) {
                    let _ = queue.try_receive();
                    self.superseded.fetch_add(1, Ordering::Relaxed);
                    let _ = queue.try_send(fix);
                }
            }
        }
    }

    /// Wait for the next fix.
    pub async fn receive(&self) -> PositionFix {
        match &self.slot {
            Slot::Latest(slot) => slot.wait().await,
            Slot::Fifo(queue) => queue.receive().await,
        }
    }

    /// Take the next fix if one is pending.
    pub fn try_receive(&self) -> Option<PositionFix> {
        match &self.slot {
            Slot::Latest(slot) => slot.take(),
            Slot::Fifo(queue) => queue.try_receive().ok(),
        }
    }

    /// Superseded fixes since the last call.
    pub fn take_superseded(&self) -> u32 {
        self.superseded.swap(0, Ordering::Relaxed)
    }
}

/// One-way shutdown request observed by the worker and the location pump.
pub struct Shutdown {
    requested: AtomicBool,
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            signal: Signal::new(),
        }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.signal.signal(());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolves once [`request`](Self::request) was called.
    pub async fn wait(&self) {
        if self.is_requested() {
            return;
        }
        self.signal.wait().await;
    }
}
