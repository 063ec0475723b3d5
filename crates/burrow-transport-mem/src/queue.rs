//! Outbound byte queue with watermark-driven writability.

use std::collections::VecDeque;

use bytes::Bytes;
use burrow_core::{SaturationManager, SaturationStateChange, Watermarks};
use parking_lot::Mutex;
use tokio::sync::watch;

/// Pending outbound bytes for one channel.
///
/// Every push and pop reports its size change to a [`SaturationManager`].
/// Writability is the inverse of saturation and is published on a `watch`
/// channel, so producers can park until the queue drains below the low
/// watermark.
pub struct OutboundQueue {
    pending: Mutex<VecDeque<Bytes>>,
    saturation: SaturationManager,
    writable: watch::Sender<bool>,
}

impl OutboundQueue {
    pub fn new(watermarks: Watermarks) -> Self {
        let (writable, _) = watch::channel(true);
        Self {
            pending: Mutex::new(VecDeque::new()),
            saturation: SaturationManager::new(watermarks),
            writable,
        }
    }

    /// Queue `bytes` for sending.
    pub fn push(&self, bytes: Bytes) -> SaturationStateChange {
        let mut pending = self.pending.lock();
        let delta = bytes.len() as i64;
        pending.push_back(bytes);
        // Published under the queue lock so writability updates land in the
        // same order as the transitions that caused them.
        self.publish(self.saturation.apply_delta(delta))
    }

    /// Take the oldest queued chunk.
    pub fn pop(&self) -> Option<Bytes> {
        let mut pending = self.pending.lock();
        let bytes = pending.pop_front()?;
        self.publish(self.saturation.apply_delta(-(bytes.len() as i64)));
        Some(bytes)
    }

    /// Take everything queued so far.
    pub fn drain(&self) -> Vec<Bytes> {
        let mut pending = self.pending.lock();
        let drained: Vec<Bytes> = pending.drain(..).collect();
        let total: i64 = drained.iter().map(|b| b.len() as i64).sum();
        if total != 0 {
            self.publish(self.saturation.apply_delta(-total));
        }
        drained
    }

    /// Takes effect on the next push or pop.
    pub fn set_watermarks(&self, watermarks: Watermarks) {
        self.saturation.update_thresholds(watermarks);
    }

    pub fn watermarks(&self) -> Watermarks {
        self.saturation.watermarks()
    }

    pub fn is_writable(&self) -> bool {
        *self.writable.borrow()
    }

    /// Subscribe to writability changes.
    pub fn writability(&self) -> watch::Receiver<bool> {
        self.writable.subscribe()
    }

    /// Total queued bytes.
    pub fn pending_bytes(&self) -> i64 {
        self.saturation.queue_size()
    }

    /// Number of queued chunks.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    fn publish(&self, change: SaturationStateChange) -> SaturationStateChange {
        match change {
            SaturationStateChange::Saturated => {
                self.writable.send_replace(false);
            }
            SaturationStateChange::Desaturated => {
                self.writable.send_replace(true);
            }
            SaturationStateChange::NoChange => {}
        }
        change
    }
}

impl std::fmt::Debug for OutboundQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundQueue")
            .field("pending_bytes", &self.pending_bytes())
            .field("writable", &self.is_writable())
            .field("watermarks", &self.watermarks())
            .finish()
    }
}
