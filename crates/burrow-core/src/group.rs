//! Channel group: the set of live channels a server manages in bulk.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{ChannelId, ChannelRef};

type Members = Arc<Mutex<HashMap<ChannelId, ChannelRef>>>;

/// Thread-safe set of channels, unique by [`ChannelId`].
///
/// Accept events from many channels insert concurrently; shutdown enumerates
/// the set to close everything at once. Enumeration order is unspecified.
///
/// Every member is watched through [`Channel::on_close`](crate::Channel::on_close)
/// and leaves the group once it has finished closing. Channels that are
/// already closed are never admitted.
pub struct ChannelGroup {
    name: Arc<str>,
    members: Members,
}

impl ChannelGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            members: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert `channel`.
    ///
    /// Returns `false` if a channel with the same id is already a member, or
    /// if `channel` has already closed. Neither case is an error.
    pub fn add(&self, channel: ChannelRef) -> bool {
        let id = channel.id();
        if !channel.is_open() {
            tracing::debug!(group = %self.name, channel = %id, "not adding closed channel");
            return false;
        }

        {
            let mut members = self.members.lock();
            if members.contains_key(&id) {
                return false;
            }
            members.insert(id, Arc::clone(&channel));
            tracing::debug!(
                group = %self.name,
                channel = %id,
                len = members.len(),
                "channel added"
            );
        }

        // Outside the lock: the callback runs inline if the channel closed
        // after the check above.
        let members = Arc::downgrade(&self.members);
        let name = Arc::clone(&self.name);
        channel.on_close(Box::new(move |id: ChannelId| {
            let Some(members) = members.upgrade() else {
                return;
            };
            if members.lock().remove(&id).is_some() {
                tracing::debug!(group = %name, channel = %id, "closed channel left group");
            }
        }));
        true
    }

    pub fn remove(&self, id: ChannelId) -> Option<ChannelRef> {
        let removed = self.members.lock().remove(&id);
        if removed.is_some() {
            tracing::debug!(group = %self.name, channel = %id, "channel removed");
        }
        removed
    }

    pub fn contains(&self, id: ChannelId) -> bool {
        self.members.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Ids of the current members, sorted (for diagnostics).
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self.members.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Call `f` on every member.
    ///
    /// Iterates a snapshot taken under the lock, so `f` may freely call back
    /// into the group.
    pub fn for_each(&self, mut f: impl FnMut(&ChannelRef)) {
        for channel in self.snapshot() {
            f(&channel);
        }
    }

    /// Request close on every member, then drop any member that finished
    /// closing without notifying.
    ///
    /// Returns how many channels close was requested on.
    pub fn close_all(&self) -> usize {
        let members = self.snapshot();
        for channel in &members {
            channel.close();
        }
        let pruned = self.prune_closed();
        tracing::debug!(
            group = %self.name,
            closed = members.len(),
            pruned,
            remaining = self.len(),
            "closed all channels"
        );
        members.len()
    }

    /// Drop every member that is no longer open. Returns how many were
    /// dropped.
    pub fn prune_closed(&self) -> usize {
        let mut members = self.members.lock();
        let before = members.len();
        members.retain(|_, channel| channel.is_open());
        before - members.len()
    }

    /// Forget every member without closing it.
    pub fn clear(&self) {
        let mut members = self.members.lock();
        let dropped = members.len();
        members.clear();
        tracing::debug!(group = %self.name, dropped, "group cleared");
    }

    fn snapshot(&self) -> Vec<ChannelRef> {
        self.members.lock().values().cloned().collect()
    }
}

impl std::fmt::Debug for ChannelGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelGroup")
            .field("name", &self.name)
            .field("members", &self.channel_ids())
            .finish()
    }
}
