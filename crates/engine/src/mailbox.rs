// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-slot handoff between adjacent stages.
//!
//! Exactly one producer (the upstream stage's worker) and exactly one
//! consumer (the downstream stage's worker) are expected to use a given
//! mailbox at a time; `put` overwrites whatever is pending, so callers must
//! only call `put`/`clear` when they own the handoff schedule.

use crate::payload::Payload;
use tokio::sync::{Mutex, Notify};

/// A bounded, single-slot queue of [`Payload`].
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Option<Payload>>,
    notify: Notify,
}

impl Mailbox {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self { slot: Mutex::new(None), notify: Notify::new() }
    }

    /// Publish a payload. Never drops: overwrites any payload already
    /// pending (callers are expected to respect the single-producer
    /// contract, so this should only happen across separate runs).
    pub async fn put(&self, payload: Payload) {
        *self.slot.lock().await = Some(payload);
        self.notify.notify_one();
    }

    /// Block until a payload is available, then return it. Does not
    /// busy-wait: suspends on a `Notify` permit between polls.
    pub async fn get(&self) -> Payload {
        loop {
            let notified = self.notify.notified();
            if let Some(payload) = self.slot.lock().await.take() {
                return payload;
            }
            notified.await;
        }
    }

    /// Non-blockingly discard any pending payload. Without a subsequent
    /// `put`, a later `get` blocks indefinitely.
    pub async fn clear(&self) {
        self.slot.lock().await.take();
    }
}
