// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-mission control handle passed to every collaborator call.
//!
//! The engine flips the flags; the owning worker observes them at phase
//! boundaries. Long-running collaborators may poll them too.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// How a held (paused) mission was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Resumed,
    Canceled,
}

/// Per-mission cancellation token and pause flag.
///
/// Cheap to clone; all clones observe the same requests.
#[derive(Debug, Clone)]
pub struct MissionControl {
    cancel: CancellationToken,
    pause: Arc<watch::Sender<bool>>,
}

impl MissionControl {
    pub fn new() -> Self {
        let (pause, _) = watch::channel(false);
        Self {
            cancel: CancellationToken::new(),
            pause: Arc::new(pause),
        }
    }

    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn request_pause(&self) {
        self.pause.send_replace(true);
    }

    pub fn clear_pause(&self) {
        self.pause.send_replace(false);
    }

    pub fn is_pause_requested(&self) -> bool {
        *self.pause.borrow()
    }

    /// Hold until the pause is cleared or cancellation is requested.
    pub async fn wait_released(&self) -> Release {
        let mut rx = self.pause.subscribe();
        loop {
            if self.cancel.is_cancelled() {
                return Release::Canceled;
            }
            let paused = *rx.borrow_and_update();
            if !paused {
                return Release::Resumed;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Release::Canceled,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Release::Canceled;
                    }
                }
            }
        }
    }
}

impl Default for MissionControl {
    fn default() -> Self {
        Self::new()
    }
}
