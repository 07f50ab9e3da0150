//! Timed byte drip.
//!
//! Writes a payload one byte at a time: byte `i` goes out at `(i + 1) * unit` after
//! scheduling and the connection is closed at `(len + 1) * unit`. All waiting happens on
//! runtime timers, the event loop is never blocked.
//!
//! Tasks only hold a weak reference to their connection. When the connection was closed or
//! dropped in the meantime, pending writes are discarded.

use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::raw::RawConnection;

#[derive(Debug, Clone, PartialEq, Eq)]
enum DripAction {
    Write(Bytes),
    Close,
}

/// A single write (or the final close) due at `fire_at`.
#[derive(Debug)]
pub struct DelayedTask {
    target: Weak<RawConnection>,
    action: DripAction,
    fire_at: Instant,
}

impl DelayedTask {
    pub fn fire_at(&self) -> Instant {
        self.fire_at
    }

    /// Runs the task, returns whether later tasks are still worth running.
    async fn fire(self) -> bool {
        let Some(connection) = self.target.upgrade() else {
            return false;
        };
        if connection.is_closed() {
            return false;
        }

        match self.action {
            DripAction::Write(byte) => connection.write(&byte).await.is_ok(),
            DripAction::Close => {
                connection.close().await;
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ByteDrip {
    unit: Duration,
}

impl ByteDrip {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Lays out one task per byte of `payload` followed by the close, starting at `start`.
    pub fn plan(&self, connection: &Arc<RawConnection>, payload: &Bytes, start: Instant) -> Vec<DelayedTask> {
        let target = Arc::downgrade(connection);
        let mut fire_at = start;

        let mut tasks = Vec::with_capacity(payload.len() + 1);
        for i in 0..payload.len() {
            fire_at += self.unit;
            tasks.push(DelayedTask { target: Weak::clone(&target), action: DripAction::Write(payload.slice(i..=i)), fire_at });
        }

        fire_at += self.unit;
        tasks.push(DelayedTask { target, action: DripAction::Close, fire_at });
        tasks
    }

    /// Starts dripping `payload` into `connection` on the current runtime.
    pub fn schedule(&self, connection: &Arc<RawConnection>, payload: Bytes) -> JoinHandle<()> {
        let tasks = self.plan(connection, &payload, Instant::now());
        let closed = connection.close_token();
        tokio::spawn(run(tasks, closed))
    }
}

async fn run(tasks: Vec<DelayedTask>, closed: CancellationToken) {
    for task in tasks {
        tokio::select! {
            () = closed.cancelled() => {
                debug!("connection closed, dropping pending drip writes");
                return;
            }
            () = sleep_until(task.fire_at) => {}
        }

        trace!(action = ?task.action, "fire drip task");
        if !task.fire().await {
            return;
        }
    }
}
