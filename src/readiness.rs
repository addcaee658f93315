// src/readiness.rs
//! One-shot readiness flag flipped by the host once its own startup is done.

use std::time::Duration;

use metrics::gauge;
use tokio::sync::watch;

/// Interval between "still waiting" reminders while the host is starting.
pub const DEFAULT_READY_REMINDER: Duration = Duration::from_secs(10);

/// Cheap to clone; every clone observes the same flag.
#[derive(Clone, Debug)]
pub struct ReadinessGate {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        gauge!("archiver_ready").set(0.0);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Open the gate. Only the first call has an effect.
    pub fn signal_ready(&self) {
        let opened = self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if opened {
            gauge!("archiver_ready").set(1.0);
            tracing::info!(target: "archiver", "host signalled ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the gate is open, logging a reminder every `reminder`.
    /// Never times out.
    pub async fn wait(&self, reminder: Duration) {
        let mut rx = self.tx.subscribe();
        loop {
            let opened = async { rx.wait_for(|ready| *ready).await.map(|_| ()) };
            match tokio::time::timeout(reminder, opened).await {
                // The sender lives in `self`, so `wait_for` cannot see it closed.
                Ok(_) => return,
                Err(_) => tracing::info!(target: "archiver", "still waiting for host initialization"),
            }
        }
    }
}
