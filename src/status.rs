//! Rotating status text shown while a generation request is pending

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Periodic task cycling through status messages until stopped
#[derive(Debug)]
pub struct StatusTicker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl StatusTicker {
    /// Publish `messages[0]` immediately, then advance every `interval`
    pub fn start(messages: Vec<String>, interval: Duration, tx: watch::Sender<String>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let interval = interval.max(MIN_INTERVAL);

        if let Some(first) = messages.first() {
            tx.send_replace(first.clone());
        }

        let handle = tokio::spawn(async move {
            if messages.len() < 2 {
                token.cancelled().await;
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            let mut idx = 0usize;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        idx = (idx + 1) % messages.len();
                        tx.send_replace(messages[idx].clone());
                    }
                }
            }
            tracing::trace!("status ticker stopped");
        });

        Self { cancel, handle }
    }

    /// Cancel without waiting; the task exits on its next poll
    pub fn stop(self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await
            && e.is_panic()
        {
            tracing::error!("status ticker panicked: {}", e);
        }
    }
}
