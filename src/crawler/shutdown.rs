use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Cooperative stop flag shared between the signal listener and the crawler
///
/// Triggering never interrupts work in progress; the coordinator checks the
/// flag at the top of its loop, before each page fetch and before each
/// attachment download.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    stop_requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Spawns a task that triggers the signal on Ctrl-C
    ///
    /// A second Ctrl-C exits the process immediately with status 130; state
    /// already written by the last checkpoint is kept.
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            tracing::warn!("Interrupt received, finishing the current step and saving state");
            signal.trigger();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::error!("Second interrupt received, exiting without a final checkpoint");
                std::process::exit(130);
            }
        })
    }
}
