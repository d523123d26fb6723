//! Cooperative stop signal for range operations.
//!
//! Once requested, range loops finish the date they are on and take no new
//! dates. Cache records already written stay valid, so a later run resumes.

use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheap to clone; all clones observe the same request.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Requests a stop on the first Ctrl+C.
    pub fn listen_for_ctrl_c(&self) {
        let signal = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing current dates and stopping");
                signal.request();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_is_seen_by_clones() -> Result<(), tokio::task::JoinError> {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_requested());

        let requester = signal.clone();
        tokio::spawn(async move { requester.request() }).await?;
        assert!(observer.is_requested());
        assert!(signal.is_requested());

        // Requesting again is harmless
        signal.request();
        assert!(signal.is_requested());
        Ok(())
    }
}
