//! Cooperative cancellation shared between the watch loop, the engine's
//! workers, and the Ctrl+C handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::info;

/// Cloneable flag; all clones observe the same state. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Set this flag on Ctrl+C / SIGTERM. Can only be installed once per process.
    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            info!("interrupt received, finishing current work");
            flag.cancel();
        })
        .context("install Ctrl+C handler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
