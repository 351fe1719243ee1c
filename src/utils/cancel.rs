//! Cooperative cancellation for long-running catalog operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::{CtlError, Result};

/// Shared flag checked between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CtlError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Cancel this token on Ctrl-C.
    ///
    /// Runs a single-threaded tokio runtime on a detached thread that waits
    /// for the signal. Failure to install the handler is logged, not fatal.
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.clone();
        let spawned = std::thread::Builder::new()
            .name("skillctl-signal".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        warn!(error = %err, "signal runtime unavailable");
                        return;
                    }
                };
                runtime.block_on(async {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        debug!("interrupt received, cancelling");
                        token.cancel();
                    }
                });
            });
        if let Err(err) = spawned {
            warn!(error = %err, "could not spawn signal thread");
        }
    }
}
