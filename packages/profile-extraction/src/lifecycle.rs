//! Process lifecycle helpers: signal-driven cancellation and one-shot cleanup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Cleanup = Box<dyn FnOnce() + Send>;

/// A resource released exactly once, however many exit paths ask for it.
///
/// `release` may be called any number of times from any thread; the cleanup
/// closure runs on the first call only. Dropping the guard releases it too.
///
/// ```rust,ignore
/// let guard = ResourceGuard::new("log file", move || writer.flush_all());
/// guard.release();
/// guard.release(); // no-op
/// ```
pub struct ResourceGuard {
    name: String,
    released: AtomicBool,
    cleanup: Mutex<Option<Cleanup>>,
}

impl ResourceGuard {
    pub fn new(name: impl Into<String>, cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            released: AtomicBool::new(false),
            cleanup: Mutex::new(Some(Box::new(cleanup))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Run the cleanup if it has not run yet. Returns whether this call ran it.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            debug!(resource = %self.name, "already released");
            return false;
        }

        let cleanup = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }

        info!(resource = %self.name, "released");
        true
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("name", &self.name)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Cancel `token` on the first interrupt or terminate signal.
///
/// Later signals are logged and ignored: in-flight work keeps running and
/// accumulated results are still saved. The returned task runs until the
/// runtime shuts down.
pub fn install_signal_handler(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let signal = match wait_for_signal().await {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(error = %e, "could not listen for shutdown signals");
                    return;
                }
            };

            if token.is_cancelled() {
                warn!(signal, "shutdown already in progress, ignoring signal");
            } else {
                info!(
                    signal,
                    "shutdown requested, finishing the current URL before stopping"
                );
                token.cancel();
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
