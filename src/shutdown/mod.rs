// src/shutdown/mod.rs

//! Graceful-shutdown wrapper.
//!
//! [`ShutdownController`] ties together:
//! - SIGINT/SIGTERM handling (cleanup, then exit with status 0)
//! - an exit hook (`Drop`) that cleans up if nothing else did
//! - scoped execution of one unit of work with guaranteed cleanup
//!
//! Cleanup itself lives in [`cleanup`] and only sees the
//! [`ChildProcessRegistry`] capability. Whichever trigger fires first does
//! the work; the others wait for that pass to finish and then return `None`.
//!
//! A signal owns the outcome of a running scope: the scope stops waiting on
//! its work and reports [`ScopeOutcome::Interrupted`], so children killed by
//! our own cleanup never show up as a failed unit.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::ConfigSection;
use crate::errors::Result;
use crate::process::{ChildProcessRegistry, configure_spawn_strategy};
use crate::types::SpawnStrategy;

pub mod cleanup;
pub mod scope;
pub mod signals;

pub use cleanup::{CleanupLatch, CleanupReport, CleanupWarning, run_cleanup};
pub use scope::ScopeOutcome;
pub use signals::{ShutdownSignal, SignalListener};

/// Knobs for a [`ShutdownController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownOptions {
    /// Per-child grace period between SIGTERM and SIGKILL.
    pub terminate_timeout: Duration,
    /// Isolation requested for children spawned after installation.
    pub spawn_strategy: SpawnStrategy,
    /// Whether to listen for SIGINT/SIGTERM at all.
    pub handle_signals: bool,
}

impl Default for ShutdownOptions {
    fn default() -> Self {
        Self {
            terminate_timeout: Duration::from_secs(1),
            spawn_strategy: SpawnStrategy::strictest(),
            handle_signals: true,
        }
    }
}

impl From<&ConfigSection> for ShutdownOptions {
    fn from(cfg: &ConfigSection) -> Self {
        Self {
            terminate_timeout: cfg.terminate_timeout(),
            spawn_strategy: cfg.spawn_strategy,
            ..Self::default()
        }
    }
}

struct Inner {
    registry: Arc<dyn ChildProcessRegistry>,
    options: ShutdownOptions,
    latch: CleanupLatch,
    /// Set by the signal task before it starts cleaning up.
    shutdown: watch::Sender<Option<ShutdownSignal>>,
}

impl Inner {
    fn cleanup(&self) -> Option<CleanupReport> {
        let report = self.latch.run_once(|| {
            run_cleanup(self.registry.as_ref(), self.options.terminate_timeout)
        });
        if report.is_none() {
            debug!("cleanup already ran; skipping");
        }
        report
    }

    fn request_shutdown(&self, signal: ShutdownSignal) {
        self.shutdown.send_replace(Some(signal));
    }

    fn shutdown_requested(&self) -> Option<ShutdownSignal> {
        *self.shutdown.borrow()
    }
}

/// Covers a scoped execution whose future is dropped before finishing: the
/// work task is aborted so it cannot spawn anything new, then cleanup runs.
struct CleanupOnDrop {
    inner: Arc<Inner>,
    work: Option<AbortHandle>,
}

impl Drop for CleanupOnDrop {
    fn drop(&mut self) {
        if let Some(work) = self.work.take() {
            work.abort();
        }
        if !self.inner.latch.is_set() {
            self.inner.cleanup();
        }
    }
}

/// One graceful-shutdown episode: construct once per entry point, wrap one
/// unit of work with [`scoped`](Self::scoped).
pub struct ShutdownController {
    inner: Arc<Inner>,
    listener: Option<JoinHandle<()>>,
}

impl fmt::Debug for ShutdownController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownController")
            .field("options", &self.inner.options)
            .field("cleaned_up", &self.inner.latch.is_set())
            .field("listening", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl ShutdownController {
    /// Install signal handlers and the exit hook, and request the configured
    /// spawn isolation.
    ///
    /// Must be called from within a Tokio runtime when
    /// `options.handle_signals` is set. A spawn strategy configured earlier
    /// in the process is left in place.
    pub fn install(
        registry: Arc<dyn ChildProcessRegistry>,
        options: ShutdownOptions,
    ) -> Result<Self> {
        if let Err(e) = configure_spawn_strategy(options.spawn_strategy) {
            debug!(error = %e, "spawn strategy already set; keeping it");
        }

        let (shutdown, _) = watch::channel(None);
        let inner = Arc::new(Inner {
            registry,
            options,
            latch: CleanupLatch::new(),
            shutdown,
        });

        let listener = if options.handle_signals {
            let signals = SignalListener::install()?;
            Some(spawn_signal_task(signals, Arc::clone(&inner)))
        } else {
            None
        };

        debug!(?options, "shutdown controller installed");

        Ok(Self { inner, listener })
    }

    /// Run `work` to completion and clean up afterwards, whatever happened.
    ///
    /// The work runs on its own Tokio task so that a panic inside it is
    /// reported as [`ScopeOutcome::Failed`] instead of unwinding through the
    /// caller. If a termination signal arrives first, the work is aborted and
    /// the outcome is [`ScopeOutcome::Interrupted`]. Either way this returns
    /// only after the cleanup pass has finished.
    pub async fn scoped<F, Fut>(&self, work: F) -> ScopeOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let shutdown = self.inner.shutdown.subscribe();
        let mut task = tokio::spawn(work());
        let guard = CleanupOnDrop {
            inner: Arc::clone(&self.inner),
            work: Some(task.abort_handle()),
        };

        let outcome = tokio::select! {
            biased;
            _ = shutdown_notified(shutdown) => {
                task.abort();
                ScopeOutcome::Interrupted
            }
            res = &mut task => {
                // The child may have died from our own SIGTERM before the
                // notification was observed.
                if self.inner.shutdown_requested().is_some() {
                    ScopeOutcome::Interrupted
                } else {
                    ScopeOutcome::from_join(res)
                }
            }
        };
        match &outcome {
            ScopeOutcome::Completed => debug!("scoped work completed"),
            ScopeOutcome::Interrupted => warn!("execution interrupted by user"),
            ScopeOutcome::Failed(err) => error!(error = %err, "error during execution"),
        }

        self.cleanup_async().await;
        drop(guard);

        outcome
    }

    /// Terminate all active children. Only the first call (from any trigger)
    /// does anything; later calls block until that pass is done and return
    /// `None`.
    ///
    /// Blocks for up to the terminate timeout per straggling child. From
    /// async code prefer [`cleanup_async`](Self::cleanup_async).
    pub fn cleanup(&self) -> Option<CleanupReport> {
        self.inner.cleanup()
    }

    /// [`cleanup`](Self::cleanup) on the blocking thread pool.
    pub async fn cleanup_async(&self) -> Option<CleanupReport> {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || inner.cleanup()).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "cleanup task failed");
                None
            }
        }
    }

    pub fn has_cleaned_up(&self) -> bool {
        self.inner.latch.is_set()
    }

    /// The termination signal received so far, if any.
    pub fn shutdown_signal(&self) -> Option<ShutdownSignal> {
        self.inner.shutdown_requested()
    }

    /// Stop listening for termination signals. Cleanup is not run here; the
    /// exit hook still covers it.
    pub fn dispose(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
            debug!("signal listener stopped");
        }
    }
}

/// The exit hook. Cleanup blocks for up to the terminate timeout per
/// straggling child; on a multi-threaded runtime the worker is handed over
/// with `block_in_place` first.
impl Drop for ShutdownController {
    fn drop(&mut self) {
        self.dispose();
        if self.inner.latch.is_set() {
            return;
        }
        match Handle::try_current() {
            Ok(rt) if rt.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.inner.cleanup());
            }
            _ => {
                self.inner.cleanup();
            }
        }
    }
}

/// Resolves once the signal task has recorded a signal. The sender lives in
/// `Inner`, so the channel cannot close while a scope is running.
async fn shutdown_notified(mut rx: watch::Receiver<Option<ShutdownSignal>>) {
    let _ = rx.wait_for(Option::is_some).await;
}

fn spawn_signal_task(mut signals: SignalListener, inner: Arc<Inner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = signals.recv().await;
        warn!(%signal, "received signal, shutting down gracefully");
        inner.request_shutdown(signal);

        let res = tokio::task::spawn_blocking(move || inner.cleanup()).await;
        if let Err(e) = res {
            warn!(error = %e, "cleanup after signal failed");
        }

        info!("exiting after signal");
        std::process::exit(0);
    })
}
