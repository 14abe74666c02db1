use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::pipeline::{Pipeline, TriggerEvent};
use crate::shortcut::{KeyListener, ShortcutBinding, TriggerCallback};

use super::loop_worker::trigger_loop;

/// One trigger may wait while another runs; anything beyond that is dropped.
pub const TRIGGER_QUEUE_DEPTH: usize = 1;

static SERVICE_ACTIVE: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Default)]
pub struct TriggerStats {
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl TriggerStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Owns the listener → pipeline lifecycle. At most one exists per process.
pub struct HotkeyService {
    binding: ShortcutBinding,
    listener_name: &'static str,
    handle: Option<JoinHandle<u64>>,
    cancel_token: CancellationToken,
    stats: Arc<TriggerStats>,
}

impl HotkeyService {
    /// Registers `binding` with `listener` and starts the trigger loop.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(
        binding: ShortcutBinding,
        listener: &mut dyn KeyListener,
        pipeline: Arc<Pipeline>,
    ) -> Result<Self, ConfigError> {
        if SERVICE_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConfigError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel(TRIGGER_QUEUE_DEPTH);
        let stats = Arc::new(TriggerStats::default());

        if let Err(err) = listener.start(binding.clone(), trigger_callback(tx, Arc::clone(&stats))) {
            SERVICE_ACTIVE.store(false, Ordering::SeqCst);
            return Err(err);
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(trigger_loop(pipeline, rx, cancel_token.clone()));

        info!("listening for '{}' via {}", binding, listener.name());

        Ok(Self {
            binding,
            listener_name: listener.name(),
            handle: Some(handle),
            cancel_token,
            stats,
        })
    }

    pub fn is_running() -> bool {
        SERVICE_ACTIVE.load(Ordering::SeqCst)
    }

    pub fn binding(&self) -> &ShortcutBinding {
        &self.binding
    }

    pub fn listener_name(&self) -> &'static str {
        self.listener_name
    }

    pub fn stats(&self) -> &TriggerStats {
        &self.stats
    }

    /// Stops the trigger loop and returns how many triggers it handled.
    /// A run in progress is awaited; a queued one is discarded.
    ///
    /// The listener is not touched: triggers it still delivers are ignored
    /// until its owner calls [`KeyListener::stop`].
    pub async fn stop(mut self) -> Result<u64> {
        self.cancel_token.cancel();

        let handled = match self.handle.take() {
            Some(handle) => handle.await.context("trigger loop task failed to join")?,
            None => 0,
        };
        info!(
            "hotkey service stopped ({} handled, {} dropped)",
            handled,
            self.stats.dropped()
        );
        Ok(handled)
    }
}

impl Drop for HotkeyService {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        SERVICE_ACTIVE.store(false, Ordering::SeqCst);
    }
}

fn trigger_callback(
    tx: mpsc::Sender<TriggerEvent>,
    stats: Arc<TriggerStats>,
) -> TriggerCallback {
    let next_seq = AtomicU64::new(1);

    Arc::new(move || {
        let seq = next_seq.fetch_add(1, Ordering::SeqCst);
        match tx.try_send(TriggerEvent { seq }) {
            Ok(()) => {
                stats.accepted.fetch_add(1, Ordering::SeqCst);
                debug!("trigger #{seq} queued");
            }
            Err(TrySendError::Full(_)) => {
                stats.dropped.fetch_add(1, Ordering::SeqCst);
                warn!("capture already in progress; trigger #{seq} dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("trigger #{seq} ignored; service stopped");
            }
        }
    })
}
