use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{Pipeline, TriggerEvent};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Runs one pipeline per trigger, strictly one at a time, until cancelled or
/// every sender is gone. Pipeline failures are reported by the pipeline
/// itself and never end the loop.
pub async fn trigger_loop(
    pipeline: Arc<Pipeline>,
    mut triggers: mpsc::Receiver<TriggerEvent>,
    cancel_token: CancellationToken,
) -> u64 {
    let mut handled = 0;

    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                log_info!("trigger loop shutting down after {handled} captures");
                break;
            }
            maybe_trigger = triggers.recv() => {
                let Some(trigger) = maybe_trigger else {
                    log_info!("trigger channel closed; trigger loop exiting");
                    break;
                };

                log_info!("shortcut trigger #{} received", trigger.seq);
                let _ = pipeline.run(trigger).await;
                handled += 1;
            }
        }
    }

    handled
}
