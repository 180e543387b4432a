use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::verify::CardVerifier;
use super::LoginState;

/// Re-verify `key` every `period` until logout, shutdown, or a failed check.
/// A failed check clears the host session; the front end notices on its next
/// status fetch.
pub(super) fn spawn(
    id: u64,
    key: String,
    verifier: Arc<dyn CardVerifier>,
    state: Arc<Mutex<LoginState>>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Host session monitor {} started ({:?})", id, period);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    {
                        let mut state = state.lock();
                        if !state.is_logged_in {
                            warn!("User logged out, stopping session monitor {}", id);
                            if state.monitor_id() == Some(id) {
                                state.monitor = None;
                            }
                            break;
                        }
                    }

                    match verifier.verify(&key).await {
                        Ok(expiration) => debug!("Session re-verified until {}", expiration),
                        Err(e) => {
                            error!("Session verification failed: {}, clearing session", e);
                            let mut state = state.lock();
                            if state.monitor_id() == Some(id) {
                                state.clear();
                            }
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, stopping session monitor {}", id);
                    break;
                }
            }
        }
    })
}
