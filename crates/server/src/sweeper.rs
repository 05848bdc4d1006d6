use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use amanah_core::session::SessionStore;

/// Periodically evicts idle sessions so donors who never come back do not
/// keep their state in memory.
pub fn spawn(sessions: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = sessions.sweep();
            if evicted > 0 {
                info!(
                    event_name = "session.swept",
                    evicted,
                    remaining = sessions.len(),
                    "idle sessions evicted"
                );
            }
        }
    })
}
