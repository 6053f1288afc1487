//! Periodic ledger retention.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use crate::raid::EntryLedger;

/// Spawn a task that drops join records older than `retention` every `every`.
pub fn spawn(ledger: EntryLedger, every: Duration, retention: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = ledger.sweep(Instant::now().into_std(), retention);
            if removed > 0 {
                info!("Housekeeping dropped {} stale join records", removed);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sweep_runs_on_interval() {
        let ledger = EntryLedger::new();
        ledger.record_join(-100, Instant::now().into_std());

        let handle = spawn(ledger.clone(), Duration::from_secs(60), Duration::from_secs(10));
        assert_eq!(ledger.tracked_chats(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert_eq!(ledger.tracked_chats(), 0);
        handle.abort();
    }
}
