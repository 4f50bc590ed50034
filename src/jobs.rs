use crate::config::configuration::SweepSettings;
use crate::errors::custom::CustomError;
use crate::store::Gateway;
use chrono::{Duration, Utc};
use tokio::task::JoinHandle;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub refresh_tokens: u64,
    pub guest_sessions: u64,
    pub stale_guests: u64,
}

/// One cleanup pass: expired staff refresh tokens, expired guest refresh
/// state, and guest rows left behind by rotated or removed tables.
#[tracing::instrument(name = "Sweep expired sessions", skip(gateway, settings))]
pub async fn sweep_once(gateway: &Gateway, settings: &SweepSettings) -> Result<SweepReport, CustomError> {
    let now = Utc::now();
    let stale_before = now - Duration::seconds(settings.stale_guest_retention_secs);
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                Ok(SweepReport {
                    refresh_tokens: tx.delete_expired_refresh_tokens(now).await?,
                    guest_sessions: tx.clear_expired_guest_sessions(now).await?,
                    stale_guests: tx.delete_stale_guests(stale_before).await?,
                })
            })
        })
        .await
}

/// Runs [`sweep_once`] on an interval until the runtime shuts down.
pub fn spawn_sweep(gateway: Gateway, settings: SweepSettings) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(settings.interval_secs.max(1)));
        loop {
            interval.tick().await;
            match sweep_once(&gateway, &settings).await {
                Ok(report) => tracing::info!(
                    refresh_tokens = report.refresh_tokens,
                    guest_sessions = report.guest_sessions,
                    stale_guests = report.stale_guests,
                    "sweep finished"
                ),
                Err(err) => tracing::error!(error = %err, "sweep failed"),
            }
        }
    })
}
