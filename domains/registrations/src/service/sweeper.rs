//! Scheduled expiry of pending invitations
//!
//! Each candidate is expired in its own unit of work after re-reading it
//! under lock, so overlapping sweeps (or sweeps on several instances) and
//! concurrent responses never double-resolve an invitation.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::RegistrationService;
use crate::domain::error::Result;

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Candidates found with `expires_at <= now`
    pub examined: usize,
    /// Invitations this pass moved to `expired`
    pub expired: usize,
    /// Candidates resolved elsewhere before this pass reached them
    pub skipped: usize,
    /// Candidates whose unit of work failed; retried next pass
    pub failed: usize,
}

#[derive(Clone)]
pub struct ExpirySweeper {
    service: RegistrationService,
    batch_size: i64,
}

impl ExpirySweeper {
    pub fn new(service: RegistrationService, batch_size: i64) -> Self {
        Self {
            service,
            batch_size: batch_size.max(1),
        }
    }

    /// Expire every due invitation, up to one batch
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let now = self.service.now();
        let candidates = {
            let mut tx = self.service.store.begin().await?;
            tx.find_expired_invitations(now, self.batch_size).await?
        };

        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for (invitation_id, registration_id) in candidates {
            match self
                .service
                .expire_invitation(invitation_id, registration_id)
                .await
            {
                Ok(true) => report.expired += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        invitation_id = %invitation_id,
                        registration_id = %registration_id,
                        error = %e,
                        "Failed to expire invitation"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Sweep every `interval` until `shutdown` resolves
    pub async fn run(self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            interval_secs = interval.as_secs(),
            batch_size = self.batch_size,
            "Invitation expiry sweep started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Invitation expiry sweep stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(report) if report.examined > 0 => {
                            tracing::info!(
                                examined = report.examined,
                                expired = report.expired,
                                skipped = report.skipped,
                                failed = report.failed,
                                "Invitation expiry sweep finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Invitation expiry sweep failed"),
                    }
                }
            }
        }
    }
}
