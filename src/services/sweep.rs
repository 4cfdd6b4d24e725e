use crate::core::alert::AlertEvaluator;
use crate::models::{AlertKind, AlertPair, AlertVerdict};
use crate::services::notifier::{AlertNotification, Notifier};
use crate::services::store::{DeviceDirectory, RecordStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of one sweep over all alert pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub evaluated: usize,
    pub alerts: usize,
    pub errors: usize,
}

/// Evaluates every alert pair and dispatches notifications.
///
/// Pairs are independent: they run concurrently up to `max_concurrent` and
/// one pair failing never affects another.
#[derive(Clone)]
pub struct AlertSweeper {
    evaluator: AlertEvaluator,
    records: Arc<dyn RecordStore>,
    directory: Arc<dyn DeviceDirectory>,
    notifier: Arc<dyn Notifier>,
    max_concurrent: usize,
}

enum PairOutcome {
    Clear,
    Alert,
    Failed,
}

impl AlertSweeper {
    pub fn new(
        evaluator: AlertEvaluator,
        records: Arc<dyn RecordStore>,
        directory: Arc<dyn DeviceDirectory>,
        notifier: Arc<dyn Notifier>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            evaluator,
            records,
            directory,
            notifier,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let pairs = self.directory.alert_pairs().await?;
        tracing::info!(
            "Loaded {} alert{}",
            pairs.len(),
            if pairs.len() == 1 { "" } else { "s" }
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for pair in pairs {
            let sweeper = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                sweeper.check_pair(&pair, now).await
            });
        }

        let mut report = SweepReport::default();
        while let Some(joined) = tasks.join_next().await {
            report.evaluated += 1;
            match joined {
                Ok(PairOutcome::Clear) => {}
                Ok(PairOutcome::Alert) => report.alerts += 1,
                Ok(PairOutcome::Failed) => report.errors += 1,
                Err(e) => {
                    tracing::error!("Alert check task failed: {}", e);
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            "Alert sweep done: {} evaluated, {} alerts, {} errors",
            report.evaluated,
            report.alerts,
            report.errors
        );
        Ok(report)
    }

    async fn check_pair(&self, pair: &AlertPair, now: DateTime<Utc>) -> PairOutcome {
        tracing::debug!(
            "Alert id: {}, account id: {}, asset id: {}, companion id: {:?}",
            pair.id,
            pair.account_id,
            pair.asset_id,
            pair.companion_id
        );

        let verdict = match self.evaluator.evaluate(pair, self.records.as_ref(), now).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!("Skipping alert {}: {}", pair.id, e);
                return PairOutcome::Failed;
            }
        };

        let Some(kind) = verdict.kind() else {
            return PairOutcome::Clear;
        };
        self.dispatch(pair, &verdict, kind).await;
        PairOutcome::Alert
    }

    async fn dispatch(&self, pair: &AlertPair, verdict: &AlertVerdict, kind: AlertKind) {
        let account = match self.directory.account(pair.account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                tracing::error!("Account {} of alert {} not found", pair.account_id, pair.id);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to load account {}: {}", pair.account_id, e);
                return;
            }
        };

        let notification = AlertNotification::render(
            &account,
            pair,
            kind,
            self.evaluator.policy().liveness.num_minutes(),
        );
        tracing::debug!("Dispatching {:?} for devices {:?}", kind, verdict.devices());

        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::error!("Couldn't send alert notification: {}, {}", notification.subject, e);
        }
    }
}
