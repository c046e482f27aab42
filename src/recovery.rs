//! # Saga Recovery
//!
//! Caller-level sweep that finds sagas interrupted mid-flight (process crash,
//! lost request) and resumes them through the orchestrator. The orchestrator
//! never schedules itself; run [`SagaRecoverySweeper::sweep_once`] from a
//! periodic job or use [`SagaRecoverySweeper::run`].

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SagaConfig;
use crate::orchestration::{
    CancellationToken, LeadConversionOrchestrator, RequestContext, SagaError, SagaResult,
};
use crate::ports::SagaStore;
use crate::saga::LeadConversionSaga;
use crate::state_machine::SagaState;

/// Tally of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub completed: usize,
    pub compensated: usize,
    /// Sagas that ended in `Failed` and need manual review
    pub failed: usize,
    /// Sagas that could not be resumed this pass (persistence errors, conflicts)
    pub errors: usize,
}

impl SweepReport {
    fn record(&mut self, state: SagaState, error: Option<&SagaError>) {
        self.examined += 1;
        match state {
            SagaState::Completed => self.completed += 1,
            SagaState::Compensated => self.compensated += 1,
            SagaState::Failed => self.failed += 1,
            SagaState::Started | SagaState::Running | SagaState::Compensating => {}
        }
        let infrastructure_error = error.is_some_and(|err| {
            !err.is_compensated_failure() && !err.requires_manual_review()
        });
        if infrastructure_error || !state.is_terminal() {
            self.errors += 1;
        }
    }

    /// Sagas moved to a terminal state by this pass
    pub fn resumed(&self) -> usize {
        self.completed + self.compensated + self.failed
    }
}

pub struct SagaRecoverySweeper {
    orchestrator: Arc<LeadConversionOrchestrator>,
    store: Arc<dyn SagaStore>,
    config: SagaConfig,
}

impl SagaRecoverySweeper {
    pub fn new(
        orchestrator: Arc<LeadConversionOrchestrator>,
        store: Arc<dyn SagaStore>,
        config: SagaConfig,
    ) -> Self {
        Self {
            orchestrator,
            store,
            config,
        }
    }

    /// Resume every stuck or compensating saga found by one store query pass
    pub async fn sweep_once(&self) -> SagaResult<SweepReport> {
        let limit = self.config.sweep_batch_limit;
        let mut candidates = self
            .store
            .get_pending_sagas(self.config.pending_saga_age(), limit)
            .await?;
        candidates.extend(self.store.get_compensating_sagas(limit).await?);

        let mut seen = HashSet::new();
        candidates.retain(|saga| seen.insert(saga.id));

        if candidates.is_empty() {
            debug!("Saga sweep found nothing to resume");
            return Ok(SweepReport::default());
        }

        let outcomes: Vec<_> = stream::iter(candidates)
            .map(|saga| self.resume_one(saga))
            .buffer_unordered(self.config.sweep_concurrency.max(1))
            .collect()
            .await;

        let mut report = SweepReport::default();
        for (state, error) in &outcomes {
            report.record(*state, error.as_ref());
        }

        info!(
            examined = report.examined,
            completed = report.completed,
            compensated = report.compensated,
            failed = report.failed,
            errors = report.errors,
            "Saga sweep finished"
        );
        Ok(report)
    }

    async fn resume_one(&self, mut saga: LeadConversionSaga) -> (SagaState, Option<SagaError>) {
        let ctx = RequestContext::new(saga.tenant_id, saga.initiated_by);
        match self.orchestrator.resume(&ctx, &mut saga).await {
            Ok(()) => (saga.state(), None),
            Err(err) => {
                if !err.is_compensated_failure() {
                    warn!(saga_id = %saga.id, error = %err, "Saga could not be resumed cleanly");
                }
                (saga.state(), Some(err))
            }
        }
    }

    /// Delete completed sagas past the retention period
    pub async fn purge_completed(&self) -> SagaResult<usize> {
        let removed = self
            .store
            .delete_old_completed_sagas(self.config.completed_retention())
            .await?;
        if removed > 0 {
            info!(removed = removed, "Purged completed sagas past retention");
        }
        Ok(removed)
    }

    /// Sweep every `interval` until `shutdown` is cancelled
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // a pass already under way finishes so no resume is dropped mid-step
            self.sweep_and_purge().await;
        }
        info!("Saga sweeper shutting down");
    }

    async fn sweep_and_purge(&self) {
        if let Err(err) = self.sweep_once().await {
            warn!(error = %err, "Saga sweep failed");
        }
        if let Err(err) = self.purge_completed().await {
            warn!(error = %err, "Saga retention purge failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::StoreError;
    use uuid::Uuid;

    #[test]
    fn test_report_counts_terminal_states() {
        let mut report = SweepReport::default();
        report.record(SagaState::Completed, None);
        let step_failed = SagaError::StepFailed {
            step: crate::saga::StepType::CreateOpportunity,
            source: crate::orchestration::StepError::Cancelled,
        };
        report.record(SagaState::Compensated, Some(&step_failed));
        report.record(
            SagaState::Running,
            Some(&SagaError::Persistence(StoreError::NotFound {
                saga_id: Uuid::new_v4(),
            })),
        );

        assert_eq!(report.examined, 3);
        assert_eq!(report.completed, 1);
        assert_eq!(report.compensated, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.resumed(), 2);
    }
}
