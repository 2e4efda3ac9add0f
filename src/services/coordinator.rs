//! Training-lifecycle coordinator
//!
//! Drives one remote training run through
//! `Idle → Training → (Completed | Failed)` and manages the single
//! production publish slot: the previous production iteration is fully
//! unpublished (and optionally deleted) before a new one claims the name.
//!
//! Containment property: if training submission or completion fails, the
//! sequence aborts before touching publish state, leaving the previous
//! production iteration published and undeleted.

use crate::config::TrainerConfig;
use crate::error::{Result, TrainError};
use crate::models::{Iteration, IterationStatus};
use crate::services::vision_client::CustomVisionClient;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bounded polling policy for `await_completion`
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

pub struct LifecycleCoordinator<'a> {
    client: &'a CustomVisionClient,
    publish_name: &'a str,
    prediction_resource_id: &'a str,
    poll: PollPolicy,
}

impl<'a> LifecycleCoordinator<'a> {
    pub fn new(client: &'a CustomVisionClient, config: &'a TrainerConfig) -> Self {
        Self {
            client,
            publish_name: &config.publish_name,
            prediction_resource_id: &config.prediction_resource_id,
            poll: config.poll_policy(),
        }
    }

    /// Request a new training run. A remote rejection (insufficient
    /// images, nothing changed, auth failure) surfaces as `RemoteRequest`
    /// and is never retried here.
    pub async fn train_iteration(&self, force: bool) -> Result<Iteration> {
        debug!(force, "Requesting training");
        let iteration = self.client.train(force).await?;
        debug!(iteration_id = %iteration.id, "Training started");
        Ok(iteration)
    }

    /// Poll until the iteration completes, within the poll budget.
    ///
    /// A `Failed` status aborts immediately; any unrecognized status keeps
    /// polling until the budget runs out, which then yields
    /// `TrainingTimeout` instead of blocking the triggering request
    /// forever.
    pub async fn await_completion(&self, iteration: Iteration) -> Result<Iteration> {
        let mut current = iteration;
        let mut attempts = 0u32;

        loop {
            match &current.status {
                IterationStatus::Completed => {
                    debug!(iteration_id = %current.id, attempts, "Training completed");
                    return Ok(current);
                }
                IterationStatus::Failed => {
                    return Err(TrainError::TrainingFailed {
                        iteration_id: current.id,
                        status: "Failed".to_string(),
                    });
                }
                status => {
                    debug!(
                        iteration_id = %current.id,
                        status = %String::from(status.clone()),
                        attempts,
                        "Waiting for training to complete"
                    );
                }
            }

            if attempts >= self.poll.max_attempts {
                return Err(TrainError::TrainingTimeout { attempts });
            }
            attempts += 1;

            tokio::time::sleep(self.poll.interval).await;
            current = self.client.get_iteration(&current.id).await?;
        }
    }

    /// The iteration currently holding the configured production publish
    /// name, if any. `None` is a valid first-run state.
    pub async fn get_production_iteration(&self) -> Result<Option<Iteration>> {
        let iterations = self.client.list_iterations().await?;
        let production = find_production(&iterations, self.publish_name).cloned();

        match &production {
            Some(iteration) => {
                debug!(publish_name = %self.publish_name, iteration_id = %iteration.id, "Production iteration found")
            }
            None => debug!(publish_name = %self.publish_name, "No production iteration published yet"),
        }

        Ok(production)
    }

    /// The iteration with the maximum `trainedAt` timestamp.
    pub async fn get_newest_iteration(&self) -> Result<Iteration> {
        let iterations = self.client.list_iterations().await?;
        newest_iteration(&iterations)
            .cloned()
            .ok_or_else(|| TrainError::EmptyResult("no trained iterations exist".to_string()))
    }

    /// Unpublish the production iteration and, when `delete`, also delete
    /// the iteration object to reclaim remote iteration-slot quota.
    ///
    /// No-op when no production iteration exists. `NotFound` during the
    /// delete is swallowed: cleanup may race a previous cleanup.
    pub async fn unpublish_production_iteration(&self, delete: bool) -> Result<()> {
        let Some(production) = self.get_production_iteration().await? else {
            debug!(publish_name = %self.publish_name, "Nothing to unpublish");
            return Ok(());
        };

        info!(iteration_id = %production.id, "Unpublishing production iteration");
        match self.client.unpublish_iteration(&production.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(iteration_id = %production.id, "Iteration was already unpublished");
            }
            Err(e) => return Err(e),
        }

        if delete {
            match self.client.delete_iteration(&production.id).await {
                Ok(()) => debug!(iteration_id = %production.id, "Previous iteration deleted"),
                Err(e) if e.is_not_found() => {
                    warn!(iteration_id = %production.id, "Iteration was already deleted");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Bind an iteration to the configured publish name and prediction
    /// resource. The previous holder must already be unpublished, or the
    /// remote service rejects the call.
    pub async fn publish_iteration(&self, iteration_id: &str) -> Result<()> {
        info!(
            iteration_id = %iteration_id,
            publish_name = %self.publish_name,
            "Publishing iteration"
        );
        self.client
            .publish_iteration(iteration_id, self.publish_name, self.prediction_resource_id)
            .await
    }

    /// The top-level sequence: train, await completion, unpublish (and
    /// optionally delete) the previous production iteration, publish the
    /// new one. Returns the published iteration, or `None` when the
    /// training request was rejected and the sequence aborted with the
    /// previous production iteration untouched.
    pub async fn train_and_publish(
        &self,
        force: bool,
        delete_previous: bool,
    ) -> Result<Option<Iteration>> {
        let iteration = match self.train_iteration(force).await {
            Ok(iteration) => iteration,
            Err(TrainError::RemoteRequest { status, body }) => {
                warn!(status, body = %body, "Training request rejected, aborting before publish");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let iteration = self.await_completion(iteration).await?;

        self.unpublish_production_iteration(delete_previous).await?;
        self.publish_iteration(&iteration.id).await?;

        info!(iteration_id = %iteration.id, "Iteration trained and published");
        Ok(Some(iteration))
    }
}

/// Linear scan for the iteration holding `publish_name`.
pub(crate) fn find_production<'i>(
    iterations: &'i [Iteration],
    publish_name: &str,
) -> Option<&'i Iteration> {
    iterations
        .iter()
        .find(|iteration| iteration.publish_name.as_deref() == Some(publish_name))
}

/// Maximum-`trained_at` selection. Untrained iterations are ignored.
pub(crate) fn newest_iteration(iterations: &[Iteration]) -> Option<&Iteration> {
    iterations
        .iter()
        .filter(|iteration| iteration.trained_at.is_some())
        .max_by_key(|iteration| iteration.trained_at)
}
