// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The idempotent run-or-poll contract for long-running tasks.
//!
//! The cache descriptor at `<task_name>:<study_id>` is the mutual
//! exclusion token: while a non-terminal descriptor exists, `run_task`
//! never enqueues. A success is observed at most once (the descriptor is
//! deleted when the result is delivered); a failure descriptor is kept so
//! resubmission can be debounced by `min_rerun_interval`.

use crate::broker::{BrokerError, BrokerState, ExecutionOutcome, MessageBroker};
use dm_cache::{CacheError, DescriptorStore};
use dm_core::{Clock, TaskDescriptor, TaskState};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// One invocation of the protocol. `command` present means the caller
/// wants the task started if it is not already running; absent means
/// poll-only.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task_name: String,
    pub study_id: String,
    /// Broker queue to submit on (a worker class name)
    pub queue: String,
    pub command: Option<Vec<String>>,
    pub stdout_log: Option<String>,
    pub stderr_log: Option<String>,
    /// Minimum gap between a failure and the next submission
    pub min_rerun_interval: Duration,
    /// Broker-side lifetime of the job and the descriptor TTL
    pub expires: Duration,
}

/// Observable status of a task after one `run_task` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// No descriptor and no command to start one
    NotFound,
    Running {
        since_epoch: u64,
    },
    /// Terminal result, delivered exactly once
    ResultReady(ExecutionOutcome),
    /// A recent failure is holding off resubmission
    PriorFailure {
        done_time_epoch: u64,
    },
}

/// Shared dependencies of every task invocation.
#[derive(Clone)]
pub struct TaskRunner<C: Clock> {
    broker: Arc<dyn MessageBroker>,
    descriptors: DescriptorStore,
    clock: C,
}

impl<C: Clock> TaskRunner<C> {
    pub fn new(broker: Arc<dyn MessageBroker>, descriptors: DescriptorStore, clock: C) -> Self {
        Self {
            broker,
            descriptors,
            clock,
        }
    }

    pub fn broker(&self) -> &Arc<dyn MessageBroker> {
        &self.broker
    }

    pub fn descriptors(&self) -> &DescriptorStore {
        &self.descriptors
    }

    /// Run or poll one task. See the module doc for the state machine.
    pub async fn run_task(&self, request: &TaskRequest) -> Result<TaskStatus, TaskError> {
        let now = self.clock.now_epoch();
        let existing = self
            .descriptors
            .load(&request.task_name, &request.study_id)
            .await?;

        let descriptor = match existing {
            None => {
                return match &request.command {
                    Some(argv) => self.submit(request, argv, now).await,
                    None => Ok(TaskStatus::NotFound),
                }
            }
            Some(d) => d,
        };

        if descriptor.state.is_terminal() {
            return self.handle_terminal(request, descriptor, now).await;
        }

        // Active descriptor: refresh from the broker.
        let state = self.broker.state(&descriptor.job_id).await?;
        if state.is_terminal() {
            return self.deliver(request, descriptor, state, now).await;
        }

        // Unknown is treated as still running; the descriptor TTL bounds
        // how long a lost job can block resubmission.
        let refreshed = TaskDescriptor {
            state: broker_to_task_state(state).unwrap_or(descriptor.state),
            last_update_epoch: now,
            ..descriptor.clone()
        };
        self.descriptors
            .save(&request.task_name, &request.study_id, &refreshed)
            .await?;
        Ok(TaskStatus::Running {
            since_epoch: descriptor.last_update_epoch,
        })
    }

    async fn submit(
        &self,
        request: &TaskRequest,
        argv: &[String],
        now: u64,
    ) -> Result<TaskStatus, TaskError> {
        let job_id = self
            .broker
            .enqueue(&request.queue, &request.task_name, argv, request.expires)
            .await?;
        let mut descriptor = TaskDescriptor::new(job_id, TaskState::Initiated, now);
        descriptor.stdout_log = request.stdout_log.clone().unwrap_or_default();
        descriptor.stderr_log = request.stderr_log.clone().unwrap_or_default();
        self.descriptors
            .save(&request.task_name, &request.study_id, &descriptor)
            .await?;
        tracing::info!(
            task = %request.task_name,
            study = %request.study_id,
            job_id = %descriptor.job_id,
            "submitted task"
        );
        Ok(TaskStatus::Running { since_epoch: now })
    }

    /// The descriptor already records a terminal state from an earlier
    /// poll that did not deliver the result.
    async fn handle_terminal(
        &self,
        request: &TaskRequest,
        descriptor: TaskDescriptor,
        now: u64,
    ) -> Result<TaskStatus, TaskError> {
        let failed = descriptor.state != TaskState::Success;
        if failed && request.command.is_some() {
            let debounce_until = descriptor
                .last_update_epoch
                .saturating_add(request.min_rerun_interval.as_secs());
            if now < debounce_until {
                return Ok(TaskStatus::PriorFailure {
                    done_time_epoch: descriptor.done_time_epoch,
                });
            }
            if let Some(argv) = &request.command {
                return self.submit(request, argv, now).await;
            }
        }
        // Success, or a poll-only caller: deliver and forget.
        let outcome = self
            .broker
            .result(&descriptor.job_id)
            .await?
            .unwrap_or_else(|| outcome_from_descriptor(&descriptor));
        self.descriptors
            .clear(&request.task_name, &request.study_id)
            .await?;
        Ok(TaskStatus::ResultReady(outcome))
    }

    /// First observation of a terminal broker state.
    async fn deliver(
        &self,
        request: &TaskRequest,
        descriptor: TaskDescriptor,
        state: BrokerState,
        now: u64,
    ) -> Result<TaskStatus, TaskError> {
        let outcome = self
            .broker
            .result(&descriptor.job_id)
            .await?
            .unwrap_or_else(|| outcome_from_descriptor(&descriptor));

        if state == BrokerState::Success {
            self.descriptors
                .clear(&request.task_name, &request.study_id)
                .await?;
        } else {
            // Keep the failure on record to debounce resubmission.
            let failed = TaskDescriptor {
                state: broker_to_task_state(state).unwrap_or(TaskState::Failure),
                last_update_epoch: now,
                done_time_epoch: now,
                ..descriptor
            };
            self.descriptors
                .save(&request.task_name, &request.study_id, &failed)
                .await?;
        }
        Ok(TaskStatus::ResultReady(outcome))
    }
}

fn broker_to_task_state(state: BrokerState) -> Option<TaskState> {
    match state {
        BrokerState::Received => Some(TaskState::Submitted),
        BrokerState::Started | BrokerState::Progress => Some(TaskState::Started),
        BrokerState::Retry => Some(TaskState::Retry),
        BrokerState::Pending => Some(TaskState::Pending),
        BrokerState::Success => Some(TaskState::Success),
        BrokerState::Failure => Some(TaskState::Failure),
        BrokerState::Revoked => Some(TaskState::Revoked),
        BrokerState::Unknown => None,
    }
}

/// Fallback when the broker result key has already expired: the logged
/// variant, pointing the caller at the per-invocation log files.
fn outcome_from_descriptor(descriptor: &TaskDescriptor) -> ExecutionOutcome {
    ExecutionOutcome {
        return_code: if descriptor.state == TaskState::Success {
            0
        } else {
            1
        },
        stdout_log: (!descriptor.stdout_log.is_empty()).then(|| descriptor.stdout_log.clone()),
        stderr_log: (!descriptor.stderr_log.is_empty()).then(|| descriptor.stderr_log.clone()),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
