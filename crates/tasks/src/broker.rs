// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message broker contract and its Redis implementation.
//!
//! The broker carries work to remote workers: a queue per worker class,
//! a state/result key pair per job, a heartbeat key per registered
//! worker, and a pub/sub control channel for shutdown broadcasts.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Key prefixes shared with the worker-side runtime.
const STATE_KEY_PREFIX: &str = "dm:task:state:";
const RESULT_KEY_PREFIX: &str = "dm:task:result:";
const HEARTBEAT_KEY_PREFIX: &str = "dm:worker:";
const CONTROL_CHANNEL: &str = "dm:worker:control";

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker backend error: {0}")]
    Backend(#[from] redis::RedisError),
    #[error("undecodable broker payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Broker-side view of a job's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Received,
    Started,
    Retry,
    Progress,
    Success,
    Failure,
    Revoked,
    Pending,
    /// The broker has no record of the job (expired or never existed).
    Unknown,
}

impl BrokerState {
    pub fn parse(s: &str) -> Self {
        match s {
            "RECEIVED" => BrokerState::Received,
            "STARTED" => BrokerState::Started,
            "RETRY" => BrokerState::Retry,
            "PROGRESS" => BrokerState::Progress,
            "SUCCESS" => BrokerState::Success,
            "FAILURE" => BrokerState::Failure,
            "REVOKED" => BrokerState::Revoked,
            "PENDING" => BrokerState::Pending,
            _ => BrokerState::Unknown,
        }
    }

    /// The job is still on its way to a result.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            BrokerState::Received
                | BrokerState::Started
                | BrokerState::Retry
                | BrokerState::Progress
                | BrokerState::Pending
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BrokerState::Success | BrokerState::Failure | BrokerState::Revoked
        )
    }
}

/// What a finished job produced. Output is either captured inline or
/// redirected to per-invocation log files on the shared filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub return_code: i32,
    #[serde(default)]
    pub stdout_lines: Vec<String>,
    #[serde(default)]
    pub stderr_lines: Vec<String>,
    #[serde(default)]
    pub stdout_log: Option<String>,
    #[serde(default)]
    pub stderr_log: Option<String>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.return_code == 0
    }

    pub fn first_stderr_line(&self) -> &str {
        self.stderr_lines.first().map(String::as_str).unwrap_or("")
    }
}

/// A worker currently registered with the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRegistration {
    pub name: String,
    pub uptime_secs: u64,
    pub queues: Vec<String>,
}

/// Queued message, readable by any language binding on the worker side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TaskMessage {
    pub id: String,
    pub task: String,
    pub args: Vec<String>,
    pub expires_secs: u64,
}

/// Heartbeat payload written periodically by each worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Heartbeat {
    name: String,
    started_epoch: u64,
    queues: Vec<String>,
}

/// Shutdown broadcast payload on the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ControlMessage {
    worker: String,
    command: String,
}

/// Transport between controllers and remote workers.
#[async_trait::async_trait]
pub trait MessageBroker: Send + Sync {
    /// Push a job onto `queue`; returns the broker job id.
    async fn enqueue(
        &self,
        queue: &str,
        task_name: &str,
        argv: &[String],
        expires: Duration,
    ) -> Result<String, BrokerError>;

    async fn state(&self, job_id: &str) -> Result<BrokerState, BrokerError>;

    async fn result(&self, job_id: &str) -> Result<Option<ExecutionOutcome>, BrokerError>;

    /// All currently-registered workers.
    async fn workers(&self) -> Result<Vec<WorkerRegistration>, BrokerError>;

    /// Ask one worker, by name, to drain and stop.
    async fn broadcast_shutdown(&self, worker_name: &str) -> Result<(), BrokerError>;

    /// Whether the named worker has a live heartbeat.
    async fn ping(&self, worker_name: &str) -> Result<bool, BrokerError>;
}

/// Broker over the same Redis deployment as the task cache.
///
/// Queues are lists, job state/result live under TTL'd keys written by
/// the worker runtime, registrations are heartbeat keys.
#[derive(Clone)]
pub struct RedisBroker<C: dm_core::Clock> {
    connection: redis::aio::MultiplexedConnection,
    clock: C,
}

impl<C: dm_core::Clock> RedisBroker<C> {
    pub async fn connect(url: &str, clock: C) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection, clock })
    }

    pub async fn ping_server(&self) -> Result<(), BrokerError> {
        let mut con = self.connection.clone();
        redis::cmd("PING").query_async::<()>(&mut con).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<C: dm_core::Clock> MessageBroker for RedisBroker<C> {
    async fn enqueue(
        &self,
        queue: &str,
        task_name: &str,
        argv: &[String],
        expires: Duration,
    ) -> Result<String, BrokerError> {
        let id = uuid::Uuid::new_v4().to_string();
        let message = TaskMessage {
            id: id.clone(),
            task: task_name.to_string(),
            args: argv.to_vec(),
            expires_secs: expires.as_secs(),
        };
        let payload = serde_json::to_string(&message)?;
        let mut con = self.connection.clone();
        redis::cmd("LPUSH")
            .arg(queue)
            .arg(&payload)
            .query_async::<()>(&mut con)
            .await?;
        // Seed the state key so pollers see PENDING before a worker picks
        // the job up. Same lifetime as the job itself.
        redis::cmd("SET")
            .arg(format!("{STATE_KEY_PREFIX}{id}"))
            .arg("PENDING")
            .arg("EX")
            .arg(expires.as_secs().max(1))
            .query_async::<()>(&mut con)
            .await?;
        tracing::debug!(queue, task_name, job_id = %id, "enqueued task");
        Ok(id)
    }

    async fn state(&self, job_id: &str) -> Result<BrokerState, BrokerError> {
        let mut con = self.connection.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(format!("{STATE_KEY_PREFIX}{job_id}"))
            .query_async(&mut con)
            .await?;
        Ok(value
            .map(|v| BrokerState::parse(&v))
            .unwrap_or(BrokerState::Unknown))
    }

    async fn result(&self, job_id: &str) -> Result<Option<ExecutionOutcome>, BrokerError> {
        let mut con = self.connection.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(format!("{RESULT_KEY_PREFIX}{job_id}"))
            .query_async(&mut con)
            .await?;
        match value {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn workers(&self) -> Result<Vec<WorkerRegistration>, BrokerError> {
        let mut con = self.connection.clone();
        // Heartbeat keyspace is one entry per live worker, tens at most.
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{HEARTBEAT_KEY_PREFIX}*"))
            .query_async(&mut con)
            .await?;
        let now = self.clock.now_epoch();
        let mut registrations = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> =
                redis::cmd("GET").arg(&key).query_async(&mut con).await?;
            let Some(raw) = raw else {
                continue; // expired between KEYS and GET
            };
            match serde_json::from_str::<Heartbeat>(&raw) {
                Ok(hb) => registrations.push(WorkerRegistration {
                    uptime_secs: now.saturating_sub(hb.started_epoch),
                    name: hb.name,
                    queues: hb.queues,
                }),
                Err(error) => {
                    tracing::warn!(key, %error, "skipping undecodable worker heartbeat");
                }
            }
        }
        Ok(registrations)
    }

    async fn broadcast_shutdown(&self, worker_name: &str) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(&ControlMessage {
            worker: worker_name.to_string(),
            command: "shutdown".to_string(),
        })?;
        let mut con = self.connection.clone();
        redis::cmd("PUBLISH")
            .arg(CONTROL_CHANNEL)
            .arg(&payload)
            .query_async::<()>(&mut con)
            .await?;
        tracing::info!(worker = worker_name, "broadcast shutdown");
        Ok(())
    }

    async fn ping(&self, worker_name: &str) -> Result<bool, BrokerError> {
        let mut con = self.connection.clone();
        let exists: i64 = redis::cmd("EXISTS")
            .arg(format!("{HEARTBEAT_KEY_PREFIX}{worker_name}"))
            .query_async(&mut con)
            .await?;
        Ok(exists == 1)
    }
}

/// Record of one [`FakeBroker::enqueue`] call.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedTask {
    pub id: String,
    pub queue: String,
    pub task_name: String,
    pub argv: Vec<String>,
}

/// Scripted broker for tests: states and results are set up front, job
/// ids are deterministic (`job-1`, `job-2`, …).
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeBroker {
    enqueued: parking_lot::Mutex<Vec<EnqueuedTask>>,
    states: parking_lot::Mutex<std::collections::HashMap<String, BrokerState>>,
    results: parking_lot::Mutex<std::collections::HashMap<String, ExecutionOutcome>>,
    registrations: parking_lot::Mutex<Vec<WorkerRegistration>>,
    shutdowns: parking_lot::Mutex<Vec<String>>,
    next_id: parking_lot::Mutex<u64>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, job_id: &str, state: BrokerState) {
        self.states.lock().insert(job_id.to_string(), state);
    }

    pub fn set_result(&self, job_id: &str, outcome: ExecutionOutcome) {
        self.results.lock().insert(job_id.to_string(), outcome);
    }

    pub fn add_worker(&self, registration: WorkerRegistration) {
        self.registrations.lock().push(registration);
    }

    pub fn enqueued(&self) -> Vec<EnqueuedTask> {
        self.enqueued.lock().clone()
    }

    pub fn shutdowns(&self) -> Vec<String> {
        self.shutdowns.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait::async_trait]
impl MessageBroker for FakeBroker {
    async fn enqueue(
        &self,
        queue: &str,
        task_name: &str,
        argv: &[String],
        _expires: Duration,
    ) -> Result<String, BrokerError> {
        let mut next = self.next_id.lock();
        *next += 1;
        let id = format!("job-{}", *next);
        self.enqueued.lock().push(EnqueuedTask {
            id: id.clone(),
            queue: queue.to_string(),
            task_name: task_name.to_string(),
            argv: argv.to_vec(),
        });
        self.states.lock().insert(id.clone(), BrokerState::Pending);
        Ok(id)
    }

    async fn state(&self, job_id: &str) -> Result<BrokerState, BrokerError> {
        Ok(self
            .states
            .lock()
            .get(job_id)
            .copied()
            .unwrap_or(BrokerState::Unknown))
    }

    async fn result(&self, job_id: &str) -> Result<Option<ExecutionOutcome>, BrokerError> {
        Ok(self.results.lock().get(job_id).cloned())
    }

    async fn workers(&self) -> Result<Vec<WorkerRegistration>, BrokerError> {
        Ok(self.registrations.lock().clone())
    }

    async fn broadcast_shutdown(&self, worker_name: &str) -> Result<(), BrokerError> {
        self.shutdowns.lock().push(worker_name.to_string());
        Ok(())
    }

    async fn ping(&self, worker_name: &str) -> Result<bool, BrokerError> {
        Ok(self
            .registrations
            .lock()
            .iter()
            .any(|r| r.name == worker_name))
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
