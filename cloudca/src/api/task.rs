//! Asynchronous task resolution
//!
//! Mutating calls may answer with a task reference instead of data. The
//! poller turns such a response into either the task's result or an error,
//! so callers never see a pending state.

use reqwest::Method;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::time::Instant;
use tokio::time;

use super::client::Client;
use super::context::Context;
use super::error::ApiError;
use super::options::QueryOptions;
use super::response::{decode_data, ResponseEnvelope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Success,
    Failed,
    /// Status string this client does not know, treated as non-terminal
    Other(String),
}

impl TaskStatus {
    /// Case-insensitive parse of a wire status
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" => TaskStatus::Pending,
            "SUCCESS" => TaskStatus::Success,
            "FAILED" => TaskStatus::Failed,
            _ => TaskStatus::Other(raw.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => f.write_str("PENDING"),
            TaskStatus::Success => f.write_str("SUCCESS"),
            TaskStatus::Failed => f.write_str("FAILED"),
            TaskStatus::Other(raw) => f.write_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TaskStatus::parse(&raw))
    }
}

/// Backend task as returned by GET /tasks/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl Task {
    fn into_outcome(self) -> Result<Value, ApiError> {
        match self.status {
            TaskStatus::Success => Ok(self.result.unwrap_or(Value::Null)),
            status => Err(ApiError::TaskFailed {
                task_id: self.id,
                status,
                created: self.created,
            }),
        }
    }
}

/// Task API polling tasks to completion
pub struct TaskPoller<'a> {
    client: &'a Client,
}

impl<'a> TaskPoller<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /tasks/{id}
    pub async fn get(&self, ctx: &Context, task_id: &str) -> Result<Task, ApiError> {
        let path = format!("/tasks/{}", urlencoding::encode(task_id));
        let envelope = self
            .client
            .send(ctx, Method::GET, &path, &QueryOptions::new(), None)
            .await?;
        decode_data(envelope.into_data())
    }

    /// Turn a successful envelope into data, polling when it references a
    /// task that has not finished yet.
    pub async fn resolve(
        &self,
        ctx: &Context,
        envelope: ResponseEnvelope,
    ) -> Result<Value, ApiError> {
        match envelope.task_status {
            Some(TaskStatus::Success) => {
                tracing::debug!("Task {:?} completed inline", envelope.task_id);
                Ok(envelope.into_data())
            }
            Some(TaskStatus::Failed) => {
                let task_id = envelope.task_id.unwrap_or_default();
                tracing::warn!("Task {} failed inline", task_id);
                Err(ApiError::TaskFailed {
                    task_id,
                    status: TaskStatus::Failed,
                    created: None,
                })
            }
            _ => match envelope.task_id {
                Some(task_id) => self.wait(ctx, &task_id).await,
                None => Ok(envelope.into_data()),
            },
        }
    }

    /// Poll a task until it is terminal. The first poll is issued immediately,
    /// later ones after each configured interval.
    pub async fn wait(&self, ctx: &Context, task_id: &str) -> Result<Value, ApiError> {
        let poll = self.client.poll_config();
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            ctx.check()?;
            attempts += 1;

            let task = self.get(ctx, task_id).await?;
            tracing::debug!(
                "Task {} poll {}: status={}",
                task_id,
                attempts,
                task.status
            );

            if task.status.is_terminal() {
                if task.status == TaskStatus::Success {
                    tracing::info!("Task {} succeeded after {} poll(s)", task_id, attempts);
                } else {
                    tracing::warn!("Task {} failed after {} poll(s)", task_id, attempts);
                }
                return task.into_outcome();
            }

            if poll.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(give_up(task_id, attempts));
            }

            // The interval sleep never outlasts the poll timeout
            let pause = match poll.timeout {
                Some(limit) => {
                    let left = limit.saturating_sub(started.elapsed());
                    if left.is_zero() {
                        return Err(give_up(task_id, attempts));
                    }
                    poll.interval.min(left)
                }
                None => poll.interval,
            };

            ctx.run(async {
                time::sleep(pause).await;
                Ok::<_, ApiError>(())
            })
            .await?;

            if poll.timeout.is_some_and(|limit| started.elapsed() >= limit) {
                return Err(give_up(task_id, attempts));
            }
        }
    }
}

fn give_up(task_id: &str, attempts: u32) -> ApiError {
    tracing::warn!("Giving up on task {} after {} poll(s)", task_id, attempts);
    ApiError::TaskTimeout {
        task_id: task_id.to_string(),
        attempts,
    }
}
