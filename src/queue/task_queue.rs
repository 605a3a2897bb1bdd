use anyhow::Result;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::core::error::AppResult;

pub const TASK_QUEUE_NAME: &str = "microblog-tasks";

/// Opens the cache/queue client. Connections are made lazily per command.
pub fn connect(url: &str) -> Result<redis::Client> {
    info!("Using cache at {}", url);
    Ok(redis::Client::open(url)?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub args: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(name: &str, args: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            args,
            enqueued_at: Utc::now(),
        }
    }
}

/// Named FIFO hand-off to the out-of-process worker: producers push on the
/// right of `queue:<name>`, the worker pops from the left.
#[derive(Clone)]
pub struct TaskQueue {
    name: String,
    client: redis::Client,
}

impl TaskQueue {
    pub fn new(name: &str, client: redis::Client) -> Self {
        Self {
            name: name.to_string(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> String {
        format!("queue:{}", self.name)
    }

    pub async fn enqueue(&self, name: &str, args: Value) -> AppResult<Job> {
        let job = Job::new(name, args);
        let payload = serde_json::to_string(&job)?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.rpush::<_, _, ()>(self.key(), payload).await?;

        info!(job_id = %job.id, task = %job.name, queue = %self.name, "Task enqueued");
        Ok(job)
    }
}
