pub mod task_queue;

pub use task_queue::{Job, TaskQueue, TASK_QUEUE_NAME};
