//! Batch orchestration and output layout

pub mod config;
pub mod organizer;
pub mod pipeline;
pub mod pool;
pub mod task;

pub use config::BatchConfig;
pub use organizer::OutputOrganizer;
pub use pipeline::BatchPipeline;
pub use pool::{PoolTask, WorkerPool};
