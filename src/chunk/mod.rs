pub mod planner;
pub mod scheduler;

pub use planner::{AttachmentAttr, ChunkPlanner, ChunkProfile, DEFAULT_SIZE_LIMIT};
pub use scheduler::{ChunkScheduler, ChunkSink, DEFAULT_CHUNK_DELAY_MS};
