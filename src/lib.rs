#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::enum_glob_use,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::uninlined_format_args
)]

pub mod chunk;
pub mod commands;
pub mod config;
pub mod message;

pub use chunk::{ChunkPlanner, ChunkProfile, ChunkScheduler, ChunkSink};
pub use commands::{
    CommandDefinition, CommandMatch, CommandRegistry, DefinitionError, PlaceholderPattern,
};
pub use config::Config;
pub use message::{Attachment, ChatMessage, Field};
