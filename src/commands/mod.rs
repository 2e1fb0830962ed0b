pub mod pattern;
pub mod registry;

pub use pattern::{PlaceholderPattern, PlaceholderValues};
pub use registry::{CommandEntry, CommandMatch, CommandRegistry};

use serde::{Deserialize, Serialize};

/// A remote command definition as delivered by the execution backend.
///
/// `formats` are human-authored shapes like `"deploy {{env}} to {{region=us-east}}"`;
/// every format of every enabled definition compiles into one registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Problems with externally supplied command definitions. These are logged
/// and the offending definition/format skipped; they never abort a load.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("format string is empty")]
    EmptyFormat,

    #[error("duplicate placeholder name: {name}")]
    DuplicatePlaceholder { name: String },

    #[error("invalid placeholder name: {name:?}")]
    InvalidPlaceholder { name: String },

    #[error("command {command:?} has no formats")]
    NoFormats { command: String },

    #[error("pattern compilation failed: {0}")]
    Pattern(#[from] regex::Error),
}
