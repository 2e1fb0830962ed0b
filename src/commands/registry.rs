use super::pattern::{PlaceholderPattern, PlaceholderValues};
use super::{CommandDefinition, DefinitionError};
use parking_lot::RwLock;
use std::sync::Arc;

/// One compiled format belonging to one command definition.
#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub name: String,
    pub format: String,
    pub pattern: PlaceholderPattern,
    pub source: CommandDefinition,
}

/// A successful registry lookup, handed to the remote executor.
#[derive(Debug, Clone)]
pub struct CommandMatch {
    pub name: String,
    pub format: String,
    pub values: PlaceholderValues,
}

/// Ordered collection of compiled command formats.
///
/// The whole entry table is swapped atomically on (re)load, so a concurrent
/// `match_utterance` observes either the old complete set or the new one,
/// never a partially cleared table. First match in registration order wins;
/// definition authors register more constraining formats first.
pub struct CommandRegistry {
    entries: RwLock<Arc<Vec<CommandEntry>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Replace all entries with the compiled formats of `definitions`.
    /// Disabled definitions are skipped silently; definitions without formats
    /// and formats that fail to compile are logged and skipped without
    /// aborting the rest of the load. Returns the number of entries loaded.
    pub fn load(&self, definitions: &[CommandDefinition]) -> usize {
        let mut next = Vec::new();

        for def in definitions {
            if !def.enabled {
                continue;
            }
            if def.formats.is_empty() {
                let err = DefinitionError::NoFormats {
                    command: def.name.clone(),
                };
                tracing::warn!("skipping command definition: {err}");
                continue;
            }

            for format in &def.formats {
                if format.trim().is_empty() {
                    tracing::warn!(
                        "command {:?}: skipping format: {}",
                        def.name,
                        DefinitionError::EmptyFormat
                    );
                    continue;
                }
                match PlaceholderPattern::compile(format) {
                    Ok(pattern) => next.push(CommandEntry {
                        name: def.name.clone(),
                        format: format.clone(),
                        pattern,
                        source: def.clone(),
                    }),
                    Err(err) => {
                        tracing::warn!(
                            "command {:?}: skipping format {:?}: {err}",
                            def.name,
                            format
                        );
                    }
                }
            }
        }

        let count = next.len();
        *self.entries.write() = Arc::new(next);
        tracing::debug!("command registry loaded {count} entries");
        count
    }

    /// First entry (in registration order) whose pattern matches the whole
    /// utterance. The table snapshot is cloned out of the lock so matching
    /// never holds the guard.
    pub fn match_utterance(&self, utterance: &str) -> Option<CommandMatch> {
        let entries = Arc::clone(&self.entries.read());
        for entry in entries.iter() {
            if let Some(values) = entry.pattern.match_utterance(utterance) {
                return Some(CommandMatch {
                    name: entry.name.clone(),
                    format: entry.format.clone(),
                    values,
                });
            }
        }
        None
    }

    pub fn clear(&self) {
        *self.entries.write() = Arc::new(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
