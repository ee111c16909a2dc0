//! Script environments and the providers that own them.
//!
//! An [`Environment`] is the set of classpath entries a script is compiled
//! against. Entries naming a directory also make the Lua modules inside it
//! reachable through `require`. An [`EnvironmentProvider`] owns one environment,
//! collects entries declared by the classpath phase, and folds them in on
//! [`refresh`](EnvironmentProvider::refresh).

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors raised by environment providers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
  /// A classpath entry was empty or whitespace.
  #[error("classpath entry must not be empty")]
  EmptyEntry,

  /// A provider refused an entry.
  #[error("classpath entry '{entry}' rejected: {reason}")]
  Rejected { entry: String, reason: String },
}

/// One entry on a script classpath.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClasspathEntry(String);

impl ClasspathEntry {
  pub fn new(entry: impl Into<String>) -> Result<Self, EnvironmentError> {
    let entry = entry.into();
    let trimmed = entry.trim();
    if trimmed.is_empty() {
      return Err(EnvironmentError::EmptyEntry);
    }
    Ok(Self(trimmed.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The entry as a module directory, if it names one.
  pub fn module_dir(&self) -> Option<&Path> {
    let path = Path::new(&self.0);
    path.is_dir().then_some(path)
  }
}

impl fmt::Display for ClasspathEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Ordered, duplicate-free classpath a script compiles against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
  entries: Vec<ClasspathEntry>,
}

impl Environment {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build an environment from entries, dropping duplicates.
  pub fn from_entries(entries: impl IntoIterator<Item = ClasspathEntry>) -> Self {
    let mut env = Self::new();
    env.extend(entries);
    env
  }

  pub fn entries(&self) -> &[ClasspathEntry] {
    &self.entries
  }

  pub fn contains(&self, entry: &str) -> bool {
    self.entries.iter().any(|e| e.as_str() == entry)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Add an entry. Returns `false` if it was already present.
  pub fn add(&mut self, entry: ClasspathEntry) -> bool {
    if self.entries.contains(&entry) {
      return false;
    }
    self.entries.push(entry);
    true
  }

  /// Add several entries, returning how many were new.
  pub fn extend(&mut self, entries: impl IntoIterator<Item = ClasspathEntry>) -> usize {
    entries.into_iter().filter(|e| self.add(e.clone())).count()
  }

  /// Lua `package.path` templates for every directory entry.
  pub fn module_search_path(&self) -> Vec<String> {
    self
      .entries
      .iter()
      .filter_map(ClasspathEntry::module_dir)
      .flat_map(|dir| {
        let dir = dir.display();
        [format!("{}/?.lua", dir), format!("{}/?/init.lua", dir)]
      })
      .collect()
  }
}

/// Owns the environment a script is compiled against.
///
/// Implementations are shared between the driver and the running classpath
/// script, so every operation takes `&self`.
pub trait EnvironmentProvider: Send + Sync {
  /// Snapshot of the current environment.
  fn environment(&self) -> Environment;

  /// Record an entry declared by the classpath phase.
  fn declare(&self, entry: ClasspathEntry) -> Result<(), EnvironmentError>;

  /// Fold every declared entry into the environment.
  fn refresh(&self) -> Result<(), EnvironmentError>;
}

/// Creates the default provider for a call when the caller supplies none.
pub trait EnvironmentFactory: Send + Sync {
  fn create(&self, base: Environment) -> Arc<dyn EnvironmentProvider>;
}

#[derive(Debug, Default)]
struct HandlerState {
  environment: Environment,
  pending: Vec<ClasspathEntry>,
}

/// The default [`EnvironmentProvider`].
#[derive(Debug, Default)]
pub struct ScriptHandler {
  state: Mutex<HandlerState>,
}

impl ScriptHandler {
  pub fn new(base: Environment) -> Self {
    Self {
      state: Mutex::new(HandlerState {
        environment: base,
        pending: Vec::new(),
      }),
    }
  }

  /// Entries declared since the last refresh.
  pub fn pending(&self) -> Vec<ClasspathEntry> {
    self.lock().pending.clone()
  }

  fn lock(&self) -> MutexGuard<'_, HandlerState> {
    // a panicking script callback must not wedge the handler
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl EnvironmentProvider for ScriptHandler {
  fn environment(&self) -> Environment {
    self.lock().environment.clone()
  }

  fn declare(&self, entry: ClasspathEntry) -> Result<(), EnvironmentError> {
    debug!(entry = %entry, "classpath entry declared");
    let mut state = self.lock();
    if !state.pending.contains(&entry) {
      state.pending.push(entry);
    }
    Ok(())
  }

  fn refresh(&self) -> Result<(), EnvironmentError> {
    let mut state = self.lock();
    let pending = std::mem::take(&mut state.pending);
    let added = state.environment.extend(pending);
    debug!(added, total = state.environment.len(), "classpath refreshed");
    Ok(())
  }
}

/// Builds a [`ScriptHandler`] per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEnvironmentFactory;

impl EnvironmentFactory for DefaultEnvironmentFactory {
  fn create(&self, base: Environment) -> Arc<dyn EnvironmentProvider> {
    Arc::new(ScriptHandler::new(base))
  }
}
