//! Error types for script configuration.
//!
//! Every failure of [`ScriptConfigurer::apply`](crate::configurer::ScriptConfigurer::apply)
//! surfaces as a [`ScriptError`]. Compilation and execution failures carry a
//! [`SourceLocation`] that names the user's file and line, never the decorated
//! text the compiler actually saw.

use std::fmt;

use crate::environment::EnvironmentError;

/// Convenience alias used across the crate.
pub type Result<T, E = ScriptError> = std::result::Result<T, E>;

/// Which of the two compilation passes a script belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
  /// The classpath-only pass that runs the declarations block.
  Classpath,
  /// The main pass with the declarations block stripped.
  Main,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Classpath => "classpath",
      Phase::Main => "main",
    }
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Position in the original script file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
  /// File name of the undecorated source.
  pub file: String,
  /// 1-based line in the undecorated source, when one could be determined.
  pub line: Option<usize>,
}

impl SourceLocation {
  pub fn new(file: impl Into<String>, line: Option<usize>) -> Self {
    Self {
      file: file.into(),
      line,
    }
  }
}

impl fmt::Display for SourceLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.line {
      Some(line) => write!(f, "{}:{}", self.file, line),
      None => f.write_str(&self.file),
    }
  }
}

/// A script failed to compile in one of the two phases.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not compile {phase} script at {location}: {message}")]
pub struct ScriptCompilationError {
  pub phase: Phase,
  pub location: SourceLocation,
  pub message: String,
}

/// A compiled script raised an error while running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{phase} script failed at {location}: {message}")]
pub struct ScriptExecutionError {
  pub phase: Phase,
  pub location: SourceLocation,
  pub message: String,
}

/// Errors that can occur while applying a script to a target.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
  /// The script text could not be read.
  #[error("could not read {name}: {source}")]
  SourceRead {
    name: String,
    #[source]
    source: std::io::Error,
  },

  /// Compilation failed in either phase.
  #[error(transparent)]
  Compilation(#[from] ScriptCompilationError),

  /// The script body raised an error.
  #[error(transparent)]
  Execution(#[from] ScriptExecutionError),

  /// `apply` was called on a configurer that was already used.
  #[error("script configurer for {0} has already been applied")]
  AlreadyApplied(String),

  /// The classpath block name is not a usable identifier.
  #[error("invalid classpath block name '{0}'")]
  InvalidClosureName(String),

  /// The environment provider rejected an operation.
  #[error("environment error: {0}")]
  Environment(#[from] EnvironmentError),
}

impl ScriptError {
  /// Location in the user's file, for compilation and execution errors.
  pub fn location(&self) -> Option<&SourceLocation> {
    match self {
      ScriptError::Compilation(e) => Some(&e.location),
      ScriptError::Execution(e) => Some(&e.location),
      _ => None,
    }
  }

  /// Phase the error was raised in, if it came from a compiled script.
  pub fn phase(&self) -> Option<Phase> {
    match self {
      ScriptError::Compilation(e) => Some(e.phase),
      ScriptError::Execution(e) => Some(e.phase),
      _ => None,
    }
  }
}
