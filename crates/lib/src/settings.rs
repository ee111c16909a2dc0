//! Process-level defaults read from environment variables.

use std::env;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::compile::is_valid_closure_name;
use crate::consts::{BLOCK_ENV, CLASSPATH_ENV, DEFAULT_CLASSPATH_CLOSURE, IMPORTS_ENV};
use crate::environment::{ClasspathEntry, Environment, EnvironmentError};
use crate::source::DefaultImportsReader;

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("{var} names an invalid classpath block '{name}'")]
  InvalidBlockName { var: &'static str, name: String },

  #[error("invalid classpath entry: {0}")]
  Classpath(#[from] EnvironmentError),

  #[error("failed to read imports file {path}: {source}")]
  Imports {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Defaults applied to every configurer a factory creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  /// Base classpath entries.
  pub classpath: Vec<String>,
  /// File of extra import lines.
  pub imports_file: Option<PathBuf>,
  /// Name of the classpath block.
  pub closure_name: String,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      classpath: Vec::new(),
      imports_file: None,
      closure_name: DEFAULT_CLASSPATH_CLOSURE.to_string(),
    }
  }
}

impl Settings {
  /// Read settings from `BOOTSCRIPT_CLASSPATH`, `BOOTSCRIPT_IMPORTS` and
  /// `BOOTSCRIPT_BLOCK`. Unset variables keep their defaults.
  pub fn from_env() -> Result<Self, SettingsError> {
    let mut settings = Settings::default();

    if let Some(paths) = env::var_os(CLASSPATH_ENV) {
      settings.classpath = env::split_paths(&paths)
        .map(|p| p.to_string_lossy().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    }

    if let Some(file) = env::var_os(IMPORTS_ENV).filter(|v| !v.is_empty()) {
      settings.imports_file = Some(PathBuf::from(file));
    }

    if let Ok(name) = env::var(BLOCK_ENV) {
      let name = name.trim();
      if !name.is_empty() {
        if !is_valid_closure_name(name) {
          return Err(SettingsError::InvalidBlockName {
            var: BLOCK_ENV,
            name: name.to_string(),
          });
        }
        settings.closure_name = name.to_string();
      }
    }

    Ok(settings)
  }

  /// The base environment described by `classpath`.
  pub fn environment(&self) -> Result<Environment, SettingsError> {
    let entries = self
      .classpath
      .iter()
      .map(|e| ClasspathEntry::new(e.as_str()))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Environment::from_entries(entries))
  }

  /// The default imports, extended with the imports file when one is set.
  pub fn imports_reader(&self) -> Result<DefaultImportsReader, SettingsError> {
    let reader = DefaultImportsReader::new();
    match &self.imports_file {
      Some(path) => reader.with_file(path).map_err(|source| SettingsError::Imports {
        path: path.clone(),
        source,
      }),
      None => Ok(reader),
    }
  }
}
