//! Script sources and the default-imports decorator.
//!
//! A [`ScriptSource`] is an immutable handle on some script text plus the name
//! used when reporting errors against it. [`ImportsScriptSource`] wraps another
//! source and prepends the default import statements, while still reporting the
//! wrapped source's name and directory.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Imports every script sees unless the reader is replaced.
pub const DEFAULT_IMPORTS: &[&str] = &[
  "local format = string.format",
  "local insert = table.insert",
  "local concat = table.concat",
];

/// A piece of script text and its identity.
pub trait ScriptSource: Send + Sync + fmt::Debug {
  /// Human-readable description used in log messages.
  fn display_name(&self) -> String;

  /// Name reported in error locations.
  fn file_name(&self) -> String;

  /// Directory relative paths in the script resolve against.
  fn directory(&self) -> Option<PathBuf> {
    None
  }

  /// Read the full script text.
  fn text(&self) -> std::io::Result<String>;

  /// Number of lines at the start of [`text`](Self::text) that are not part of
  /// the user's file.
  fn line_offset(&self) -> usize {
    0
  }
}

/// A script read from disk on demand.
#[derive(Debug, Clone)]
pub struct FileScriptSource {
  path: PathBuf,
}

impl FileScriptSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl ScriptSource for FileScriptSource {
  fn display_name(&self) -> String {
    format!("script '{}'", self.path.display())
  }

  fn file_name(&self) -> String {
    self.path.display().to_string()
  }

  fn directory(&self) -> Option<PathBuf> {
    let parent = match self.path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p,
      _ => Path::new("."),
    };
    Some(dunce::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf()))
  }

  fn text(&self) -> std::io::Result<String> {
    fs::read_to_string(&self.path)
  }
}

/// A script held in memory, mostly useful for embedding and tests.
#[derive(Debug, Clone)]
pub struct StringScriptSource {
  name: String,
  text: String,
}

impl StringScriptSource {
  pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      text: text.into(),
    }
  }
}

impl ScriptSource for StringScriptSource {
  fn display_name(&self) -> String {
    format!("script '{}'", self.name)
  }

  fn file_name(&self) -> String {
    self.name.clone()
  }

  fn text(&self) -> std::io::Result<String> {
    Ok(self.text.clone())
  }
}

/// Supplies the import statements prepended to every script.
pub trait ImportsReader: Send + Sync {
  fn imports(&self) -> Vec<String>;
}

/// The built-in imports, optionally extended from an imports file.
#[derive(Debug, Clone, Default)]
pub struct DefaultImportsReader {
  extra: Vec<String>,
}

impl DefaultImportsReader {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add the statements listed in `path`, one per line.
  ///
  /// Blank lines and `--` comments are skipped.
  pub fn with_file(mut self, path: &Path) -> std::io::Result<Self> {
    let content = fs::read_to_string(path)?;
    self.extra.extend(
      content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .map(str::to_string),
    );
    Ok(self)
  }
}

impl ImportsReader for DefaultImportsReader {
  fn imports(&self) -> Vec<String> {
    DEFAULT_IMPORTS
      .iter()
      .map(|s| s.to_string())
      .chain(self.extra.iter().cloned())
      .collect()
  }
}

/// A view of a source with import statements placed before its text.
#[derive(Debug, Clone)]
pub struct ImportsScriptSource {
  base: Arc<dyn ScriptSource>,
  imports: Vec<String>,
}

impl ImportsScriptSource {
  pub fn new(base: Arc<dyn ScriptSource>, reader: &dyn ImportsReader) -> Self {
    // one statement per physical line keeps the offset equal to the import count
    let imports = reader
      .imports()
      .iter()
      .flat_map(|stmt| stmt.lines())
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    Self { base, imports }
  }

  pub fn base(&self) -> &Arc<dyn ScriptSource> {
    &self.base
  }

  pub fn imports(&self) -> &[String] {
    &self.imports
  }
}

impl ScriptSource for ImportsScriptSource {
  fn display_name(&self) -> String {
    self.base.display_name()
  }

  fn file_name(&self) -> String {
    self.base.file_name()
  }

  fn directory(&self) -> Option<PathBuf> {
    self.base.directory()
  }

  fn text(&self) -> std::io::Result<String> {
    let base = self.base.text()?;
    if self.imports.is_empty() {
      return Ok(base);
    }
    let mut text = self.imports.join("\n");
    text.push('\n');
    text.push_str(&base);
    Ok(text)
  }

  fn line_offset(&self) -> usize {
    self.imports.len() + self.base.line_offset()
  }
}
