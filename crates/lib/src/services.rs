//! The per-call service context handed to compiled scripts.
//!
//! A [`ServiceRegistry`] maps a capability type to one shared instance. The
//! configurer builds a fresh registry for every `apply` and drops it when the
//! call returns.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, trace, warn};

/// Typed lookup of shared capabilities.
#[derive(Default)]
pub struct ServiceRegistry {
  services: HashMap<TypeId, Box<dyn Any>>,
}

impl ServiceRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `service` under its type, replacing any previous registration.
  ///
  /// Trait objects register under the trait object type, e.g.
  /// `registry.add::<dyn EnvironmentProvider>(provider)`.
  pub fn add<T: ?Sized + 'static>(&mut self, service: Arc<T>) {
    self.services.insert(TypeId::of::<T>(), Box::new(service));
  }

  pub fn get<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
    self
      .services
      .get(&TypeId::of::<T>())
      .and_then(|service| service.downcast_ref::<Arc<T>>())
      .cloned()
  }

  pub fn contains<T: ?Sized + 'static>(&self) -> bool {
    self.services.contains_key(&TypeId::of::<T>())
  }

  pub fn len(&self) -> usize {
    self.services.len()
  }

  pub fn is_empty(&self) -> bool {
    self.services.is_empty()
  }
}

impl fmt::Debug for ServiceRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ServiceRegistry")
      .field("services", &self.services.len())
      .finish()
  }
}

/// Log level captured script output is emitted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLevel {
  Error,
  Warn,
  #[default]
  Info,
  Debug,
  Trace,
}

impl FromStr for OutputLevel {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "error" => Ok(OutputLevel::Error),
      "warn" | "warning" => Ok(OutputLevel::Warn),
      "info" | "quiet" | "lifecycle" => Ok(OutputLevel::Info),
      "debug" => Ok(OutputLevel::Debug),
      "trace" => Ok(OutputLevel::Trace),
      other => Err(format!("unknown output level '{}'", other)),
    }
  }
}

/// Captures what a script prints and forwards it to the log.
#[derive(Debug, Default)]
pub struct StandardOutputRedirector {
  level: Mutex<OutputLevel>,
  lines: Mutex<Vec<String>>,
}

impl StandardOutputRedirector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn level(&self) -> OutputLevel {
    *self.level.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn capture_at(&self, level: OutputLevel) {
    *self.level.lock().unwrap_or_else(|e| e.into_inner()) = level;
  }

  /// Record one line of output from `script`.
  pub fn write_line(&self, script: &str, line: &str) {
    match self.level() {
      OutputLevel::Error => error!(script, "{}", line),
      OutputLevel::Warn => warn!(script, "{}", line),
      OutputLevel::Info => info!(script, "{}", line),
      OutputLevel::Debug => debug!(script, "{}", line),
      OutputLevel::Trace => trace!(script, "{}", line),
    }
    self
      .lines
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(line.to_string());
  }

  /// Everything captured so far, oldest first.
  pub fn lines(&self) -> Vec<String> {
    self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }
}
