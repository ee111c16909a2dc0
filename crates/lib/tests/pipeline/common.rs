//! Shared helpers for pipeline tests.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use bootscript_lib::ScriptConfigurerFactory;
use bootscript_lib::compile::CompiledScript;
use bootscript_lib::configurer::ScriptConfigurer;
use bootscript_lib::environment::{ClasspathEntry, Environment, EnvironmentError, ScriptHandler};
use bootscript_lib::services::StandardOutputRedirector;
use bootscript_lib::source::{FileScriptSource, StringScriptSource};
use bootscript_lib::target::{DynamicObject, ScriptAware, ScriptTarget, TargetError};
use serde_json::Value;
use tempfile::TempDir;

// tests call `environment()` on handlers through the trait
pub use bootscript_lib::environment::EnvironmentProvider;

/// Configurer for an in-memory script named `build.lua`.
pub fn configurer(text: &str) -> ScriptConfigurer {
  ScriptConfigurerFactory::new().create(Arc::new(StringScriptSource::new("build.lua", text)))
}

/// Configurer wired to a fresh [`ScriptHandler`] seeded with `entries`.
pub fn with_handler(text: &str, entries: &[&str]) -> (ScriptConfigurer, Arc<ScriptHandler>) {
  let handler = Arc::new(ScriptHandler::new(environment(entries)));
  let mut cfg = configurer(text);
  cfg.set_environment_provider(handler.clone());
  (cfg, handler)
}

pub fn environment(entries: &[&str]) -> Environment {
  Environment::from_entries(entries.iter().map(|e| ClasspathEntry::new(*e).unwrap()))
}

/// Sorted entry names, for order-insensitive comparisons.
pub fn entry_names(env: &Environment) -> Vec<String> {
  let mut names: Vec<String> = env.entries().iter().map(|e| e.as_str().to_string()).collect();
  names.sort();
  names
}

pub fn dynamic() -> Rc<RefCell<DynamicObject>> {
  DynamicObject::new().into_ref()
}

/// Temporary directory holding script files.
pub struct ScriptDir {
  pub temp: TempDir,
}

impl ScriptDir {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the directory and return its path.
  pub fn write(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn configurer(&self, relative_path: &str) -> ScriptConfigurer {
    let path = self.temp.path().join(relative_path);
    ScriptConfigurerFactory::new().create(Arc::new(FileScriptSource::new(path)))
  }
}

/// Target that records every hook call and property write.
#[derive(Default)]
pub struct RecordingTarget {
  pub events: Vec<String>,
  pub properties: DynamicObject,
  pub rename_block: Option<String>,
  pub redirector: Option<Arc<StandardOutputRedirector>>,
}

impl RecordingTarget {
  pub fn into_ref(self) -> Rc<RefCell<Self>> {
    Rc::new(RefCell::new(self))
  }
}

impl ScriptTarget for RecordingTarget {
  fn property(&self, name: &str) -> Option<Value> {
    self.properties.property(name)
  }

  fn set_property(&mut self, name: &str, value: Value) -> Result<(), TargetError> {
    self.events.push(format!("set:{}", name));
    self.properties.set_property(name, value)
  }

  fn as_script_aware(&mut self) -> Option<&mut dyn ScriptAware> {
    Some(self)
  }
}

impl ScriptAware for RecordingTarget {
  fn before_compile(&mut self, configurer: &mut ScriptConfigurer) {
    self.events.push("before".to_string());
    if let Some(name) = &self.rename_block {
      configurer.set_classpath_closure_name(name.clone());
    }
  }

  fn after_compile(&mut self, _configurer: &ScriptConfigurer, script: &dyn CompiledScript) {
    self.events.push(format!("after:{}", script.phase()));
    self.redirector = script.services().and_then(|s| s.get::<StandardOutputRedirector>());
  }
}

/// Provider that refuses every declaration.
#[derive(Default)]
pub struct RejectingProvider {
  pub refreshed: Mutex<bool>,
}

impl EnvironmentProvider for RejectingProvider {
  fn environment(&self) -> Environment {
    Environment::new()
  }

  fn declare(&self, entry: ClasspathEntry) -> Result<(), EnvironmentError> {
    Err(EnvironmentError::Rejected {
      entry: entry.to_string(),
      reason: "offline".to_string(),
    })
  }

  fn refresh(&self) -> Result<(), EnvironmentError> {
    *self.refreshed.lock().unwrap() = true;
    Ok(())
  }
}
