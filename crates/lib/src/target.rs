//! Objects scripts are applied to.
//!
//! A compiled script delegates unresolved global reads, writes and calls to its
//! target. Values cross the boundary as [`serde_json::Value`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::compile::CompiledScript;
use crate::configurer::ScriptConfigurer;

/// Shared handle on a target. The caller keeps its own clone and reads the
/// results back after `apply` returns.
pub type TargetRef = Rc<RefCell<dyn ScriptTarget>>;

/// Errors a target reports back to the script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
  #[error("unknown property '{0}'")]
  UnknownProperty(String),

  #[error("property '{0}' is read-only")]
  ReadOnly(String),

  #[error("no method '{0}'")]
  NoSuchMethod(String),

  #[error("invalid argument to '{method}': {message}")]
  InvalidArgument { method: String, message: String },
}

/// Something a script can configure.
pub trait ScriptTarget {
  /// Current value of a property, or `None` if the target has no such property.
  fn property(&self, name: &str) -> Option<Value>;

  /// Assign a property.
  ///
  /// Returning [`TargetError::UnknownProperty`] lets the script keep the value
  /// as one of its own globals instead.
  fn set_property(&mut self, name: &str, value: Value) -> Result<(), TargetError>;

  fn has_method(&self, _name: &str) -> bool {
    false
  }

  fn invoke(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, TargetError> {
    Err(TargetError::NoSuchMethod(name.to_string()))
  }

  /// Compilation hooks, for targets that want them.
  fn as_script_aware(&mut self) -> Option<&mut dyn ScriptAware> {
    None
  }
}

/// Hooks around script compilation.
pub trait ScriptAware {
  /// Runs before anything compiles. The configurer is still writable, so the
  /// target may change the block name, base type or environment here.
  fn before_compile(&mut self, _configurer: &mut ScriptConfigurer) {}

  /// Runs after the main script compiled and before it runs.
  fn after_compile(&mut self, _configurer: &ScriptConfigurer, _script: &dyn CompiledScript) {}
}

/// A target that accepts any property.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DynamicObject {
  properties: BTreeMap<String, Value>,
}

impl DynamicObject {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn into_ref(self) -> Rc<RefCell<Self>> {
    Rc::new(RefCell::new(self))
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.properties.get(name)
  }

  pub fn properties(&self) -> &BTreeMap<String, Value> {
    &self.properties
  }
}

impl ScriptTarget for DynamicObject {
  fn property(&self, name: &str) -> Option<Value> {
    self.properties.get(name).cloned()
  }

  fn set_property(&mut self, name: &str, value: Value) -> Result<(), TargetError> {
    if value.is_null() {
      self.properties.remove(name);
    } else {
      self.properties.insert(name.to_string(), value);
    }
    Ok(())
  }
}
