//! Per-script state shared by the Lua callbacks of one compiled script.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use mlua::prelude::*;

use crate::environment::Environment;
use crate::error::Phase;
use crate::services::ServiceRegistry;
use crate::target::TargetRef;

struct Binding {
  target: TargetRef,
  services: Rc<ServiceRegistry>,
}

struct Inner {
  source_name: String,
  directory: Option<PathBuf>,
  phase: Phase,
  closure_name: String,
  environment: Environment,
  binding: RefCell<Option<Binding>>,
  env: RefCell<Option<LuaTable>>,
  // globals whose Lua table mirrors a target property
  tracked: RefCell<BTreeSet<String>>,
}

/// What a compiled script knows about itself, and what it is bound to.
///
/// Cheap to clone; every callback a [`ScriptBase`](super::ScriptBase) installs
/// holds one.
#[derive(Clone)]
pub struct ScriptContext {
  inner: Rc<Inner>,
}

impl ScriptContext {
  pub fn new(
    source_name: impl Into<String>,
    directory: Option<PathBuf>,
    phase: Phase,
    closure_name: impl Into<String>,
    environment: Environment,
  ) -> Self {
    Self {
      inner: Rc::new(Inner {
        source_name: source_name.into(),
        directory,
        phase,
        closure_name: closure_name.into(),
        environment,
        binding: RefCell::new(None),
        env: RefCell::new(None),
        tracked: RefCell::new(BTreeSet::new()),
      }),
    }
  }

  pub fn source_name(&self) -> &str {
    &self.inner.source_name
  }

  pub fn directory(&self) -> Option<&Path> {
    self.inner.directory.as_deref()
  }

  pub fn phase(&self) -> Phase {
    self.inner.phase
  }

  pub fn closure_name(&self) -> &str {
    &self.inner.closure_name
  }

  /// The environment the script was compiled against.
  pub fn environment(&self) -> &Environment {
    &self.inner.environment
  }

  pub(crate) fn bind(&self, target: TargetRef, services: Rc<ServiceRegistry>) {
    *self.inner.binding.borrow_mut() = Some(Binding { target, services });
  }

  pub(crate) fn attach_env(&self, env: LuaTable) {
    *self.inner.env.borrow_mut() = Some(env);
  }

  /// The chunk environment, once one has been created.
  pub fn env(&self) -> Option<LuaTable> {
    self.inner.env.borrow().clone()
  }

  pub(crate) fn track(&self, name: &str) {
    self.inner.tracked.borrow_mut().insert(name.to_string());
  }

  pub(crate) fn untrack(&self, name: &str) {
    self.inner.tracked.borrow_mut().remove(name);
  }

  pub(crate) fn tracked(&self) -> Vec<String> {
    self.inner.tracked.borrow().iter().cloned().collect()
  }

  pub(crate) fn take_tracked(&self) -> Vec<String> {
    std::mem::take(&mut *self.inner.tracked.borrow_mut()).into_iter().collect()
  }

  pub fn is_bound(&self) -> bool {
    self.inner.binding.borrow().is_some()
  }

  pub fn bound_target(&self) -> Option<TargetRef> {
    self.inner.binding.borrow().as_ref().map(|b| b.target.clone())
  }

  pub fn bound_services(&self) -> Option<Rc<ServiceRegistry>> {
    self.inner.binding.borrow().as_ref().map(|b| b.services.clone())
  }

  pub fn target(&self) -> LuaResult<TargetRef> {
    self
      .bound_target()
      .ok_or_else(|| LuaError::runtime(format!("{} is not bound to a target", self.source_name())))
  }

  /// Look up a capability in the service context.
  pub fn service<T: ?Sized + 'static>(&self) -> LuaResult<Arc<T>> {
    self
      .bound_services()
      .and_then(|services| services.get::<T>())
      .ok_or_else(|| {
        LuaError::runtime(format!(
          "service {} is not available to {}",
          std::any::type_name::<T>(),
          self.source_name()
        ))
      })
  }

  /// Resolve `path` against the script directory.
  pub fn resolve_path(&self, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    match self.directory() {
      Some(dir) if candidate.is_relative() => dir.join(candidate),
      _ => candidate.to_path_buf(),
    }
  }
}
