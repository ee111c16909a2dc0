//! Applying a script to a target in two phases.
//!
//! A [`ScriptConfigurerFactory`] hands out one [`ScriptConfigurer`] per script.
//! The configurer is a small builder: callers (or the target's
//! [`before_compile`](crate::target::ScriptAware::before_compile) hook) adjust
//! the classpath block name, script base and environment, then call
//! [`ScriptConfigurer::apply`] exactly once.
//!
//! `apply` compiles and runs the classpath block first, refreshes the
//! environment with whatever it declared, and only then compiles the rest of the
//! script against the refreshed environment.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::compile::{is_valid_closure_name, ScriptCompiler, Transformer};
use crate::consts::DEFAULT_CLASSPATH_CLOSURE;
use crate::environment::{DefaultEnvironmentFactory, Environment, EnvironmentFactory, EnvironmentProvider};
use crate::error::{Result, ScriptError};
use crate::lua::{DefaultScript, LuaScriptCompiler, ScriptBase};
use crate::services::{ServiceRegistry, StandardOutputRedirector};
use crate::settings::{Settings, SettingsError};
use crate::source::{DefaultImportsReader, ImportsReader, ImportsScriptSource, ScriptSource};
use crate::target::TargetRef;

struct FactoryInner {
  compiler: Arc<dyn ScriptCompiler>,
  imports: Arc<dyn ImportsReader>,
  environment_factory: Arc<dyn EnvironmentFactory>,
  environment: Environment,
  closure_name: String,
}

/// Creates [`ScriptConfigurer`]s that share a compiler, imports and defaults.
///
/// Cloning is cheap and clones share the same configuration.
#[derive(Clone)]
pub struct ScriptConfigurerFactory {
  inner: Arc<FactoryInner>,
}

impl Default for ScriptConfigurerFactory {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for ScriptConfigurerFactory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ScriptConfigurerFactory")
      .field("environment", &self.inner.environment)
      .field("closure_name", &self.inner.closure_name)
      .finish_non_exhaustive()
  }
}

impl ScriptConfigurerFactory {
  /// Factory using the Lua compiler and built-in defaults.
  pub fn new() -> Self {
    Self {
      inner: Arc::new(FactoryInner {
        compiler: Arc::new(LuaScriptCompiler::new()),
        imports: Arc::new(DefaultImportsReader::new()),
        environment_factory: Arc::new(DefaultEnvironmentFactory),
        environment: Environment::new(),
        closure_name: DEFAULT_CLASSPATH_CLOSURE.to_string(),
      }),
    }
  }

  /// Factory configured from [`Settings`].
  pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
    let environment = settings.environment()?;
    let imports = settings.imports_reader()?;
    Ok(
      Self::new()
        .with_environment(environment)
        .with_imports(Arc::new(imports))
        .with_closure_name(settings.closure_name.clone()),
    )
  }

  fn rebuild(self, f: impl FnOnce(&mut FactoryInner)) -> Self {
    let FactoryInner {
      compiler,
      imports,
      environment_factory,
      environment,
      closure_name,
    } = &*self.inner;
    let mut inner = FactoryInner {
      compiler: compiler.clone(),
      imports: imports.clone(),
      environment_factory: environment_factory.clone(),
      environment: environment.clone(),
      closure_name: closure_name.clone(),
    };
    f(&mut inner);
    Self { inner: Arc::new(inner) }
  }

  pub fn with_compiler(self, compiler: Arc<dyn ScriptCompiler>) -> Self {
    self.rebuild(|inner| inner.compiler = compiler)
  }

  pub fn with_imports(self, imports: Arc<dyn ImportsReader>) -> Self {
    self.rebuild(|inner| inner.imports = imports)
  }

  pub fn with_environment_factory(self, factory: Arc<dyn EnvironmentFactory>) -> Self {
    self.rebuild(|inner| inner.environment_factory = factory)
  }

  /// Environment every new configurer starts with.
  pub fn with_environment(self, environment: Environment) -> Self {
    self.rebuild(|inner| inner.environment = environment)
  }

  /// Classpath block name every new configurer starts with.
  pub fn with_closure_name(self, name: impl Into<String>) -> Self {
    let name = name.into();
    self.rebuild(|inner| inner.closure_name = name)
  }

  pub fn environment(&self) -> &Environment {
    &self.inner.environment
  }

  pub fn closure_name(&self) -> &str {
    &self.inner.closure_name
  }

  pub fn imports(&self) -> Vec<String> {
    self.inner.imports.imports()
  }

  /// A fresh configurer for `source`.
  pub fn create(&self, source: Arc<dyn ScriptSource>) -> ScriptConfigurer {
    ScriptConfigurer {
      factory: self.clone(),
      source,
      classpath_closure_name: self.inner.closure_name.clone(),
      script_base: Arc::new(DefaultScript),
      environment: self.inner.environment.clone(),
      environment_provider: None,
      state: ApplyState::Created,
      consumed: false,
    }
  }
}

/// Where an `apply` call has got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
  Created,
  PreCompileHookRun,
  ClasspathPhaseCompiled,
  ClasspathPhaseRun,
  EnvironmentRefreshed,
  MainPhaseCompiled,
  PostCompileHookRun,
  MainPhaseRun,
  Complete,
  Failed,
}

/// Single-use record describing how one script is applied to one target.
pub struct ScriptConfigurer {
  factory: ScriptConfigurerFactory,
  source: Arc<dyn ScriptSource>,
  classpath_closure_name: String,
  script_base: Arc<dyn ScriptBase>,
  environment: Environment,
  environment_provider: Option<Arc<dyn EnvironmentProvider>>,
  state: ApplyState,
  consumed: bool,
}

impl fmt::Debug for ScriptConfigurer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ScriptConfigurer")
      .field("source", &self.source.display_name())
      .field("classpath_closure_name", &self.classpath_closure_name)
      .field("script_base", &self.script_base.name())
      .field("environment", &self.environment)
      .field("custom_provider", &self.environment_provider.is_some())
      .field("state", &self.state)
      .finish()
  }
}

impl ScriptConfigurer {
  pub fn source(&self) -> &Arc<dyn ScriptSource> {
    &self.source
  }

  pub fn classpath_closure_name(&self) -> &str {
    &self.classpath_closure_name
  }

  pub fn script_base(&self) -> &Arc<dyn ScriptBase> {
    &self.script_base
  }

  pub fn environment(&self) -> &Environment {
    &self.environment
  }

  pub fn environment_provider(&self) -> Option<&Arc<dyn EnvironmentProvider>> {
    self.environment_provider.as_ref()
  }

  pub fn state(&self) -> ApplyState {
    self.state
  }

  /// True once `apply` has been called, whatever its outcome.
  pub fn is_applied(&self) -> bool {
    self.consumed
  }

  /// Name of the block holding classpath declarations. Validated by `apply`.
  pub fn set_classpath_closure_name(&mut self, name: impl Into<String>) -> &mut Self {
    if self.accepts_changes("classpath_closure_name") {
      self.classpath_closure_name = name.into();
    }
    self
  }

  /// Base type both phases compile against.
  pub fn set_script_base(&mut self, base: Arc<dyn ScriptBase>) -> &mut Self {
    if self.accepts_changes("script_base") {
      self.script_base = base;
    }
    self
  }

  /// Environment for the default provider. Ignored when a provider is set.
  pub fn set_environment(&mut self, environment: Environment) -> &mut Self {
    if self.accepts_changes("environment") {
      self.environment = environment;
    }
    self
  }

  pub fn set_environment_provider(&mut self, provider: Arc<dyn EnvironmentProvider>) -> &mut Self {
    if self.accepts_changes("environment_provider") {
      self.environment_provider = Some(provider);
    }
    self
  }

  fn accepts_changes(&self, field: &str) -> bool {
    if self.state == ApplyState::Created {
      return true;
    }
    warn!(
      source = %self.source.display_name(),
      field,
      state = ?self.state,
      "ignoring change to script configurer after apply started"
    );
    false
  }

  fn transition(&mut self, next: ApplyState) {
    debug!(source = %self.source.file_name(), from = ?self.state, to = ?next, "apply state");
    self.state = next;
  }

  /// Apply the script to `target`.
  ///
  /// May be called once. Classpath entries declared by the classpath block stay
  /// in the provider even if the main phase later fails.
  pub fn apply(&mut self, target: TargetRef) -> Result<()> {
    if self.consumed {
      return Err(ScriptError::AlreadyApplied(self.source.display_name()));
    }
    self.consumed = true;

    let result = self.run_phases(target);
    match &result {
      Ok(()) => self.transition(ApplyState::Complete),
      Err(e) => {
        debug!(source = %self.source.file_name(), error = %e, "apply failed");
        self.transition(ApplyState::Failed);
      }
    }
    result
  }

  fn run_phases(&mut self, target: TargetRef) -> Result<()> {
    let mut services = ServiceRegistry::new();
    services.add(Arc::new(self.factory.clone()));
    services.add(Arc::new(StandardOutputRedirector::new()));

    {
      let mut guard = target.borrow_mut();
      if let Some(aware) = guard.as_script_aware() {
        aware.before_compile(self);
      }
    }
    self.transition(ApplyState::PreCompileHookRun);

    let name = self.classpath_closure_name.clone();
    if !is_valid_closure_name(&name) {
      return Err(ScriptError::InvalidClosureName(name));
    }

    let provider = match &self.environment_provider {
      Some(provider) => provider.clone(),
      None => self.factory.inner.environment_factory.create(self.environment.clone()),
    };
    services.add::<dyn EnvironmentProvider>(provider.clone());
    let services = Rc::new(services);

    let source = ImportsScriptSource::new(self.source.clone(), self.factory.inner.imports.as_ref());
    let compiler = self.factory.inner.compiler.clone();
    let base = self.script_base.clone();

    info!(source = %source.file_name(), block = %name, "running classpath phase");
    let mut classpath = compiler.compile(
      &source,
      &Transformer::classpath_only(name.as_str()),
      base.as_ref(),
      &provider.environment(),
    )?;
    self.transition(ApplyState::ClasspathPhaseCompiled);

    classpath.bind(target.clone(), services.clone());
    classpath.run()?;
    self.transition(ApplyState::ClasspathPhaseRun);

    provider.refresh()?;
    self.transition(ApplyState::EnvironmentRefreshed);

    let environment = provider.environment();
    info!(source = %source.file_name(), classpath = environment.len(), "running main phase");
    let mut main = compiler.compile(
      &source,
      &Transformer::strip_classpath(name.as_str()),
      base.as_ref(),
      &environment,
    )?;
    self.transition(ApplyState::MainPhaseCompiled);

    main.bind(target.clone(), services);
    {
      let mut guard = target.borrow_mut();
      if let Some(aware) = guard.as_script_aware() {
        aware.after_compile(self, main.as_ref());
      }
    }
    self.transition(ApplyState::PostCompileHookRun);

    main.run()?;
    self.transition(ApplyState::MainPhaseRun);
    Ok(())
  }
}
