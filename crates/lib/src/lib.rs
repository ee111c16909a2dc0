//! bootscript-lib: two-phase configuration scripts
//!
//! A script may open with a classpath block (by default `buildscript { ... }`)
//! that declares the libraries the rest of the script needs. Applying a script
//! runs that block first, folds its declarations into the script's
//! [`Environment`](environment::Environment), then compiles and runs the rest
//! of the script against the updated environment.
//!
//! - `ScriptConfigurer`: single-use record that drives one application
//! - `ScriptCompiler`: compiles a transformed script for one phase
//! - `EnvironmentProvider`: owns the classpath and accepts declarations
//! - `ScriptTarget`: the object a script configures

pub mod compile;
pub mod configurer;
pub mod consts;
pub mod environment;
pub mod error;
pub mod lua;
pub mod services;
pub mod settings;
pub mod source;
pub mod target;

pub use configurer::{ApplyState, ScriptConfigurer, ScriptConfigurerFactory};
pub use error::{Phase, Result, ScriptCompilationError, ScriptError, ScriptExecutionError, SourceLocation};
pub use target::{DynamicObject, ScriptAware, ScriptTarget, TargetRef};
