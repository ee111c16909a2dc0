//! The compiler seam used by the configurer.
//!
//! The configurer never looks inside a script. It asks a [`ScriptCompiler`]
//! for a [`CompiledScript`] twice, once per [`Transformer`], then binds and
//! runs what comes back.
//!
//! - [`transform`] - splitting a script into its classpath and main phases

pub mod transform;

use std::rc::Rc;

use crate::environment::Environment;
use crate::error::{Phase, Result, ScriptExecutionError};
use crate::lua::ScriptBase;
use crate::services::ServiceRegistry;
use crate::source::ScriptSource;
use crate::target::TargetRef;

pub use transform::{Transformer, UnterminatedBlock, is_valid_closure_name};

/// Turns a script source into something runnable.
///
/// Implementations must be deterministic for identical inputs. They may return
/// a cached artifact when the source, transformer and base type are unchanged.
pub trait ScriptCompiler: Send + Sync {
  fn compile(
    &self,
    source: &dyn ScriptSource,
    transformer: &Transformer,
    base: &dyn ScriptBase,
    environment: &Environment,
  ) -> Result<Box<dyn CompiledScript>>;
}

/// A compiled script waiting to be bound and run.
pub trait CompiledScript {
  /// File name of the source this was compiled from.
  fn source_name(&self) -> &str;

  fn phase(&self) -> Phase;

  /// Entries the script was compiled against.
  fn environment(&self) -> &Environment;

  /// Attach the target and service context.
  fn bind(&mut self, target: TargetRef, services: Rc<ServiceRegistry>);

  /// The service context, once bound.
  fn services(&self) -> Option<Rc<ServiceRegistry>>;

  /// Execute the script body.
  fn run(&mut self) -> Result<(), ScriptExecutionError>;
}
