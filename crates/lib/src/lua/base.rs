//! Script base types: the globals a compiled script starts with.
//!
//! Both phases of a script compile against the same base, so anything a base
//! installs (the logger, `print`, path helpers) behaves the same inside the
//! classpath block as in the main body.

use std::cell::Cell;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use mlua::prelude::*;
use tracing::{debug, error, info, trace, warn};

use super::context::ScriptContext;
use super::delegate::{flush_tables, forget_tables};
use super::helpers;
use crate::configurer::ScriptConfigurerFactory;
use crate::environment::{ClasspathEntry, EnvironmentProvider};
use crate::error::Phase;
use crate::services::{OutputLevel, StandardOutputRedirector};
use crate::source::FileScriptSource;

/// How deep `apply { from = ... }` may nest before it is treated as a cycle.
const MAX_APPLY_DEPTH: usize = 32;

thread_local! {
  static APPLY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// The shape a compiled script conforms to.
pub trait ScriptBase: Send + Sync + fmt::Debug {
  fn name(&self) -> &str;

  /// Register this base's globals in a fresh Lua state.
  fn install(&self, lua: &Lua, ctx: &ScriptContext) -> LuaResult<()>;
}

/// The standard base for configuration scripts.
///
/// Globals:
/// - `print(...)`, `captureOutput(level)`: output capture
/// - `logger.error|warn|info|debug|trace(msg)`
/// - `declare(entry)`: add a classpath entry (classpath block only)
/// - `useLib(name)`: require a classpath entry to be present
/// - `classpath`: entries the script was compiled against
/// - `apply { from = "other.lua" }`: apply another script to the same target
/// - `paths`: path helpers
/// - `__dir`: directory of the script file
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScript;

impl ScriptBase for DefaultScript {
  fn name(&self) -> &str {
    "DefaultScript"
  }

  fn install(&self, lua: &Lua, ctx: &ScriptContext) -> LuaResult<()> {
    let globals = lua.globals();

    register_output(lua, &globals, ctx)?;
    globals.set("logger", create_logger(lua, ctx)?)?;
    register_classpath(lua, &globals, ctx)?;
    register_apply(lua, &globals, ctx)?;
    globals.set("paths", helpers::paths::create_path_helpers(lua, ctx)?)?;

    if let Some(dir) = ctx.directory() {
      globals.set("__dir", dir.to_string_lossy().into_owned())?;
    }

    Ok(())
  }
}

fn register_output(lua: &Lua, globals: &LuaTable, ctx: &ScriptContext) -> LuaResult<()> {
  let print_ctx = ctx.clone();
  globals.set(
    "print",
    lua.create_function(move |lua, args: LuaMultiValue| {
      let tostring: LuaFunction = lua.globals().get("tostring")?;
      let parts = args
        .into_iter()
        .map(|arg| tostring.call::<String>(arg))
        .collect::<LuaResult<Vec<_>>>()?;
      let line = parts.join("\t");
      match print_ctx.service::<StandardOutputRedirector>() {
        Ok(redirector) => redirector.write_line(print_ctx.source_name(), &line),
        Err(_) => info!(script = print_ctx.source_name(), "{}", line),
      }
      Ok(())
    })?,
  )?;

  let capture_ctx = ctx.clone();
  globals.set(
    "captureOutput",
    lua.create_function(move |_, level: String| {
      let level = level.parse::<OutputLevel>().map_err(LuaError::runtime)?;
      capture_ctx.service::<StandardOutputRedirector>()?.capture_at(level);
      Ok(())
    })?,
  )?;

  Ok(())
}

fn create_logger(lua: &Lua, ctx: &ScriptContext) -> LuaResult<LuaTable> {
  let logger = lua.create_table()?;
  for level in ["error", "warn", "info", "debug", "trace"] {
    let script = ctx.source_name().to_string();
    logger.set(
      level,
      lua.create_function(move |_, message: String| {
        match level {
          "error" => error!(script = %script, "{}", message),
          "warn" => warn!(script = %script, "{}", message),
          "info" => info!(script = %script, "{}", message),
          "debug" => debug!(script = %script, "{}", message),
          _ => trace!(script = %script, "{}", message),
        }
        Ok(())
      })?,
    )?;
  }
  Ok(logger)
}

fn register_classpath(lua: &Lua, globals: &LuaTable, ctx: &ScriptContext) -> LuaResult<()> {
  let declare_ctx = ctx.clone();
  globals.set(
    "declare",
    lua.create_function(move |_, entry: String| {
      if declare_ctx.phase() != Phase::Classpath {
        return Err(LuaError::runtime(format!(
          "classpath entries can only be declared inside the '{}' block",
          declare_ctx.closure_name()
        )));
      }
      let entry = resolve_entry(&declare_ctx, &entry);
      let entry = ClasspathEntry::new(entry).map_err(LuaError::external)?;
      declare_ctx
        .service::<dyn EnvironmentProvider>()?
        .declare(entry)
        .map_err(LuaError::external)
    })?,
  )?;

  let use_ctx = ctx.clone();
  globals.set(
    "useLib",
    lua.create_function(move |_, name: String| {
      if use_ctx.environment().contains(&name) {
        return Ok(name);
      }
      Err(LuaError::runtime(format!(
        "unresolved library '{}'; declare it in the '{}' block",
        name,
        use_ctx.closure_name()
      )))
    })?,
  )?;

  let classpath = lua.create_table()?;
  for (i, entry) in ctx.environment().entries().iter().enumerate() {
    classpath.set(i + 1, entry.as_str())?;
  }
  globals.set("classpath", classpath)?;

  Ok(())
}

/// Entries naming an existing path relative to the script become absolute.
fn resolve_entry(ctx: &ScriptContext, entry: &str) -> String {
  if Path::new(entry).is_absolute() {
    return entry.to_string();
  }
  let candidate = ctx.resolve_path(entry);
  if candidate.exists() {
    dunce::canonicalize(&candidate)
      .unwrap_or(candidate)
      .to_string_lossy()
      .into_owned()
  } else {
    entry.to_string()
  }
}

fn register_apply(lua: &Lua, globals: &LuaTable, ctx: &ScriptContext) -> LuaResult<()> {
  let apply_ctx = ctx.clone();
  globals.set(
    "apply",
    lua.create_function(move |lua, args: LuaTable| {
      let from: String = args
        .get::<Option<String>>("from")?
        .ok_or_else(|| LuaError::runtime("apply{} requires a 'from' field"))?;
      let path = apply_ctx.resolve_path(&from);
      let factory = apply_ctx.service::<ScriptConfigurerFactory>()?;
      let target = apply_ctx.target()?;

      let depth = APPLY_DEPTH.with(|d| d.get());
      if depth >= MAX_APPLY_DEPTH {
        return Err(LuaError::runtime(format!(
          "apply nested more than {} levels deep at '{}'",
          MAX_APPLY_DEPTH,
          path.display()
        )));
      }

      debug!(script = apply_ctx.source_name(), from = %path.display(), "applying nested script");
      // the nested script reads the target, not our cached tables
      flush_tables(lua, &apply_ctx)?;
      forget_tables(&apply_ctx)?;
      APPLY_DEPTH.with(|d| d.set(depth + 1));
      let result = factory
        .create(Arc::new(FileScriptSource::new(path)))
        .apply(target);
      APPLY_DEPTH.with(|d| d.set(depth));

      result.map_err(LuaError::external)
    })?,
  )?;
  Ok(())
}
