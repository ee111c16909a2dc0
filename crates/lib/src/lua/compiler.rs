//! The Lua-backed [`ScriptCompiler`].
//!
//! Every compile gets a fresh Lua state: `package.path` is built from the
//! environment, the base type installs its globals, and the transformed text is
//! loaded into a function without running it. Syntax errors therefore surface
//! at compile time, and a script only ever sees the classpath it was compiled
//! against.

use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;
use tracing::debug;

use super::base::ScriptBase;
use super::context::ScriptContext;
use super::delegate::{create_script_env, flush_tables};
use crate::compile::{CompiledScript, ScriptCompiler, Transformer};
use crate::environment::Environment;
use crate::error::{Phase, Result, ScriptCompilationError, ScriptError, ScriptExecutionError, SourceLocation};
use crate::services::ServiceRegistry;
use crate::source::ScriptSource;
use crate::target::TargetRef;

/// Chunk names longer than this are cut short by Lua in error messages.
const MAX_CHUNK_LABEL: usize = 48;

/// Compiles scripts into [`LuaScript`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaScriptCompiler;

impl LuaScriptCompiler {
  pub fn new() -> Self {
    Self
  }
}

impl ScriptCompiler for LuaScriptCompiler {
  fn compile(
    &self,
    source: &dyn ScriptSource,
    transformer: &Transformer,
    base: &dyn ScriptBase,
    environment: &Environment,
  ) -> Result<Box<dyn CompiledScript>> {
    let phase = transformer.phase();
    let file_name = source.file_name();
    let label = chunk_label(&file_name);
    let offset = source.line_offset();

    let text = source.text().map_err(|e| ScriptError::SourceRead {
      name: source.display_name(),
      source: e,
    })?;

    let (preamble, body) = split_preamble(&text, offset);
    let body = transformer.transform(body).map_err(|e| ScriptCompilationError {
      phase,
      location: SourceLocation::new(&file_name, Some(e.line)),
      message: e.to_string(),
    })?;
    let chunk = format!("{}{}", preamble, body);

    let ctx = ScriptContext::new(
      &file_name,
      source.directory(),
      phase,
      transformer.closure_name(),
      environment.clone(),
    );

    let lua = Lua::new();
    let function = prepare(&lua, &ctx, base, environment)
      .and_then(|env| {
        lua
          .load(chunk.as_str())
          .set_name(format!("={}", label))
          .set_environment(env)
          .into_function()
      })
      .map_err(|e| {
        let (location, message) = locate(&e, &file_name, &label, offset);
        ScriptCompilationError {
          phase,
          location,
          message,
        }
      })?;

    debug!(
      script = %file_name,
      phase = %phase,
      base = base.name(),
      classpath = environment.len(),
      "compiled script"
    );

    Ok(Box::new(LuaScript {
      function,
      lua,
      ctx,
      label,
      line_offset: offset,
    }))
  }
}

/// Set up module search paths and base globals, returning the chunk environment.
fn prepare(lua: &Lua, ctx: &ScriptContext, base: &dyn ScriptBase, environment: &Environment) -> LuaResult<LuaTable> {
  let search = environment.module_search_path();
  if !search.is_empty() {
    let package: LuaTable = lua.globals().get("package")?;
    let current: String = package.get("path")?;
    package.set("path", format!("{};{}", search.join(";"), current))?;
  }
  base.install(lua, ctx)?;
  create_script_env(lua, ctx)
}

/// A compiled Lua chunk plus the state it runs in.
pub struct LuaScript {
  // declared before `lua` so the function is released first
  function: LuaFunction,
  lua: Lua,
  ctx: ScriptContext,
  label: String,
  line_offset: usize,
}

impl LuaScript {
  pub fn lua(&self) -> &Lua {
    &self.lua
  }

  pub fn context(&self) -> &ScriptContext {
    &self.ctx
  }
}

impl CompiledScript for LuaScript {
  fn source_name(&self) -> &str {
    self.ctx.source_name()
  }

  fn phase(&self) -> Phase {
    self.ctx.phase()
  }

  fn environment(&self) -> &Environment {
    self.ctx.environment()
  }

  fn bind(&mut self, target: TargetRef, services: Rc<ServiceRegistry>) {
    self.ctx.bind(target, services);
  }

  fn services(&self) -> Option<Rc<ServiceRegistry>> {
    self.ctx.bound_services()
  }

  fn run(&mut self) -> Result<(), ScriptExecutionError> {
    let phase = self.phase();
    if !self.ctx.is_bound() {
      return Err(ScriptExecutionError {
        phase,
        location: SourceLocation::new(self.source_name(), None),
        message: "script is not bound to a target".to_string(),
      });
    }
    self
      .function
      .call::<()>(())
      .and_then(|()| flush_tables(&self.lua, &self.ctx))
      .map_err(|e| {
        let (location, message) = locate(&e, self.ctx.source_name(), &self.label, self.line_offset);
        ScriptExecutionError {
          phase,
          location,
          message,
        }
      })
  }
}

/// Short chunk name used in Lua's own messages.
fn chunk_label(file_name: &str) -> String {
  let name = Path::new(file_name)
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| file_name.to_string());
  name.chars().take(MAX_CHUNK_LABEL).collect()
}

/// Split `text` after its first `lines` lines.
fn split_preamble(text: &str, lines: usize) -> (&str, &str) {
  if lines == 0 {
    return ("", text);
  }
  let end = text
    .match_indices('\n')
    .nth(lines - 1)
    .map_or(text.len(), |(i, _)| i + 1);
  text.split_at(end)
}

fn root_cause(err: &LuaError) -> &LuaError {
  match err {
    LuaError::CallbackError { cause, .. } => root_cause(cause),
    other => other,
  }
}

/// First `label:N:` in `text`, as the line number and the byte range it spans.
///
/// The label must start the text or follow whitespace or a path separator,
/// so `mybuild.lua:3:` is not a marker for `build.lua`.
fn find_line_marker(text: &str, label: &str) -> Option<(usize, usize, usize)> {
  let needle = format!("{}:", label);
  text.match_indices(&needle).find_map(|(start, _)| {
    let bounded = text[..start]
      .chars()
      .next_back()
      .is_none_or(|c| c.is_whitespace() || c == '/' || c == '\\');
    if !bounded {
      return None;
    }
    let digits_start = start + needle.len();
    let digits: String = text[digits_start..].chars().take_while(char::is_ascii_digit).collect();
    let after = digits_start + digits.len();
    if digits.is_empty() || !text[after..].starts_with(':') {
      return None;
    }
    digits.parse().ok().map(|line| (line, start, after + 1))
  })
}

/// Map a Lua error to a location in the user's file and a one-line message.
fn locate(err: &LuaError, file_name: &str, label: &str, offset: usize) -> (SourceLocation, String) {
  let full = err.to_string();
  let line = find_line_marker(&full, label)
    .map(|(line, _, _)| line)
    .and_then(|line| line.checked_sub(offset))
    .filter(|line| *line > 0);

  let cause = match root_cause(err) {
    LuaError::SyntaxError { message, .. } | LuaError::RuntimeError(message) => message.clone(),
    other => other.to_string(),
  };
  let first = cause.lines().next().unwrap_or_default();
  let message = match find_line_marker(first, label) {
    Some((_, _, end)) => first[end..].trim_start(),
    None => first.trim(),
  };

  (SourceLocation::new(file_name, line), message.to_string())
}
