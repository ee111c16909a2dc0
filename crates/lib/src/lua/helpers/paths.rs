use std::path::{Component, Path, PathBuf};

use mlua::prelude::*;

use crate::lua::context::ScriptContext;

/// Lexically normalize a path, dropping `.` and folding `..`.
fn normalize(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::ParentDir => {
        normalized.pop();
      }
      Component::CurDir => {}
      other => normalized.push(other),
    }
  }
  normalized
}

fn text(path: impl AsRef<Path>) -> String {
  path.as_ref().to_string_lossy().into_owned()
}

/// Create the `paths` table.
///
/// `paths.resolve` resolves against the directory of the running script rather
/// than the process working directory.
pub fn create_path_helpers(lua: &Lua, ctx: &ScriptContext) -> LuaResult<LuaTable> {
  let paths = lua.create_table()?;

  paths.set(
    "join",
    lua.create_function(|_, segments: LuaVariadic<String>| Ok(text(segments.iter().collect::<PathBuf>())))?,
  )?;

  let single: [(&str, fn(&Path) -> String); 3] = [
    ("dirname", |p: &Path| p.parent().map(text).unwrap_or_default()),
    ("basename", |p: &Path| p.file_name().map(text).unwrap_or_default()),
    ("normalize", |p: &Path| text(normalize(p))),
  ];
  for (name, helper) in single {
    paths.set(name, lua.create_function(move |_, path: String| Ok(helper(Path::new(&path))))?)?;
  }

  let resolve_ctx = ctx.clone();
  paths.set(
    "resolve",
    lua.create_function(move |_, path: String| {
      Ok(text(normalize(&resolve_ctx.resolve_path(&path))))
    })?,
  )?;

  Ok(paths)
}
