//! Global lookup that falls through to the bound target.
//!
//! Every compiled chunk runs with its own environment table. Reads check the
//! table, then the Lua globals, then the target's methods and properties.
//! Writes go to the target when it accepts the property and stay in the table
//! otherwise.
//!
//! Table values are kept as Lua tables in the environment once they have been
//! assigned or read, so a script can keep mutating them in place.
//! [`flush_tables`] writes them back to the target when the script is done.

use mlua::prelude::*;
use mlua::SerializeOptions;
use serde_json::{Map, Value};
use thiserror::Error;

use super::context::ScriptContext;
use crate::target::TargetError;

/// Nesting limit for table conversion. Cyclic tables hit it.
const MAX_TABLE_DEPTH: usize = 64;

/// Why a Lua value has no property representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
  #[error("{0} values cannot be stored as properties")]
  Unsupported(&'static str),

  #[error("{0}")]
  Lossy(String),
}

fn serialize_options() -> SerializeOptions {
  SerializeOptions::new()
    .serialize_none_to_null(false)
    .serialize_unit_to_null(false)
}

/// Convert a JSON value into Lua, mapping `null` to `nil`.
pub fn json_to_lua(lua: &Lua, value: &Value) -> LuaResult<LuaValue> {
  lua.to_value_with(value, serialize_options())
}

/// Convert a Lua value into JSON without dropping anything.
///
/// A table becomes an array when its keys are exactly `1..n` and an object
/// when every key is a string. Empty tables are objects unless they carry the
/// array metatable. Mixed or sparse tables, non-finite numbers and non-UTF-8
/// strings are [`ConversionError::Lossy`]; functions, userdata and threads are
/// [`ConversionError::Unsupported`], at any depth.
pub fn lua_to_json(lua: &Lua, value: LuaValue) -> Result<Value, ConversionError> {
  value_to_json(lua, value, 0)
}

fn value_to_json(lua: &Lua, value: LuaValue, depth: usize) -> Result<Value, ConversionError> {
  match value {
    LuaValue::Nil => Ok(Value::Null),
    LuaValue::Boolean(b) => Ok(Value::Bool(b)),
    LuaValue::Integer(i) => Ok(Value::from(i)),
    LuaValue::Number(n) => serde_json::Number::from_f64(n)
      .map(Value::Number)
      .ok_or_else(|| ConversionError::Lossy(format!("number {} has no property representation", n))),
    LuaValue::String(s) => lua_string(&s).map(Value::String),
    LuaValue::Table(t) => table_to_json(lua, &t, depth),
    other => Err(ConversionError::Unsupported(other.type_name())),
  }
}

fn lua_string(s: &LuaString) -> Result<String, ConversionError> {
  s.to_str()
    .map(|s| str::to_owned(&s))
    .map_err(|_| ConversionError::Lossy("string is not valid UTF-8".to_string()))
}

fn table_to_json(lua: &Lua, table: &LuaTable, depth: usize) -> Result<Value, ConversionError> {
  if depth >= MAX_TABLE_DEPTH {
    return Err(ConversionError::Lossy("tables are nested too deeply (is one cyclic?)".to_string()));
  }

  let mut entries = Vec::new();
  table
    .for_each::<LuaValue, LuaValue>(|k, v| {
      entries.push((k, v));
      Ok(())
    })
    .map_err(|e| ConversionError::Lossy(e.to_string()))?;

  if entries.is_empty() {
    let is_array = table
      .metatable()
      .is_some_and(|mt| mt.to_pointer() == lua.array_metatable().to_pointer());
    return Ok(if is_array { Value::Array(Vec::new()) } else { Value::Object(Map::new()) });
  }

  let mut items = Vec::new();
  let mut fields = Map::new();
  for (key, value) in entries {
    match key {
      LuaValue::Integer(i) => items.push((i, value)),
      LuaValue::String(s) => {
        let name = lua_string(&s)?;
        fields.insert(name, value_to_json(lua, value, depth + 1)?);
      }
      other => {
        return Err(ConversionError::Lossy(format!(
          "table keys must be strings or list indices, found {}",
          other.type_name()
        )));
      }
    }
  }

  if items.is_empty() {
    return Ok(Value::Object(fields));
  }
  if !fields.is_empty() {
    return Err(ConversionError::Lossy("table mixes list items and named fields".to_string()));
  }

  items.sort_by_key(|(i, _)| *i);
  let contiguous = items.iter().zip(1..).all(|((i, _), expected)| *i == expected);
  if !contiguous {
    return Err(ConversionError::Lossy("list has gaps or indices below 1".to_string()));
  }
  items
    .into_iter()
    .map(|(_, v)| value_to_json(lua, v, depth + 1))
    .collect::<Result<Vec<_>, _>>()
    .map(Value::Array)
}

fn rejected(name: &str, err: ConversionError) -> LuaError {
  LuaError::runtime(format!("cannot store '{}': {}", name, err))
}

/// Create the environment table a script chunk runs in.
pub fn create_script_env(lua: &Lua, ctx: &ScriptContext) -> LuaResult<LuaTable> {
  let env = lua.create_table()?;
  let mt = lua.create_table()?;

  let index_ctx = ctx.clone();
  mt.set(
    "__index",
    lua.create_function(move |lua, (env, key): (LuaTable, LuaValue)| {
      let global: LuaValue = lua.globals().raw_get(key.clone())?;
      if !global.is_nil() {
        return Ok(global);
      }
      let LuaValue::String(name) = key else {
        return Ok(LuaValue::Nil);
      };
      let Some(target) = index_ctx.bound_target() else {
        return Ok(LuaValue::Nil);
      };
      let name = name.to_str()?.to_string();

      if target.borrow().has_method(&name) {
        let method = lua.create_function(move |lua, args: LuaMultiValue| {
          let args = args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| {
              lua_to_json(lua, arg).map_err(|e| LuaError::runtime(format!("argument {} to '{}': {}", i + 1, name, e)))
            })
            .collect::<LuaResult<Vec<_>>>()?;
          let result = target.borrow_mut().invoke(&name, args).map_err(LuaError::external)?;
          json_to_lua(lua, &result)
        })?;
        return Ok(LuaValue::Function(method));
      }

      let property = target.borrow().property(&name);
      match property {
        Some(value @ (Value::Array(_) | Value::Object(_))) => {
          let table = json_to_lua(lua, &value)?;
          env.raw_set(name.as_str(), table.clone())?;
          index_ctx.track(&name);
          Ok(table)
        }
        Some(value) => json_to_lua(lua, &value),
        None => Ok(LuaValue::Nil),
      }
    })?,
  )?;

  let newindex_ctx = ctx.clone();
  mt.set(
    "__newindex",
    lua.create_function(move |lua, (env, key, value): (LuaTable, LuaValue, LuaValue)| {
      let (LuaValue::String(name), Some(target)) = (&key, newindex_ctx.bound_target()) else {
        return env.raw_set(key, value);
      };
      let name = name.to_str()?.to_string();
      let json = match lua_to_json(lua, value.clone()) {
        Ok(json) => json,
        Err(ConversionError::Unsupported(_)) => return env.raw_set(key, value),
        Err(e) => return Err(rejected(&name, e)),
      };
      let result = target.borrow_mut().set_property(&name, json);
      match result {
        Ok(()) if value.is_table() => {
          env.raw_set(key, value)?;
          newindex_ctx.track(&name);
          Ok(())
        }
        Ok(()) => {
          newindex_ctx.untrack(&name);
          Ok(())
        }
        Err(TargetError::UnknownProperty(_)) => env.raw_set(key, value),
        Err(e) => Err(LuaError::external(e)),
      }
    })?,
  )?;

  env.set_metatable(Some(mt))?;
  ctx.attach_env(env.clone());
  Ok(env)
}

/// Write tables held by the script back to the target.
///
/// Only properties whose value changed are set again, so a read-only table
/// that was merely read does not fail. A name the script set to `nil` is
/// removed.
pub fn flush_tables(lua: &Lua, ctx: &ScriptContext) -> LuaResult<()> {
  let (Some(env), Some(target)) = (ctx.env(), ctx.bound_target()) else {
    return Ok(());
  };
  for name in ctx.tracked() {
    let value: LuaValue = env.raw_get(name.as_str())?;
    let json = lua_to_json(lua, value).map_err(|e| rejected(&name, e))?;
    if target.borrow().property(&name).as_ref() == Some(&json) {
      continue;
    }
    target.borrow_mut().set_property(&name, json).map_err(LuaError::external)?;
  }
  Ok(())
}

/// Drop cached tables so the next read fetches the target's value again.
pub fn forget_tables(ctx: &ScriptContext) -> LuaResult<()> {
  let Some(env) = ctx.env() else {
    return Ok(());
  };
  for name in ctx.take_tracked() {
    env.raw_set(name.as_str(), LuaValue::Nil)?;
  }
  Ok(())
}
