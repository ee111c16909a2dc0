//! Lua runtime for configuration scripts.
//!
//! # Submodules
//!
//! - [`base`] - script base types and the globals they install
//! - [`compiler`] - turning a transformed script into a loaded Lua function
//! - [`context`] - per-script state shared with Lua callbacks
//! - [`delegate`] - global lookup that falls through to the bound target
//! - [`helpers`] - Lua helper modules exposed to user scripts

pub mod base;
pub mod compiler;
pub mod context;
pub mod delegate;
pub mod helpers;

pub use base::{DefaultScript, ScriptBase};
pub use compiler::{LuaScript, LuaScriptCompiler};
pub use context::ScriptContext;
