//! Failure handling and error locations.

use std::sync::Arc;

use bootscript_lib::configurer::{ApplyState, ScriptConfigurerFactory};
use bootscript_lib::error::{Phase, ScriptError};
use bootscript_lib::source::FileScriptSource;

use super::common::*;

#[test]
fn main_phase_syntax_error_keeps_declared_entries() {
  let (mut cfg, handler) = with_handler(
    "buildscript {\n  declare(\"lib-x\")\n}\n\nvalue = = 1\n",
    &[],
  );

  let err = cfg.apply(dynamic()).unwrap_err();

  let ScriptError::Compilation(e) = err else {
    panic!("expected compilation error, got {:?}", err);
  };
  assert_eq!(e.phase, Phase::Main);
  assert_eq!(e.location.file, "build.lua");
  assert_eq!(e.location.line, Some(5));
  assert!(handler.environment().contains("lib-x"));
  assert_eq!(cfg.state(), ApplyState::Failed);
}

#[test]
fn classpath_syntax_error_reports_block_line() {
  let mut cfg = configurer("x = 1\nbuildscript {\n  declare(\"a\"\n}\n");

  let err = cfg.apply(dynamic()).unwrap_err();

  let ScriptError::Compilation(e) = err else {
    panic!("expected compilation error, got {:?}", err);
  };
  assert_eq!(e.phase, Phase::Classpath);
  assert_eq!(e.location.line, Some(4));
}

#[test]
fn classpath_failure_stops_main_phase() {
  let (mut cfg, handler) = with_handler(
    "buildscript {\n  declare(\"lib-x\")\n  error(\"stop here\")\n}\nreached = true\n",
    &[],
  );
  let target = dynamic();

  let err = cfg.apply(target.clone()).unwrap_err();

  let ScriptError::Execution(e) = err else {
    panic!("expected execution error, got {:?}", err);
  };
  assert_eq!(e.phase, Phase::Classpath);
  assert_eq!(e.location.line, Some(3));
  assert_eq!(e.message, "stop here");
  assert!(target.borrow().get("reached").is_none());
  assert!(!handler.environment().contains("lib-x"));
  assert_eq!(handler.pending().len(), 1);
}

#[test]
fn main_phase_failure_keeps_classpath_side_effects() {
  let (mut cfg, handler) = with_handler("buildscript { declare(\"kept\") }\nerror(\"late\")\n", &[]);

  let err = cfg.apply(dynamic()).unwrap_err();

  assert_eq!(err.phase(), Some(Phase::Main));
  assert_eq!(err.location().and_then(|l| l.line), Some(2));
  assert!(handler.environment().contains("kept"));
}

#[test]
fn undeclared_library_names_block() {
  let err = configurer("\n\nuseLib(\"missing\")\n").apply(dynamic()).unwrap_err();

  let message = err.to_string();
  assert!(message.contains("build.lua:3"), "got: {}", message);
  assert!(message.contains("unresolved library 'missing'"), "got: {}", message);
  assert!(message.contains("'buildscript' block"), "got: {}", message);
}

#[test]
fn declare_outside_block_is_rejected() {
  let err = configurer("declare(\"late\")\n").apply(dynamic()).unwrap_err();
  assert!(err.to_string().contains("can only be declared inside"), "got: {}", err);
}

#[test]
fn second_apply_is_rejected() {
  let mut cfg = configurer("x = 1\n");
  cfg.apply(dynamic()).unwrap();

  assert!(matches!(cfg.apply(dynamic()), Err(ScriptError::AlreadyApplied(_))));
}

#[test]
fn missing_file_is_reported() {
  let dir = ScriptDir::new();
  let path = dir.temp.path().join("absent.lua");
  let mut cfg = ScriptConfigurerFactory::new().create(Arc::new(FileScriptSource::new(path)));

  let err = cfg.apply(dynamic()).unwrap_err();
  assert!(matches!(err, ScriptError::SourceRead { .. }));
  assert!(err.to_string().contains("absent.lua"));
}

#[test]
fn file_errors_name_the_file() {
  let dir = ScriptDir::new();
  let path = dir.write("broken.lua", "a = 1\nb = nil + 1\n");

  let err = dir.configurer("broken.lua").apply(dynamic()).unwrap_err();

  let location = err.location().unwrap();
  assert_eq!(location.file, path.display().to_string());
  assert_eq!(location.line, Some(2));
}

#[test]
fn mixed_table_is_an_execution_error() {
  let mut cfg = configurer("name = 'demo'\nopts = { 'a', 'b', mode = 'fast' }\n");
  let target = dynamic();

  let err = cfg.apply(target.clone()).unwrap_err();

  let ScriptError::Execution(e) = err else {
    panic!("expected execution error, got {:?}", err);
  };
  assert_eq!(e.phase, Phase::Main);
  assert_eq!(e.location.line, Some(2));
  assert!(e.message.contains("cannot store 'opts'"), "got: {}", e.message);
  assert!(target.borrow().get("opts").is_none());
}
