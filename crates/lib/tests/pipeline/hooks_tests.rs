//! Target hooks around compilation.

use super::common::*;

#[test]
fn hooks_run_around_compilation() {
  let target = RecordingTarget::default().into_ref();
  let mut cfg = configurer("buildscript {\n  marker_classpath = 1\n}\nmarker_main = 2\n");

  cfg.apply(target.clone()).unwrap();

  assert_eq!(
    target.borrow().events,
    vec!["before", "set:marker_classpath", "after:main", "set:marker_main"]
  );
}

#[test]
fn before_hook_can_rename_block() {
  let target = RecordingTarget {
    rename_block: Some("deps".to_string()),
    ..Default::default()
  }
  .into_ref();
  let mut cfg = configurer("deps {\n  declare(\"lib-z\")\n}\nlib = useLib(\"lib-z\")\n");

  cfg.apply(target.clone()).unwrap();

  assert_eq!(cfg.classpath_closure_name(), "deps");
  assert!(target.borrow().properties.get("lib").is_some());
}

#[test]
fn after_hook_sees_output_capture() {
  let target = RecordingTarget::default().into_ref();
  let mut cfg = configurer("captureOutput(\"debug\")\nprint(\"hello\", 42)\n");

  cfg.apply(target.clone()).unwrap();

  let redirector = target.borrow().redirector.clone().expect("redirector captured");
  assert_eq!(redirector.lines(), vec!["hello\t42"]);
}

#[test]
fn after_hook_is_skipped_when_main_phase_fails_to_compile() {
  let target = RecordingTarget::default().into_ref();
  let mut cfg = configurer("x = = 1\n");

  assert!(cfg.apply(target.clone()).is_err());
  assert_eq!(target.borrow().events, vec!["before"]);
}
